//! Core of the Ollama consumer.
//!
//! Everything between the shell and the REST client lives here: the INI
//! config store, capability detection, preset selection, prompt dispatch,
//! the model lifecycle manager with its recovery protocol, markdown export
//! and the benchmark runner.

pub mod bench;
pub mod capabilities;
pub mod catalog;
pub mod config;
pub mod content;
pub mod dispatch;
pub mod export;
pub mod lifecycle;
pub mod presets;
mod session;
mod settings;
pub mod text;

#[cfg(test)]
pub(crate) mod testing;

pub use capabilities::{Capability, CapabilitySet};
pub use catalog::{Catalog, ModelDescriptor};
pub use config::{ConfigError, ConfigStore, GenerationParams};
pub use content::ContentType;
pub use dispatch::{DispatchError, Dispatcher, PromptRequest};
pub use export::{ExportError, MarkdownExporter};
pub use lifecycle::{ActionResult, LoadState, ModelManager};
pub use session::Session;
pub use settings::{Settings, SettingsBuilder};
