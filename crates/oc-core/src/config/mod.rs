//! Persistent configuration: `config.ini`.
//!
//! Sections:
//!
//! - `[ollama]`: active generation parameters, `system_prompt`,
//!   `current_loaded_model`
//! - `[llm_presets]`: `name = {json object}`
//! - `[blacklist]`: `models = ...`
//! - `[system_prompts]`: per-content-type prompts

mod blacklist;
mod params;
mod store;

pub use blacklist::{filter_blacklisted, parse_blacklist};
pub use params::{GenerationParams, ParamValue};
pub use store::{ConfigError, ConfigStore, PresetParams};
