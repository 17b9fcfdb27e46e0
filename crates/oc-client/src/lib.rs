//! # Ollama REST client
//!
//! Typed access to the endpoints the consumer relies on:
//!
//! ```text
//! GET  /api/tags      list installed models
//! POST /api/show      model metadata (capabilities, template, details)
//! POST /api/generate  prompt -> response
//! POST /api/unload    evict a model from memory
//! GET  /api/ps        models currently resident
//! GET  /api/version   health probe
//! ```
//!
//! Callers depend on the [`OllamaApi`] trait so the lifecycle and dispatch
//! logic can run against a scripted server in tests.

mod api;
mod client;
mod error;
mod types;

pub use api::OllamaApi;
pub use client::OllamaClient;
pub use error::OllamaError;
pub use types::{
    GenerateRequest, GenerateResponse, ModelDetails, ModelEntry, RunningModel, ShowRequest,
    TagsResponse,
};

/// Default Ollama server URL.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
