//! The seam between the consumer and the inference server.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::OllamaError;
use crate::types::{GenerateRequest, ModelEntry, RunningModel};

/// Operations the consumer performs against an Ollama server.
#[async_trait]
pub trait OllamaApi: Send + Sync {
    /// List installed models (`GET /api/tags`).
    async fn list_models(&self) -> Result<Vec<ModelEntry>, OllamaError>;

    /// Raw model metadata (`POST /api/show`).
    ///
    /// Returned untyped: callers must tolerate any JSON shape.
    async fn show_model(&self, name: &str) -> Result<Value, OllamaError>;

    /// Generate a completion and return the concatenated response text.
    async fn generate(&self, request: &GenerateRequest) -> Result<String, OllamaError>;

    /// Ask the server to evict a model. Returns the HTTP status code.
    async fn unload(&self, name: &str) -> Result<u16, OllamaError>;

    /// Models currently resident in memory (`GET /api/ps`).
    async fn running_models(&self) -> Result<Vec<RunningModel>, OllamaError>;

    /// Server version (`GET /api/version`), used as the health probe.
    async fn version(&self) -> Result<String, OllamaError>;
}
