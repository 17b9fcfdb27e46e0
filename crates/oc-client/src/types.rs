//! Wire types for the Ollama REST API.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Request to the generate API.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    /// Generation options; only explicitly configured keys are sent.
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub options: Map<String, Value>,
}

impl GenerateRequest {
    /// Create a non-streaming request with no options.
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            ..Self::default()
        }
    }
}

/// Response (or one streamed chunk) from the generate API.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// Request body for the show API.
#[derive(Debug, Serialize)]
pub struct ShowRequest<'a> {
    pub name: &'a str,
}

/// Response from the tags API (list models).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TagsResponse {
    #[serde(default)]
    pub models: Vec<ModelEntry>,
}

/// An installed model as reported by the tags API.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ModelEntry {
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub digest: String,
    #[serde(default)]
    pub modified_at: String,
    #[serde(default)]
    pub details: ModelDetails,
}

/// Model details shared by the tags, ps and show APIs.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct ModelDetails {
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub family: String,
    #[serde(default)]
    pub families: Option<Vec<String>>,
    #[serde(default)]
    pub parameter_size: String,
    #[serde(default)]
    pub quantization_level: String,
}

/// A model currently resident in server memory (ps API).
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct RunningModel {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub size_vram: u64,
    #[serde(default)]
    pub digest: String,
    #[serde(default)]
    pub details: ModelDetails,
    #[serde(default)]
    pub expires_at: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RunningResponse {
    #[serde(default)]
    pub models: Vec<RunningModel>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct VersionResponse {
    #[serde(default)]
    pub version: String,
}
