//! HTTP client for the Ollama server.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::api::OllamaApi;
use crate::error::OllamaError;
use crate::types::{
    GenerateRequest, GenerateResponse, ModelEntry, RunningModel, RunningResponse, ShowRequest,
    TagsResponse, VersionResponse,
};
use crate::DEFAULT_OLLAMA_URL;

/// Ollama API client.
#[derive(Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    probe_timeout: Duration,
}

impl OllamaClient {
    /// Create a new client against the default local server.
    pub fn new() -> Self {
        Self::with_url(DEFAULT_OLLAMA_URL)
    }

    /// Create a new client with a custom base URL.
    pub fn with_url(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            probe_timeout: Duration::from_secs(5),
        }
    }

    /// Timeout applied to the health and ps probes.
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn map_send_error(&self, e: reqwest::Error) -> OllamaError {
        if e.is_connect() {
            OllamaError::ServerNotRunning(self.base_url.clone())
        } else {
            OllamaError::Http(e)
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, OllamaError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(OllamaError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Join the `response` fields of a generate body.
///
/// Streaming bodies are newline-delimited JSON chunks; non-streaming bodies
/// are a single object. Both go through the same path.
pub(crate) fn collect_generate_body(body: &str) -> Result<String, OllamaError> {
    let mut text = String::new();
    for line in body.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let chunk: GenerateResponse = serde_json::from_str(line)?;
        if let Some(error) = chunk.error {
            return Err(OllamaError::Api(error));
        }
        text.push_str(&chunk.response);
        if chunk.done {
            break;
        }
    }
    Ok(text)
}

#[async_trait]
impl OllamaApi for OllamaClient {
    async fn list_models(&self) -> Result<Vec<ModelEntry>, OllamaError> {
        let response = self
            .client
            .get(self.url("/api/tags"))
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        let tags: TagsResponse = Self::check_status(response).await?.json().await?;
        Ok(tags.models)
    }

    async fn show_model(&self, name: &str) -> Result<Value, OllamaError> {
        let response = self
            .client
            .post(self.url("/api/show"))
            .json(&ShowRequest { name })
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        Ok(Self::check_status(response).await?.json().await?)
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<String, OllamaError> {
        debug!("POST /api/generate model={} stream={}", request.model, request.stream);
        let response = self
            .client
            .post(self.url("/api/generate"))
            .json(request)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        let body = Self::check_status(response).await?.text().await?;
        collect_generate_body(&body)
    }

    async fn unload(&self, name: &str) -> Result<u16, OllamaError> {
        let response = self
            .client
            .post(self.url("/api/unload"))
            .json(&serde_json::json!({ "model": name }))
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        Ok(response.status().as_u16())
    }

    async fn running_models(&self) -> Result<Vec<RunningModel>, OllamaError> {
        let response = self
            .client
            .get(self.url("/api/ps"))
            .timeout(self.probe_timeout)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;
        let running: RunningResponse = Self::check_status(response).await?.json().await?;
        Ok(running.models)
    }

    async fn version(&self) -> Result<String, OllamaError> {
        let response = self
            .client
            .get(self.url("/api/version"))
            .timeout(self.probe_timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    OllamaError::ServerNotRunning(self.base_url.clone())
                } else {
                    OllamaError::Http(e)
                }
            })?;
        let version: VersionResponse = Self::check_status(response).await?.json().await?;
        Ok(version.version)
    }
}
