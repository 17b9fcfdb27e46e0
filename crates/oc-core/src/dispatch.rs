//! Request dispatcher: builds generate calls and classifies failures.

use std::sync::Arc;

use oc_client::{GenerateRequest, OllamaApi, OllamaError};
use thiserror::Error;
use tracing::{debug, warn};

use crate::capabilities;
use crate::config::ConfigStore;

/// Appended to the prompt when reasoning output is requested in XML form.
pub const THINKING_INSTRUCTION: &str = "\n\nPlease use <think> tags to show your reasoning process.";

/// A failed generation.
///
/// `Http` carries the server's status code; `Local` covers connection
/// failures, timeouts and malformed bodies.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Error: {status}")]
    Http { status: u16, message: String },
    #[error("Exception: {0}")]
    Local(String),
}

impl DispatchError {
    pub fn status(&self) -> Option<u16> {
        match self {
            DispatchError::Http { status, .. } => Some(*status),
            DispatchError::Local(_) => None,
        }
    }

    /// A 500-class failure; the only kind that triggers recovery.
    pub fn is_server_error(&self) -> bool {
        self.status().is_some_and(|s| s >= 500)
    }

    /// Text for log and UI output, including the server's body if any.
    pub fn detail(&self) -> String {
        match self {
            DispatchError::Http { status, message } if !message.is_empty() => {
                format!("Error: {} ({})", status, message)
            }
            other => other.to_string(),
        }
    }
}

impl From<OllamaError> for DispatchError {
    fn from(err: OllamaError) -> Self {
        match err {
            OllamaError::Status { status, body } => DispatchError::Http {
                status,
                message: body,
            },
            other => DispatchError::Local(other.to_string()),
        }
    }
}

/// One prompt to send.
#[derive(Debug, Clone, Default)]
pub struct PromptRequest {
    pub model: String,
    pub prompt: String,
    pub system: Option<String>,
    /// Base64 image data.
    pub image: Option<String>,
    /// Apply `[ollama]` generation parameters.
    pub use_config_params: bool,
}

impl PromptRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            use_config_params: true,
            ..Self::default()
        }
    }

    /// Empty system prompts are dropped.
    pub fn system(mut self, system: Option<impl Into<String>>) -> Self {
        self.system = system.map(Into::into).filter(|s: &String| !s.trim().is_empty());
        self
    }

    pub fn image(mut self, image: Option<String>) -> Self {
        self.image = image;
        self
    }

    pub fn without_config_params(mut self) -> Self {
        self.use_config_params = false;
        self
    }
}

/// Sends prompts through an [`OllamaApi`].
#[derive(Clone)]
pub struct Dispatcher {
    api: Arc<dyn OllamaApi>,
    store: ConfigStore,
}

impl Dispatcher {
    pub fn new(api: Arc<dyn OllamaApi>, store: ConfigStore) -> Self {
        Self { api, store }
    }

    pub fn api(&self) -> &Arc<dyn OllamaApi> {
        &self.api
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// Build the wire request for a prompt.
    pub fn build_request(&self, request: &PromptRequest) -> GenerateRequest {
        let mut wire = GenerateRequest::new(&request.model, &request.prompt);
        wire.system = request.system.clone();

        let params = if request.use_config_params {
            Some(self.store.generation_params())
        } else {
            None
        };

        let name_caps = capabilities::from_name(&request.model);

        if let Some(params) = &params {
            wire.options = params.request_options();
            if let Some(stream) = params.stream() {
                wire.stream = stream;
            }
            wire.raw = params.raw();

            let thinking = params
                .enable_thinking()
                .unwrap_or_else(|| name_caps.supports_reasoning());
            if thinking && params.thinking_format() == "xml" && !request.prompt.contains("<think>") {
                wire.prompt.push_str(THINKING_INSTRUCTION);
            }
        }

        if let Some(image) = &request.image {
            let vision = params
                .as_ref()
                .and_then(|p| p.enable_vision())
                .unwrap_or_else(|| name_caps.supports_vision());
            if !vision {
                warn!(
                    "Image provided but model '{}' may not support vision",
                    request.model
                );
            }
            wire.images = vec![image.clone()];
        }

        wire
    }

    /// Send a prompt and return the response text.
    pub async fn ask(&self, request: &PromptRequest) -> Result<String, DispatchError> {
        let wire = self.build_request(request);
        debug!(
            "Generate: model={} stream={} options={} images={}",
            wire.model,
            wire.stream,
            wire.options.len(),
            wire.images.len()
        );
        self.api.generate(&wire).await.map_err(|e| {
            let err = DispatchError::from(e);
            debug!("Generate failed for {}: {}", request.model, err.detail());
            err
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Call, FakeApi};
    use serde_json::json;
    use std::fs;
    use tempfile::tempdir;

    fn dispatcher(config: &str, api: Arc<FakeApi>) -> (tempfile::TempDir, Dispatcher) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.ini");
        fs::write(&path, config).unwrap();
        (dir, Dispatcher::new(api, ConfigStore::new(path)))
    }

    #[test]
    fn test_error_display_keeps_prefixes() {
        let http = DispatchError::Http {
            status: 500,
            message: "boom".into(),
        };
        assert_eq!(http.to_string(), "Error: 500");
        assert!(http.is_server_error());
        assert_eq!(http.detail(), "Error: 500 (boom)");

        let local = DispatchError::Local("connection refused".into());
        assert_eq!(local.to_string(), "Exception: connection refused");
        assert!(!local.is_server_error());
    }

    #[test]
    fn test_disabled_params_are_not_sent() {
        let config = "[ollama]\ntemperature = -1\ntop_k = 20\nstream_response = false\n";
        let (_dir, d) = dispatcher(config, Arc::new(FakeApi::new()));
        let wire = d.build_request(&PromptRequest::new("llama3:8b", "hi"));
        assert_eq!(wire.options.get("temperature"), None);
        assert_eq!(wire.options["top_k"], json!(20));
        assert!(!wire.stream);
        assert_eq!(wire.prompt, "hi");
    }

    #[test]
    fn test_config_params_can_be_skipped() {
        let config = "[ollama]\ntop_k = 20\nenable_thinking = true\n";
        let (_dir, d) = dispatcher(config, Arc::new(FakeApi::new()));
        let wire = d.build_request(&PromptRequest::new("qwq:32b", "hi").without_config_params());
        assert!(wire.options.is_empty());
        assert_eq!(wire.prompt, "hi");
    }

    #[test]
    fn test_thinking_instruction() {
        let (_dir, d) = dispatcher("[ollama]\nenable_thinking = auto\n", Arc::new(FakeApi::new()));
        let wire = d.build_request(&PromptRequest::new("deepseek-r1:8b", "why?"));
        assert_eq!(wire.prompt, format!("why?{}", THINKING_INSTRUCTION));

        let wire = d.build_request(&PromptRequest::new("llama3:8b", "why?"));
        assert_eq!(wire.prompt, "why?");

        let wire = d.build_request(&PromptRequest::new("deepseek-r1:8b", "<think>already</think>"));
        assert_eq!(wire.prompt, "<think>already</think>");

        let (_dir, d) = dispatcher(
            "[ollama]\nenable_thinking = true\nthinking_format = markdown\n",
            Arc::new(FakeApi::new()),
        );
        let wire = d.build_request(&PromptRequest::new("deepseek-r1:8b", "why?"));
        assert_eq!(wire.prompt, "why?");
    }

    #[test]
    fn test_image_attached_to_non_vision_model() {
        let (_dir, d) = dispatcher("", Arc::new(FakeApi::new()));
        let wire = d.build_request(
            &PromptRequest::new("llama3:8b", "what is this").image(Some("AQID".into())),
        );
        assert_eq!(wire.images, vec!["AQID".to_string()]);
    }

    #[test]
    fn test_empty_system_prompt_dropped() {
        let (_dir, d) = dispatcher("", Arc::new(FakeApi::new()));
        let wire = d.build_request(&PromptRequest::new("m", "p").system(Some("  ")));
        assert_eq!(wire.system, None);
        let wire = d.build_request(&PromptRequest::new("m", "p").system(Some("be brief")));
        assert_eq!(wire.system.as_deref(), Some("be brief"));
    }

    #[tokio::test]
    async fn test_ask_classifies_errors() {
        let api = Arc::new(FakeApi::new());
        api.push_generate(Ok("pong".into()));
        api.push_generate(Err(OllamaError::Status {
            status: 500,
            body: "model runner crashed".into(),
        }));
        api.push_generate(Err(OllamaError::ServerNotRunning("refused".into())));
        let (_dir, d) = dispatcher("", api.clone());

        let request = PromptRequest::new("llama3:8b", "ping");
        assert_eq!(d.ask(&request).await.unwrap(), "pong");
        assert!(d.ask(&request).await.unwrap_err().is_server_error());
        assert!(matches!(
            d.ask(&request).await.unwrap_err(),
            DispatchError::Local(_)
        ));
        assert_eq!(
            api.calls(),
            vec![
                Call::Generate("llama3:8b".into()),
                Call::Generate("llama3:8b".into()),
                Call::Generate("llama3:8b".into()),
            ]
        );
    }

    #[tokio::test]
    async fn test_answer_starting_with_error_is_success() {
        let api = Arc::new(FakeApi::new());
        api.push_generate(Ok("Error: is a word too".into()));
        let (_dir, d) = dispatcher("", api);
        let answer = d.ask(&PromptRequest::new("m", "p")).await.unwrap();
        assert_eq!(answer, "Error: is a word too");
    }
}
