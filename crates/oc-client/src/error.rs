//! Error types for the Ollama client.

use thiserror::Error;

/// Errors that can occur while talking to the Ollama server.
#[derive(Debug, Error)]
pub enum OllamaError {
    /// Transport-level failure (connection refused, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The server reported an error inside a successful response.
    #[error("Ollama API error: {0}")]
    Api(String),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server is not running or not reachable.
    #[error("Ollama server not running at {0}. Start it with: ollama serve")]
    ServerNotRunning(String),
}

impl OllamaError {
    /// HTTP status code, when the server produced one.
    pub fn status(&self) -> Option<u16> {
        match self {
            OllamaError::Status { status, .. } => Some(*status),
            OllamaError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether the failure came from the server side (5xx).
    pub fn is_server_error(&self) -> bool {
        matches!(self.status(), Some(code) if (500..600).contains(&code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        let err = OllamaError::Status {
            status: 500,
            body: "model runner crashed".to_string(),
        };
        assert_eq!(err.status(), Some(500));
        assert!(err.is_server_error());

        let err = OllamaError::Status {
            status: 404,
            body: String::new(),
        };
        assert!(!err.is_server_error());

        let err = OllamaError::ServerNotRunning("http://localhost:11434".to_string());
        assert_eq!(err.status(), None);
        assert!(!err.is_server_error());
    }
}
