//! Load state and action results.

use std::fmt;

/// Belief about the model slot of the inference server.
///
/// A hint only: the server may evict models on its own. Use
/// [`ModelManager::is_model_loaded`](super::ModelManager::is_model_loaded)
/// for the live answer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LoadState {
    #[default]
    Unknown,
    Loading(String),
    Loaded(String),
    Unloading(String),
    Unloaded,
    Recovering(String),
}

impl LoadState {
    pub fn loaded_model(&self) -> Option<&str> {
        match self {
            LoadState::Loaded(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadState::Unknown => f.write_str("unknown"),
            LoadState::Loading(name) => write!(f, "loading {}", name),
            LoadState::Loaded(name) => write!(f, "loaded {}", name),
            LoadState::Unloading(name) => write!(f, "unloading {}", name),
            LoadState::Unloaded => f.write_str("unloaded"),
            LoadState::Recovering(name) => write!(f, "recovering {}", name),
        }
    }
}

/// Outcome of a lifecycle operation. Failures are values, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResult {
    pub success: bool,
    pub message: String,
    /// HTTP status behind a failure, when there was one.
    pub status: Option<u16>,
}

impl ActionResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            status: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// A 500-class failure.
    pub fn is_server_error(&self) -> bool {
        !self.success && self.status.is_some_and(|s| s >= 500)
    }
}

impl fmt::Display for ActionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}
