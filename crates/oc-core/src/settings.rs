//! Process-level settings.

use std::path::PathBuf;
use std::time::Duration;

use oc_client::DEFAULT_OLLAMA_URL;

/// Settings for talking to the server and locating on-disk state.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Ollama server base URL
    pub base_url: String,
    /// INI config store path
    pub config_path: PathBuf,
    /// Root of `images/`, `texts/` and `answers/`
    pub content_dir: PathBuf,
    /// Timeout for health and ps probes
    pub probe_timeout: Duration,
    /// Timeout for each automated restart command
    pub restart_timeout: Duration,
    /// Pause after unloading a model before loading the next one
    pub settle_delay: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            config_path: PathBuf::from("config.ini"),
            content_dir: PathBuf::from("content"),
            probe_timeout: Duration::from_secs(5),
            restart_timeout: Duration::from_secs(10),
            settle_delay: Duration::from_secs(1),
        }
    }
}

impl Settings {
    /// Create settings from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let base_url = std::env::var("OLLAMA_HOST")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(|v| normalize_host(&v))
            .unwrap_or(defaults.base_url);

        let config_path = std::env::var("OC_CONFIG")
            .map(PathBuf::from)
            .unwrap_or(defaults.config_path);

        let content_dir = std::env::var("OC_CONTENT_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.content_dir);

        let settle_delay = std::env::var("OC_SETTLE_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.settle_delay);

        Self {
            base_url,
            config_path,
            content_dir,
            settle_delay,
            ..defaults
        }
    }

    pub fn images_dir(&self) -> PathBuf {
        self.content_dir.join("images")
    }

    pub fn texts_dir(&self) -> PathBuf {
        self.content_dir.join("texts")
    }

    pub fn answers_dir(&self) -> PathBuf {
        self.content_dir.join("answers")
    }

    /// Create a builder for settings.
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::default()
    }
}

/// `OLLAMA_HOST` may be a bare `host:port`.
fn normalize_host(value: &str) -> String {
    let value = value.trim().trim_end_matches('/');
    if value.starts_with("http://") || value.starts_with("https://") {
        value.to_string()
    } else {
        format!("http://{}", value)
    }
}

/// Builder for settings.
#[derive(Debug, Default)]
pub struct SettingsBuilder {
    settings: Settings,
}

impl SettingsBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.settings.base_url = url.into();
        self
    }

    pub fn config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings.config_path = path.into();
        self
    }

    pub fn content_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings.content_dir = path.into();
        self
    }

    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.settings.probe_timeout = timeout;
        self
    }

    pub fn restart_timeout(mut self, timeout: Duration) -> Self {
        self.settings.restart_timeout = timeout;
        self
    }

    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.settings.settle_delay = delay;
        self
    }

    pub fn build(self) -> Settings {
        self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_host() {
        assert_eq!(normalize_host("127.0.0.1:11434"), "http://127.0.0.1:11434");
        assert_eq!(normalize_host("https://ollama.lan/"), "https://ollama.lan");
    }

    #[test]
    fn test_builder_pattern() {
        let settings = Settings::builder()
            .base_url("http://gpu-box:11434")
            .content_dir("/tmp/content")
            .settle_delay(Duration::ZERO)
            .build();
        assert_eq!(settings.base_url, "http://gpu-box:11434");
        assert_eq!(settings.answers_dir(), PathBuf::from("/tmp/content/answers"));
        assert_eq!(settings.settle_delay, Duration::ZERO);
        assert_eq!(settings.config_path, PathBuf::from("config.ini"));
    }
}
