//! INI-backed config store.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use ini::{Ini, ParseOption};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use super::blacklist::parse_blacklist;
use super::params::GenerationParams;
use crate::content::ContentType;

const OLLAMA_SECTION: &str = "ollama";
const PRESETS_SECTION: &str = "llm_presets";
const BLACKLIST_SECTION: &str = "blacklist";
const PROMPTS_SECTION: &str = "system_prompts";
const CURRENT_MODEL_KEY: &str = "current_loaded_model";

/// A preset: parameter name to value.
pub type PresetParams = Map<String, Value>;

/// Config store errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[from] ini::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("preset '{0}' not found")]
    PresetNotFound(String),
}

/// Read-then-write access to the `config.ini` file.
///
/// Every call re-reads the file so edits made while the program runs are
/// picked up. Writes are not transactional.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parse_option() -> ParseOption {
        ParseOption {
            enabled_quote: false,
            enabled_escape: true,
            enabled_indented_mutiline_value: true,
            ..ParseOption::default()
        }
    }

    /// Load the file; a missing file reads as empty.
    pub fn load(&self) -> Result<Ini, ConfigError> {
        if !self.path.exists() {
            return Ok(Ini::new());
        }
        Ok(Ini::load_from_file_opt(&self.path, Self::parse_option())?)
    }

    pub fn save(&self, ini: &Ini) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        ini.write_to_file(&self.path)?;
        Ok(())
    }

    /// Load, logging and defaulting on failure.
    fn load_or_empty(&self) -> Ini {
        self.load().unwrap_or_else(|e| {
            warn!("Error reading config {}: {}", self.path.display(), e);
            Ini::new()
        })
    }

    /// The model last recorded as loaded. A hint only.
    pub fn current_loaded_model(&self) -> Result<Option<String>, ConfigError> {
        let ini = self.load()?;
        Ok(ini
            .get_from(Some(OLLAMA_SECTION), CURRENT_MODEL_KEY)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string))
    }

    pub fn set_current_loaded_model(&self, model: Option<&str>) -> Result<(), ConfigError> {
        let mut ini = self.load()?;
        ini.set_to(
            Some(OLLAMA_SECTION),
            CURRENT_MODEL_KEY.to_string(),
            model.unwrap_or("").to_string(),
        );
        self.save(&ini)
    }

    /// System prompt for a content type, falling back to the default prompt.
    pub fn system_prompt(&self, content_type: Option<ContentType>) -> String {
        let ini = self.load_or_empty();

        if let Some(key) = content_type.map(ContentType::system_prompt_key) {
            if let Some(prompt) = ini.get_from(Some(PROMPTS_SECTION), key) {
                return prompt.trim().to_string();
            }
        }

        ini.get_from(Some(OLLAMA_SECTION), "system_prompt")
            .map(|p| p.trim().to_string())
            .unwrap_or_default()
    }

    /// Explicitly configured generation parameters.
    pub fn generation_params(&self) -> GenerationParams {
        let ini = self.load_or_empty();
        match ini.section(Some(OLLAMA_SECTION)) {
            Some(section) => GenerationParams::from_pairs(section.iter()),
            None => GenerationParams::default(),
        }
    }

    /// All presets in file order. Entries with invalid JSON are skipped.
    pub fn presets(&self) -> IndexMap<String, PresetParams> {
        let ini = self.load_or_empty();
        let mut presets = IndexMap::new();

        let Some(section) = ini.section(Some(PRESETS_SECTION)) else {
            return presets;
        };

        for (name, raw) in section.iter() {
            match serde_json::from_str::<Value>(raw) {
                Ok(Value::Object(params)) => {
                    presets.insert(name.to_string(), params);
                }
                Ok(_) => warn!("Preset '{}' is not a JSON object", name),
                Err(e) => warn!("Invalid JSON in preset '{}': {}", name, e),
            }
        }

        presets
    }

    /// Copy a preset's parameters over the active `[ollama]` parameters.
    ///
    /// Keys the preset does not mention keep their current value.
    pub fn apply_preset(&self, name: &str) -> Result<(), ConfigError> {
        let presets = self.presets();
        let params = presets
            .get(name)
            .ok_or_else(|| ConfigError::PresetNotFound(name.to_string()))?;

        let mut ini = self.load()?;
        for (key, value) in params {
            ini.set_to(Some(OLLAMA_SECTION), key.clone(), config_value(value));
        }
        self.save(&ini)?;

        debug!("Applied preset '{}' ({} parameters)", name, params.len());
        Ok(())
    }

    /// Blacklisted model names.
    pub fn blacklist(&self) -> Vec<String> {
        let ini = self.load_or_empty();
        ini.get_from(Some(BLACKLIST_SECTION), "models")
            .map(parse_blacklist)
            .unwrap_or_default()
    }
}

/// Render a JSON preset value the way the `[ollama]` section expects it.
fn config_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::params::ParamValue;
    use tempfile::tempdir;

    const SAMPLE: &str = r#"[ollama]
system_prompt = You are concise.
temperature = 0.7
top_k = -1
current_loaded_model = llama3:8b

[llm_presets]
coding = {"temperature": 0.1, "top_p": 0.9, "repeat_penalty": 1.1}
broken = {"temperature": 0.1
creative_writing = {"temperature": 1.0, "top_k": 80}

[system_prompts]
code_analysis = You review code.

[blacklist]
models = ["nomic-embed-text:latest", "llava:7b"]
"#;

    fn store_with(contents: &str) -> (tempfile::TempDir, ConfigStore) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.ini");
        fs::write(&path, contents).unwrap();
        (dir, ConfigStore::new(path))
    }

    #[test]
    fn test_missing_file_reads_empty() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("absent.ini"));
        assert_eq!(store.current_loaded_model().unwrap(), None);
        assert!(store.presets().is_empty());
        assert!(store.blacklist().is_empty());
        assert_eq!(store.system_prompt(None), "");
    }

    #[test]
    fn test_current_model_roundtrip() {
        let (_dir, store) = store_with(SAMPLE);
        assert_eq!(store.current_loaded_model().unwrap().as_deref(), Some("llama3:8b"));

        store.set_current_loaded_model(Some("qwen3:14b")).unwrap();
        assert_eq!(store.current_loaded_model().unwrap().as_deref(), Some("qwen3:14b"));

        store.set_current_loaded_model(None).unwrap();
        assert_eq!(store.current_loaded_model().unwrap(), None);

        // other sections survive the rewrite
        assert_eq!(store.presets().len(), 2);
    }

    #[test]
    fn test_system_prompt_by_content_type() {
        let (_dir, store) = store_with(SAMPLE);
        assert_eq!(store.system_prompt(Some(ContentType::Code)), "You review code.");
        assert_eq!(store.system_prompt(Some(ContentType::Image)), "You are concise.");
        assert_eq!(store.system_prompt(None), "You are concise.");
    }

    #[test]
    fn test_invalid_preset_is_skipped() {
        let (_dir, store) = store_with(SAMPLE);
        let presets = store.presets();
        let names: Vec<&str> = presets.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["coding", "creative_writing"]);
    }

    #[test]
    fn test_apply_preset_overwrites_active_parameters() {
        let (_dir, store) = store_with(SAMPLE);

        store.apply_preset("creative_writing").unwrap();
        let params = store.generation_params();
        assert_eq!(params.get("temperature"), Some(&ParamValue::Float(1.0)));
        assert_eq!(params.get("top_k"), Some(&ParamValue::Int(80)));

        store.apply_preset("coding").unwrap();
        let params = store.generation_params();
        assert_eq!(params.get("temperature"), Some(&ParamValue::Float(0.1)));
        assert_eq!(params.get("top_p"), Some(&ParamValue::Float(0.9)));
        // not restored: the previous preset's top_k stays until overwritten
        assert_eq!(params.get("top_k"), Some(&ParamValue::Int(80)));
    }

    #[test]
    fn test_apply_unknown_preset() {
        let (_dir, store) = store_with(SAMPLE);
        let err = store.apply_preset("nope").unwrap_err();
        assert!(matches!(err, ConfigError::PresetNotFound(name) if name == "nope"));
    }

    #[test]
    fn test_blacklist_from_file() {
        let (_dir, store) = store_with(SAMPLE);
        assert_eq!(
            store.blacklist(),
            vec!["nomic-embed-text:latest".to_string(), "llava:7b".to_string()]
        );
    }
}
