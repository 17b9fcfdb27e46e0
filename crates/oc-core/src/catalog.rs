//! Installed model listing and metadata.

use std::sync::Arc;

use oc_client::{ModelEntry, OllamaApi, OllamaError};
use serde::Serialize;
use tracing::debug;

use crate::capabilities::{self, CapabilitySet};
use crate::config::{filter_blacklisted, ConfigStore};

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Snapshot of an installed model. Fetched fresh on every listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelDescriptor {
    pub name: String,
    pub size_bytes: u64,
    pub parameter_size: String,
    pub family: String,
    pub format: String,
    pub quantization: String,
    pub modified_at: String,
}

impl ModelDescriptor {
    /// On-disk size in GiB, rounded to two decimals.
    pub fn size_gb(&self) -> f64 {
        (self.size_bytes as f64 / BYTES_PER_GB * 100.0).round() / 100.0
    }

    pub fn parameter_size_or_unknown(&self) -> &str {
        if self.parameter_size.is_empty() {
            "Unknown"
        } else {
            &self.parameter_size
        }
    }
}

impl From<ModelEntry> for ModelDescriptor {
    fn from(entry: ModelEntry) -> Self {
        Self {
            name: entry.name,
            size_bytes: entry.size,
            parameter_size: entry.details.parameter_size,
            family: entry.details.family,
            format: entry.details.format,
            quantization: entry.details.quantization_level,
            modified_at: entry.modified_at,
        }
    }
}

/// Read-only view of the server's installed models.
#[derive(Clone)]
pub struct Catalog {
    api: Arc<dyn OllamaApi>,
    store: ConfigStore,
}

impl Catalog {
    pub fn new(api: Arc<dyn OllamaApi>, store: ConfigStore) -> Self {
        Self { api, store }
    }

    /// Installed models sorted by lowercase name.
    pub async fn list_models(
        &self,
        exclude_blacklisted: bool,
    ) -> Result<Vec<ModelDescriptor>, OllamaError> {
        let entries = self.api.list_models().await?;
        let mut models: Vec<ModelDescriptor> =
            entries.into_iter().map(ModelDescriptor::from).collect();

        if exclude_blacklisted {
            let blacklist = self.store.blacklist();
            let before = models.len();
            models = filter_blacklisted(models, &blacklist, |m| m.name.as_str());
            debug!("Blacklist hid {} model(s)", before - models.len());
        }

        models.sort_by_key(|m| m.name.to_lowercase());
        Ok(models)
    }

    /// First model whose name contains `name`.
    pub async fn model_info(&self, name: &str) -> Result<Option<ModelDescriptor>, OllamaError> {
        let models = self.api.list_models().await?;
        Ok(models
            .into_iter()
            .find(|m| m.name.contains(name))
            .map(ModelDescriptor::from))
    }

    /// Capabilities from server metadata, or from the name when the show
    /// call fails.
    pub async fn capabilities_for(&self, name: &str) -> CapabilitySet {
        match self.api.show_model(name).await {
            Ok(metadata) => capabilities::from_metadata(name, &metadata),
            Err(e) => {
                debug!("show failed for {}: {}; using name heuristics", name, e);
                capabilities::from_name(name)
            }
        }
    }

    /// Listing with capabilities for each model.
    pub async fn list_annotated(
        &self,
        exclude_blacklisted: bool,
    ) -> Result<Vec<(ModelDescriptor, CapabilitySet)>, OllamaError> {
        let models = self.list_models(exclude_blacklisted).await?;
        let mut annotated = Vec::with_capacity(models.len());
        for model in models {
            let caps = self.capabilities_for(&model.name).await;
            annotated.push((model, caps));
        }
        Ok(annotated)
    }

    pub fn blacklist(&self) -> Vec<String> {
        self.store.blacklist()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{entry, store_with, Call, FakeApi};
    use serde_json::json;

    fn catalog(api: Arc<FakeApi>, config: &str) -> (tempfile::TempDir, Catalog) {
        let (dir, store) = store_with(config);
        (dir, Catalog::new(api, store))
    }

    #[tokio::test]
    async fn test_listing_sorted_and_filtered() {
        let api = Arc::new(FakeApi::new());
        api.set_models(&["Zephyr:7b", "llama3:8b", "nomic-embed-text:latest", "gemma2:9b"]);
        let (_dir, catalog) = catalog(api, "[blacklist]\nmodels = nomic-embed-text:latest\n");

        let names: Vec<String> = catalog
            .list_models(true)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(names, vec!["gemma2:9b", "llama3:8b", "Zephyr:7b"]);

        assert_eq!(catalog.list_models(false).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_model_info_matches_substring() {
        let api = Arc::new(FakeApi::new());
        api.set_model_entries(vec![entry("llama3:8b", "8.0B"), entry("qwen3:14b", "14.8B")]);
        let (_dir, catalog) = catalog(api, "");

        let info = catalog.model_info("qwen3").await.unwrap().unwrap();
        assert_eq!(info.name, "qwen3:14b");
        assert_eq!(info.parameter_size, "14.8B");
        assert_eq!(info.size_gb(), 4.38);
        assert!(catalog.model_info("mistral").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_capabilities_fall_back_to_name() {
        let api = Arc::new(FakeApi::new());
        api.set_show("gemma3:4b", json!({"capabilities": ["completion", "vision"]}));
        let (_dir, catalog) = catalog(api.clone(), "");

        assert_eq!(catalog.capabilities_for("gemma3:4b").await.tags(), vec!["vision"]);
        assert_eq!(
            catalog.capabilities_for("deepseek-r1:8b").await.tags(),
            vec!["reasoning"]
        );
        assert_eq!(
            api.calls(),
            vec![Call::Show("gemma3:4b".into()), Call::Show("deepseek-r1:8b".into())]
        );
    }
}
