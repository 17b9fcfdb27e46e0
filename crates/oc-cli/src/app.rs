//! Shared wiring: one client and config store per process.

use std::sync::Arc;

use oc_client::{OllamaApi, OllamaClient};
use oc_core::lifecycle::{RecoveryPrompt, SystemRestarter};
use oc_core::{Catalog, ConfigStore, Dispatcher, MarkdownExporter, ModelManager, Settings};

pub(crate) struct App {
    pub settings: Settings,
    pub api: Arc<dyn OllamaApi>,
    pub store: ConfigStore,
}

impl App {
    pub fn new(settings: Settings) -> Self {
        let client =
            OllamaClient::with_url(&settings.base_url).with_probe_timeout(settings.probe_timeout);
        let store = ConfigStore::new(&settings.config_path);
        Self {
            settings,
            api: Arc::new(client),
            store,
        }
    }

    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(self.api.clone(), self.store.clone())
    }

    pub fn catalog(&self) -> Catalog {
        Catalog::new(self.api.clone(), self.store.clone())
    }

    pub fn manager(&self, prompt: Arc<dyn RecoveryPrompt>) -> ModelManager {
        let restarter = SystemRestarter::new(self.settings.restart_timeout);
        ModelManager::new(self.dispatcher(), Arc::new(restarter), prompt)
            .with_settle_delay(self.settings.settle_delay)
    }

    pub fn exporter(&self) -> MarkdownExporter {
        MarkdownExporter::new(self.dispatcher(), self.catalog(), self.settings.answers_dir())
    }
}
