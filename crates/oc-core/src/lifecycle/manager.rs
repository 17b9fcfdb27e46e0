//! Model loading, unloading and switching.

use std::sync::Arc;
use std::time::Duration;

use oc_client::{OllamaApi, RunningModel};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::recovery::{RecoveryOutcome, RecoveryPrompt};
use super::service::ServiceRestarter;
use super::state::{ActionResult, LoadState};
use crate::config::ConfigStore;
use crate::dispatch::{Dispatcher, PromptRequest};
use crate::session::Session;

/// Prompt sent to force a model into memory.
pub const PROBE_PROMPT: &str = "ping";

/// Result of [`ModelManager::request_load`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub result: ActionResult,
    /// Set when a server error triggered the recovery protocol.
    pub recovery: Option<RecoveryOutcome>,
}

impl LoadReport {
    pub fn success(&self) -> bool {
        self.result.success
    }
}

/// Drives the server's model slot toward a requested model.
///
/// Never returns `Err`: every failure becomes an [`ActionResult`].
pub struct ModelManager {
    dispatcher: Dispatcher,
    pub(super) restarter: Arc<dyn ServiceRestarter>,
    pub(super) prompt: Arc<dyn RecoveryPrompt>,
    settle_delay: Duration,
}

impl ModelManager {
    pub fn new(
        dispatcher: Dispatcher,
        restarter: Arc<dyn ServiceRestarter>,
        prompt: Arc<dyn RecoveryPrompt>,
    ) -> Self {
        Self {
            dispatcher,
            restarter,
            prompt,
            settle_delay: Duration::from_secs(1),
        }
    }

    /// Pause between unloading one model and loading the next.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    pub(super) fn api(&self) -> &Arc<dyn OllamaApi> {
        self.dispatcher.api()
    }

    pub(super) fn store(&self) -> &ConfigStore {
        self.dispatcher.store()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Health probe: the version endpoint answers.
    pub async fn is_server_running(&self) -> bool {
        match self.api().version().await {
            Ok(version) => {
                debug!("Ollama {} is running", version);
                true
            }
            Err(e) => {
                debug!("Health check failed: {}", e);
                false
            }
        }
    }

    /// Models resident in server memory; empty when the server is unreachable.
    pub async fn running_models(&self) -> Vec<RunningModel> {
        self.api().running_models().await.unwrap_or_else(|e| {
            debug!("Could not list running models: {}", e);
            Vec::new()
        })
    }

    /// Live residency check against the server.
    pub async fn is_model_loaded(&self, name: &str) -> bool {
        self.running_models().await.iter().any(|m| m.name == name)
    }

    /// Seed the session from the persisted hint, trusting it only when the
    /// server confirms the model is resident.
    pub async fn reconcile(&self, session: &mut Session) {
        let hint = match self.store().current_loaded_model() {
            Ok(hint) => hint,
            Err(e) => {
                warn!("Could not read current model: {}", e);
                None
            }
        };
        match hint {
            Some(name) if self.is_model_loaded(&name).await => {
                debug!("Persisted model {} is resident", name);
                session.set_load_state(LoadState::Loaded(name));
            }
            Some(name) => {
                debug!("Persisted model {} is not resident", name);
                session.set_load_state(LoadState::Unloaded);
            }
            None => session.set_load_state(LoadState::Unknown),
        }
    }

    fn persist_current(&self, model: Option<&str>) {
        if let Err(e) = self.store().set_current_loaded_model(model) {
            warn!("Could not record current model: {}", e);
        }
    }

    /// Load a model by sending the probe prompt.
    ///
    /// Success means the probe answered without error; residency is then
    /// checked against the running list and only logged.
    pub async fn load_model(&self, session: &mut Session, name: &str) -> ActionResult {
        session.set_load_state(LoadState::Loading(name.to_string()));

        let system = self.store().system_prompt(None);
        let request = PromptRequest::new(name, PROBE_PROMPT).system(Some(system));

        match self.dispatcher.ask(&request).await {
            Ok(_) => {
                self.persist_current(Some(name));
                session.set_load_state(LoadState::Loaded(name.to_string()));
                if !self.is_model_loaded(name).await {
                    warn!("{} answered the probe but is not listed as running", name);
                }
                info!("Model {} loaded", name);
                ActionResult::ok(format!("Model {} loaded successfully", name))
            }
            Err(err) => {
                session.set_load_state(LoadState::Unloaded);
                let result =
                    ActionResult::failed(format!("Failed to load model {}: {}", name, err.detail()));
                match err.status() {
                    Some(status) => result.with_status(status),
                    None => result,
                }
            }
        }
    }

    /// Ask the server to evict a model. 200 and 404 both count as success.
    pub async fn unload_model(&self, session: &mut Session, name: &str) -> ActionResult {
        let tracked = session.loaded_model().map_or(true, |m| m == name);
        if tracked {
            session.set_load_state(LoadState::Unloading(name.to_string()));
        }

        let result = match self.api().unload(name).await {
            Ok(200) => ActionResult::ok(format!("Model {} unloaded successfully", name)),
            Ok(404) => ActionResult::ok(format!(
                "Model {} was not loaded (404 - already unloaded)",
                name
            )),
            Ok(status) => ActionResult::failed(format!("HTTP {}", status)).with_status(status),
            Err(e) => {
                let result = ActionResult::failed(e.to_string());
                match e.status() {
                    Some(status) => result.with_status(status),
                    None => result,
                }
            }
        };

        if result.success {
            let recorded = self.store().current_loaded_model().ok().flatten();
            if recorded.as_deref() == Some(name) {
                self.persist_current(None);
            }
            if tracked {
                session.set_load_state(LoadState::Unloaded);
            }
        } else if tracked {
            session.set_load_state(LoadState::Unknown);
        }

        debug!("Unload {}: {}", name, result.message);
        result
    }

    /// Unload every installed model, ignoring the blacklist.
    pub async fn unload_all_models(&self, session: &mut Session) -> Vec<(String, ActionResult)> {
        let models = match self.api().list_models().await {
            Ok(models) => models,
            Err(e) => {
                warn!("Could not list models to unload: {}", e);
                Vec::new()
            }
        };

        let mut results = Vec::with_capacity(models.len());
        for model in models {
            let result = self.unload_model(session, &model.name).await;
            info!("Unload {}: {}", model.name, result.message);
            results.push((model.name, result));
        }

        self.persist_current(None);
        session.set_load_state(LoadState::Unloaded);
        results
    }

    /// Switch to `name`: unload the previously loaded model, load `name`,
    /// and on a server error run recovery and retry the load once.
    pub async fn request_load(&self, session: &mut Session, name: &str) -> LoadReport {
        if let Some(previous) = session.loaded_model().map(str::to_string) {
            if previous != name {
                info!("Unloading previous model: {}", previous);
                let result = self.unload_model(session, &previous).await;
                if !result.success {
                    warn!("Unload of {} failed: {}", previous, result.message);
                }
                sleep(self.settle_delay).await;
            }
        }

        info!("Loading model: {}", name);
        let result = self.load_model(session, name).await;
        if result.success || !result.is_server_error() {
            return LoadReport {
                result,
                recovery: None,
            };
        }

        warn!("{}; attempting recovery", result.message);
        let outcome = self.recover(session, name).await;
        if !outcome.is_success() {
            return LoadReport {
                result: outcome.to_result(),
                recovery: Some(outcome),
            };
        }

        info!("Retrying load of {}", name);
        let retry = self.load_model(session, name).await;
        LoadReport {
            result: retry,
            recovery: Some(outcome),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{manager_with, Call, FakeApi};
    use oc_client::OllamaError;

    fn server_error() -> OllamaError {
        OllamaError::Status {
            status: 500,
            body: "llama runner process has terminated".into(),
        }
    }

    #[tokio::test]
    async fn test_unload_status_codes() {
        let api = Arc::new(FakeApi::new());
        api.push_unload(Ok(200));
        api.push_unload(Ok(404));
        api.push_unload(Ok(503));
        let (_dir, manager, _, _) = manager_with(api.clone(), "");
        let mut session = Session::new();

        assert!(manager.unload_model(&mut session, "a").await.success);
        assert!(manager.unload_model(&mut session, "b").await.success);
        let failed = manager.unload_model(&mut session, "c").await;
        assert!(!failed.success);
        assert!(failed.message.contains("503"));
        assert_eq!(failed.status, Some(503));
    }

    #[tokio::test]
    async fn test_unload_connection_failure_is_a_result() {
        let api = Arc::new(FakeApi::new());
        api.push_unload(Err(OllamaError::ServerNotRunning("http://localhost:11434".into())));
        let (_dir, manager, _, _) = manager_with(api, "");
        let mut session = Session::new();
        let result = manager.unload_model(&mut session, "a").await;
        assert!(!result.success);
        assert_eq!(session.load_state(), &LoadState::Unknown);
    }

    #[tokio::test]
    async fn test_load_persists_current_model() {
        let api = Arc::new(FakeApi::new());
        let (_dir, manager, _, _) = manager_with(api.clone(), "[ollama]\nsystem_prompt = Be brief.\n");
        let mut session = Session::new();

        let result = manager.load_model(&mut session, "llama3:8b").await;
        assert!(result.success);
        assert_eq!(session.loaded_model(), Some("llama3:8b"));
        assert_eq!(
            manager.store().current_loaded_model().unwrap().as_deref(),
            Some("llama3:8b")
        );
        let probe = api.last_generate().unwrap();
        assert_eq!(probe.prompt, PROBE_PROMPT);
        assert_eq!(probe.system.as_deref(), Some("Be brief."));
    }

    #[tokio::test]
    async fn test_failed_load_is_not_retried_without_server_error() {
        let api = Arc::new(FakeApi::new());
        api.push_generate(Err(OllamaError::Status {
            status: 404,
            body: "model not found".into(),
        }));
        let (_dir, manager, restarter, _) = manager_with(api.clone(), "");
        let mut session = Session::new();

        let report = manager.request_load(&mut session, "ghost:1b").await;
        assert!(!report.success());
        assert_eq!(report.recovery, None);
        assert_eq!(session.load_state(), &LoadState::Unloaded);
        assert_eq!(api.count(|c| matches!(c, Call::Generate(_))), 1);
        assert!(restarter.commands().is_empty());
    }

    #[tokio::test]
    async fn test_switch_unloads_previous_once_then_probes_once() {
        let api = Arc::new(FakeApi::new());
        // the unload of Y fails; the load of X must still happen
        api.push_unload(Ok(500));
        let (_dir, manager, _, _) = manager_with(api.clone(), "");
        let mut session = Session::new();
        session.set_load_state(LoadState::Loaded("Y".into()));

        let report = manager.request_load(&mut session, "X").await;
        assert!(report.success());

        let relevant: Vec<Call> = api
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Unload(_) | Call::Generate(_)))
            .collect();
        assert_eq!(relevant, vec![Call::Unload("Y".into()), Call::Generate("X".into())]);
        assert_eq!(session.loaded_model(), Some("X"));
    }

    #[tokio::test]
    async fn test_same_model_is_not_unloaded() {
        let api = Arc::new(FakeApi::new());
        let (_dir, manager, _, _) = manager_with(api.clone(), "");
        let mut session = Session::new();
        session.set_load_state(LoadState::Loaded("X".into()));

        manager.request_load(&mut session, "X").await;
        assert_eq!(api.count(|c| matches!(c, Call::Unload(_))), 0);
    }

    #[tokio::test]
    async fn test_server_error_triggers_one_retry() {
        let api = Arc::new(FakeApi::new());
        api.push_generate(Err(server_error()));
        api.push_generate(Ok("pong".into()));
        let (_dir, manager, _, _) = manager_with(api.clone(), "");
        let mut session = Session::new();

        let report = manager.request_load(&mut session, "big:70b").await;
        assert!(report.success());
        assert_eq!(report.recovery, Some(RecoveryOutcome::Cleared));
        assert_eq!(api.count(|c| matches!(c, Call::Generate(_))), 2);
    }

    #[tokio::test]
    async fn test_retry_failure_is_final() {
        let api = Arc::new(FakeApi::new());
        api.push_generate(Err(server_error()));
        api.push_generate(Err(server_error()));
        api.push_generate(Ok("never reached".into()));
        let (_dir, manager, _, _) = manager_with(api.clone(), "");
        let mut session = Session::new();

        let report = manager.request_load(&mut session, "big:70b").await;
        assert!(!report.success());
        assert_eq!(api.count(|c| matches!(c, Call::Generate(_))), 2);
    }

    #[tokio::test]
    async fn test_reconcile_trusts_only_live_state() {
        let api = Arc::new(FakeApi::new());
        let (_dir, manager, _, _) =
            manager_with(api.clone(), "[ollama]\ncurrent_loaded_model = llama3:8b\n");
        let mut session = Session::new();

        manager.reconcile(&mut session).await;
        assert_eq!(session.load_state(), &LoadState::Unloaded);

        api.set_running(&["llama3:8b"]);
        manager.reconcile(&mut session).await;
        assert_eq!(session.loaded_model(), Some("llama3:8b"));
    }
}
