//! Scripted fakes for unit tests.

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use oc_client::{
    GenerateRequest, ModelDetails, ModelEntry, OllamaApi, OllamaError, RunningModel,
};
use serde_json::Value;
use tempfile::TempDir;

use crate::config::ConfigStore;
use crate::dispatch::Dispatcher;
use crate::lifecycle::{
    default_restart_plan, ModelManager, RecoveryPrompt, RestartCommand, ServiceError,
    ServiceRestarter,
};

/// A call made against [`FakeApi`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List,
    Show(String),
    Generate(String),
    Unload(String),
    Running,
    Version,
}

/// In-memory server. Queued responses are consumed in order; an empty
/// queue falls back to a healthy default.
#[derive(Default)]
pub struct FakeApi {
    calls: Mutex<Vec<Call>>,
    generate: Mutex<VecDeque<Result<String, OllamaError>>>,
    unload: Mutex<VecDeque<Result<u16, OllamaError>>>,
    version: Mutex<VecDeque<Result<String, OllamaError>>>,
    requests: Mutex<Vec<GenerateRequest>>,
    models: Mutex<Vec<ModelEntry>>,
    running: Mutex<Vec<String>>,
    show: Mutex<HashMap<String, Value>>,
    down: AtomicBool,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    pub fn push_generate(&self, result: Result<String, OllamaError>) {
        self.generate.lock().unwrap().push_back(result);
    }

    pub fn push_unload(&self, result: Result<u16, OllamaError>) {
        self.unload.lock().unwrap().push_back(result);
    }

    pub fn push_version(&self, result: Result<String, OllamaError>) {
        self.version.lock().unwrap().push_back(result);
    }

    /// Every health probe fails.
    pub fn always_down(&self) {
        self.down.store(true, Ordering::SeqCst);
    }

    pub fn set_models(&self, names: &[&str]) {
        *self.models.lock().unwrap() = names.iter().map(|n| entry(n, "")).collect();
    }

    pub fn set_model_entries(&self, entries: Vec<ModelEntry>) {
        *self.models.lock().unwrap() = entries;
    }

    pub fn set_running(&self, names: &[&str]) {
        *self.running.lock().unwrap() = names.iter().map(|n| n.to_string()).collect();
    }

    pub fn set_show(&self, name: &str, metadata: Value) {
        self.show.lock().unwrap().insert(name.to_string(), metadata);
    }

    pub fn last_generate(&self) -> Option<GenerateRequest> {
        self.requests.lock().unwrap().last().cloned()
    }

    pub fn generate_requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().unwrap().clone()
    }
}

/// A tags entry with the given parameter size.
pub fn entry(name: &str, parameter_size: &str) -> ModelEntry {
    ModelEntry {
        name: name.to_string(),
        size: 4_700_000_000,
        details: ModelDetails {
            family: "llama".into(),
            parameter_size: parameter_size.to_string(),
            quantization_level: "Q4_0".into(),
            format: "gguf".into(),
            ..ModelDetails::default()
        },
        ..ModelEntry::default()
    }
}

#[async_trait]
impl OllamaApi for FakeApi {
    async fn list_models(&self) -> Result<Vec<ModelEntry>, OllamaError> {
        self.record(Call::List);
        Ok(self.models.lock().unwrap().clone())
    }

    async fn show_model(&self, name: &str) -> Result<Value, OllamaError> {
        self.record(Call::Show(name.to_string()));
        self.show
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| OllamaError::Status {
                status: 404,
                body: format!("model '{}' not found", name),
            })
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<String, OllamaError> {
        self.record(Call::Generate(request.model.clone()));
        self.requests.lock().unwrap().push(request.clone());
        self.generate
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("ok".to_string()))
    }

    async fn unload(&self, name: &str) -> Result<u16, OllamaError> {
        self.record(Call::Unload(name.to_string()));
        self.unload.lock().unwrap().pop_front().unwrap_or(Ok(200))
    }

    async fn running_models(&self) -> Result<Vec<RunningModel>, OllamaError> {
        self.record(Call::Running);
        Ok(self
            .running
            .lock()
            .unwrap()
            .iter()
            .map(|name| RunningModel {
                name: name.clone(),
                ..RunningModel::default()
            })
            .collect())
    }

    async fn version(&self) -> Result<String, OllamaError> {
        self.record(Call::Version);
        if self.down.load(Ordering::SeqCst) {
            return Err(OllamaError::ServerNotRunning("fake".into()));
        }
        self.version
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("0.9.0".to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RestartMode {
    Succeed,
    ExitStatus,
    Spawn,
}

/// Records restart commands without running anything.
pub struct FakeRestarter {
    commands: Mutex<Vec<RestartCommand>>,
    mode: Mutex<RestartMode>,
}

impl FakeRestarter {
    pub fn new() -> Self {
        Self {
            commands: Mutex::new(Vec::new()),
            mode: Mutex::new(RestartMode::Succeed),
        }
    }

    pub fn commands(&self) -> Vec<RestartCommand> {
        self.commands.lock().unwrap().clone()
    }

    pub fn fail_with_exit_status(&self) {
        *self.mode.lock().unwrap() = RestartMode::ExitStatus;
    }

    pub fn fail_to_spawn(&self) {
        *self.mode.lock().unwrap() = RestartMode::Spawn;
    }
}

#[async_trait]
impl ServiceRestarter for FakeRestarter {
    fn plan(&self) -> Vec<RestartCommand> {
        default_restart_plan()
    }

    async fn run(&self, command: &RestartCommand) -> Result<(), ServiceError> {
        self.commands.lock().unwrap().push(command.clone());
        match *self.mode.lock().unwrap() {
            RestartMode::Succeed => Ok(()),
            RestartMode::ExitStatus => Err(ServiceError::Failed {
                command: command.to_string(),
                status: "exit status: 1".into(),
            }),
            RestartMode::Spawn => Err(ServiceError::Spawn {
                command: command.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
            }),
        }
    }
}

/// Answers the manual restart prompt with a fixed choice.
pub struct FakePrompt {
    answer: AtomicBool,
    asked: AtomicUsize,
}

impl FakePrompt {
    pub fn new() -> Self {
        Self {
            answer: AtomicBool::new(false),
            asked: AtomicUsize::new(0),
        }
    }

    pub fn answer(&self, value: bool) {
        self.answer.store(value, Ordering::SeqCst);
    }

    pub fn asked(&self) -> usize {
        self.asked.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecoveryPrompt for FakePrompt {
    async fn confirm_manual_restart(&self) -> bool {
        self.asked.fetch_add(1, Ordering::SeqCst);
        self.answer.load(Ordering::SeqCst)
    }
}

/// A config store in a temp dir holding `config`.
pub fn store_with(config: &str) -> (TempDir, ConfigStore) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.ini");
    fs::write(&path, config).unwrap();
    (dir, ConfigStore::new(path))
}

/// A manager over `api` with a fresh config and no settle delay.
pub fn manager_with(
    api: Arc<FakeApi>,
    config: &str,
) -> (TempDir, ModelManager, Arc<FakeRestarter>, Arc<FakePrompt>) {
    let (dir, store) = store_with(config);
    let restarter = Arc::new(FakeRestarter::new());
    let prompt = Arc::new(FakePrompt::new());
    let manager = ModelManager::new(Dispatcher::new(api, store), restarter.clone(), prompt.clone())
        .with_settle_delay(Duration::ZERO);
    (dir, manager, restarter, prompt)
}
