//! Model lifecycle: load state, switching, recovery and service restart.

mod manager;
mod recovery;
mod service;
mod state;

pub use manager::{LoadReport, ModelManager, PROBE_PROMPT};
pub use recovery::{NoPrompt, RecoveryOutcome, RecoveryPrompt};
pub use service::{
    default_restart_plan, RestartCommand, ServiceError, ServiceRestarter, SystemRestarter,
    MANUAL_RESTART_STEPS,
};
pub use state::{ActionResult, LoadState};
