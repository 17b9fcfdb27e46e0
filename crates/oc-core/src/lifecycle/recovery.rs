//! Recovery after a server error during load.
//!
//! Order is fixed: unload the recorded model, unload the attempted model,
//! unload everything, probe health, then try each restart command until
//! the server answers, then fall back to a manual restart by the user.

use async_trait::async_trait;
use tracing::{info, warn};

use super::manager::ModelManager;
use super::service::ServiceError;
use super::state::{ActionResult, LoadState};
use crate::session::Session;

/// Interactive fallback when automated restarts fail.
#[async_trait]
pub trait RecoveryPrompt: Send + Sync {
    /// Show manual restart steps and wait. `false` means the user quit.
    async fn confirm_manual_restart(&self) -> bool;
}

/// Prompt for non-interactive runs: always gives up.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPrompt;

#[async_trait]
impl RecoveryPrompt for NoPrompt {
    async fn confirm_manual_restart(&self) -> bool {
        false
    }
}

/// How recovery ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// The server stayed up; models were cleared.
    Cleared,
    /// An automated restart command brought the server back.
    Restarted(String),
    /// The user restarted the server by hand.
    ManuallyRestarted,
    /// The user restarted but the server still does not answer.
    StillDown,
    /// The user chose to quit at the manual step.
    UserQuit,
}

impl RecoveryOutcome {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            RecoveryOutcome::Cleared
                | RecoveryOutcome::Restarted(_)
                | RecoveryOutcome::ManuallyRestarted
        )
    }

    pub fn to_result(&self) -> ActionResult {
        match self {
            RecoveryOutcome::Cleared => ActionResult::ok("Recovery attempted - cleared all models"),
            RecoveryOutcome::Restarted(command) => {
                ActionResult::ok(format!("Service restarted successfully ({})", command))
            }
            RecoveryOutcome::ManuallyRestarted => ActionResult::ok("Service manually restarted"),
            RecoveryOutcome::StillDown => ActionResult::failed("Service still not responding"),
            RecoveryOutcome::UserQuit => ActionResult::failed("User chose to quit"),
        }
    }
}

impl ModelManager {
    /// Run the recovery protocol after a server error loading `attempted`.
    pub async fn recover(&self, session: &mut Session, attempted: &str) -> RecoveryOutcome {
        warn!("Server error detected; attempting recovery");
        session.set_load_state(LoadState::Recovering(attempted.to_string()));

        let configured = self.store().current_loaded_model().ok().flatten();
        if let Some(configured) = configured {
            info!("Trying to unload configured model: {}", configured);
            let result = self.unload_model(session, &configured).await;
            info!("Unload result: {}", result);
        }

        info!("Trying to unload attempted model: {}", attempted);
        let result = self.unload_model(session, attempted).await;
        info!("Unload result: {}", result);

        info!("Trying to unload all models");
        self.unload_all_models(session).await;

        let outcome = if self.is_server_running().await {
            RecoveryOutcome::Cleared
        } else {
            self.restart_server().await
        };

        let state = if outcome.is_success() {
            LoadState::Unloaded
        } else {
            LoadState::Unknown
        };
        session.set_load_state(state);
        info!("Recovery finished: {}", outcome.to_result());
        outcome
    }

    /// Try each restart command, then the manual prompt.
    pub async fn restart_server(&self) -> RecoveryOutcome {
        warn!("Ollama service appears to be down; attempting automatic restart");

        for command in self.restarter.plan() {
            match self.restarter.run(&command).await {
                Ok(()) => {}
                Err(e @ ServiceError::Failed { .. }) => warn!("{}", e),
                Err(e) => {
                    warn!("{}", e);
                    continue;
                }
            }
            if self.is_server_running().await {
                info!("Ollama service restarted with '{}'", command);
                return RecoveryOutcome::Restarted(command.to_string());
            }
        }

        warn!("Automatic restart failed");
        if !self.prompt.confirm_manual_restart().await {
            return RecoveryOutcome::UserQuit;
        }
        if self.is_server_running().await {
            RecoveryOutcome::ManuallyRestarted
        } else {
            RecoveryOutcome::StillDown
        }
    }
}
