//! Restarting the inference server process.

use std::io;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tokio::time::{sleep, timeout};
use tracing::{debug, info};

/// Errors running a restart command.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("failed to run '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("'{command}' timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },
    #[error("'{command}' exited with {status}")]
    Failed { command: String, status: String },
}

/// One way of restarting the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestartCommand {
    /// Run to completion.
    Run(Vec<String>),
    /// Run `kill`, then launch `launch` detached.
    KillAndLaunch {
        kill: Vec<String>,
        launch: Vec<String>,
    },
}

impl RestartCommand {
    fn run(args: &[&str]) -> Self {
        RestartCommand::Run(args.iter().map(|s| s.to_string()).collect())
    }
}

impl std::fmt::Display for RestartCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RestartCommand::Run(args) => f.write_str(&args.join(" ")),
            RestartCommand::KillAndLaunch { kill, launch } => {
                write!(f, "{} && {}", kill.join(" "), launch.join(" "))
            }
        }
    }
}

/// Service manager, user service manager, then kill and relaunch.
///
/// The kill step matches the exact process name `ollama` so it never
/// signals this client, whose binary name also starts with `ollama`.
pub fn default_restart_plan() -> Vec<RestartCommand> {
    vec![
        RestartCommand::run(&["sudo", "-n", "systemctl", "restart", "ollama"]),
        RestartCommand::run(&["systemctl", "--user", "restart", "ollama"]),
        RestartCommand::KillAndLaunch {
            kill: vec!["pkill".into(), "-x".into(), "ollama".into()],
            launch: vec!["ollama".into(), "serve".into()],
        },
    ]
}

/// Manual recovery steps shown when every restart command failed.
pub const MANUAL_RESTART_STEPS: &[(&str, &[&str])] = &[
    (
        "If Ollama is installed as a system service",
        &["sudo systemctl restart ollama", "systemctl --user restart ollama"],
    ),
    ("If Ollama is installed as a binary", &["pkill -x ollama", "ollama serve"]),
    ("If using Docker", &["docker restart ollama", "docker-compose restart ollama"]),
    (
        "Alternative approach",
        &["killall ollama", "nohup ollama serve > /dev/null 2>&1 &"],
    ),
];

/// Executes restart commands.
#[async_trait]
pub trait ServiceRestarter: Send + Sync {
    /// Commands to try, in order.
    fn plan(&self) -> Vec<RestartCommand>;

    /// Run one command. `Ok` means it ran; the caller still checks health.
    async fn run(&self, command: &RestartCommand) -> Result<(), ServiceError>;
}

/// Runs restart commands as OS processes.
#[derive(Debug, Clone)]
pub struct SystemRestarter {
    plan: Vec<RestartCommand>,
    timeout: Duration,
    settle: Duration,
}

impl SystemRestarter {
    pub fn new(timeout: Duration) -> Self {
        Self {
            plan: default_restart_plan(),
            timeout,
            settle: Duration::from_secs(3),
        }
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    async fn run_to_completion(&self, args: &[String]) -> Result<(), ServiceError> {
        let command = args.join(" ");
        let Some((program, rest)) = args.split_first() else {
            return Ok(());
        };

        let mut cmd = Command::new(program);
        cmd.args(rest)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match timeout(self.timeout, cmd.output()).await {
            Ok(result) => result.map_err(|source| ServiceError::Spawn {
                command: command.clone(),
                source,
            })?,
            Err(_) => {
                return Err(ServiceError::Timeout {
                    command,
                    timeout: self.timeout,
                })
            }
        };

        if output.status.success() {
            debug!("'{}' succeeded", command);
            Ok(())
        } else {
            Err(ServiceError::Failed {
                command,
                status: output.status.to_string(),
            })
        }
    }

    fn launch_detached(&self, args: &[String]) -> Result<(), ServiceError> {
        let Some((program, rest)) = args.split_first() else {
            return Ok(());
        };
        let child = Command::new(program)
            .args(rest)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| ServiceError::Spawn {
                command: args.join(" "),
                source,
            })?;
        debug!("Launched '{}' (PID: {:?})", args.join(" "), child.id());
        Ok(())
    }
}

#[async_trait]
impl ServiceRestarter for SystemRestarter {
    fn plan(&self) -> Vec<RestartCommand> {
        self.plan.clone()
    }

    async fn run(&self, command: &RestartCommand) -> Result<(), ServiceError> {
        info!("Trying: {}", command);
        match command {
            RestartCommand::Run(args) => {
                self.run_to_completion(args).await?;
            }
            RestartCommand::KillAndLaunch { kill, launch } => {
                // pkill exits non-zero when nothing matched; that is fine
                if let Err(e) = self.run_to_completion(kill).await {
                    debug!("{}", e);
                }
                sleep(Duration::from_secs(2)).await;
                self.launch_detached(launch)?;
            }
        }
        sleep(self.settle).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_plan_order() {
        let plan: Vec<String> = default_restart_plan().iter().map(|c| c.to_string()).collect();
        assert_eq!(
            plan,
            vec![
                "sudo -n systemctl restart ollama",
                "systemctl --user restart ollama",
                "pkill -x ollama && ollama serve",
            ]
        );
    }

    /// Whether `pkill <args>` would signal a process called `name` that was
    /// started as `cmdline`.
    fn pkill_matches(args: &[String], name: &str, cmdline: &str) -> bool {
        let flags: Vec<&str> = args[1..args.len() - 1].iter().map(String::as_str).collect();
        let pattern = &args[args.len() - 1];
        let pattern = if flags.contains(&"-x") {
            format!("^(?:{})$", pattern)
        } else {
            pattern.clone()
        };
        let target = if flags.contains(&"-f") { cmdline } else { name };
        regex::Regex::new(&pattern).unwrap().is_match(target)
    }

    #[test]
    fn test_kill_step_spares_the_client() {
        let plan = default_restart_plan();
        let Some(RestartCommand::KillAndLaunch { kill, .. }) = plan.last() else {
            panic!("last step should kill and relaunch");
        };
        assert_eq!(kill[0], "pkill");

        assert!(pkill_matches(kill, "ollama", "/usr/local/bin/ollama serve"));
        assert!(!pkill_matches(
            kill,
            "ollama-consumer",
            "/usr/local/bin/ollama-consumer bench -q"
        ));
        assert!(!pkill_matches(kill, "bash", "bash -c ollama-consumer"));

        let loose: Vec<String> = ["pkill", "-f", "ollama"].iter().map(|s| s.to_string()).collect();
        assert!(pkill_matches(
            &loose,
            "ollama-consumer",
            "/usr/local/bin/ollama-consumer bench -q"
        ));
    }

    #[test]
    fn test_manual_steps_use_exact_name() {
        for (_, commands) in MANUAL_RESTART_STEPS {
            for command in commands.iter() {
                assert!(!command.contains("pkill -f"), "{}", command);
            }
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_reports_exit_status() {
        let restarter = SystemRestarter::new(Duration::from_secs(5)).with_settle(Duration::ZERO);
        assert!(restarter.run(&RestartCommand::run(&["true"])).await.is_ok());
        assert!(matches!(
            restarter.run(&RestartCommand::run(&["false"])).await,
            Err(ServiceError::Failed { .. })
        ));
        assert!(matches!(
            restarter
                .run(&RestartCommand::run(&["definitely-not-a-real-binary-oc"]))
                .await,
            Err(ServiceError::Spawn { .. })
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_times_out() {
        let restarter =
            SystemRestarter::new(Duration::from_millis(100)).with_settle(Duration::ZERO);
        assert!(matches!(
            restarter.run(&RestartCommand::run(&["sleep", "5"])).await,
            Err(ServiceError::Timeout { .. })
        ));
    }
}
