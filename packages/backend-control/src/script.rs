use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use llmlab_error::LabError;
use tokio::process::Command;

use crate::status::StatusProbe;
use crate::{BackendControl, CommandOutcome, SwitchTarget};

#[derive(Debug, Clone)]
pub struct ControlTimeouts {
    pub status: Duration,
    /// Model loads are slow.
    pub switch: Duration,
    pub default: Duration,
}

impl Default for ControlTimeouts {
    fn default() -> Self {
        Self {
            status: Duration::from_secs(15),
            switch: Duration::from_secs(180),
            default: Duration::from_secs(30),
        }
    }
}

/// Drives the external switch tool (`status --json`, `switch <target>`,
/// `stop`) as a subprocess. The tool manages a single GPU, so callers issue
/// one command at a time.
#[derive(Debug, Clone)]
pub struct ScriptController {
    program: PathBuf,
    working_dir: Option<PathBuf>,
    timeouts: ControlTimeouts,
}

impl ScriptController {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            working_dir: None,
            timeouts: ControlTimeouts::default(),
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_timeouts(mut self, timeouts: ControlTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Runs the tool and returns stdout. Non-zero exits carry stderr; a hung
    /// tool is killed once `timeout` elapses.
    async fn run(&self, args: &[&str], timeout: Duration) -> Result<String, LabError> {
        let operation = args.first().copied().unwrap_or("command").to_string();
        let mut command = Command::new(&self.program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let started_at = Instant::now();
        let output = match tokio::time::timeout(timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                tracing::warn!(
                    program = %self.program.display(),
                    error = %err,
                    "failed to start switch tool"
                );
                return Err(LabError::BackendUnavailable {
                    message: format!("could not run the switch tool ({})", err.kind()),
                });
            }
            Err(_) => {
                tracing::warn!(
                    operation = %operation,
                    timeout_ms = timeout.as_millis() as u64,
                    "switch tool timed out"
                );
                return Err(LabError::Timeout {
                    operation,
                    seconds: timeout.as_secs(),
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        tracing::debug!(
            operation = %operation,
            exit_code = ?output.status.code(),
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "switch tool finished"
        );

        if !output.status.success() {
            return Err(LabError::CommandFailed {
                command: operation,
                exit_code: output.status.code(),
                stderr: Some(if stderr.trim().is_empty() { stdout } else { stderr }),
            });
        }
        Ok(stdout)
    }
}

#[async_trait]
impl BackendControl for ScriptController {
    async fn status(&self) -> StatusProbe {
        match self.run(&["status", "--json"], self.timeouts.status).await {
            Ok(stdout) => {
                let probe = StatusProbe::from_stdout(&stdout);
                if let StatusProbe::Degraded { reason } = &probe {
                    tracing::warn!(reason = %reason, "backend status degraded");
                }
                probe
            }
            Err(err) => {
                tracing::warn!(error = %err, "backend status degraded");
                StatusProbe::Degraded {
                    reason: CommandOutcome::from_result(Err(err)).output,
                }
            }
        }
    }

    async fn switch(&self, target: SwitchTarget) -> CommandOutcome {
        tracing::info!(target = %target, "switching backend");
        CommandOutcome::from_result(
            self.run(&["switch", target.as_str()], self.timeouts.switch)
                .await,
        )
    }

    async fn stop(&self) -> CommandOutcome {
        tracing::info!("stopping backend");
        CommandOutcome::from_result(self.run(&["stop"], self.timeouts.default).await)
    }
}
