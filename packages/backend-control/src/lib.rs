//! Control of the GPU-resident inference backend through the external switch
//! tool.

mod script;
mod status;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use llmlab_error::LabError;
use serde::Serialize;

pub use script::{ControlTimeouts, ScriptController};
pub use status::{BackendState, BackendStatus, GpuMemory, SlotInfo, StatusProbe};

/// Backends the switch tool can bring up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SwitchTarget {
    LlamaCpp,
    Vllm,
}

impl SwitchTarget {
    pub fn as_str(self) -> &'static str {
        match self {
            SwitchTarget::LlamaCpp => "llama-cpp",
            SwitchTarget::Vllm => "vllm",
        }
    }

    pub fn all() -> &'static [SwitchTarget] {
        &[SwitchTarget::LlamaCpp, SwitchTarget::Vllm]
    }
}

impl fmt::Display for SwitchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SwitchTarget {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "llama-cpp" | "llamacpp" | "llama.cpp" => Ok(SwitchTarget::LlamaCpp),
            "vllm" => Ok(SwitchTarget::Vllm),
            other => Err(format!(
                "unknown backend '{other}'; expected one of: llama-cpp, vllm"
            )),
        }
    }
}

/// Result of a switch or stop: whether it worked and the text to show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandOutcome {
    pub success: bool,
    pub output: String,
}

impl CommandOutcome {
    pub fn from_result(result: Result<String, LabError>) -> Self {
        match result {
            Ok(stdout) => Self {
                success: true,
                output: stdout.trim_end().to_string(),
            },
            Err(err) => Self {
                success: false,
                output: failure_text(&err),
            },
        }
    }
}

fn failure_text(err: &LabError) -> String {
    match err {
        LabError::CommandFailed {
            stderr: Some(stderr),
            ..
        } if !stderr.trim().is_empty() => stderr.trim_end().to_string(),
        other => other.to_string(),
    }
}

/// Narrow capability over whatever owns backend lifecycle.
#[async_trait]
pub trait BackendControl: Send + Sync {
    async fn status(&self) -> StatusProbe;
    async fn switch(&self, target: SwitchTarget) -> CommandOutcome;
    async fn stop(&self) -> CommandOutcome;
}
