use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendState {
    GpuOffline,
    GpuIdle,
    LlamaCpp,
    Vllm,
    #[default]
    #[serde(other)]
    Unknown,
}

impl BackendState {
    pub fn as_str(self) -> &'static str {
        match self {
            BackendState::GpuOffline => "gpu-offline",
            BackendState::GpuIdle => "gpu-idle",
            BackendState::LlamaCpp => "llama-cpp",
            BackendState::Vllm => "vllm",
            BackendState::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotInfo {
    pub id: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Memory figures in the tool's unit (MiB); fractional values are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuMemory {
    pub id: u32,
    pub used: f64,
    pub total: f64,
}

/// `status --json` document emitted by the switch tool.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendStatus {
    #[serde(default)]
    pub state: BackendState,
    #[serde(default, alias = "active", skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slots: Option<Vec<SlotInfo>>,
    #[serde(default)]
    pub saved: Vec<String>,
    #[serde(default, alias = "gpu", skip_serializing_if = "Option::is_none")]
    pub gpus: Option<Vec<GpuMemory>>,
}

impl BackendStatus {
    pub fn unknown() -> Self {
        Self::default()
    }
}

/// Status query outcome. A degraded probe still renders as an `unknown`
/// status; the reason is kept for logs and `--json` output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum StatusProbe {
    Reported(BackendStatus),
    Degraded { reason: String },
}

impl StatusProbe {
    pub fn from_stdout(stdout: &str) -> Self {
        match serde_json::from_str::<BackendStatus>(stdout.trim()) {
            Ok(status) => StatusProbe::Reported(status),
            Err(err) => StatusProbe::Degraded {
                reason: format!("malformed status output: {err}"),
            },
        }
    }

    pub fn status(&self) -> BackendStatus {
        match self {
            StatusProbe::Reported(status) => status.clone(),
            StatusProbe::Degraded { .. } => BackendStatus::unknown(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, StatusProbe::Degraded { .. })
    }
}
