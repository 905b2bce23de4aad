use std::time::Duration;

use llmlab_registry::ModelMetadata;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),
    #[error("connection failed")]
    Connect,
    #[error("request failed: {0}")]
    Request(String),
    #[error("HTTP {0}")]
    Status(u16),
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("unsupported endpoint type: {0}")]
    UnsupportedKind(String),
    #[error("failed to build http client: {0}")]
    Client(String),
}

impl ProbeError {
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            ProbeError::Timeout(timeout)
        } else if err.is_connect() {
            ProbeError::Connect
        } else if err.is_decode() {
            ProbeError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            ProbeError::Status(status.as_u16())
        } else {
            ProbeError::Request(err.without_url().to_string())
        }
    }
}

/// What a protocol module learned from a reachable backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendReport {
    /// Display name.
    pub model: Option<String>,
    /// Raw identifier used for catalog matching.
    pub model_path: Option<String>,
    pub context_window: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedModel {
    pub key: String,
    #[serde(flatten)]
    pub metadata: ModelMetadata,
}

/// Outcome of probing one endpoint once.
///
/// Built only through [`ProbeResult::online`] and [`ProbeResult::offline`], so
/// an offline result never carries model fields and always carries an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    online: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    model_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    context_window: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<MatchedModel>,
}

impl ProbeResult {
    pub fn online(report: BackendReport, latency: Duration) -> Self {
        Self {
            online: true,
            model: report.model,
            model_path: report.model_path,
            context_window: report.context_window,
            error: None,
            latency_ms: latency.as_millis() as u64,
            metadata: None,
        }
    }

    pub fn offline(error: impl Into<String>, latency: Duration) -> Self {
        Self {
            online: false,
            model: None,
            model_path: None,
            context_window: None,
            error: Some(error.into()),
            latency_ms: latency.as_millis() as u64,
            metadata: None,
        }
    }

    pub(crate) fn with_metadata(mut self, metadata: Option<MatchedModel>) -> Self {
        if self.online {
            self.metadata = metadata;
        }
        self
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn model_path(&self) -> Option<&str> {
        self.model_path.as_deref()
    }

    pub fn context_window(&self) -> Option<u64> {
        self.context_window
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn latency_ms(&self) -> u64 {
        self.latency_ms
    }

    pub fn metadata(&self) -> Option<&MatchedModel> {
        self.metadata.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offline_results_carry_only_the_error() {
        let result = ProbeResult::offline("connection failed", Duration::from_millis(12))
            .with_metadata(Some(MatchedModel {
                key: "k".to_string(),
                metadata: ModelMetadata {
                    alias: "a".to_string(),
                    name: "A".to_string(),
                    context: 1,
                    vram_fit: String::new(),
                    speeds: Default::default(),
                },
            }));
        assert!(!result.is_online());
        assert_eq!(result.error(), Some("connection failed"));
        assert!(result.model().is_none());
        assert!(result.model_path().is_none());
        assert!(result.context_window().is_none());
        assert!(result.metadata().is_none());
        assert_eq!(result.latency_ms(), 12);

        let json = serde_json::to_value(&result).expect("json");
        assert_eq!(json["online"], false);
        assert_eq!(json["latencyMs"], 12);
        assert!(json.get("model").is_none());
    }

    #[test]
    fn online_results_never_carry_an_error() {
        let result = ProbeResult::online(
            BackendReport {
                model: Some("Qwen3".to_string()),
                model_path: Some("/models/Qwen3.gguf".to_string()),
                context_window: Some(4096),
            },
            Duration::from_millis(3),
        );
        assert!(result.is_online());
        assert!(result.error().is_none());
        assert_eq!(result.context_window(), Some(4096));
    }

    #[test]
    fn timeout_message_is_readable() {
        assert_eq!(
            ProbeError::Timeout(Duration::from_secs(5)).to_string(),
            "timed out after 5s"
        );
        assert_eq!(ProbeError::Status(503).to_string(), "HTTP 503");
    }
}
