use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::json::read_json_file;

/// Wire protocol spoken by an endpoint. Unrecognised strings are kept so the
/// endpoint can still be listed and reported offline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EndpointKind {
    LlamaCpp,
    Vllm,
    Ollama,
    Unknown(String),
}

impl EndpointKind {
    pub fn as_str(&self) -> &str {
        match self {
            EndpointKind::LlamaCpp => "llama-cpp",
            EndpointKind::Vllm => "vllm",
            EndpointKind::Ollama => "ollama",
            EndpointKind::Unknown(other) => other,
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "llama-cpp" => EndpointKind::LlamaCpp,
            "vllm" => EndpointKind::Vllm,
            "ollama" => EndpointKind::Ollama,
            other => EndpointKind::Unknown(other.to_string()),
        }
    }
}

impl From<String> for EndpointKind {
    fn from(value: String) -> Self {
        EndpointKind::parse(&value)
    }
}

impl From<EndpointKind> for String {
    fn from(value: EndpointKind) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointConfig {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EndpointKind,
    pub url: String,
    /// Lower is preferred.
    pub priority: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl EndpointConfig {
    /// Joins `path` onto the endpoint url without doubling slashes.
    pub fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[derive(Debug, Deserialize)]
struct EndpointDocument {
    endpoints: Vec<Value>,
}

/// Reads the endpoints registry. Accepts either a bare array or an object
/// with an `endpoints` array next to optional metadata.
pub fn load_endpoints(path: &Path) -> Option<Vec<EndpointConfig>> {
    let value = read_json_file(path)?;
    let raw = match value {
        Value::Array(items) => items,
        other => match serde_json::from_value::<EndpointDocument>(other) {
            Ok(doc) => doc.endpoints,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "endpoints registry has no endpoints array");
                return None;
            }
        },
    };

    let endpoints = raw
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<EndpointConfig>(item) {
            Ok(endpoint) => Some(endpoint),
            Err(err) => {
                tracing::warn!(error = %err, "skipping malformed endpoint entry");
                None
            }
        })
        .collect();
    Some(endpoints)
}
