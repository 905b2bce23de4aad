use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Rejection shown when a caller may not perform an operation. Kept stable so
/// callers can tell it apart from "unknown room".
pub const PERMISSION_DENIED_MESSAGE: &str =
    "You are not allowed to do that here. Ask an authorized user.";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    ConfigUnavailable,
    InvalidRequest,
    PermissionDenied,
    RoomNotFound,
    BackendUnavailable,
    CommandFailed,
    Timeout,
    Persistence,
}

impl ErrorType {
    pub fn as_urn(&self) -> &'static str {
        match self {
            Self::ConfigUnavailable => "urn:llmlab:error:config_unavailable",
            Self::InvalidRequest => "urn:llmlab:error:invalid_request",
            Self::PermissionDenied => "urn:llmlab:error:permission_denied",
            Self::RoomNotFound => "urn:llmlab:error:room_not_found",
            Self::BackendUnavailable => "urn:llmlab:error:backend_unavailable",
            Self::CommandFailed => "urn:llmlab:error:command_failed",
            Self::Timeout => "urn:llmlab:error:timeout",
            Self::Persistence => "urn:llmlab:error:persistence",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::ConfigUnavailable => "Configuration Unavailable",
            Self::InvalidRequest => "Invalid Request",
            Self::PermissionDenied => "Permission Denied",
            Self::RoomNotFound => "Room Not Found",
            Self::BackendUnavailable => "Backend Unavailable",
            Self::CommandFailed => "Command Failed",
            Self::Timeout => "Timeout",
            Self::Persistence => "Persistence Failed",
        }
    }

    /// Process exit code used by the CLI for this class of failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidRequest | Self::RoomNotFound => 2,
            Self::PermissionDenied => 3,
            Self::ConfigUnavailable => 4,
            Self::BackendUnavailable | Self::CommandFailed | Self::Timeout => 5,
            Self::Persistence => 6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    #[serde(rename = "type")]
    pub type_: ErrorType,
    pub urn: String,
    pub title: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

#[derive(Debug, Error)]
pub enum LabError {
    #[error("could not load {what}")]
    ConfigUnavailable { what: String },
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },
    #[error("permission denied")]
    PermissionDenied { room: Option<String> },
    #[error("unknown room: {room}")]
    RoomNotFound { room: String },
    #[error("backend unavailable: {message}")]
    BackendUnavailable { message: String },
    #[error("command failed: {command}")]
    CommandFailed {
        command: String,
        exit_code: Option<i32>,
        stderr: Option<String>,
    },
    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },
    #[error("persistence failed: {message}")]
    Persistence { message: String },
}

impl LabError {
    pub fn error_type(&self) -> ErrorType {
        match self {
            Self::ConfigUnavailable { .. } => ErrorType::ConfigUnavailable,
            Self::InvalidRequest { .. } => ErrorType::InvalidRequest,
            Self::PermissionDenied { .. } => ErrorType::PermissionDenied,
            Self::RoomNotFound { .. } => ErrorType::RoomNotFound,
            Self::BackendUnavailable { .. } => ErrorType::BackendUnavailable,
            Self::CommandFailed { .. } => ErrorType::CommandFailed,
            Self::Timeout { .. } => ErrorType::Timeout,
            Self::Persistence { .. } => ErrorType::Persistence,
        }
    }

    /// Short text that is safe to show in a chat room. Persistence and command
    /// failures carry paths and raw stderr, so those details stay in logs and in
    /// `ErrorReport::details`.
    pub fn user_message(&self) -> String {
        match self {
            Self::PermissionDenied { .. } => PERMISSION_DENIED_MESSAGE.to_string(),
            Self::Persistence { .. } => "could not save the session store".to_string(),
            Self::CommandFailed { command, .. } => format!("{command} failed"),
            other => other.to_string(),
        }
    }

    pub fn to_report(&self) -> ErrorReport {
        let (room, details) = match self {
            Self::ConfigUnavailable { what } => (None, Some(single("what", what))),
            Self::InvalidRequest { .. } => (None, None),
            Self::PermissionDenied { room } => (room.clone(), None),
            Self::RoomNotFound { room } => (Some(room.clone()), None),
            Self::BackendUnavailable { message } => (None, Some(single("message", message))),
            Self::CommandFailed {
                exit_code, stderr, ..
            } => {
                let mut map = Map::new();
                if let Some(code) = exit_code {
                    map.insert(
                        "exitCode".to_string(),
                        Value::Number(serde_json::Number::from(*code as i64)),
                    );
                }
                if let Some(stderr) = stderr {
                    map.insert("stderr".to_string(), Value::String(stderr.clone()));
                }
                (
                    None,
                    if map.is_empty() {
                        None
                    } else {
                        Some(Value::Object(map))
                    },
                )
            }
            Self::Timeout { seconds, .. } => {
                let mut map = Map::new();
                map.insert(
                    "seconds".to_string(),
                    Value::Number(serde_json::Number::from(*seconds)),
                );
                (None, Some(Value::Object(map)))
            }
            Self::Persistence { .. } => (None, None),
        };

        let error_type = self.error_type();
        ErrorReport {
            type_: error_type,
            urn: error_type.as_urn().to_string(),
            title: error_type.title().to_string(),
            message: self.user_message(),
            room,
            details,
        }
    }
}

fn single(key: &str, value: &str) -> Value {
    let mut map = Map::new();
    map.insert(key.to_string(), Value::String(value.to_string()));
    Value::Object(map)
}

impl From<LabError> for ErrorReport {
    fn from(value: LabError) -> Self {
        value.to_report()
    }
}

impl From<&LabError> for ErrorReport {
    fn from(value: &LabError) -> Self {
        value.to_report()
    }
}
