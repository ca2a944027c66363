//! Structured failure records attached to a failed sync attempt.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use syncbyte_types::StreamDescriptor;

use crate::error::{ErrorKind, SyncError};

/// User-facing text for payload ceiling failures.
pub const SIZE_LIMIT_MESSAGE: &str =
    "Size limit exceeded, please check your configuration, this is often related to a high number of fields.";

/// Which side of the sync a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureOrigin {
    Source,
    Destination,
    Replication,
    Persistence,
    Platform,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureType {
    ConfigError,
    SystemError,
    TransientError,
    ManualCancellation,
}

/// One classified failure, as recorded for the attempt and shown to users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureReason {
    pub origin: FailureOrigin,
    pub failure_type: FailureType,
    pub kind: ErrorKind,
    pub internal_message: String,
    pub external_message: String,
    pub retryable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<StreamDescriptor>,
    pub timestamp: DateTime<Utc>,
}

impl FailureReason {
    #[must_use]
    pub fn from_error(origin: FailureOrigin, err: &SyncError) -> Self {
        let kind = err.kind();
        let failure_type = match kind {
            ErrorKind::Retryable | ErrorKind::Unreachable => FailureType::TransientError,
            ErrorKind::Cancelled => FailureType::ManualCancellation,
            ErrorKind::SizeLimitExceeded => FailureType::ConfigError,
            ErrorKind::StreamStatusTransition | ErrorKind::Deleted | ErrorKind::Fatal => {
                FailureType::SystemError
            }
        };
        let external_message = match kind {
            ErrorKind::SizeLimitExceeded => SIZE_LIMIT_MESSAGE.to_string(),
            ErrorKind::Cancelled => "The sync was cancelled.".to_string(),
            _ => format!("Something went wrong during {}.", origin.as_str()),
        };
        Self {
            origin,
            failure_type,
            kind,
            internal_message: err.to_string(),
            external_message,
            retryable: err.is_retryable(),
            stream: err.stream().cloned(),
            timestamp: Utc::now(),
        }
    }
}

impl FailureReason {
    /// Failure reported by a connector in an ERROR trace message.
    ///
    /// The connector's own `failure_type` decides retryability; anything
    /// other than `transient_error` is treated as a system error.
    #[must_use]
    pub fn from_connector_trace(origin: FailureOrigin, error: &Value, emitted_at: f64) -> Self {
        let text = |field: &str| error.get(field).and_then(Value::as_str).map(str::to_string);
        let failure_type = match error.get("failure_type").and_then(Value::as_str) {
            Some("config_error") => FailureType::ConfigError,
            Some("transient_error") => FailureType::TransientError,
            _ => FailureType::SystemError,
        };
        let retryable = failure_type == FailureType::TransientError;
        let external_message = text("message")
            .unwrap_or_else(|| format!("Something went wrong during {}.", origin.as_str()));
        #[allow(clippy::cast_possible_truncation)]
        let timestamp = DateTime::from_timestamp_millis(emitted_at as i64).unwrap_or_else(Utc::now);
        Self {
            origin,
            failure_type,
            kind: if retryable {
                ErrorKind::Retryable
            } else {
                ErrorKind::Fatal
            },
            internal_message: text("internal_message").unwrap_or_else(|| external_message.clone()),
            external_message,
            retryable,
            stream: error
                .get("stream_descriptor")
                .and_then(|d| serde_json::from_value(d.clone()).ok()),
            timestamp,
        }
    }
}

impl FailureOrigin {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Destination => "destination",
            Self::Replication => "replication",
            Self::Persistence => "persistence",
            Self::Platform => "platform",
        }
    }
}
