//! Sync attempt error model.
//!
//! [`SyncError`] is closed: every failure an attempt can surface is one of
//! its variants, and each maps to exactly one [`ErrorKind`]. Low-level
//! causes ride along as attached values rather than being flattened into
//! strings.

use std::{fmt, io};

use syncbyte_protocol::RegistryError;
use syncbyte_state::StateError;
use syncbyte_types::{MigrationError, StreamDescriptor, StreamStatus};

/// Boxed low-level cause attached to a [`SyncError`].
pub type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Transient failure talking to a connector process or dependency.
    #[error("transient failure during {operation}: {cause}")]
    Retryable {
        operation: String,
        #[source]
        cause: Cause,
    },

    /// A value bound for the workflow engine is larger than the ceiling.
    #[error("payload of {measured} bytes exceeds the {limit} byte limit")]
    SizeLimitExceeded { measured: usize, limit: usize },

    /// A connector reported an impossible stream lifecycle transition.
    #[error("invalid stream status transition for {stream}: {} -> {attempted}", display_status(.current))]
    StreamStatusTransition {
        stream: StreamDescriptor,
        current: Option<StreamStatus>,
        attempted: StreamStatus,
    },

    /// The workflow or task could not be contacted at all.
    #[error("workflow {target} is unreachable: {cause}")]
    Unreachable {
        target: String,
        #[source]
        cause: Cause,
    },

    /// The workflow or task no longer exists.
    #[error("workflow {target} was deleted")]
    Deleted { target: String },

    /// Any other failure; never retried.
    #[error("{operation} failed: {cause}")]
    Fatal {
        operation: String,
        #[source]
        cause: Cause,
    },

    /// The enclosing activity was cancelled.
    #[error("sync attempt cancelled")]
    Cancelled,

    #[error(transparent)]
    Migration(#[from] MigrationError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn display_status(status: &Option<StreamStatus>) -> String {
    status.map_or_else(|| "<none>".to_string(), |s| s.to_string())
}

impl SyncError {
    pub fn retryable(operation: impl Into<String>, cause: impl Into<Cause>) -> Self {
        Self::Retryable {
            operation: operation.into(),
            cause: cause.into(),
        }
    }

    pub fn unreachable(target: impl Into<String>, cause: impl Into<Cause>) -> Self {
        Self::Unreachable {
            target: target.into(),
            cause: cause.into(),
        }
    }

    pub fn fatal(operation: impl Into<String>, cause: impl Into<Cause>) -> Self {
        Self::Fatal {
            operation: operation.into(),
            cause: cause.into(),
        }
    }

    pub fn deleted(target: impl Into<String>) -> Self {
        Self::Deleted {
            target: target.into(),
        }
    }

    /// Taxonomy bucket of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Retryable { .. } => ErrorKind::Retryable,
            Self::SizeLimitExceeded { .. } => ErrorKind::SizeLimitExceeded,
            Self::StreamStatusTransition { .. } => ErrorKind::StreamStatusTransition,
            Self::Unreachable { .. } => ErrorKind::Unreachable,
            Self::Deleted { .. } => ErrorKind::Deleted,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::State(state) => state_error_kind(state),
            Self::Fatal { .. }
            | Self::Migration(_)
            | Self::Registry(_)
            | Self::Serialization(_) => ErrorKind::Fatal,
        }
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Retryable
    }

    /// Stream the failure is attributed to, if any.
    #[must_use]
    pub fn stream(&self) -> Option<&StreamDescriptor> {
        match self {
            Self::StreamStatusTransition { stream, .. } => Some(stream),
            _ => None,
        }
    }
}

/// Transport failures on pipes or sockets are transient; anything else
/// points at the environment or the connector itself.
#[must_use]
pub fn io_error_kind(err: &io::Error) -> ErrorKind {
    match err.kind() {
        io::ErrorKind::BrokenPipe
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::ConnectionRefused
        | io::ErrorKind::NotConnected
        | io::ErrorKind::TimedOut
        | io::ErrorKind::Interrupted
        | io::ErrorKind::WouldBlock
        | io::ErrorKind::UnexpectedEof => ErrorKind::Retryable,
        _ => ErrorKind::Fatal,
    }
}

/// State store failures are retryable only when the cause is transient:
/// transport-level I/O or a busy `SQLite` database.
#[must_use]
pub fn state_error_kind(err: &StateError) -> ErrorKind {
    match err {
        StateError::Io(io) => io_error_kind(io),
        busy if busy.is_database_busy() => ErrorKind::Retryable,
        _ => ErrorKind::Fatal,
    }
}

/// Closed failure taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Retryable,
    SizeLimitExceeded,
    StreamStatusTransition,
    Unreachable,
    Deleted,
    Cancelled,
    Fatal,
}

impl ErrorKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Retryable => "retryable",
            Self::SizeLimitExceeded => "size_limit_exceeded",
            Self::StreamStatusTransition => "stream_status_transition",
            Self::Unreachable => "unreachable",
            Self::Deleted => "deleted",
            Self::Cancelled => "cancelled",
            Self::Fatal => "fatal",
        }
    }

    /// What the workflow engine should do with a failure of this kind.
    #[must_use]
    pub fn action(self) -> EngineAction {
        match self {
            Self::Retryable => EngineAction::Retry,
            Self::SizeLimitExceeded | Self::StreamStatusTransition | Self::Fatal => {
                EngineAction::Fail
            }
            Self::Unreachable => EngineAction::Escalate,
            Self::Deleted | Self::Cancelled => EngineAction::Terminal,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Workflow engine reaction to a classified failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineAction {
    /// Re-run the activity under the engine's backoff policy.
    Retry,
    /// End the run as failed, recording the reason.
    Fail,
    /// Report loss of contact with the orchestrator, distinct from a failed run.
    Escalate,
    /// Stop without retrying or alerting.
    Terminal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;
    use syncbyte_types::{PayloadKind, Version};

    #[test]
    fn retryable_keeps_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let err = SyncError::retryable("read connector output", io);
        assert!(err.is_retryable());
        assert_eq!(err.kind().action(), EngineAction::Retry);
        let source = err.source().unwrap();
        assert_eq!(source.to_string(), "pipe closed");
    }

    #[test]
    fn size_limit_reports_both_sizes() {
        let err = SyncError::SizeLimitExceeded {
            measured: 4_194_305,
            limit: 4_194_304,
        };
        assert_eq!(
            err.to_string(),
            "payload of 4194305 bytes exceeds the 4194304 byte limit"
        );
        assert_eq!(err.kind().action(), EngineAction::Fail);
    }

    #[test]
    fn status_transition_names_stream() {
        let err = SyncError::StreamStatusTransition {
            stream: StreamDescriptor::new("users").with_namespace("public"),
            current: None,
            attempted: StreamStatus::Complete,
        };
        assert!(err.to_string().contains("public:users: <none> -> COMPLETE"));
        assert_eq!(err.stream().unwrap().name, "users");
        assert!(!err.is_retryable());
    }

    #[test]
    fn migration_error_is_fatal() {
        let err: SyncError =
            MigrationError::new(Version::V0, Version::V1, PayloadKind::Message, "bad").into();
        assert_eq!(err.kind(), ErrorKind::Fatal);
        assert!(err.to_string().contains("cannot migrate message"));
    }

    #[test]
    fn state_errors_follow_the_io_table() {
        let timed_out = StateError::Io(io::Error::new(io::ErrorKind::TimedOut, "slow disk"));
        assert!(SyncError::from(timed_out).is_retryable());
        let denied = StateError::Io(io::Error::new(io::ErrorKind::PermissionDenied, "ro"));
        assert_eq!(SyncError::from(denied).kind(), ErrorKind::Fatal);
        assert!(!SyncError::from(StateError::LockPoisoned).is_retryable());
    }

    #[test]
    fn busy_sqlite_is_retryable() {
        let busy = StateError::Sqlite(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            Some("database is locked".into()),
        ));
        assert_eq!(state_error_kind(&busy), ErrorKind::Retryable);
        assert!(SyncError::from(busy).is_retryable());
    }

    #[test]
    fn actions_cover_every_kind() {
        assert_eq!(ErrorKind::Unreachable.action(), EngineAction::Escalate);
        assert_eq!(ErrorKind::Deleted.action(), EngineAction::Terminal);
        assert_eq!(ErrorKind::Cancelled.action(), EngineAction::Terminal);
        assert_eq!(ErrorKind::Fatal.action(), EngineAction::Fail);
        assert_eq!(ErrorKind::StreamStatusTransition.action(), EngineAction::Fail);
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::SizeLimitExceeded).unwrap();
        assert_eq!(json, "\"size_limit_exceeded\"");
    }
}
