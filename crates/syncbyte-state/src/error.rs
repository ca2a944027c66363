//! State aggregation and persistence error types.

use syncbyte_types::{StateType, StreamDescriptor};

use crate::aggregator::AggregatorKind;

/// Errors produced while aggregating, validating or storing state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// Underlying `SQLite` failure.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// File-system I/O failure (e.g. creating the database directory).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// State could not be encoded or decoded as JSON.
    #[error("state serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal mutex was poisoned by a panicked thread.
    #[error("state store lock poisoned")]
    LockPoisoned,

    /// Two aggregators of different kinds were merged.
    #[error("cannot merge a {other} state aggregator into a {this} state aggregator")]
    KindMismatch {
        this: AggregatorKind,
        other: AggregatorKind,
    },

    /// A per-stream aggregator received a message without a stream section.
    #[error("{state_type} state message has no stream descriptor")]
    MissingStreamDescriptor { state_type: StateType },

    /// The aggregator cannot hold messages of this type.
    #[error("a {kind} state aggregator cannot ingest {state_type} state")]
    UnsupportedStateType {
        kind: AggregatorKind,
        state_type: StateType,
    },

    /// A connector switched state types within one attempt.
    #[error("state type changed from {expected} to {actual} within one attempt")]
    StateTypeMismatch {
        expected: StateType,
        actual: StateType,
    },

    /// A persisted state blob mixes message types.
    #[error("unexpected state blob: {0}")]
    UnexpectedStateBlob(String),

    /// Per-stream state emitted after legacy state does not cover every
    /// incremental stream.
    #[error(
        "job ran during migration from legacy state to per-stream state; \
         streams without state: {}",
        join_descriptors(.missing)
    )]
    IncompleteStreamMigration { missing: Vec<StreamDescriptor> },
}

impl StateError {
    /// Whether this is `SQLite` reporting the database busy or locked by
    /// another connection. Such failures clear once the other writer is done.
    #[must_use]
    pub fn is_database_busy(&self) -> bool {
        matches!(
            self,
            Self::Sqlite(rusqlite::Error::SqliteFailure(failure, _))
                if matches!(
                    failure.code,
                    rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
                )
        )
    }
}

fn join_descriptors(descriptors: &[StreamDescriptor]) -> String {
    descriptors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, StateError>;
