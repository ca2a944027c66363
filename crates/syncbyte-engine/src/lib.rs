//! Sync attempt runtime for syncbyte.
//!
//! Ties the protocol version bridge and state aggregation together into one
//! attempt: connector output is migrated line by line, state is buffered and
//! flushed through the [`PayloadGuard`], and failures are classified for the
//! workflow engine.

pub mod attempt;
pub mod bootstrap;
pub mod classifier;
pub mod config;
pub mod error;
pub mod failure;
pub mod guard;
pub mod persistence;
pub mod status;
pub mod stream;

// Re-export public API for convenience
pub use attempt::{AttemptInput, AttemptOutput, StreamStatusEntry, SyncAttempt};
pub use bootstrap::Platform;
pub use classifier::RetryClassifier;
pub use config::{parse_config, validate_config, SyncConfig};
pub use error::{EngineAction, ErrorKind, SyncError};
pub use failure::{FailureOrigin, FailureReason, FailureType};
pub use guard::{PayloadGuard, DEFAULT_PAYLOAD_LIMIT};
pub use persistence::SyncPersistence;
pub use status::StreamStatusTracker;
pub use stream::VersionedMessageStream;
