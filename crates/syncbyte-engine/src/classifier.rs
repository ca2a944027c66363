//! Maps failures raised while talking to connector processes onto the
//! [`ErrorKind`] taxonomy.
//!
//! Classification only decides; retry timing and scheduling belong to the
//! workflow engine.

use std::io;

use syncbyte_state::StateError;
use syncbyte_types::MigrationError;

use crate::error::{io_error_kind, state_error_kind, EngineAction, ErrorKind, SyncError};

#[derive(Debug, Clone, Copy, Default)]
pub struct RetryClassifier;

impl RetryClassifier {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    #[must_use]
    pub fn classify(&self, err: &SyncError) -> ErrorKind {
        err.kind()
    }

    #[must_use]
    pub fn action(&self, err: &SyncError) -> EngineAction {
        self.classify(err).action()
    }

    #[must_use]
    pub fn classify_io(&self, err: &io::Error) -> ErrorKind {
        io_error_kind(err)
    }

    /// Walk an error chain and classify by the first cause that is
    /// recognised. Unrecognised chains are fatal.
    #[must_use]
    pub fn classify_chain(&self, err: &anyhow::Error) -> ErrorKind {
        for cause in err.chain() {
            if let Some(sync) = cause.downcast_ref::<SyncError>() {
                return self.classify(sync);
            }
            if cause.downcast_ref::<MigrationError>().is_some() {
                return ErrorKind::Fatal;
            }
            if let Some(state) = cause.downcast_ref::<StateError>() {
                return state_error_kind(state);
            }
            if let Some(io) = cause.downcast_ref::<io::Error>() {
                return self.classify_io(io);
            }
        }
        ErrorKind::Fatal
    }

    /// Convert an arbitrary connector-side failure into a [`SyncError`],
    /// keeping the original error attached.
    #[must_use]
    pub fn into_sync_error(&self, err: anyhow::Error, operation: &str) -> SyncError {
        let kind = self.classify_chain(&err);
        let err = match err.downcast::<SyncError>() {
            Ok(sync) => return sync,
            Err(other) => other,
        };
        tracing::debug!(operation, kind = %kind, error = %err, "Classified connector failure");
        let cause: Box<dyn std::error::Error + Send + Sync> = err.into();
        match kind {
            ErrorKind::Retryable => SyncError::Retryable {
                operation: operation.to_string(),
                cause,
            },
            _ => SyncError::Fatal {
                operation: operation.to_string(),
                cause,
            },
        }
    }
}
