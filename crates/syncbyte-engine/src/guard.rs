//! Size ceiling for values handed to the workflow engine.
//!
//! The engine accepts an oversized activity result and only fails later, when
//! delivering it, after the activity has already been reported as complete.
//! Every value crossing that boundary therefore goes through
//! [`PayloadGuard::validate`] first.

use std::io;

use serde::Serialize;

use crate::error::SyncError;

/// Largest serialized payload the workflow engine carries: 4 MiB.
pub const DEFAULT_PAYLOAD_LIMIT: usize = 4 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadGuard {
    limit: usize,
}

impl Default for PayloadGuard {
    fn default() -> Self {
        Self::new(DEFAULT_PAYLOAD_LIMIT)
    }
}

impl PayloadGuard {
    #[must_use]
    pub const fn new(limit: usize) -> Self {
        Self { limit }
    }

    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    /// Serialized JSON size of `value` in bytes.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Serialization`] if `value` cannot be serialized.
    pub fn measure<T: Serialize + ?Sized>(value: &T) -> Result<usize, SyncError> {
        let mut counter = ByteCounter(0);
        serde_json::to_writer(&mut counter, value)?;
        Ok(counter.0)
    }

    /// Pass `value` through unchanged if it fits under the limit.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::SizeLimitExceeded`] with the exact measured size
    /// when the serialized value is larger than the limit.
    pub fn validate<T: Serialize>(&self, value: T) -> Result<T, SyncError> {
        self.check(&value)?;
        Ok(value)
    }

    /// Borrowing form of [`validate`](Self::validate).
    ///
    /// # Errors
    ///
    /// See [`validate`](Self::validate).
    pub fn check<T: Serialize + ?Sized>(&self, value: &T) -> Result<usize, SyncError> {
        let measured = Self::measure(value)?;
        if measured > self.limit {
            tracing::error!(measured, limit = self.limit, "Payload exceeds size limit");
            return Err(SyncError::SizeLimitExceeded {
                measured,
                limit: self.limit,
            });
        }
        Ok(measured)
    }
}

/// `io::Write` sink that only counts bytes.
struct ByteCounter(usize);

impl io::Write for ByteCounter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0 += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
