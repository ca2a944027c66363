//! Stream lifecycle tracking for one sync attempt.
//!
//! A stream must be STARTED exactly once, before anything else. RUNNING is
//! accepted after STARTED or RUNNING; COMPLETE and INCOMPLETE are accepted
//! once the stream is tracked. Everything else is a
//! [`SyncError::StreamStatusTransition`].

use indexmap::IndexMap;
use syncbyte_types::{StreamDescriptor, StreamStatus};

use crate::error::SyncError;

#[derive(Debug, Clone, Default)]
pub struct StreamStatusTracker {
    statuses: IndexMap<StreamDescriptor, StreamStatus>,
}

impl StreamStatusTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a status reported by the connector.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::StreamStatusTransition`] if the transition is not
    /// allowed from the stream's current status.
    pub fn track(&mut self, stream: &StreamDescriptor, status: StreamStatus) -> Result<(), SyncError> {
        let current = self.statuses.get(stream).copied();
        let allowed = match (current, status) {
            (None, StreamStatus::Started) => true,
            (Some(StreamStatus::Started | StreamStatus::Running), StreamStatus::Running) => true,
            (Some(_), StreamStatus::Complete | StreamStatus::Incomplete) => true,
            _ => false,
        };
        if !allowed {
            return Err(SyncError::StreamStatusTransition {
                stream: stream.clone(),
                current,
                attempted: status,
            });
        }
        if current != Some(status) {
            tracing::info!(stream = %stream, status = %status, "Stream status changed");
        }
        self.statuses.insert(stream.clone(), status);
        Ok(())
    }

    /// Mark every stream that has not finished as INCOMPLETE.
    ///
    /// Used when the attempt itself fails or is cancelled.
    pub fn force_incomplete(&mut self) -> Vec<StreamDescriptor> {
        let mut changed = Vec::new();
        for (stream, status) in &mut self.statuses {
            if matches!(status, StreamStatus::Started | StreamStatus::Running) {
                *status = StreamStatus::Incomplete;
                changed.push(stream.clone());
            }
        }
        if !changed.is_empty() {
            tracing::warn!(streams = changed.len(), "Forced unfinished streams to INCOMPLETE");
        }
        changed
    }

    #[must_use]
    pub fn status(&self, stream: &StreamDescriptor) -> Option<StreamStatus> {
        self.statuses.get(stream).copied()
    }

    /// Every tracked stream with its status, in first-seen order.
    pub fn statuses(&self) -> impl Iterator<Item = (&StreamDescriptor, StreamStatus)> {
        self.statuses.iter().map(|(d, s)| (d, *s))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }
}
