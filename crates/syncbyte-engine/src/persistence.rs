//! Buffered persistence of one attempt's state.
//!
//! State messages accumulate in a buffer aggregator and are flushed to the
//! [`StateStore`] every `flush_every` messages and once more at close. A
//! failed flush keeps its aggregator; the next buffer is merged into it so
//! nothing is lost before the following flush. Every flushed state passes
//! through the [`PayloadGuard`] first.
//!
//! Per-stream state is written as a whole, so the streams persisted by
//! earlier attempts are carried forward and overwritten entry by entry.
//!
//! The final flush is retried with jittered exponential backoff while the
//! store fails transiently; interval flushes are not, since the next flush
//! picks up their state anyway.
//!
//! A connection whose persisted state is LEGACY and whose connector now emits
//! per-stream state is mid-migration. Its state is written only at close, and
//! only if every incremental stream of the catalog has an entry.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use syncbyte_state::{
    typed_state, validate_stream_states, StateAggregator, StateError, StateStore, StateWrapper,
};
use syncbyte_types::{ConfiguredCatalog, ConnectionId, State, StateMessage, StateType};

use crate::error::{ErrorKind, SyncError};
use crate::guard::PayloadGuard;

/// First backoff between tries of the final flush.
const CLOSE_BACKOFF_BASE: Duration = Duration::from_millis(100);

/// Ceiling of the backoff between tries of the final flush.
const CLOSE_BACKOFF_MAX: Duration = Duration::from_secs(5);

/// Default tries of the final flush.
pub const DEFAULT_FINAL_FLUSH_ATTEMPTS: u32 = 3;

pub struct SyncPersistence {
    connection: ConnectionId,
    store: Arc<dyn StateStore>,
    guard: PayloadGuard,
    catalog: Option<ConfiguredCatalog>,
    flush_every: usize,
    final_flush_attempts: u32,
    persisted: Option<State>,
    persisted_type: Option<StateType>,
    state_type: Option<StateType>,
    buffer: Option<StateAggregator>,
    to_flush: Option<StateAggregator>,
    committed: Option<StateAggregator>,
    pending: usize,
    migrating_from_legacy: bool,
}

impl SyncPersistence {
    /// # Errors
    ///
    /// Returns [`SyncError::State`] if the persisted state cannot be read.
    pub fn new(
        connection: ConnectionId,
        store: Arc<dyn StateStore>,
        guard: PayloadGuard,
        flush_every: usize,
    ) -> Result<Self, SyncError> {
        let (persisted_type, persisted) = match store.get_state(&connection)? {
            Some(stored) => (Some(stored.state_type), Some(stored.state)),
            None => (None, None),
        };
        Ok(Self {
            connection,
            store,
            guard,
            catalog: None,
            flush_every: flush_every.max(1),
            final_flush_attempts: DEFAULT_FINAL_FLUSH_ATTEMPTS,
            persisted,
            persisted_type,
            state_type: None,
            buffer: None,
            to_flush: None,
            committed: None,
            pending: 0,
            migrating_from_legacy: false,
        })
    }

    /// Catalog used to validate a legacy to per-stream migration.
    #[must_use]
    pub fn with_catalog(mut self, catalog: ConfiguredCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// How many times [`close`](Self::close) tries the final flush.
    #[must_use]
    pub fn with_final_flush_attempts(mut self, attempts: u32) -> Self {
        self.final_flush_attempts = attempts.max(1);
        self
    }

    /// Whether this attempt moves the connection off legacy state.
    #[must_use]
    pub fn is_migrating_from_legacy(&self) -> bool {
        self.migrating_from_legacy
    }

    /// Buffer a state message, flushing when the interval is reached.
    ///
    /// A failed interval flush is logged and retried at the next flush.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::State`] if the message type differs from earlier
    /// messages or does not fit the aggregator, and
    /// [`SyncError::SizeLimitExceeded`] if the buffered state outgrows the
    /// payload ceiling.
    pub fn accept(&mut self, message: StateMessage) -> Result<(), SyncError> {
        let state_type = message.effective_type();
        match self.state_type {
            Some(expected) if expected != state_type => {
                return Err(StateError::StateTypeMismatch {
                    expected,
                    actual: state_type,
                }
                .into());
            }
            Some(_) => {}
            None => self.start(state_type)?,
        }

        self.buffer
            .get_or_insert_with(|| StateAggregator::for_state_type(state_type))
            .ingest(message)?;
        self.pending += 1;

        if !self.migrating_from_legacy && self.pending >= self.flush_every {
            match self.flush() {
                Ok(_) => {}
                Err(err @ SyncError::SizeLimitExceeded { .. }) => return Err(err),
                Err(err) => {
                    tracing::warn!(
                        connection = %self.connection,
                        error = %err,
                        "State flush failed; keeping state for the next flush"
                    );
                }
            }
        }
        Ok(())
    }

    fn start(&mut self, state_type: StateType) -> Result<(), SyncError> {
        self.state_type = Some(state_type);
        if state_type != StateType::Stream {
            return Ok(());
        }
        match self.persisted_type {
            Some(StateType::Legacy) => {
                tracing::info!(
                    connection = %self.connection,
                    "Migrating from legacy to per-stream state; deferring flush to the end of the attempt"
                );
                self.migrating_from_legacy = true;
            }
            Some(StateType::Stream) => {
                if let Some(StateWrapper::Stream(messages)) = typed_state(self.persisted.as_ref())? {
                    let mut committed = StateAggregator::for_state_type(StateType::Stream);
                    for message in messages {
                        committed.ingest(message)?;
                    }
                    self.committed = Some(committed);
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Persist everything buffered so far.
    ///
    /// Returns the full persisted state, or `None` when nothing was
    /// buffered.
    ///
    /// # Errors
    ///
    /// Returns the guard, validation or store error. Buffered state is kept
    /// for the next flush.
    pub fn flush(&mut self) -> Result<Option<State>, SyncError> {
        if let Some(buffer) = self.buffer.take() {
            match self.to_flush.as_mut() {
                Some(to_flush) => to_flush.merge(buffer)?,
                None => self.to_flush = Some(buffer),
            }
        }
        self.pending = 0;

        let (Some(to_flush), Some(state_type)) = (self.to_flush.as_ref(), self.state_type) else {
            return Ok(None);
        };
        if to_flush.is_empty() {
            return Ok(None);
        }

        let mut candidate = self
            .committed
            .clone()
            .unwrap_or_else(|| StateAggregator::for_state_type(state_type));
        candidate.merge(to_flush.clone())?;
        let state = self.guard.validate(candidate.aggregated()?)?;
        if self.migrating_from_legacy {
            if let Some(catalog) = &self.catalog {
                validate_stream_states(&state, catalog)?;
            }
        }
        self.store.put_state(&self.connection, state_type, &state)?;

        tracing::debug!(
            connection = %self.connection,
            state_type = %state_type,
            "Flushed state"
        );
        self.to_flush = None;
        self.committed = Some(candidate);
        self.persisted_type = Some(state_type);
        Ok(Some(state))
    }

    /// Final flush at the end of a successful attempt.
    ///
    /// Retryable store failures are retried up to the configured number of
    /// tries. Returns the state persisted for the connection by this attempt.
    ///
    /// # Errors
    ///
    /// See [`flush`](Self::flush). Only the last failure is returned.
    pub async fn close(mut self) -> Result<Option<State>, SyncError> {
        let mut tries = 0;
        let mut backoff = CLOSE_BACKOFF_BASE;
        let flushed = loop {
            tries += 1;
            match self.flush() {
                Ok(flushed) => break flushed,
                Err(err)
                    if err.kind() == ErrorKind::Retryable && tries < self.final_flush_attempts =>
                {
                    let delay = backoff.min(CLOSE_BACKOFF_MAX) + jitter();
                    tracing::warn!(
                        connection = %self.connection,
                        error = %err,
                        attempt = tries,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "Final state flush failed; retrying"
                    );
                    tokio::time::sleep(delay).await;
                    backoff = backoff.saturating_mul(2);
                }
                Err(err) => return Err(err),
            }
        };
        if self.migrating_from_legacy && flushed.is_some() {
            tracing::info!(connection = %self.connection, "Completed migration to per-stream state");
        }
        match flushed {
            Some(state) => Ok(Some(state)),
            None => Ok(self.committed.map(|c| c.aggregated()).transpose()?),
        }
    }

    /// Drop everything not yet persisted. Used on cancellation, where no
    /// partial checkpoint may be written.
    pub fn discard(mut self) {
        let dropped = self.buffer.take().is_some() || self.to_flush.take().is_some();
        if dropped {
            tracing::info!(connection = %self.connection, "Discarded unflushed state");
        }
    }

    /// Type of the state messages seen in this attempt.
    #[must_use]
    pub fn state_type(&self) -> Option<StateType> {
        self.state_type
    }
}

/// Backoff jitter of up to 50ms.
fn jitter() -> Duration {
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    Duration::from_millis(u64::from(nanos % 50))
}
