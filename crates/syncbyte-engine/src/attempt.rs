//! Driver for one sync attempt over a connector's output.
//!
//! The attempt reads raw lines from a channel fed by the connector
//! collaborator, resolves the connector's protocol version, upgrades every
//! message to the platform version and routes it: STATE into
//! [`SyncPersistence`], stream status traces into the
//! [`StreamStatusTracker`], error traces into the failure list. The final
//! [`AttemptOutput`] passes through the [`PayloadGuard`] before it is
//! returned.
//!
//! Cancellation is observed between lines. A cancelled attempt flushes
//! nothing and returns [`SyncError::Cancelled`].

use serde::Serialize;
use syncbyte_protocol::{detect_or, DETECTION_LOOKAHEAD};
use syncbyte_types::message::TraceType;
use syncbyte_types::{
    ConfiguredCatalog, ConnectionId, MessageType, ProtocolMessage, State, StateType,
    StreamDescriptor, StreamStatus, Version,
};
use tokio::sync::{mpsc, watch};

use crate::bootstrap::Platform;
use crate::error::SyncError;
use crate::failure::{FailureOrigin, FailureReason};
use crate::guard::PayloadGuard;
use crate::persistence::SyncPersistence;
use crate::status::StreamStatusTracker;
use crate::stream::VersionedMessageStream;

/// What the caller knows about the attempt before it starts.
#[derive(Debug, Clone)]
pub struct AttemptInput {
    pub connection: ConnectionId,
    /// Version declared by the connector's metadata, if any.
    pub declared_version: Option<Version>,
    /// Catalog of the connection; required to validate a move off legacy state.
    pub catalog: Option<ConfiguredCatalog>,
}

impl AttemptInput {
    #[must_use]
    pub fn new(connection: ConnectionId) -> Self {
        Self {
            connection,
            declared_version: None,
            catalog: None,
        }
    }

    #[must_use]
    pub fn with_declared_version(mut self, version: Version) -> Self {
        self.declared_version = Some(version);
        self
    }

    #[must_use]
    pub fn with_catalog(mut self, catalog: ConfiguredCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamStatusEntry {
    pub stream: StreamDescriptor,
    pub status: StreamStatus,
}

/// Result of a completed attempt, as handed to the workflow engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptOutput {
    pub connection: ConnectionId,
    pub protocol_version: Version,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_type: Option<StateType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<State>,
    pub records: u64,
    pub state_messages: u64,
    pub stream_statuses: Vec<StreamStatusEntry>,
    pub failures: Vec<FailureReason>,
}

enum Next {
    Line(String),
    Eof,
    Cancelled,
}

/// Line source with cancellation.
struct Feed {
    lines: mpsc::Receiver<String>,
    cancel: watch::Receiver<bool>,
    cancel_open: bool,
}

impl Feed {
    async fn next(&mut self) -> Next {
        if *self.cancel.borrow() {
            return Next::Cancelled;
        }
        loop {
            tokio::select! {
                biased;
                changed = self.cancel.changed(), if self.cancel_open => {
                    match changed {
                        Ok(()) if *self.cancel.borrow() => return Next::Cancelled,
                        Ok(()) => {}
                        // Sender gone: nobody can cancel any more.
                        Err(_) => self.cancel_open = false,
                    }
                }
                line = self.lines.recv() => {
                    return line.map_or(Next::Eof, Next::Line);
                }
            }
        }
    }
}

pub struct SyncAttempt {
    platform: Platform,
    input: AttemptInput,
}

/// Per-attempt mutable state, owned by the running attempt.
struct Session {
    stream: VersionedMessageStream,
    persistence: SyncPersistence,
    tracker: StreamStatusTracker,
    records: u64,
    state_messages: u64,
    failures: Vec<FailureReason>,
}

impl SyncAttempt {
    #[must_use]
    pub fn new(platform: Platform, input: AttemptInput) -> Self {
        Self { platform, input }
    }

    /// Run the attempt to completion.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Cancelled`] when `cancel` flips to `true`, the
    /// first migration, status or state error raised while processing, and
    /// [`SyncError::SizeLimitExceeded`] if the output is too large.
    pub async fn run(
        self,
        lines: mpsc::Receiver<String>,
        cancel: watch::Receiver<bool>,
    ) -> Result<AttemptOutput, SyncError> {
        let mut feed = Feed {
            lines,
            cancel,
            cancel_open: true,
        };
        let connection = self.input.connection.clone();

        let (version, buffered) = match self.resolve_version(&mut feed).await {
            Some(resolved) => resolved,
            None => {
                tracing::warn!(connection = %connection, "Attempt cancelled before the version was resolved");
                return Err(SyncError::Cancelled);
            }
        };
        tracing::info!(
            connection = %connection,
            connector_version = %version,
            platform_version = %self.platform.migrator.current_version(),
            "Starting sync attempt"
        );

        let mut persistence = SyncPersistence::new(
            connection.clone(),
            self.platform.store.clone(),
            self.platform.guard,
            self.platform.config.state.flush_every_messages,
        )?
        .with_final_flush_attempts(self.platform.config.state.final_flush_attempts);
        if let Some(catalog) = self.input.catalog.clone() {
            persistence = persistence.with_catalog(catalog);
        }
        let mut session = Session {
            stream: VersionedMessageStream::new(self.platform.migrator.clone(), version),
            persistence,
            tracker: StreamStatusTracker::new(),
            records: 0,
            state_messages: 0,
            failures: Vec::new(),
        };

        for line in buffered {
            if let Err(err) = session.handle_line(&line) {
                return Err(session.abort(err));
            }
        }
        loop {
            match feed.next().await {
                Next::Line(line) => {
                    if let Err(err) = session.handle_line(&line) {
                        return Err(session.abort(err));
                    }
                }
                Next::Eof => break,
                Next::Cancelled => return Err(session.abort(SyncError::Cancelled)),
            }
        }

        session
            .finish(connection, version, &self.platform.guard)
            .await
    }

    /// Version to read the connector at, plus the lines consumed while
    /// detecting it. `None` if cancelled meanwhile.
    async fn resolve_version(&self, feed: &mut Feed) -> Option<(Version, Vec<String>)> {
        if let Some(declared) = self.input.declared_version {
            return Some((declared, Vec::new()));
        }
        let fallback = self.platform.config.fallback_protocol_version;
        if !self.platform.config.detect_version {
            return Some((fallback, Vec::new()));
        }
        let mut buffered = Vec::with_capacity(DETECTION_LOOKAHEAD);
        while buffered.len() < DETECTION_LOOKAHEAD {
            match feed.next().await {
                Next::Line(line) => buffered.push(line),
                Next::Eof => break,
                Next::Cancelled => return None,
            }
        }
        Some((detect_or(&buffered, fallback), buffered))
    }
}

impl Session {
    fn handle_line(&mut self, line: &str) -> Result<(), SyncError> {
        if let Some(message) = self.stream.decode_line(line)? {
            self.route(message)?;
        }
        Ok(())
    }

    fn route(&mut self, message: ProtocolMessage) -> Result<(), SyncError> {
        match message.message_type {
            MessageType::Record => self.records += 1,
            MessageType::State => {
                if let Some(state) = message.state {
                    self.state_messages += 1;
                    self.persistence.accept(state)?;
                }
            }
            MessageType::Trace => {
                let Some(trace) = message.trace else {
                    return Ok(());
                };
                match trace.trace_type {
                    TraceType::StreamStatus => {
                        if let Some(status) = trace.stream_status {
                            self.tracker
                                .track(&status.stream_descriptor, status.status)?;
                        }
                    }
                    TraceType::Error => {
                        if let Some(error) = &trace.error {
                            let reason = FailureReason::from_connector_trace(
                                FailureOrigin::Source,
                                error,
                                trace.emitted_at,
                            );
                            tracing::warn!(
                                message = %reason.external_message,
                                retryable = reason.retryable,
                                "Connector reported an error"
                            );
                            self.failures.push(reason);
                        }
                    }
                    TraceType::Estimate | TraceType::Analytics => {}
                }
            }
            other => tracing::debug!(message_type = ?other, "Ignoring message"),
        }
        Ok(())
    }

    /// Abandon the attempt: nothing unflushed is persisted and unfinished
    /// streams are marked INCOMPLETE.
    fn abort(mut self, err: SyncError) -> SyncError {
        let forced = self.tracker.force_incomplete();
        self.persistence.discard();
        tracing::warn!(
            error = %err,
            records = self.records,
            incomplete_streams = forced.len(),
            "Sync attempt aborted"
        );
        err
    }

    async fn finish(
        mut self,
        connection: ConnectionId,
        version: Version,
        guard: &PayloadGuard,
    ) -> Result<AttemptOutput, SyncError> {
        let state_type = self.persistence.state_type();
        let state = match self.persistence.close().await {
            Ok(state) => state,
            Err(err) => {
                self.tracker.force_incomplete();
                return Err(err);
            }
        };
        let output = AttemptOutput {
            connection,
            protocol_version: version,
            state_type,
            state,
            records: self.records,
            state_messages: self.state_messages,
            stream_statuses: self
                .tracker
                .statuses()
                .map(|(stream, status)| StreamStatusEntry {
                    stream: stream.clone(),
                    status,
                })
                .collect(),
            failures: self.failures,
        };
        tracing::info!(
            connection = %output.connection,
            records = output.records,
            state_messages = output.state_messages,
            skipped_lines = self.stream.skipped(),
            "Sync attempt finished"
        );
        guard.validate(output)
    }
}
