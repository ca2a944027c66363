//! Line-by-line decoding of connector output at a fixed protocol version.

use std::sync::Arc;

use serde_json::Value;
use syncbyte_protocol::MessageMigrator;
use syncbyte_types::message::{LogLevel, LogMessage};
use syncbyte_types::{MessageType, ProtocolMessage, Version};

use crate::error::SyncError;

/// Upgrades each line a connector prints into a platform [`ProtocolMessage`].
///
/// Connectors interleave free-form output with protocol messages, so lines
/// that are not JSON objects are logged and skipped. LOG messages are
/// forwarded to `tracing` and not returned.
pub struct VersionedMessageStream {
    migrator: Arc<MessageMigrator>,
    version: Version,
    skipped: u64,
}

impl VersionedMessageStream {
    #[must_use]
    pub fn new(migrator: Arc<MessageMigrator>, version: Version) -> Self {
        Self {
            migrator,
            version,
            skipped: 0,
        }
    }

    /// Protocol version the connector is read at.
    #[must_use]
    pub fn version(&self) -> Version {
        self.version
    }

    /// Number of lines skipped as non-protocol output.
    #[must_use]
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Decode one output line.
    ///
    /// Returns `None` for blank lines, non-protocol output and LOG messages.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Migration`] if the message cannot be upgraded to
    /// the platform version.
    pub fn decode_line(&mut self, line: &str) -> Result<Option<ProtocolMessage>, SyncError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let value = match serde_json::from_str::<Value>(line) {
            Ok(value @ Value::Object(_)) => value,
            _ => {
                self.skipped += 1;
                tracing::debug!(line, "Skipping non-protocol connector output");
                return Ok(None);
            }
        };

        let message = self.migrator.decode_message(value, &self.version)?;
        if message.message_type == MessageType::Log {
            if let Some(log) = &message.log {
                forward_log(log);
            }
            return Ok(None);
        }
        Ok(Some(message))
    }
}

fn forward_log(log: &LogMessage) {
    let message = log.message.as_str();
    match log.level {
        LogLevel::Fatal | LogLevel::Error => match &log.stack_trace {
            Some(stack_trace) => tracing::error!(stack_trace = %stack_trace, "connector: {message}"),
            None => tracing::error!("connector: {message}"),
        },
        LogLevel::Warn => tracing::warn!("connector: {message}"),
        LogLevel::Info => tracing::info!("connector: {message}"),
        LogLevel::Debug => tracing::debug!("connector: {message}"),
        LogLevel::Trace => tracing::trace!("connector: {message}"),
    }
}
