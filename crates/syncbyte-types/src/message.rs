//! Protocol messages exchanged with connector processes.
//!
//! Messages follow the connector wire shape: a `type` tag plus one payload
//! field named after the type (`{"type": "STATE", "state": {...}}`). Every
//! struct keeps the fields it does not model in an `additional` map so that
//! fields introduced by newer protocol revisions survive a decode/encode
//! cycle untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::state::StateType;
use crate::stream::StreamDescriptor;

/// Discriminator of a [`ProtocolMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    Record,
    State,
    Log,
    Spec,
    ConnectionStatus,
    Catalog,
    Trace,
    Control,
}

/// A single protocol message at the platform's internal version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolMessage {
    #[serde(rename = "type")]
    pub message_type: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<RecordMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<StateMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<LogMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<TraceMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_status: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control: Option<Value>,
    #[serde(flatten)]
    pub additional: Map<String, Value>,
}

impl ProtocolMessage {
    fn empty(message_type: MessageType) -> Self {
        Self {
            message_type,
            record: None,
            state: None,
            log: None,
            trace: None,
            spec: None,
            catalog: None,
            connection_status: None,
            control: None,
            additional: Map::new(),
        }
    }

    #[must_use]
    pub fn from_record(record: RecordMessage) -> Self {
        Self {
            record: Some(record),
            ..Self::empty(MessageType::Record)
        }
    }

    #[must_use]
    pub fn from_state(state: StateMessage) -> Self {
        Self {
            state: Some(state),
            ..Self::empty(MessageType::State)
        }
    }

    #[must_use]
    pub fn from_trace(trace: TraceMessage) -> Self {
        Self {
            trace: Some(trace),
            ..Self::empty(MessageType::Trace)
        }
    }

    #[must_use]
    pub fn from_log(log: LogMessage) -> Self {
        Self {
            log: Some(log),
            ..Self::empty(MessageType::Log)
        }
    }
}

/// One row of data for a stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMessage {
    pub stream: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub data: Value,
    pub emitted_at: i64,
    #[serde(flatten)]
    pub additional: Map<String, Value>,
}

impl RecordMessage {
    #[must_use]
    pub fn descriptor(&self) -> StreamDescriptor {
        StreamDescriptor {
            name: self.stream.clone(),
            namespace: self.namespace.clone(),
        }
    }
}

/// Checkpoint emitted by a connector.
///
/// `data` is the deprecated whole-connection payload. Connectors built for
/// backward compatibility populate it next to `stream` or `global`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateMessage {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub state_type: Option<StateType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<StreamState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global: Option<GlobalState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(flatten)]
    pub additional: Map<String, Value>,
}

impl StateMessage {
    /// Per-stream checkpoint.
    #[must_use]
    pub fn for_stream(descriptor: StreamDescriptor, stream_state: Value) -> Self {
        Self {
            state_type: Some(StateType::Stream),
            stream: Some(StreamState {
                stream_descriptor: descriptor,
                stream_state: Some(stream_state),
                additional: Map::new(),
            }),
            ..Self::default()
        }
    }

    /// Whole-connection checkpoint.
    #[must_use]
    pub fn legacy(data: Value) -> Self {
        Self {
            state_type: Some(StateType::Legacy),
            data: Some(data),
            ..Self::default()
        }
    }

    /// Connection-wide checkpoint shared by several streams.
    #[must_use]
    pub fn for_global(global: GlobalState) -> Self {
        Self {
            state_type: Some(StateType::Global),
            global: Some(global),
            ..Self::default()
        }
    }

    /// Declared type, with untyped messages read as legacy.
    #[must_use]
    pub fn effective_type(&self) -> StateType {
        self.state_type.unwrap_or(StateType::Legacy)
    }

    #[must_use]
    pub fn descriptor(&self) -> Option<&StreamDescriptor> {
        self.stream.as_ref().map(|s| &s.stream_descriptor)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamState {
    pub stream_descriptor: StreamDescriptor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_state: Option<Value>,
    #[serde(flatten)]
    pub additional: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shared_state: Option<Value>,
    #[serde(default)]
    pub stream_states: Vec<StreamState>,
    #[serde(flatten)]
    pub additional: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogLevel {
    Fatal,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogMessage {
    pub level: LogLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TraceType {
    Error,
    Estimate,
    StreamStatus,
    Analytics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceMessage {
    #[serde(rename = "type")]
    pub trace_type: TraceType,
    pub emitted_at: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimate: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_status: Option<StreamStatusTrace>,
    #[serde(flatten)]
    pub additional: Map<String, Value>,
}

impl TraceMessage {
    #[must_use]
    pub fn stream_status(descriptor: StreamDescriptor, status: StreamStatus, emitted_at: f64) -> Self {
        Self {
            trace_type: TraceType::StreamStatus,
            emitted_at,
            error: None,
            estimate: None,
            stream_status: Some(StreamStatusTrace {
                stream_descriptor: descriptor,
                status,
                additional: Map::new(),
            }),
            additional: Map::new(),
        }
    }
}

/// Lifecycle position of a stream within one sync attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamStatus {
    Started,
    Running,
    Complete,
    Incomplete,
}

impl std::fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Started => "STARTED",
            Self::Running => "RUNNING",
            Self::Complete => "COMPLETE",
            Self::Incomplete => "INCOMPLETE",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamStatusTrace {
    pub stream_descriptor: StreamDescriptor,
    pub status: StreamStatus,
    #[serde(flatten)]
    pub additional: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn state_message_wire_shape() {
        let msg = ProtocolMessage::from_state(StateMessage::for_stream(
            StreamDescriptor::new("users").with_namespace("public"),
            json!({"cursor": 10}),
        ));
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "STATE",
                "state": {
                    "type": "STREAM",
                    "stream": {
                        "stream_descriptor": {"name": "users", "namespace": "public"},
                        "stream_state": {"cursor": 10}
                    }
                }
            })
        );
    }

    #[test]
    fn unknown_fields_survive_decode_encode() {
        let raw = json!({
            "type": "RECORD",
            "record": {
                "stream": "users",
                "data": {"id": 1},
                "emitted_at": 1_700_000_000_000_i64,
                "meta": {"changes": []}
            },
            "sidecar": "kept"
        });
        let msg: ProtocolMessage = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(msg.additional["sidecar"], "kept");
        assert_eq!(serde_json::to_value(&msg).unwrap(), raw);
    }

    #[test]
    fn untyped_state_reads_as_legacy() {
        let msg: StateMessage = serde_json::from_value(json!({"data": {"a": 1}})).unwrap();
        assert_eq!(msg.effective_type(), StateType::Legacy);
        assert!(msg.descriptor().is_none());
    }

    #[test]
    fn stream_status_trace_roundtrip() {
        let trace = TraceMessage::stream_status(
            StreamDescriptor::new("orders"),
            StreamStatus::Complete,
            1.0,
        );
        let json = serde_json::to_value(&trace).unwrap();
        assert_eq!(json["type"], "STREAM_STATUS");
        assert_eq!(json["stream_status"]["status"], "COMPLETE");
        let back: TraceMessage = serde_json::from_value(json).unwrap();
        assert_eq!(back, trace);
    }
}
