//! Connection-level state envelope and identifiers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Shape of the checkpoints a connector emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StateType {
    /// One opaque blob for the whole connection.
    Legacy,
    /// One entry per stream.
    Stream,
    /// A shared blob plus per-stream entries, emitted as a single message.
    Global,
}

impl StateType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Legacy => "LEGACY",
            Self::Stream => "STREAM",
            Self::Global => "GLOBAL",
        }
    }
}

impl std::fmt::Display for StateType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StateType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LEGACY" => Ok(Self::Legacy),
            "STREAM" => Ok(Self::Stream),
            "GLOBAL" => Ok(Self::Global),
            other => Err(format!("unknown state type '{other}'")),
        }
    }
}

/// The envelope persisted for a connection and handed to the workflow engine.
///
/// For per-stream and global state `state` is an ordered array of state
/// messages; for legacy state it is the connector's opaque blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub state: Value,
}

impl State {
    #[must_use]
    pub fn new(state: Value) -> Self {
        Self { state }
    }

    /// Whether the envelope carries no checkpoint at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match &self.state {
            Value::Null => true,
            Value::Array(items) => items.is_empty(),
            Value::Object(map) => map.is_empty(),
            _ => false,
        }
    }
}

/// Opaque connection identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ConnectionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ConnectionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn state_type_roundtrip() {
        for ty in [StateType::Legacy, StateType::Stream, StateType::Global] {
            let json = serde_json::to_string(&ty).unwrap();
            assert_eq!(json, format!("\"{}\"", ty.as_str()));
            assert_eq!(ty.as_str().parse::<StateType>().unwrap(), ty);
        }
        assert!("PER_STREAM".parse::<StateType>().is_err());
    }

    #[test]
    fn emptiness() {
        assert!(State::new(Value::Null).is_empty());
        assert!(State::new(json!([])).is_empty());
        assert!(State::new(json!({})).is_empty());
        assert!(!State::new(json!([{"type": "STREAM"}])).is_empty());
        assert!(!State::new(json!("cursor")).is_empty());
    }

    #[test]
    fn connection_id_is_transparent() {
        let id = ConnectionId::new("conn-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"conn-1\"");
        assert_eq!(id.to_string(), "conn-1");
    }
}
