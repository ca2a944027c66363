//! Typed view over a persisted [`State`] envelope.

use serde_json::Value;
use syncbyte_types::{State, StateMessage, StateType};

use crate::error::{self, StateError};

/// A persisted state envelope, classified by shape.
#[derive(Debug, Clone, PartialEq)]
pub enum StateWrapper {
    /// Opaque whole-connection blob.
    Legacy(Value),
    /// One message per stream.
    Stream(Vec<StateMessage>),
    /// A single global message.
    Global(StateMessage),
}

impl StateWrapper {
    #[must_use]
    pub fn state_type(&self) -> StateType {
        match self {
            Self::Legacy(_) => StateType::Legacy,
            Self::Stream(_) => StateType::Stream,
            Self::Global(_) => StateType::Global,
        }
    }

    /// Back to the envelope persisted for a connection.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Serialization`] if a message cannot be encoded.
    pub fn to_state(&self) -> error::Result<State> {
        let value = match self {
            Self::Legacy(blob) => blob.clone(),
            Self::Stream(messages) => serde_json::to_value(messages)?,
            Self::Global(message) => Value::Array(vec![serde_json::to_value(message)?]),
        };
        Ok(State::new(value))
    }
}

/// Classify a persisted envelope.
///
/// * no state, or `null` → `None`
/// * a non-array value, or an array that does not decode as state messages
///   → [`StateWrapper::Legacy`]
/// * exactly one GLOBAL message → [`StateWrapper::Global`]
/// * one or more STREAM messages → [`StateWrapper::Stream`]
/// * messages that are all untyped or LEGACY → [`StateWrapper::Legacy`]
///
/// # Errors
///
/// Returns [`StateError::UnexpectedStateBlob`] when an array mixes types.
pub fn typed_state(state: Option<&State>) -> error::Result<Option<StateWrapper>> {
    let Some(state) = state else {
        return Ok(None);
    };
    let blob = match &state.state {
        Value::Null => return Ok(None),
        Value::Array(items) if items.is_empty() => return Ok(None),
        Value::Array(_) => state.state.clone(),
        other => return Ok(Some(StateWrapper::Legacy(other.clone()))),
    };

    let Ok(messages) = serde_json::from_value::<Vec<StateMessage>>(blob.clone()) else {
        return Ok(Some(StateWrapper::Legacy(blob)));
    };

    if messages.len() == 1 && messages[0].state_type == Some(StateType::Global) {
        let mut messages = messages;
        return Ok(messages.pop().map(StateWrapper::Global));
    }
    let all = |ty: StateType| messages.iter().all(|m| m.effective_type() == ty);
    if all(StateType::Stream) {
        return Ok(Some(StateWrapper::Stream(messages)));
    }
    if all(StateType::Legacy) {
        return Ok(Some(StateWrapper::Legacy(blob)));
    }
    let types: Vec<&str> = messages.iter().map(|m| m.effective_type().as_str()).collect();
    Err(StateError::UnexpectedStateBlob(format!(
        "state array mixes message types [{}]",
        types.join(", ")
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use syncbyte_types::StreamDescriptor;

    #[test]
    fn absent_and_null_state_have_no_type() {
        assert_eq!(typed_state(None).unwrap(), None);
        assert_eq!(typed_state(Some(&State::new(Value::Null))).unwrap(), None);
        assert_eq!(typed_state(Some(&State::new(json!([])))).unwrap(), None);
    }

    #[test]
    fn object_blob_is_legacy() {
        let state = State::new(json!({"cursor": "2024-01-01"}));
        let typed = typed_state(Some(&state)).unwrap().unwrap();
        assert_eq!(typed.state_type(), StateType::Legacy);
        assert_eq!(typed.to_state().unwrap(), state);
    }

    #[test]
    fn array_of_scalars_is_legacy() {
        let state = State::new(json!([1, 2, 3]));
        let typed = typed_state(Some(&state)).unwrap().unwrap();
        assert_eq!(typed, StateWrapper::Legacy(json!([1, 2, 3])));
    }

    #[test]
    fn stream_messages_are_stream() {
        let messages = vec![
            StateMessage::for_stream(StreamDescriptor::new("a"), json!(1)),
            StateMessage::for_stream(StreamDescriptor::new("b"), json!(2)),
        ];
        let state = State::new(serde_json::to_value(&messages).unwrap());
        let typed = typed_state(Some(&state)).unwrap().unwrap();
        assert_eq!(typed, StateWrapper::Stream(messages));
        assert_eq!(typed.to_state().unwrap(), state);
    }

    #[test]
    fn single_global_message_is_global() {
        let state = State::new(json!([
            {"type": "GLOBAL", "global": {"shared_state": {"lsn": 4}, "stream_states": []}}
        ]));
        let typed = typed_state(Some(&state)).unwrap().unwrap();
        assert_eq!(typed.state_type(), StateType::Global);
    }

    #[test]
    fn mixed_types_are_rejected() {
        let state = State::new(json!([
            {"type": "STREAM", "stream": {"stream_descriptor": {"name": "a"}}},
            {"type": "LEGACY", "data": {}}
        ]));
        let err = typed_state(Some(&state)).unwrap_err();
        assert!(err.to_string().contains("STREAM, LEGACY"), "got: {err}");
    }
}
