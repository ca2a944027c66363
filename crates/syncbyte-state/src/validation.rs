//! Checks applied when a connection moves from legacy to per-stream state.

use std::collections::HashSet;

use syncbyte_types::{ConfiguredCatalog, State, StreamDescriptor};

use crate::error::{self, StateError};
use crate::wrapper::{typed_state, StateWrapper};

/// Require a state entry for every incremental stream in `catalog`.
///
/// Legacy state covered the whole connection; once a connector switches to
/// per-stream state, an incremental stream left without an entry would be
/// re-synced from scratch on the next run.
///
/// # Errors
///
/// Returns [`StateError::IncompleteStreamMigration`] listing the uncovered
/// streams in catalog order.
pub fn validate_stream_states(state: &State, catalog: &ConfiguredCatalog) -> error::Result<()> {
    let covered: HashSet<StreamDescriptor> = match typed_state(Some(state))? {
        Some(StateWrapper::Stream(messages)) => messages
            .into_iter()
            .filter_map(|m| m.stream.map(|s| s.stream_descriptor))
            .collect(),
        Some(StateWrapper::Global(message)) => message
            .global
            .map(|g| {
                g.stream_states
                    .into_iter()
                    .map(|s| s.stream_descriptor)
                    .collect()
            })
            .unwrap_or_default(),
        Some(StateWrapper::Legacy(_)) | None => HashSet::new(),
    };

    let missing: Vec<StreamDescriptor> = catalog
        .incremental_stream_descriptors()
        .into_iter()
        .filter(|d| !covered.contains(d))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(StateError::IncompleteStreamMigration { missing })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use syncbyte_types::StateMessage;

    fn catalog() -> ConfiguredCatalog {
        serde_json::from_value(json!({
            "streams": [
                {"stream": {"name": "users", "namespace": "public", "json_schema": {}},
                 "sync_mode": "incremental", "cursor_field": ["updated_at"]},
                {"stream": {"name": "countries", "json_schema": {}},
                 "sync_mode": "full_refresh"},
                {"stream": {"name": "orders", "json_schema": {}},
                 "sync_mode": "incremental", "cursor_field": ["id"]}
            ]
        }))
        .unwrap()
    }

    fn state(messages: &[StateMessage]) -> State {
        State::new(serde_json::to_value(messages).unwrap())
    }

    #[test]
    fn every_incremental_stream_covered() {
        let state = state(&[
            StateMessage::for_stream(StreamDescriptor::new("orders"), json!({"id": 4})),
            StateMessage::for_stream(
                StreamDescriptor::new("users").with_namespace("public"),
                json!({"updated_at": "2024"}),
            ),
        ]);
        validate_stream_states(&state, &catalog()).unwrap();
    }

    #[test]
    fn full_refresh_streams_are_not_required() {
        let state = state(&[
            StateMessage::for_stream(StreamDescriptor::new("orders"), json!({})),
            StateMessage::for_stream(StreamDescriptor::new("users").with_namespace("public"), json!({})),
        ]);
        assert!(validate_stream_states(&state, &catalog()).is_ok());
    }

    #[test]
    fn missing_stream_is_reported() {
        let state = state(&[StateMessage::for_stream(
            StreamDescriptor::new("orders"),
            json!({"id": 4}),
        )]);
        let err = validate_stream_states(&state, &catalog()).unwrap_err();
        match err {
            StateError::IncompleteStreamMigration { missing } => {
                assert_eq!(missing, vec![StreamDescriptor::new("users").with_namespace("public")]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn namespace_must_match() {
        let state = state(&[
            StateMessage::for_stream(StreamDescriptor::new("orders"), json!({})),
            StateMessage::for_stream(StreamDescriptor::new("users"), json!({})),
        ]);
        assert!(validate_stream_states(&state, &catalog()).is_err());
    }

    #[test]
    fn empty_state_misses_everything() {
        let err = validate_stream_states(&State::new(json!([])), &catalog()).unwrap_err();
        assert!(err.to_string().contains("public:users, orders"));
    }
}
