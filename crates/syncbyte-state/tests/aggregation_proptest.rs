use std::collections::HashMap;

use proptest::prelude::*;
use serde_json::json;
use syncbyte_state::StateAggregator;
use syncbyte_types::{StateMessage, StreamDescriptor};

fn descriptor() -> impl Strategy<Value = StreamDescriptor> {
    (
        prop_oneof![Just("users"), Just("orders"), Just("x")],
        prop_oneof![Just(None), Just(Some("a")), Just(Some(""))],
    )
        .prop_map(|(name, namespace)| StreamDescriptor {
            name: name.to_string(),
            namespace: namespace.map(str::to_string),
        })
}

fn message() -> impl Strategy<Value = StateMessage> {
    (descriptor(), 0_i64..1000, any::<bool>()).prop_map(|(descriptor, cursor, with_legacy)| {
        let mut message = StateMessage::for_stream(descriptor, json!({"cursor": cursor}));
        if with_legacy {
            message.data = Some(json!({"legacy": cursor}));
        }
        message
    })
}

fn ingest_all(messages: &[StateMessage]) -> StateAggregator {
    let mut agg = StateAggregator::default();
    for message in messages {
        agg.ingest(message.clone()).unwrap();
    }
    agg
}

proptest! {
    #[test]
    fn one_entry_per_descriptor_holding_the_last_message(
        messages in proptest::collection::vec(message(), 0..40)
    ) {
        let agg = ingest_all(&messages);
        let mut last: HashMap<StreamDescriptor, StateMessage> = HashMap::new();
        for message in &messages {
            let mut expected = message.clone();
            expected.data = None;
            last.insert(message.descriptor().unwrap().clone(), expected);
        }

        let state = agg.aggregated().unwrap();
        let stored: Vec<StateMessage> = serde_json::from_value(state.state).unwrap();
        prop_assert_eq!(stored.len(), last.len());
        for entry in &stored {
            prop_assert!(entry.data.is_none());
            let descriptor = entry.descriptor().unwrap();
            prop_assert_eq!(Some(entry), last.get(descriptor));
        }
        prop_assert_eq!(agg.is_empty(), messages.is_empty());
    }

    #[test]
    fn merge_equals_replay(
        first in proptest::collection::vec(message(), 0..20),
        second in proptest::collection::vec(message(), 0..20),
    ) {
        let mut merged = ingest_all(&first);
        merged.merge(ingest_all(&second)).unwrap();

        let mut replayed = ingest_all(&first);
        for message in &second {
            replayed.ingest(message.clone()).unwrap();
        }

        prop_assert_eq!(merged.aggregated().unwrap(), replayed.aggregated().unwrap());
        prop_assert_eq!(merged.is_empty(), replayed.is_empty());
    }
}

#[test]
fn null_namespace_and_named_namespace_stay_separate() {
    let agg = ingest_all(&[
        StateMessage::for_stream(StreamDescriptor::new("x").with_namespace("a"), json!({"c": 1})),
        StateMessage::for_stream(StreamDescriptor::new("x"), json!({"c": 2})),
    ]);
    let state = agg.aggregated().unwrap();
    assert_eq!(
        state.state,
        json!([
            {"type": "STREAM", "stream": {"stream_descriptor": {"name": "x", "namespace": "a"}, "stream_state": {"c": 1}}},
            {"type": "STREAM", "stream": {"stream_descriptor": {"name": "x"}, "stream_state": {"c": 2}}}
        ])
    );
}
