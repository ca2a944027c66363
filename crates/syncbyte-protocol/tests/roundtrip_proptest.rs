use proptest::prelude::*;
use serde_json::{json, Map, Value};
use syncbyte_protocol::{builtin_registry, MessageMigrator};
use syncbyte_types::Version;

fn migrator() -> MessageMigrator {
    let registry = builtin_registry().expect("builtin migrations register");
    MessageMigrator::new(&registry, Version::V1).expect("chains resolve")
}

/// Leaf schemas a connector may emit, canonical and not, including nodes
/// already in the other version's form.
fn v0_leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(json!({"type": "string"})),
        Just(json!({"type": "boolean"})),
        Just(json!({"type": "integer"})),
        Just(json!({"type": "number"})),
        Just(json!({"type": "string", "format": "date"})),
        Just(json!({"type": "string", "format": "date-time", "airbyte_type": "timestamp_with_timezone"})),
        Just(json!({"type": "string", "format": "time", "airbyte_type": "time_without_timezone"})),
        Just(json!({"type": "string", "contentEncoding": "base64"})),
        Just(json!({"type": ["null", "string"]})),
        Just(json!({"type": "string", "format": "email"})),
        Just(json!({"format": "date"})),
        Just(json!({"$ref": "Custom.json#/definitions/Money"})),
        Just(json!({"$ref": "WellKnownTypes.json#/definitions/Integer"})),
        Just(json!({"$ref": "WellKnownTypes.json#/definitions/TimeWithTimezone"})),
        Just(json!({})),
    ]
    .prop_flat_map(|leaf| {
        proptest::option::of("[a-z ]{0,12}").prop_map(move |description| {
            let mut node = leaf.clone();
            if let (Some(text), Value::Object(map)) = (description, &mut node) {
                map.insert("description".into(), Value::String(text));
            }
            node
        })
    })
}

fn v0_schema() -> impl Strategy<Value = Value> {
    v0_leaf().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            proptest::collection::btree_map("[a-z]{1,6}", inner.clone(), 0..4).prop_map(|props| {
                json!({
                    "type": "object",
                    "properties": props.into_iter().collect::<Map<String, Value>>()
                })
            }),
            inner.clone().prop_map(|item| json!({"type": "array", "items": item})),
            proptest::collection::vec(inner, 1..3).prop_map(|options| json!({"oneOf": options})),
        ]
    })
}

fn v0_catalog_message() -> impl Strategy<Value = Value> {
    proptest::collection::vec(("[a-z]{1,8}", v0_schema()), 0..4).prop_map(|streams| {
        let streams: Vec<Value> = streams
            .into_iter()
            .map(|(name, schema)| {
                json!({
                    "name": name,
                    "json_schema": schema,
                    "supported_sync_modes": ["full_refresh"]
                })
            })
            .collect();
        json!({"type": "CATALOG", "catalog": {"streams": streams}})
    })
}

proptest! {
    #[test]
    fn v0_message_survives_upgrade_then_downgrade(message in v0_catalog_message()) {
        let migrator = migrator();
        let upgraded = migrator.upgrade_message(message.clone(), &Version::V0).unwrap();
        let restored = migrator.downgrade_message(upgraded, &Version::V0).unwrap();
        prop_assert_eq!(restored, message);
    }

    #[test]
    fn v0_configured_catalog_survives_upgrade_then_downgrade(schema in v0_schema()) {
        let catalog = json!({
            "streams": [{
                "stream": {"name": "s", "json_schema": schema},
                "sync_mode": "incremental",
                "cursor_field": ["updated_at"]
            }]
        });
        let migrator = migrator();
        let upgraded = migrator.upgrade_catalog(catalog.clone(), &Version::V0).unwrap();
        let restored = migrator.downgrade_catalog(upgraded, &Version::V0).unwrap();
        prop_assert_eq!(restored, catalog);
    }

    #[test]
    fn v1_configured_catalog_survives_downgrade_then_upgrade(schema in v0_schema()) {
        let catalog = json!({
            "streams": [{
                "stream": {"name": "s", "json_schema": schema},
                "sync_mode": "full_refresh",
                "generation_id": 1
            }]
        });
        let migrator = migrator();
        let downgraded = migrator.downgrade_catalog(catalog.clone(), &Version::V0).unwrap();
        let restored = migrator.upgrade_catalog(downgraded, &Version::V0).unwrap();
        prop_assert_eq!(restored, catalog);
    }

    #[test]
    fn same_version_is_identity(minor in 0_u64..5, patch in 0_u64..5, payload in v0_catalog_message()) {
        let migrator = migrator();
        let version = Version::new(1, minor, patch);
        prop_assert_eq!(migrator.upgrade_message(payload.clone(), &version).unwrap(), payload.clone());
        prop_assert_eq!(migrator.downgrade_catalog(payload.clone(), &version).unwrap(), payload);
    }
}

#[test]
fn v1_catalog_downgraded_for_v0_connector_and_back_keeps_v1_fields() {
    let migrator = migrator();
    let v1 = json!({
        "streams": [{
            "stream": {
                "name": "orders",
                "namespace": "shop",
                "json_schema": {
                    "type": "object",
                    "properties": {
                        "id": {"$ref": "WellKnownTypes.json#/definitions/Integer"},
                        "placed_at": {"$ref": "WellKnownTypes.json#/definitions/TimestampWithoutTimezone"},
                        "amount": {"$ref": "Custom.json#/definitions/Money"},
                        "note": {"$ref": "WellKnownTypes.json#/definitions/String", "description": "free text"}
                    }
                },
                "supported_sync_modes": ["incremental"],
                "source_defined_primary_key": [["id"]]
            },
            "sync_mode": "incremental",
            "destination_sync_mode": "append_dedup",
            "cursor_field": ["placed_at"],
            "primary_key": [["id"]],
            "generation_id": 3
        }]
    });

    let v0 = migrator.downgrade_catalog(v1.clone(), &Version::V0).unwrap();
    let props = &v0["streams"][0]["stream"]["json_schema"]["properties"];
    assert_eq!(props["id"], json!({"type": "integer"}));
    assert_eq!(
        props["placed_at"],
        json!({"type": "string", "format": "date-time", "airbyte_type": "timestamp_without_timezone"})
    );
    // Not a well-known type: no V0 form exists, carried as-is.
    assert_eq!(props["amount"], json!({"$ref": "Custom.json#/definitions/Money"}));
    assert_eq!(props["note"], json!({"type": "string", "description": "free text"}));
    assert_eq!(v0["streams"][0]["generation_id"], json!(3));

    let back = migrator.upgrade_catalog(v0, &Version::V0).unwrap();
    assert_eq!(back, v1);
}

#[test]
fn v0_well_known_reference_is_not_rewritten() {
    let migrator = migrator();
    let v0 = json!({
        "type": "CATALOG",
        "catalog": {"streams": [{
            "name": "users",
            "json_schema": {"properties": {"id": {"$ref": "WellKnownTypes.json#/definitions/Integer"}}}
        }]}
    });
    let upgraded = migrator.upgrade_message(v0.clone(), &Version::V0).unwrap();
    let restored = migrator.downgrade_message(upgraded, &Version::V0).unwrap();
    assert_eq!(restored, v0);
}

#[test]
fn v1_plain_items_type_is_not_rewritten() {
    let migrator = migrator();
    let v1 = json!({
        "streams": [{
            "stream": {
                "name": "tags",
                "json_schema": {"type": "array", "items": {"type": "string"}}
            },
            "sync_mode": "full_refresh"
        }]
    });
    let v0 = migrator.downgrade_catalog(v1.clone(), &Version::V0).unwrap();
    let back = migrator.upgrade_catalog(v0, &Version::V0).unwrap();
    assert_eq!(back, v1);
}

#[test]
fn unknown_connector_version_is_rejected() {
    let migrator = migrator();
    let err = migrator
        .upgrade_message(json!({"type": "RECORD"}), &Version::new(2, 0, 0))
        .unwrap_err();
    assert_eq!(err.from, Version::new(2, 0, 0));
    assert_eq!(err.to, Version::V1);
}

#[test]
fn malformed_v0_catalog_is_a_migration_error() {
    let migrator = migrator();
    let err = migrator
        .upgrade_catalog(json!({"streams": {"not": "an array"}}), &Version::FALLBACK)
        .unwrap_err();
    assert_eq!(err.from, Version::V0);
    assert_eq!(err.to, Version::V1);
}
