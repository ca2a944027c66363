//! Protocol 0 ↔ 1.
//!
//! Version 1 replaces primitive JSON-schema type declarations with
//! references to well-known type definitions. Only the exact canonical V0
//! forms listed in [`WELL_KNOWN_TYPES`] are rewritten; every other schema
//! node, including nullable unions and custom keywords, is carried verbatim.
//! That keeps `downgrade(upgrade(x)) == x` exact for V0 payloads.
//!
//! A `$ref` pointing outside the well-known set has no V0 representation and
//! is left untouched on downgrade.
//!
//! A node that already looks like the other side's form (a well-known `$ref`
//! in a V0 schema, a primitive `type` in a V1 schema) is tagged with
//! [`VERBATIM_KEY`] instead of being rewritten. The opposite direction strips
//! the tag and leaves the node alone, so both round trips are exact.

use serde_json::{Map, Value};
use syncbyte_types::{MigrationError, PayloadKind, Version};

use crate::migration::Migration;

const WELL_KNOWN_PREFIX: &str = "WellKnownTypes.json#/definitions/";

/// Keys that carry the primitive type in a V0 schema node.
const TYPE_KEYS: [&str; 4] = ["type", "format", "airbyte_type", "contentEncoding"];

const REF_KEY: &str = "$ref";

/// Set on a node that already has the target version's shape, so the
/// opposite rewrite leaves it alone and removes the marker.
const VERBATIM_KEY: &str = "x-syncbyte-verbatim";

struct WellKnownType {
    name: &'static str,
    v0: &'static [(&'static str, &'static str)],
}

const WELL_KNOWN_TYPES: &[WellKnownType] = &[
    WellKnownType {
        name: "String",
        v0: &[("type", "string")],
    },
    WellKnownType {
        name: "Boolean",
        v0: &[("type", "boolean")],
    },
    WellKnownType {
        name: "Integer",
        v0: &[("type", "integer")],
    },
    WellKnownType {
        name: "Number",
        v0: &[("type", "number")],
    },
    WellKnownType {
        name: "Date",
        v0: &[("type", "string"), ("format", "date")],
    },
    WellKnownType {
        name: "TimestampWithTimezone",
        v0: &[
            ("type", "string"),
            ("format", "date-time"),
            ("airbyte_type", "timestamp_with_timezone"),
        ],
    },
    WellKnownType {
        name: "TimestampWithoutTimezone",
        v0: &[
            ("type", "string"),
            ("format", "date-time"),
            ("airbyte_type", "timestamp_without_timezone"),
        ],
    },
    WellKnownType {
        name: "TimeWithTimezone",
        v0: &[
            ("type", "string"),
            ("format", "time"),
            ("airbyte_type", "time_with_timezone"),
        ],
    },
    WellKnownType {
        name: "TimeWithoutTimezone",
        v0: &[
            ("type", "string"),
            ("format", "time"),
            ("airbyte_type", "time_without_timezone"),
        ],
    },
    WellKnownType {
        name: "BinaryData",
        v0: &[("type", "string"), ("contentEncoding", "base64")],
    },
];

/// Which way a schema rewrite runs.
#[derive(Clone, Copy)]
enum Rewrite {
    Upgrade,
    Downgrade,
}

fn rewrite_schema(schema: &mut Value, rewrite: Rewrite) {
    let Value::Object(node) = schema else {
        return;
    };

    if let Some(Value::Object(properties)) = node.get_mut("properties") {
        for child in properties.values_mut() {
            rewrite_schema(child, rewrite);
        }
    }
    match node.get_mut("items") {
        Some(Value::Array(items)) => items.iter_mut().for_each(|c| rewrite_schema(c, rewrite)),
        Some(item @ Value::Object(_)) => rewrite_schema(item, rewrite),
        _ => {}
    }
    if let Some(extra @ Value::Object(_)) = node.get_mut("additionalProperties") {
        rewrite_schema(extra, rewrite);
    }
    for combinator in ["oneOf", "anyOf", "allOf"] {
        if let Some(Value::Array(options)) = node.get_mut(combinator) {
            options.iter_mut().for_each(|c| rewrite_schema(c, rewrite));
        }
    }

    match rewrite {
        Rewrite::Upgrade => upgrade_node(node),
        Rewrite::Downgrade => downgrade_node(node),
    }
}

/// V0 form of a node the upgrade would turn into a well-known `$ref`.
fn canonical_primitive(node: &Map<String, Value>) -> Option<&'static WellKnownType> {
    if node.contains_key(REF_KEY) {
        return None;
    }
    let mut present: Vec<(&str, &str)> = Vec::new();
    for key in TYPE_KEYS {
        match node.get(key) {
            None => {}
            Some(Value::String(value)) => present.push((key, value.as_str())),
            // Arrays such as `["null", "string"]` are not canonical.
            Some(_) => return None,
        }
    }
    WELL_KNOWN_TYPES.iter().find(|t| same_keys(t.v0, &present))
}

/// Well-known type of a node the downgrade would turn into a primitive.
fn well_known_reference(node: &Map<String, Value>) -> Option<&'static WellKnownType> {
    if TYPE_KEYS.iter().any(|k| node.contains_key(*k)) {
        return None;
    }
    let name = node
        .get(REF_KEY)
        .and_then(Value::as_str)
        .and_then(|r| r.strip_prefix(WELL_KNOWN_PREFIX))?;
    WELL_KNOWN_TYPES.iter().find(|t| t.name == name)
}

/// Drop the verbatim marker; returns whether it was set.
fn take_verbatim(node: &mut Map<String, Value>) -> bool {
    if node.get(VERBATIM_KEY) == Some(&Value::Bool(true)) {
        node.remove(VERBATIM_KEY);
        return true;
    }
    false
}

fn upgrade_node(node: &mut Map<String, Value>) {
    if take_verbatim(node) {
        return;
    }
    if let Some(known) = canonical_primitive(node) {
        for key in TYPE_KEYS {
            node.remove(key);
        }
        node.insert(
            REF_KEY.to_string(),
            Value::String(format!("{WELL_KNOWN_PREFIX}{}", known.name)),
        );
    } else if well_known_reference(node).is_some() {
        node.insert(VERBATIM_KEY.to_string(), Value::Bool(true));
    }
}

fn downgrade_node(node: &mut Map<String, Value>) {
    if take_verbatim(node) {
        return;
    }
    if let Some(known) = well_known_reference(node) {
        node.remove(REF_KEY);
        for (key, value) in known.v0 {
            node.insert((*key).to_string(), Value::String((*value).to_string()));
        }
    } else if canonical_primitive(node).is_some() {
        node.insert(VERBATIM_KEY.to_string(), Value::Bool(true));
    }
}

fn same_keys(canonical: &[(&str, &str)], present: &[(&str, &str)]) -> bool {
    canonical.len() == present.len() && canonical.iter().all(|pair| present.contains(pair))
}

/// Shared error constructor for both V1 migrations.
fn error(kind: PayloadKind, rewrite: Rewrite, reason: impl Into<String>) -> MigrationError {
    let (from, to) = match rewrite {
        Rewrite::Upgrade => (Version::V0, Version::V1),
        Rewrite::Downgrade => (Version::V1, Version::V0),
    };
    MigrationError::new(from, to, kind, reason)
}

/// Rewrite every `json_schema` found in `streams[*]`, optionally one
/// object level down (`streams[*].<nested>`).
fn rewrite_streams(
    container: &mut Map<String, Value>,
    nested: Option<&str>,
    kind: PayloadKind,
    rewrite: Rewrite,
) -> Result<(), MigrationError> {
    let streams = match container.get_mut("streams") {
        None => return Ok(()),
        Some(Value::Array(streams)) => streams,
        Some(_) => return Err(error(kind, rewrite, "'streams' is not an array")),
    };
    for (idx, stream) in streams.iter_mut().enumerate() {
        let holder = match nested {
            None => stream,
            Some(segment) => match stream {
                Value::Object(map) => map.get_mut(segment).ok_or_else(|| {
                    error(kind, rewrite, format!("streams[{idx}] has no '{segment}'"))
                })?,
                _ => {
                    return Err(error(
                        kind,
                        rewrite,
                        format!("streams[{idx}] is not an object"),
                    ))
                }
            },
        };
        let Value::Object(stream_obj) = holder else {
            return Err(error(
                kind,
                rewrite,
                format!("streams[{idx}] is not an object"),
            ));
        };
        if let Some(schema) = stream_obj.get_mut("json_schema") {
            rewrite_schema(schema, rewrite);
        }
    }
    Ok(())
}

/// Protocol message migration between versions 0 and 1.
///
/// Only CATALOG messages change shape; every other message type passes
/// through untouched.
#[derive(Debug, Default)]
pub struct MessageMigrationV1;

impl MessageMigrationV1 {
    fn migrate(payload: Value, rewrite: Rewrite) -> Result<Value, MigrationError> {
        let kind = PayloadKind::Message;
        let Value::Object(mut message) = payload else {
            return Err(error(kind, rewrite, "message is not a JSON object"));
        };
        let is_catalog = match message.get("type") {
            Some(Value::String(ty)) => ty == "CATALOG",
            Some(_) => return Err(error(kind, rewrite, "message 'type' is not a string")),
            None => return Err(error(kind, rewrite, "message has no 'type'")),
        };
        if is_catalog {
            match message.get_mut("catalog") {
                Some(Value::Object(catalog)) => rewrite_streams(catalog, None, kind, rewrite)?,
                _ => return Err(error(kind, rewrite, "CATALOG message has no catalog object")),
            }
        }
        Ok(Value::Object(message))
    }
}

impl Migration for MessageMigrationV1 {
    fn previous_version(&self) -> Version {
        Version::V0
    }

    fn current_version(&self) -> Version {
        Version::V1
    }

    fn payload_kind(&self) -> PayloadKind {
        PayloadKind::Message
    }

    fn upgrade(&self, payload: Value) -> Result<Value, MigrationError> {
        Self::migrate(payload, Rewrite::Upgrade)
    }

    fn downgrade(&self, payload: Value) -> Result<Value, MigrationError> {
        Self::migrate(payload, Rewrite::Downgrade)
    }
}

/// Configured catalog migration between versions 0 and 1.
#[derive(Debug, Default)]
pub struct CatalogMigrationV1;

impl CatalogMigrationV1 {
    fn migrate(payload: Value, rewrite: Rewrite) -> Result<Value, MigrationError> {
        let kind = PayloadKind::Catalog;
        let Value::Object(mut catalog) = payload else {
            return Err(error(kind, rewrite, "catalog is not a JSON object"));
        };
        rewrite_streams(&mut catalog, Some("stream"), kind, rewrite)?;
        Ok(Value::Object(catalog))
    }
}

impl Migration for CatalogMigrationV1 {
    fn previous_version(&self) -> Version {
        Version::V0
    }

    fn current_version(&self) -> Version {
        Version::V1
    }

    fn payload_kind(&self) -> PayloadKind {
        PayloadKind::Catalog
    }

    fn upgrade(&self, payload: Value) -> Result<Value, MigrationError> {
        Self::migrate(payload, Rewrite::Upgrade)
    }

    fn downgrade(&self, payload: Value) -> Result<Value, MigrationError> {
        Self::migrate(payload, Rewrite::Downgrade)
    }
}
