//! Stream identity.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies a logical stream within a connection.
///
/// A missing namespace is a distinct key from an empty one: `{name: "x"}`
/// and `{name: "x", namespace: ""}` never collapse.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl StreamDescriptor {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
        }
    }

    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }
}

impl fmt::Display for StreamDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{ns}:{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn null_and_empty_namespace_are_distinct() {
        let bare = StreamDescriptor::new("x");
        let empty = StreamDescriptor::new("x").with_namespace("");
        let named = StreamDescriptor::new("x").with_namespace("a");
        let set: HashSet<_> = [bare.clone(), empty.clone(), named.clone()].into();
        assert_eq!(set.len(), 3);
        assert_ne!(bare, empty);
    }

    #[test]
    fn absent_namespace_is_not_serialized() {
        let json = serde_json::to_value(StreamDescriptor::new("users")).unwrap();
        assert_eq!(json, serde_json::json!({"name": "users"}));
    }

    #[test]
    fn display_includes_namespace() {
        assert_eq!(StreamDescriptor::new("users").to_string(), "users");
        assert_eq!(
            StreamDescriptor::new("users").with_namespace("public").to_string(),
            "public:users"
        );
    }
}
