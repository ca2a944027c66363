//! Configured catalog: the per-sync contract of streams and sync modes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::stream::StreamDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    FullRefresh,
    Incremental,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationSyncMode {
    Append,
    Overwrite,
    AppendDedup,
}

/// Schema and capabilities of one stream as discovered from the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamSchema {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub json_schema: Value,
    #[serde(default)]
    pub supported_sync_modes: Vec<SyncMode>,
    #[serde(flatten)]
    pub additional: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfiguredStream {
    pub stream: StreamSchema,
    pub sync_mode: SyncMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_sync_mode: Option<DestinationSyncMode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cursor_field: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub primary_key: Vec<Vec<String>>,
    #[serde(flatten)]
    pub additional: Map<String, Value>,
}

impl ConfiguredStream {
    #[must_use]
    pub fn descriptor(&self) -> StreamDescriptor {
        StreamDescriptor {
            name: self.stream.name.clone(),
            namespace: self.stream.namespace.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfiguredCatalog {
    pub streams: Vec<ConfiguredStream>,
    #[serde(flatten)]
    pub additional: Map<String, Value>,
}

impl ConfiguredCatalog {
    /// Descriptors of every stream synced incrementally, in catalog order.
    #[must_use]
    pub fn incremental_stream_descriptors(&self) -> Vec<StreamDescriptor> {
        self.streams
            .iter()
            .filter(|s| s.sync_mode == SyncMode::Incremental)
            .map(ConfiguredStream::descriptor)
            .collect()
    }
}
