//! Sync configuration types deserialized from YAML.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use syncbyte_types::Version;

use crate::guard::DEFAULT_PAYLOAD_LIMIT;
use crate::persistence::DEFAULT_FINAL_FLUSH_ATTEMPTS;

/// Top-level sync configuration. Every field has a default, so an empty
/// document is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    /// Protocol version messages are migrated to.
    #[serde(default = "default_platform_version")]
    pub platform_protocol_version: Version,
    /// Ceiling for values handed to the workflow engine.
    #[serde(default = "default_payload_limit")]
    pub payload_limit_bytes: usize,
    /// Detect the connector version from its SPEC output when not declared.
    #[serde(default = "default_true")]
    pub detect_version: bool,
    /// Version assumed for connectors that declare none.
    #[serde(default = "default_fallback_version")]
    pub fallback_protocol_version: Version,
    #[serde(default)]
    pub state: StateConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            platform_protocol_version: default_platform_version(),
            payload_limit_bytes: default_payload_limit(),
            detect_version: true,
            fallback_protocol_version: default_fallback_version(),
            state: StateConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StateConfig {
    /// State messages buffered between flushes.
    #[serde(default = "default_flush_every")]
    pub flush_every_messages: usize,
    /// Tries of the end-of-attempt flush when the store fails transiently.
    #[serde(default = "default_final_flush_attempts")]
    pub final_flush_attempts: u32,
    #[serde(default)]
    pub store: StoreKind,
    /// `SQLite` database path; ignored by the memory store.
    #[serde(default = "default_state_path")]
    pub path: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            flush_every_messages: default_flush_every(),
            final_flush_attempts: default_final_flush_attempts(),
            store: StoreKind::default(),
            path: default_state_path(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Sqlite,
    Memory,
}

fn default_platform_version() -> Version {
    Version::V1
}

fn default_payload_limit() -> usize {
    DEFAULT_PAYLOAD_LIMIT
}

fn default_true() -> bool {
    true
}

fn default_fallback_version() -> Version {
    Version::FALLBACK
}

fn default_flush_every() -> usize {
    100
}

fn default_final_flush_attempts() -> u32 {
    DEFAULT_FINAL_FLUSH_ATTEMPTS
}

fn default_state_path() -> PathBuf {
    PathBuf::from("./state.db")
}
