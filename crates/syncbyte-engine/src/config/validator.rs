//! Semantic validation for parsed sync configuration values.

use anyhow::{bail, Result};
use syncbyte_protocol::VersionRegistry;
use syncbyte_types::Version;

use crate::config::types::{StoreKind, SyncConfig};

/// Smallest payload ceiling accepted. Anything lower cannot hold an empty
/// attempt output.
const MIN_PAYLOAD_LIMIT: usize = 1024;

fn validate_version(
    registry: &VersionRegistry,
    version: Version,
    field: &str,
    errors: &mut Vec<String>,
) {
    if registry.version_for_major(version.major()).is_none() {
        let known: Vec<String> = registry
            .known_versions()
            .iter()
            .map(ToString::to_string)
            .collect();
        errors.push(format!(
            "{field} '{version}' has no registered major version (known: {})",
            known.join(", ")
        ));
    }
}

/// Validate a parsed sync configuration against the migrations available in
/// `registry`. Returns `Ok(())` if valid, Err with all validation errors if
/// not.
///
/// # Errors
///
/// Returns an error listing all validation failures found in the config.
pub fn validate_config(config: &SyncConfig, registry: &VersionRegistry) -> Result<()> {
    let mut errors = Vec::new();

    validate_version(
        registry,
        config.platform_protocol_version,
        "platform_protocol_version",
        &mut errors,
    );
    validate_version(
        registry,
        config.fallback_protocol_version,
        "fallback_protocol_version",
        &mut errors,
    );

    if config.payload_limit_bytes < MIN_PAYLOAD_LIMIT {
        errors.push(format!(
            "payload_limit_bytes must be at least {MIN_PAYLOAD_LIMIT}, got {}",
            config.payload_limit_bytes
        ));
    }

    if config.state.flush_every_messages == 0 {
        errors.push("state.flush_every_messages must be at least 1".to_string());
    }

    if config.state.final_flush_attempts == 0 {
        errors.push("state.final_flush_attempts must be at least 1".to_string());
    }

    if config.state.store == StoreKind::Sqlite && config.state.path.as_os_str().is_empty() {
        errors.push("state.path must not be empty for the sqlite store".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        bail!("Sync config validation failed:\n  - {}", errors.join("\n  - "));
    }
}
