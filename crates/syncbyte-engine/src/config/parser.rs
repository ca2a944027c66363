//! Sync configuration YAML parsing with environment variable substitution.

use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;

use crate::config::types::SyncConfig;

static ENV_VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid env var regex"));

/// Substitute `${VAR_NAME}` patterns with environment variable values.
///
/// # Errors
///
/// Returns an error naming every referenced variable that is not set.
pub fn substitute_env_vars(input: &str) -> Result<String> {
    let mut missing = Vec::new();
    let result = ENV_VAR_RE.replace_all(input, |cap: &regex::Captures<'_>| {
        std::env::var(&cap[1]).unwrap_or_else(|_| {
            if !missing.iter().any(|name| name == &cap[1]) {
                missing.push(cap[1].to_string());
            }
            String::new()
        })
    });

    if !missing.is_empty() {
        anyhow::bail!("Missing environment variable(s): {}", missing.join(", "));
    }

    Ok(result.into_owned())
}

/// Parse a sync configuration YAML string (after env var substitution).
///
/// # Errors
///
/// Returns an error if env var substitution fails or the YAML is invalid.
pub fn parse_config_str(yaml_str: &str) -> Result<SyncConfig> {
    let substituted = substitute_env_vars(yaml_str)?;
    if substituted.trim().is_empty() {
        return Ok(SyncConfig::default());
    }
    let config: SyncConfig =
        serde_yaml::from_str(&substituted).context("Failed to parse sync config YAML")?;
    Ok(config)
}

/// Parse a sync configuration YAML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the YAML is invalid.
pub fn parse_config(path: &Path) -> Result<SyncConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config_str(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::StoreKind;
    use syncbyte_types::Version;

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("SB_TEST_STATE_PATH", "/var/lib/syncbyte/state.db");
        let input = "state:\n  path: ${SB_TEST_STATE_PATH}";
        let result = substitute_env_vars(input).unwrap();
        assert!(result.contains("/var/lib/syncbyte/state.db"));
        assert!(!result.contains("${SB_TEST_STATE_PATH}"));
        std::env::remove_var("SB_TEST_STATE_PATH");
    }

    #[test]
    fn test_multiple_env_vars() {
        std::env::set_var("SB_TEST_A", "alpha");
        std::env::set_var("SB_TEST_B", "beta");
        let result = substitute_env_vars("${SB_TEST_A} and ${SB_TEST_B}").unwrap();
        assert_eq!(result, "alpha and beta");
        std::env::remove_var("SB_TEST_A");
        std::env::remove_var("SB_TEST_B");
    }

    #[test]
    fn test_no_env_vars_passthrough() {
        let input = "detect_version: false\npayload_limit_bytes: 1024";
        assert_eq!(substitute_env_vars(input).unwrap(), input);
    }

    #[test]
    fn test_multiple_missing_env_vars_all_reported() {
        let err = substitute_env_vars("${SB_MISSING_X} and ${SB_MISSING_Y}")
            .unwrap_err()
            .to_string();
        assert!(err.contains("SB_MISSING_X"));
        assert!(err.contains("SB_MISSING_Y"));
    }

    #[test]
    fn test_repeated_missing_env_var_reported_once() {
        let err = substitute_env_vars("${SB_MISSING_A} ${SB_MISSING_B} ${SB_MISSING_A}")
            .unwrap_err()
            .to_string();
        assert_eq!(
            err,
            "Missing environment variable(s): SB_MISSING_A, SB_MISSING_B"
        );
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = parse_config_str("").unwrap();
        assert_eq!(config, SyncConfig::default());
        assert_eq!(config.platform_protocol_version, Version::V1);
        assert_eq!(config.payload_limit_bytes, 4_194_304);
        assert_eq!(config.state.flush_every_messages, 100);
        assert_eq!(config.state.final_flush_attempts, 3);
    }

    #[test]
    fn test_parse_config_from_string() {
        std::env::set_var("SB_TEST_FLUSH", "25");
        let yaml = r#"
platform_protocol_version: "1.0.0"
payload_limit_bytes: 1048576
detect_version: false
fallback_protocol_version: "0.3.0"
state:
  flush_every_messages: ${SB_TEST_FLUSH}
  store: memory
"#;
        let config = parse_config_str(yaml).unwrap();
        assert_eq!(config.payload_limit_bytes, 1_048_576);
        assert!(!config.detect_version);
        assert_eq!(config.fallback_protocol_version, Version::V0);
        assert_eq!(config.state.flush_every_messages, 25);
        assert_eq!(config.state.store, StoreKind::Memory);
        std::env::remove_var("SB_TEST_FLUSH");
    }

    #[test]
    fn test_unknown_field_errors() {
        assert!(parse_config_str("payload_limit: 10").is_err());
    }

    #[test]
    fn test_bad_version_errors() {
        assert!(parse_config_str("platform_protocol_version: one").is_err());
    }

    #[test]
    fn test_parse_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sync.yaml");
        std::fs::write(&path, "state:\n  store: memory\n").unwrap();
        let config = parse_config(&path).unwrap();
        assert_eq!(config.state.store, StoreKind::Memory);
    }

    #[test]
    fn test_parse_config_file_not_found() {
        let err = parse_config(Path::new("/nonexistent/sync.yaml"))
            .unwrap_err()
            .to_string();
        assert!(err.contains("Failed to read config file"));
    }
}
