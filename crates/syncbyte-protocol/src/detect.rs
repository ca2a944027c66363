//! Protocol version detection from a connector's first output lines.
//!
//! Connectors announce their protocol version in the SPEC message
//! (`spec.protocol_version`). Connectors that predate the field, or whose
//! output does not start with a SPEC message, are assumed to speak
//! [`Version::FALLBACK`].

use serde_json::Value;
use syncbyte_types::Version;

/// Number of leading lines inspected for a SPEC message.
pub const DETECTION_LOOKAHEAD: usize = 10;

/// Look for a declared protocol version in the first
/// [`DETECTION_LOOKAHEAD`] lines.
///
/// Lines that are not JSON, or JSON that is not a SPEC message, are skipped.
/// A SPEC message without a parseable `protocol_version` ends the search.
pub fn detect_version<S: AsRef<str>>(lines: &[S]) -> Option<Version> {
    for line in lines.iter().take(DETECTION_LOOKAHEAD) {
        let Ok(value) = serde_json::from_str::<Value>(line.as_ref()) else {
            continue;
        };
        if value.get("type").and_then(Value::as_str) != Some("SPEC") {
            continue;
        }
        let declared = value
            .pointer("/spec/protocol_version")
            .and_then(Value::as_str)?;
        return match declared.parse() {
            Ok(version) => Some(version),
            Err(e) => {
                tracing::warn!(declared, error = %e, "Ignoring unparseable protocol version");
                None
            }
        };
    }
    None
}

/// [`detect_version`], falling back to `fallback` when nothing is declared.
pub fn detect_or(lines: &[impl AsRef<str>], fallback: Version) -> Version {
    match detect_version(lines) {
        Some(version) => {
            tracing::info!(%version, "Detected connector protocol version");
            version
        }
        None => {
            tracing::info!(%fallback, "No protocol version declared, using fallback");
            fallback
        }
    }
}
