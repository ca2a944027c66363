//! Errors shared by every crate that rewrites protocol payloads.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::version::{PayloadKind, Version};

/// A payload could not be translated between two protocol versions.
///
/// Never retryable: replaying the same bytes yields the same failure, and
/// dropping the payload instead would corrupt the sync.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("cannot migrate {kind} from protocol {from} to {to}: {reason}")]
pub struct MigrationError {
    pub from: Version,
    pub to: Version,
    pub kind: PayloadKind,
    pub reason: String,
}

impl MigrationError {
    pub fn new(from: Version, to: Version, kind: PayloadKind, reason: impl Into<String>) -> Self {
        Self {
            from,
            to,
            kind,
            reason: reason.into(),
        }
    }
}
