//! Pairwise migrations and the chains built from them.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use syncbyte_types::{MigrationError, PayloadKind, Version};

/// A pure, bidirectional rewrite between two adjacent protocol versions.
///
/// Implementations operate on the generic JSON tree so that fields the
/// migration does not know about pass through verbatim. `upgrade` moves a
/// payload from [`previous_version`](Migration::previous_version) to
/// [`current_version`](Migration::current_version); `downgrade` does the
/// reverse. Both must be deterministic and side-effect free.
pub trait Migration: Send + Sync + fmt::Debug {
    fn previous_version(&self) -> Version;

    fn current_version(&self) -> Version;

    fn payload_kind(&self) -> PayloadKind;

    /// # Errors
    ///
    /// Returns [`MigrationError`] when the payload does not have the shape
    /// the previous version requires.
    fn upgrade(&self, payload: Value) -> Result<Value, MigrationError>;

    /// # Errors
    ///
    /// Returns [`MigrationError`] when the payload does not have the shape
    /// the current version requires.
    fn downgrade(&self, payload: Value) -> Result<Value, MigrationError>;
}

/// Which way a chain step walks its migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Upgrade,
    Downgrade,
}

#[derive(Debug, Clone)]
pub struct ChainStep {
    pub migration: Arc<dyn Migration>,
    pub direction: Direction,
}

impl ChainStep {
    /// Version the payload is in before this step runs.
    #[must_use]
    pub fn from_version(&self) -> Version {
        match self.direction {
            Direction::Upgrade => self.migration.previous_version(),
            Direction::Downgrade => self.migration.current_version(),
        }
    }

    /// Version the payload is in after this step runs.
    #[must_use]
    pub fn to_version(&self) -> Version {
        match self.direction {
            Direction::Upgrade => self.migration.current_version(),
            Direction::Downgrade => self.migration.previous_version(),
        }
    }

    fn apply(&self, payload: Value) -> Result<Value, MigrationError> {
        match self.direction {
            Direction::Upgrade => self.migration.upgrade(payload),
            Direction::Downgrade => self.migration.downgrade(payload),
        }
    }
}

/// Ordered sequence of steps connecting `source` to `target`.
///
/// Immutable once built; the migrator caches chains behind `Arc`.
#[derive(Debug, Clone)]
pub struct MigrationChain {
    source: Version,
    target: Version,
    kind: PayloadKind,
    steps: Vec<ChainStep>,
}

impl MigrationChain {
    pub(crate) fn new(
        source: Version,
        target: Version,
        kind: PayloadKind,
        steps: Vec<ChainStep>,
    ) -> Self {
        Self {
            source,
            target,
            kind,
            steps,
        }
    }

    pub(crate) fn identity(source: Version, target: Version, kind: PayloadKind) -> Self {
        Self::new(source, target, kind, Vec::new())
    }

    #[must_use]
    pub fn source(&self) -> Version {
        self.source
    }

    #[must_use]
    pub fn target(&self) -> Version {
        self.target
    }

    #[must_use]
    pub fn kind(&self) -> PayloadKind {
        self.kind
    }

    #[must_use]
    pub fn steps(&self) -> &[ChainStep] {
        &self.steps
    }

    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every step in order.
    ///
    /// # Errors
    ///
    /// Propagates the first step's [`MigrationError`]; later steps do not run.
    pub fn apply(&self, payload: Value) -> Result<Value, MigrationError> {
        self.steps
            .iter()
            .try_fold(payload, |acc, step| step.apply(acc))
    }
}


#[cfg(test)]
mod tests {
    use super::testing::TrailMigration;
    use super::*;
    use serde_json::json;

    #[test]
    fn identity_chain_returns_input() {
        let chain = MigrationChain::identity(Version::V1, Version::V1, PayloadKind::Message);
        assert!(chain.is_identity());
        let payload = json!({"type": "RECORD"});
        assert_eq!(chain.apply(payload.clone()).unwrap(), payload);
    }

    #[test]
    fn steps_run_in_order() {
        let steps = vec![
            ChainStep {
                migration: Arc::new(TrailMigration::new(0, 1)),
                direction: Direction::Upgrade,
            },
            ChainStep {
                migration: Arc::new(TrailMigration::new(1, 2)),
                direction: Direction::Upgrade,
            },
        ];
        let chain = MigrationChain::new(
            Version::new(0, 0, 0),
            Version::new(2, 0, 0),
            PayloadKind::Message,
            steps,
        );
        let out = chain.apply(json!({"trail": []})).unwrap();
        assert_eq!(out["trail"], json!(["up1", "up2"]));
    }

    #[test]
    fn first_failure_stops_the_chain() {
        let steps = vec![ChainStep {
            migration: Arc::new(TrailMigration::new(0, 1)),
            direction: Direction::Downgrade,
        }];
        let chain = MigrationChain::new(
            Version::new(1, 0, 0),
            Version::new(0, 0, 0),
            PayloadKind::Message,
            steps,
        );
        let err = chain.apply(json!({})).unwrap_err();
        assert_eq!(err.reason, "missing trail");
    }

    #[test]
    fn step_versions_follow_direction() {
        let step = ChainStep {
            migration: Arc::new(TrailMigration::new(0, 1)),
            direction: Direction::Downgrade,
        };
        assert_eq!(step.from_version().major(), 1);
        assert_eq!(step.to_version().major(), 0);
    }
}
