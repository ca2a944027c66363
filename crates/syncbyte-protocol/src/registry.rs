//! Registry of known protocol versions and the migrations between them.
//!
//! Populated once at startup and then shared read-only behind an `Arc`;
//! nothing mutates it after initialization, so concurrent readers need no
//! locking.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

use syncbyte_types::{PayloadKind, Version};

use crate::migration::{ChainStep, Direction, Migration, MigrationChain};

/// Registry configuration errors.
///
/// These indicate a broken build of the migration set, not bad input, and
/// are surfaced at startup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("a {kind} migration between protocol {previous} and {current} is already registered")]
    DuplicateMigration {
        kind: PayloadKind,
        previous: Version,
        current: Version,
    },

    #[error("{kind} migration must connect two different major versions, got {version} twice")]
    SameMajorVersion { kind: PayloadKind, version: Version },

    #[error("no {kind} migration path from protocol {from} to {to}")]
    NoPath {
        kind: PayloadKind,
        from: Version,
        to: Version,
    },
}

type EdgeKey = (PayloadKind, u64, u64);

#[derive(Debug, Default)]
pub struct VersionRegistry {
    migrations: BTreeMap<EdgeKey, Arc<dyn Migration>>,
    versions: BTreeMap<u64, Version>,
}

impl VersionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pairwise migration.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateMigration`] if the same pair and
    /// payload kind is already registered (in either orientation), and
    /// [`RegistryError::SameMajorVersion`] if the migration does not change
    /// the major version.
    pub fn register(&mut self, migration: Arc<dyn Migration>) -> Result<(), RegistryError> {
        let kind = migration.payload_kind();
        let previous = migration.previous_version();
        let current = migration.current_version();
        if previous.major() == current.major() {
            return Err(RegistryError::SameMajorVersion {
                kind,
                version: current,
            });
        }

        let key = (kind, previous.major(), current.major());
        let mirrored = (kind, current.major(), previous.major());
        if self.migrations.contains_key(&key) || self.migrations.contains_key(&mirrored) {
            return Err(RegistryError::DuplicateMigration {
                kind,
                previous,
                current,
            });
        }

        tracing::debug!(%kind, %previous, %current, "Registered protocol migration");
        self.migrations.insert(key, migration);
        for version in [previous, current] {
            let slot = self.versions.entry(version.major()).or_insert(version);
            if version > *slot {
                *slot = version;
            }
        }
        Ok(())
    }

    /// Every version that appears in a registered migration, one per major.
    #[must_use]
    pub fn known_versions(&self) -> Vec<Version> {
        self.versions.values().copied().collect()
    }

    /// Highest registered version.
    #[must_use]
    pub fn most_recent_version(&self) -> Option<Version> {
        self.versions.values().next_back().copied()
    }

    /// Canonical version registered for a major number.
    #[must_use]
    pub fn version_for_major(&self, major: u64) -> Option<Version> {
        self.versions.get(&major).copied()
    }

    /// Resolve the ordered chain of migrations from `source` to `target`.
    ///
    /// Walks the adjacency graph breadth-first, visiting neighbours in
    /// ascending major order, so identical inputs always give the same chain.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NoPath`] if the versions are not connected.
    pub fn resolve_chain(
        &self,
        source: Version,
        target: Version,
        kind: PayloadKind,
    ) -> Result<MigrationChain, RegistryError> {
        if source.is_compatible_with(&target) {
            return Ok(MigrationChain::identity(source, target, kind));
        }

        let start = source.major();
        let goal = target.major();
        let mut came_from: BTreeMap<u64, (u64, ChainStep)> = BTreeMap::new();
        let mut visited = BTreeSet::from([start]);
        let mut queue = VecDeque::from([start]);

        while let Some(node) = queue.pop_front() {
            if node == goal {
                break;
            }
            for (next, step) in self.neighbours(node, kind) {
                if visited.insert(next) {
                    came_from.insert(next, (node, step));
                    queue.push_back(next);
                }
            }
        }

        if !visited.contains(&goal) {
            return Err(RegistryError::NoPath {
                kind,
                from: source,
                to: target,
            });
        }

        let mut steps = Vec::new();
        let mut cursor = goal;
        while cursor != start {
            let Some((prev, step)) = came_from.remove(&cursor) else {
                return Err(RegistryError::NoPath {
                    kind,
                    from: source,
                    to: target,
                });
            };
            steps.push(step);
            cursor = prev;
        }
        steps.reverse();

        Ok(MigrationChain::new(source, target, kind, steps))
    }

    fn neighbours(&self, major: u64, kind: PayloadKind) -> BTreeMap<u64, ChainStep> {
        let mut out = BTreeMap::new();
        for (&(edge_kind, previous, current), migration) in &self.migrations {
            if edge_kind != kind {
                continue;
            }
            if previous == major {
                out.insert(
                    current,
                    ChainStep {
                        migration: Arc::clone(migration),
                        direction: Direction::Upgrade,
                    },
                );
            } else if current == major {
                out.insert(
                    previous,
                    ChainStep {
                        migration: Arc::clone(migration),
                        direction: Direction::Downgrade,
                    },
                );
            }
        }
        out
    }
}
