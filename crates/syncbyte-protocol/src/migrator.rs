//! Applies resolved migration chains to messages and catalogs.
//!
//! Every chain between the platform version and a registered version is
//! resolved when the migrator is built, so a per-message call is at most one
//! map lookup. Payloads whose major version already matches the platform pass
//! through untouched.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use syncbyte_types::{ConfiguredCatalog, MigrationError, PayloadKind, ProtocolMessage, Version};

use crate::migration::MigrationChain;
use crate::registry::{RegistryError, VersionRegistry};

/// Chain table for one payload kind.
#[derive(Debug, Clone)]
pub struct Migrator {
    kind: PayloadKind,
    current: Version,
    upgrades: BTreeMap<u64, Arc<MigrationChain>>,
    downgrades: BTreeMap<u64, Arc<MigrationChain>>,
}

impl Migrator {
    /// Resolve chains between `current` and every version the registry knows.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NoPath`] if a registered version is not
    /// connected to `current`.
    pub fn new(
        registry: &VersionRegistry,
        current: Version,
        kind: PayloadKind,
    ) -> Result<Self, RegistryError> {
        let mut upgrades = BTreeMap::new();
        let mut downgrades = BTreeMap::new();
        for version in registry.known_versions() {
            if version.is_compatible_with(&current) {
                continue;
            }
            let up = registry.resolve_chain(version, current, kind)?;
            let down = registry.resolve_chain(current, version, kind)?;
            upgrades.insert(version.major(), Arc::new(up));
            downgrades.insert(version.major(), Arc::new(down));
        }
        tracing::debug!(
            %kind,
            %current,
            chains = upgrades.len(),
            "Resolved protocol migration chains"
        );
        Ok(Self {
            kind,
            current,
            upgrades,
            downgrades,
        })
    }

    #[must_use]
    pub fn current_version(&self) -> Version {
        self.current
    }

    #[must_use]
    pub fn kind(&self) -> PayloadKind {
        self.kind
    }

    /// Whether payloads in `version` can be translated.
    #[must_use]
    pub fn supports(&self, version: &Version) -> bool {
        version.is_compatible_with(&self.current) || self.upgrades.contains_key(&version.major())
    }

    /// Move `payload` from `source` to the platform version.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError`] if `source` is not registered or a step
    /// rejects the payload.
    pub fn upgrade(&self, payload: Value, source: &Version) -> Result<Value, MigrationError> {
        if source.is_compatible_with(&self.current) {
            return Ok(payload);
        }
        let chain = self
            .upgrades
            .get(&source.major())
            .ok_or_else(|| self.unsupported(*source, self.current))?;
        chain.apply(payload)
    }

    /// Move `payload` from the platform version to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError`] if `target` is not registered or a step
    /// rejects the payload.
    pub fn downgrade(&self, payload: Value, target: &Version) -> Result<Value, MigrationError> {
        if target.is_compatible_with(&self.current) {
            return Ok(payload);
        }
        let chain = self
            .downgrades
            .get(&target.major())
            .ok_or_else(|| self.unsupported(self.current, *target))?;
        chain.apply(payload)
    }

    fn unsupported(&self, from: Version, to: Version) -> MigrationError {
        MigrationError::new(from, to, self.kind, "no migration path registered")
    }
}

/// Translates connector messages and configured catalogs to and from the
/// platform protocol version.
#[derive(Debug, Clone)]
pub struct MessageMigrator {
    messages: Migrator,
    catalogs: Migrator,
}

impl MessageMigrator {
    /// # Errors
    ///
    /// Returns [`RegistryError`] if the registry does not connect every
    /// registered version to `current`.
    pub fn new(registry: &VersionRegistry, current: Version) -> Result<Self, RegistryError> {
        Ok(Self {
            messages: Migrator::new(registry, current, PayloadKind::Message)?,
            catalogs: Migrator::new(registry, current, PayloadKind::Catalog)?,
        })
    }

    #[must_use]
    pub fn current_version(&self) -> Version {
        self.messages.current_version()
    }

    /// Whether both messages and catalogs in `version` can be translated.
    #[must_use]
    pub fn supports(&self, version: &Version) -> bool {
        self.messages.supports(version) && self.catalogs.supports(version)
    }

    /// # Errors
    ///
    /// See [`Migrator::upgrade`].
    pub fn upgrade_message(&self, message: Value, source: &Version) -> Result<Value, MigrationError> {
        self.messages.upgrade(message, source)
    }

    /// # Errors
    ///
    /// See [`Migrator::downgrade`].
    pub fn downgrade_message(
        &self,
        message: Value,
        target: &Version,
    ) -> Result<Value, MigrationError> {
        self.messages.downgrade(message, target)
    }

    /// # Errors
    ///
    /// See [`Migrator::upgrade`].
    pub fn upgrade_catalog(&self, catalog: Value, source: &Version) -> Result<Value, MigrationError> {
        self.catalogs.upgrade(catalog, source)
    }

    /// # Errors
    ///
    /// See [`Migrator::downgrade`].
    pub fn downgrade_catalog(
        &self,
        catalog: Value,
        target: &Version,
    ) -> Result<Value, MigrationError> {
        self.catalogs.downgrade(catalog, target)
    }

    /// Upgrade a raw connector message and decode it into the platform model.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError`] if migration fails or the upgraded tree is
    /// not a valid platform message.
    pub fn decode_message(
        &self,
        message: Value,
        source: &Version,
    ) -> Result<ProtocolMessage, MigrationError> {
        let upgraded = self.upgrade_message(message, source)?;
        serde_json::from_value(upgraded).map_err(|e| {
            MigrationError::new(
                *source,
                self.current_version(),
                PayloadKind::Message,
                format!("upgraded message does not match the platform schema: {e}"),
            )
        })
    }

    /// Upgrade a connector's configured catalog and decode it.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError`] if migration fails or the upgraded tree is
    /// not a valid configured catalog.
    pub fn decode_catalog(
        &self,
        catalog: Value,
        source: &Version,
    ) -> Result<ConfiguredCatalog, MigrationError> {
        let upgraded = self.upgrade_catalog(catalog, source)?;
        serde_json::from_value(upgraded).map_err(|e| {
            MigrationError::new(
                *source,
                self.current_version(),
                PayloadKind::Catalog,
                format!("upgraded catalog does not match the platform schema: {e}"),
            )
        })
    }

    /// Encode a configured catalog and downgrade it for a connector.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError`] if serialization or migration fails.
    pub fn encode_catalog(
        &self,
        catalog: &ConfiguredCatalog,
        target: &Version,
    ) -> Result<Value, MigrationError> {
        let tree = serde_json::to_value(catalog).map_err(|e| {
            MigrationError::new(
                self.current_version(),
                *target,
                PayloadKind::Catalog,
                format!("catalog is not serializable: {e}"),
            )
        })?;
        self.downgrade_catalog(tree, target)
    }
}
