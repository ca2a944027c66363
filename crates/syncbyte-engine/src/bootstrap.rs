//! Wiring of the long-lived collaborators shared by every attempt.

use std::sync::Arc;

use anyhow::{Context, Result};
use syncbyte_protocol::{builtin_registry, MessageMigrator, VersionRegistry};
use syncbyte_state::{MemoryStateStore, SqliteStateStore, StateStore};

use crate::config::{validate_config, StoreKind, SyncConfig};
use crate::guard::PayloadGuard;

/// Process-wide state: the version registry, migrator and state store are
/// built once and shared read-only by every attempt.
#[derive(Clone)]
pub struct Platform {
    pub config: SyncConfig,
    pub registry: Arc<VersionRegistry>,
    pub migrator: Arc<MessageMigrator>,
    pub store: Arc<dyn StateStore>,
    pub guard: PayloadGuard,
}

impl Platform {
    /// Validate `config` and build the shared collaborators.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid, the registry cannot reach
    /// the platform version, or the state store cannot be opened.
    pub fn from_config(config: SyncConfig) -> Result<Self> {
        let registry = builtin_registry().context("Failed to build version registry")?;
        validate_config(&config, &registry)?;

        let store: Arc<dyn StateStore> = match config.state.store {
            StoreKind::Sqlite => Arc::new(
                SqliteStateStore::open(&config.state.path).with_context(|| {
                    format!("Failed to open state store: {}", config.state.path.display())
                })?,
            ),
            StoreKind::Memory => Arc::new(MemoryStateStore::new()),
        };
        Self::with_store(config, registry, store)
    }

    /// Build a platform around an existing store.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot reach the platform version.
    pub fn with_store(
        config: SyncConfig,
        registry: VersionRegistry,
        store: Arc<dyn StateStore>,
    ) -> Result<Self> {
        let migrator = MessageMigrator::new(&registry, config.platform_protocol_version)
            .with_context(|| {
                format!(
                    "Failed to build migrator for platform version {}",
                    config.platform_protocol_version
                )
            })?;
        tracing::info!(
            platform_version = %config.platform_protocol_version,
            known_versions = ?registry.known_versions(),
            store = ?config.state.store,
            "Platform initialised"
        );
        Ok(Self {
            guard: PayloadGuard::new(config.payload_limit_bytes),
            registry: Arc::new(registry),
            migrator: Arc::new(migrator),
            store,
            config,
        })
    }
}
