//! Concrete migrations shipped with the platform.

mod v1;

use std::sync::Arc;

pub use v1::{CatalogMigrationV1, MessageMigrationV1};

use crate::registry::{RegistryError, VersionRegistry};

/// Register every built-in migration.
///
/// # Errors
///
/// Returns [`RegistryError`] if `registry` already holds one of them.
pub fn register_builtin(registry: &mut VersionRegistry) -> Result<(), RegistryError> {
    registry.register(Arc::new(MessageMigrationV1))?;
    registry.register(Arc::new(CatalogMigrationV1))?;
    Ok(())
}

/// A registry holding every built-in migration.
///
/// # Errors
///
/// Returns [`RegistryError`] if the built-in set is inconsistent.
pub fn builtin_registry() -> Result<VersionRegistry, RegistryError> {
    let mut registry = VersionRegistry::new();
    register_builtin(&mut registry)?;
    Ok(registry)
}
