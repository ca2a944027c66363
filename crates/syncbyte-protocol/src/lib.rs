//! Protocol version bridge.
//!
//! A process-wide [`VersionRegistry`] holds pairwise [`Migration`]s between
//! protocol major versions. A [`MessageMigrator`] built from it translates
//! connector messages and configured catalogs to the platform version and
//! back.

pub mod detect;
pub mod migration;
pub mod migrations;
pub mod migrator;
pub mod registry;

pub use detect::{detect_or, detect_version, DETECTION_LOOKAHEAD};
pub use migration::{Direction, Migration, MigrationChain};
pub use migrations::{builtin_registry, register_builtin};
pub use migrator::{MessageMigrator, Migrator};
pub use registry::{RegistryError, VersionRegistry};
