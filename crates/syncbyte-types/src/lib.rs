//! Shared syncbyte protocol, state, and error model types.
//!
//! This crate sits below every other syncbyte crate and has no runtime
//! dependencies beyond serialization.

pub mod catalog;
pub mod error;
pub mod message;
pub mod state;
pub mod stream;
pub mod version;

pub use catalog::{ConfiguredCatalog, ConfiguredStream, SyncMode};
pub use error::MigrationError;
pub use message::{MessageType, ProtocolMessage, StateMessage, StreamStatus};
pub use state::{ConnectionId, State, StateType};
pub use stream::StreamDescriptor;
pub use version::{PayloadKind, Version};
