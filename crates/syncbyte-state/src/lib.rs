//! Checkpoint aggregation and persistence for syncbyte sync attempts.
//!
//! Provides the [`StateAggregator`] that reduces an attempt's state messages
//! into one [`State`](syncbyte_types::State), the typed [`StateWrapper`]
//! view of persisted state, and the [`StateStore`] trait with `SQLite` and
//! in-memory implementations.

#![warn(clippy::pedantic)]

pub mod aggregator;
pub mod error;
pub mod sqlite;
pub mod store;
pub mod validation;
pub mod wrapper;

pub use aggregator::{AggregatorKind, SingleStateAggregator, StateAggregator, StreamStateAggregator};
pub use error::StateError;
pub use sqlite::SqliteStateStore;
pub use store::{ConnectionState, MemoryStateStore, StateStore};
pub use validation::validate_stream_states;
pub use wrapper::{typed_state, StateWrapper};
