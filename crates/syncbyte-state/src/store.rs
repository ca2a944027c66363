//! Persistence contract for connection state.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use syncbyte_types::{ConnectionId, State, StateType};

use crate::error::{self, StateError};

/// The checkpoint last persisted for a connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionState {
    pub state_type: StateType,
    pub state: State,
    pub updated_at: DateTime<Utc>,
}

/// Storage contract for connection state.
///
/// Implementations must be `Send + Sync` for use behind `Arc<dyn StateStore>`.
pub trait StateStore: Send + Sync {
    /// Read the state persisted for `connection`.
    ///
    /// Returns `Ok(None)` when nothing has been persisted yet.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] on storage failure.
    fn get_state(&self, connection: &ConnectionId) -> error::Result<Option<ConnectionState>>;

    /// Replace the state persisted for `connection`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] on storage failure.
    fn put_state(
        &self,
        connection: &ConnectionId,
        state_type: StateType,
        state: &State,
    ) -> error::Result<()>;

    /// Remove the state persisted for `connection`. Returns whether a row
    /// existed.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] on storage failure.
    fn delete_state(&self, connection: &ConnectionId) -> error::Result<bool>;
}

/// Process-local store, used by tests and `store: memory` configurations.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    states: Mutex<HashMap<ConnectionId, ConnectionState>>,
}

impl MemoryStateStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> error::Result<MutexGuard<'_, HashMap<ConnectionId, ConnectionState>>> {
        self.states.lock().map_err(|_| StateError::LockPoisoned)
    }
}

impl StateStore for MemoryStateStore {
    fn get_state(&self, connection: &ConnectionId) -> error::Result<Option<ConnectionState>> {
        Ok(self.lock()?.get(connection).cloned())
    }

    fn put_state(
        &self,
        connection: &ConnectionId,
        state_type: StateType,
        state: &State,
    ) -> error::Result<()> {
        self.lock()?.insert(
            connection.clone(),
            ConnectionState {
                state_type,
                state: state.clone(),
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }

    fn delete_state(&self, connection: &ConnectionId) -> error::Result<bool> {
        Ok(self.lock()?.remove(connection).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Verify the trait is object-safe (can be used as `dyn StateStore`).
    #[test]
    fn trait_is_object_safe() {
        fn _assert_object_safe(_: &dyn StateStore) {}
    }

    #[test]
    fn memory_roundtrip_and_overwrite() {
        let store = MemoryStateStore::new();
        let conn = ConnectionId::new("c1");
        assert!(store.get_state(&conn).unwrap().is_none());

        store
            .put_state(&conn, StateType::Legacy, &State::new(json!({"cursor": 1})))
            .unwrap();
        store
            .put_state(&conn, StateType::Stream, &State::new(json!([])))
            .unwrap();

        let stored = store.get_state(&conn).unwrap().unwrap();
        assert_eq!(stored.state_type, StateType::Stream);
        assert_eq!(stored.state.state, json!([]));
    }

    #[test]
    fn memory_delete() {
        let store = MemoryStateStore::new();
        let conn = ConnectionId::new("c1");
        assert!(!store.delete_state(&conn).unwrap());
        store
            .put_state(&conn, StateType::Legacy, &State::new(json!(1)))
            .unwrap();
        assert!(store.delete_state(&conn).unwrap());
        assert!(store.get_state(&conn).unwrap().is_none());
    }
}
