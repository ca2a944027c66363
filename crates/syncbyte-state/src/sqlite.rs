//! `SQLite`-backed implementation of [`StateStore`].
//!
//! Uses a single `Mutex<Connection>` for thread safety.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use syncbyte_types::{ConnectionId, State, StateType};

use crate::error::{self, StateError};
use crate::store::{ConnectionState, StateStore};

/// `SQLite` datetime format (UTC, no timezone suffix).
const SQLITE_DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

/// Idempotent DDL for state tables.
const CREATE_TABLES: &str = r"
CREATE TABLE IF NOT EXISTS connection_state (
    connection_id TEXT PRIMARY KEY,
    state_type TEXT NOT NULL,
    state_json TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
";

/// `SQLite`-backed state storage.
///
/// Create with [`SqliteStateStore::open`] for file-backed persistence
/// or [`SqliteStateStore::in_memory`] for tests.
pub struct SqliteStateStore {
    conn: Mutex<Connection>,
}

impl SqliteStateStore {
    /// Open or create a `SQLite` state database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Io`] if the directory can't be created,
    /// or [`StateError::Sqlite`] if the database can't be opened.
    pub fn open(path: &Path) -> error::Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(CREATE_TABLES)?;
        tracing::debug!(path = %path.display(), "Opened sqlite state store");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory `SQLite` store (for testing).
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Sqlite`] if the in-memory database can't be
    /// initialized.
    pub fn in_memory() -> error::Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(CREATE_TABLES)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the connection lock.
    fn lock_conn(&self) -> error::Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StateError::LockPoisoned)
    }

    fn now_sqlite() -> String {
        Utc::now().format(SQLITE_DATETIME_FMT).to_string()
    }

    /// Parse a stored `SQLite` datetime, falling back to the epoch for rows
    /// written by hand.
    fn parse_sqlite_datetime(raw: &str) -> DateTime<Utc> {
        NaiveDateTime::parse_from_str(raw, SQLITE_DATETIME_FMT)
            .map(|ndt| ndt.and_utc())
            .unwrap_or_default()
    }
}

impl StateStore for SqliteStateStore {
    fn get_state(&self, connection: &ConnectionId) -> error::Result<Option<ConnectionState>> {
        let conn = self.lock_conn()?;
        let row = conn
            .query_row(
                "SELECT state_type, state_json, updated_at \
                 FROM connection_state WHERE connection_id = ?1",
                [connection.as_str()],
                |row| {
                    let state_type: String = row.get(0)?;
                    let state_json: String = row.get(1)?;
                    let updated_at: String = row.get(2)?;
                    Ok((state_type, state_json, updated_at))
                },
            )
            .optional()?;

        let Some((state_type, state_json, updated_at)) = row else {
            return Ok(None);
        };
        let state_type = state_type
            .parse::<StateType>()
            .map_err(StateError::UnexpectedStateBlob)?;
        let state = State::new(serde_json::from_str(&state_json)?);
        Ok(Some(ConnectionState {
            state_type,
            state,
            updated_at: Self::parse_sqlite_datetime(&updated_at),
        }))
    }

    fn put_state(
        &self,
        connection: &ConnectionId,
        state_type: StateType,
        state: &State,
    ) -> error::Result<()> {
        let state_json = serde_json::to_string(&state.state)?;
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO connection_state (connection_id, state_type, state_json, updated_at) \
             VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(connection_id) \
             DO UPDATE SET state_type = ?2, state_json = ?3, updated_at = ?4",
            rusqlite::params![
                connection.as_str(),
                state_type.as_str(),
                state_json,
                Self::now_sqlite(),
            ],
        )?;
        tracing::debug!(
            connection = %connection,
            state_type = %state_type,
            bytes = state_json.len(),
            "Persisted connection state"
        );
        Ok(())
    }

    fn delete_state(&self, connection: &ConnectionId) -> error::Result<bool> {
        let conn = self.lock_conn()?;
        let rows = conn.execute(
            "DELETE FROM connection_state WHERE connection_id = ?1",
            [connection.as_str()],
        )?;
        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cid(name: &str) -> ConnectionId {
        ConnectionId::new(name)
    }

    #[test]
    fn state_roundtrip() {
        let store = SqliteStateStore::in_memory().unwrap();
        assert!(store.get_state(&cid("c")).unwrap().is_none());

        let state = State::new(json!([
            {"type": "STREAM", "stream": {"stream_descriptor": {"name": "users"}, "stream_state": {"id": 3}}}
        ]));
        store.put_state(&cid("c"), StateType::Stream, &state).unwrap();

        let stored = store.get_state(&cid("c")).unwrap().unwrap();
        assert_eq!(stored.state_type, StateType::Stream);
        assert_eq!(stored.state, state);
        assert!(stored.updated_at.timestamp() > 0);
    }

    #[test]
    fn state_upsert() {
        let store = SqliteStateStore::in_memory().unwrap();
        store
            .put_state(&cid("c"), StateType::Legacy, &State::new(json!({"cursor": 1})))
            .unwrap();
        store
            .put_state(&cid("c"), StateType::Legacy, &State::new(json!({"cursor": 2})))
            .unwrap();
        let stored = store.get_state(&cid("c")).unwrap().unwrap();
        assert_eq!(stored.state.state, json!({"cursor": 2}));
    }

    #[test]
    fn different_connections_independent() {
        let store = SqliteStateStore::in_memory().unwrap();
        store
            .put_state(&cid("a"), StateType::Legacy, &State::new(json!("aaa")))
            .unwrap();
        store
            .put_state(&cid("b"), StateType::Legacy, &State::new(json!("bbb")))
            .unwrap();
        assert_eq!(store.get_state(&cid("a")).unwrap().unwrap().state.state, json!("aaa"));
        assert_eq!(store.get_state(&cid("b")).unwrap().unwrap().state.state, json!("bbb"));
    }

    #[test]
    fn delete_reports_presence() {
        let store = SqliteStateStore::in_memory().unwrap();
        assert!(!store.delete_state(&cid("c")).unwrap());
        store
            .put_state(&cid("c"), StateType::Legacy, &State::new(json!(1)))
            .unwrap();
        assert!(store.delete_state(&cid("c")).unwrap());
        assert!(store.get_state(&cid("c")).unwrap().is_none());
    }

    #[test]
    fn file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.db");
        {
            let store = SqliteStateStore::open(&path).unwrap();
            store
                .put_state(&cid("c"), StateType::Global, &State::new(json!([{"type": "GLOBAL"}])))
                .unwrap();
        }
        let store = SqliteStateStore::open(&path).unwrap();
        let stored = store.get_state(&cid("c")).unwrap().unwrap();
        assert_eq!(stored.state_type, StateType::Global);
    }

    #[test]
    fn unknown_state_type_is_rejected() {
        let store = SqliteStateStore::in_memory().unwrap();
        {
            let conn = store.lock_conn().unwrap();
            conn.execute(
                "INSERT INTO connection_state (connection_id, state_type, state_json) \
                 VALUES ('c', 'PER_STREAM', '[]')",
                [],
            )
            .unwrap();
        }
        assert!(matches!(
            store.get_state(&cid("c")),
            Err(StateError::UnexpectedStateBlob(_))
        ));
    }

    #[test]
    fn sqlite_datetime_parses_as_utc() {
        let parsed = SqliteStateStore::parse_sqlite_datetime("2024-01-15 10:30:00");
        assert_eq!(parsed.to_rfc3339(), "2024-01-15T10:30:00+00:00");
    }
}
