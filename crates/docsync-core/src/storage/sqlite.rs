//! SQLite-backed state store
//!
//! Storage location: `<data_dir>/state.db` (see `Config::state_db_path`).

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::schema::migrate;
use super::StateStore;
use crate::error::{SyncError, SyncResult};

/// Durable state store on a local SQLite database
pub struct SqliteStateStore {
    conn: Mutex<Connection>,
}

impl SqliteStateStore {
    /// Open (or create) the database at the given path
    pub fn open(path: &Path) -> SyncResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|source| SyncError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let conn = Connection::open(path)?;
        debug!("Opened state store at {:?}", path);
        Self::from_connection(conn)
    }

    /// Open a throwaway in-memory database
    pub fn open_in_memory() -> SyncResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(mut conn: Connection) -> SyncResult<Self> {
        migrate(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> SyncResult<T> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        Ok(f(&conn)?)
    }
}

impl StateStore for SqliteStateStore {
    fn get(&self, key: &str) -> SyncResult<Option<Vec<u8>>> {
        self.with_conn(|conn| {
            conn.query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| {
                row.get::<_, Vec<u8>>(0)
            })
            .optional()
        })
    }

    fn put(&self, key: &str, value: &[u8]) -> SyncResult<()> {
        let now = chrono::Utc::now().timestamp_millis();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, now],
            )
            .map(|_| ())
        })
    }

    fn delete(&self, key: &str) -> SyncResult<()> {
        self.with_conn(|conn| conn.execute("DELETE FROM kv WHERE key = ?1", [key]).map(|_| ()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionState;
    use crate::document::Document;
    use tempfile::TempDir;

    #[test]
    fn test_in_memory_put_get() {
        let store = SqliteStateStore::open_in_memory().unwrap();
        store.put("a", b"1").unwrap();
        store.put("a", b"2").unwrap();
        assert_eq!(store.get("a").unwrap(), Some(b"2".to_vec()));

        store.delete("a").unwrap();
        assert!(store.get("a").unwrap().is_none());
    }

    #[test]
    fn test_open_reports_local_path_errors() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("data");
        std::fs::write(&blocker, "not a directory").unwrap();

        let err = SqliteStateStore::open(&blocker.join("state.db"))
            .err()
            .unwrap();
        assert!(matches!(err, SyncError::Io { ref path, .. } if *path == blocker));
    }

    #[test]
    fn test_state_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("state.db");
        let doc = Document::new("draft.md", "unsynced words");

        {
            let store = SqliteStateStore::open(&path).unwrap();
            store.set_pending_snapshot(&doc).unwrap();
            store.set_connection_state(ConnectionState::Ready).unwrap();
        }

        {
            let store = SqliteStateStore::open(&path).unwrap();
            assert_eq!(store.pending_snapshot().unwrap(), Some(doc));
            assert_eq!(
                store.connection_state().unwrap(),
                Some(ConnectionState::Ready)
            );
        }
    }
}
