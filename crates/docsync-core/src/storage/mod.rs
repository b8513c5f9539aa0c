//! Persisted engine state
//!
//! The sync engine keeps three kinds of durable state in an out-of-process
//! key-value store:
//!
//! - `last_sync:<identity>` - RFC 3339 timestamp of the last confirmed sync
//! - `pending_snapshot` - CBOR-encoded document that could not be synced
//! - `connection_state` - connection state name (never `auth_pending`)
//!
//! Backends only implement raw `get`/`put`/`delete`; the typed accessors are
//! provided on top of them.

pub mod memory;
pub mod schema;
pub mod sqlite;

use chrono::{DateTime, Utc};

use crate::connection::ConnectionState;
use crate::document::{Document, DocumentIdentity};
use crate::error::{SyncError, SyncResult};

pub use memory::MemoryStateStore;
pub use schema::{migrate, schema_version, SCHEMA_VERSION};
pub use sqlite::SqliteStateStore;

const PENDING_SNAPSHOT_KEY: &str = "pending_snapshot";
const CONNECTION_STATE_KEY: &str = "connection_state";
const LAST_SYNC_PREFIX: &str = "last_sync:";

/// Durable key-value store for engine state
pub trait StateStore: Send + Sync {
    /// Read a raw value
    fn get(&self, key: &str) -> SyncResult<Option<Vec<u8>>>;

    /// Write a raw value, replacing any existing one
    fn put(&self, key: &str, value: &[u8]) -> SyncResult<()>;

    /// Remove a value (no-op if absent)
    fn delete(&self, key: &str) -> SyncResult<()>;

    /// Timestamp of the last confirmed sync for a document
    fn last_sync(&self, identity: &DocumentIdentity) -> SyncResult<Option<DateTime<Utc>>> {
        let Some(bytes) = self.get(&last_sync_key(identity))? else {
            return Ok(None);
        };
        let text = String::from_utf8(bytes).map_err(|e| SyncError::Codec(e.to_string()))?;
        let at = DateTime::parse_from_rfc3339(&text)
            .map_err(|e| SyncError::Codec(format!("invalid last sync time '{}': {}", text, e)))?;
        Ok(Some(at.with_timezone(&Utc)))
    }

    fn set_last_sync(&self, identity: &DocumentIdentity, at: DateTime<Utc>) -> SyncResult<()> {
        self.put(&last_sync_key(identity), at.to_rfc3339().as_bytes())
    }

    /// The durable pending slot
    fn pending_snapshot(&self) -> SyncResult<Option<Document>> {
        let Some(bytes) = self.get(PENDING_SNAPSHOT_KEY)? else {
            return Ok(None);
        };
        let doc: Document = ciborium::from_reader(bytes.as_slice())?;
        Ok(Some(doc))
    }

    /// Overwrite the durable pending slot
    fn set_pending_snapshot(&self, doc: &Document) -> SyncResult<()> {
        let mut bytes = Vec::new();
        ciborium::into_writer(doc, &mut bytes)?;
        self.put(PENDING_SNAPSHOT_KEY, &bytes)
    }

    fn clear_pending_snapshot(&self) -> SyncResult<()> {
        self.delete(PENDING_SNAPSHOT_KEY)
    }

    /// Restore the persisted connection state
    ///
    /// An interrupted auth handshake cannot be resumed, so `AuthPending`
    /// always comes back as `SignedOut`.
    fn connection_state(&self) -> SyncResult<Option<ConnectionState>> {
        let Some(bytes) = self.get(CONNECTION_STATE_KEY)? else {
            return Ok(None);
        };
        let text = String::from_utf8(bytes).map_err(|e| SyncError::Codec(e.to_string()))?;
        let state: ConnectionState = text.parse()?;
        Ok(Some(match state {
            ConnectionState::AuthPending => ConnectionState::SignedOut,
            other => other,
        }))
    }

    fn set_connection_state(&self, state: ConnectionState) -> SyncResult<()> {
        let persisted = match state {
            ConnectionState::AuthPending => ConnectionState::SignedOut,
            other => other,
        };
        self.put(CONNECTION_STATE_KEY, persisted.as_str().as_bytes())
    }
}

fn last_sync_key(identity: &DocumentIdentity) -> String {
    format!("{}{}", LAST_SYNC_PREFIX, identity)
}
