//! Sync status and events

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::conflict::ConflictInfo;
use crate::document::{Document, DocumentIdentity, RemoteId};

/// Sync status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Nothing in flight
    Idle,
    /// A remote write is in progress
    Syncing,
    /// Last write succeeded (reverts to idle shortly)
    Synced,
    /// Local and remote diverged; waiting for a resolution
    Conflict,
    /// Sync failed; the snapshot is kept for a later retry
    Error,
    /// Network unreachable; the snapshot is kept until reconnect
    Offline,
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncStatus::Idle => "idle",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Synced => "synced",
            SyncStatus::Conflict => "conflict",
            SyncStatus::Error => "error",
            SyncStatus::Offline => "offline",
        };
        f.write_str(s)
    }
}

/// Events emitted by the sync coordinator
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// Status changed, for one document or for the engine as a whole
    StatusChanged {
        identity: Option<DocumentIdentity>,
        status: SyncStatus,
    },
    /// Document was written remotely; record the binding
    Synced {
        identity: DocumentIdentity,
        remote_id: RemoteId,
    },
    /// Divergence detected
    ConflictDetected(ConflictInfo),
    /// Remote content replaced the local copy (conflict resolved as remote/both)
    RemotePulled {
        identity: DocumentIdentity,
        remote_id: RemoteId,
        content: Vec<u8>,
        modified_time: DateTime<Utc>,
    },
    /// Local snapshot was forked into a new document (conflict resolved as both)
    Forked {
        original: DocumentIdentity,
        fork: Document,
    },
    /// Sync failed
    Error {
        identity: Option<DocumentIdentity>,
        message: String,
    },
}
