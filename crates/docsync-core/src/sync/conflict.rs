//! Conflict detection and resolution handoff
//!
//! A conflict exists when both the local and the remote copy changed since
//! the last confirmed sync, and far enough apart in time that the change
//! cannot be an echo of the same save.
//!
//! When a conflict is detected the coordinator registers it here and waits
//! on a oneshot channel. `resolve` completes that channel exactly once with
//! the chosen strategy and the latest local snapshot.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::debug;

use crate::document::{Document, DocumentIdentity, RemoteId};
use crate::error::{SyncError, SyncResult};

/// Decide whether local and remote diverged
///
/// True iff both sides post-date `last_sync` and their difference exceeds
/// `threshold`.
pub fn is_conflict(
    remote_modified: DateTime<Utc>,
    local_saved: DateTime<Utc>,
    last_sync: DateTime<Utc>,
    threshold: Duration,
) -> bool {
    if remote_modified <= last_sync || local_saved <= last_sync {
        return false;
    }
    let diff = (remote_modified - local_saved).abs();
    match diff.to_std() {
        Ok(diff) => diff > threshold,
        Err(_) => false,
    }
}

/// How to resolve a conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictChoice {
    /// Overwrite the remote copy with the local snapshot
    Local,
    /// Discard local changes and take the remote copy
    Remote,
    /// Fork the local snapshot into a new document; keep remote as canonical
    Both,
}

impl fmt::Display for ConflictChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictChoice::Local => f.write_str("local"),
            ConflictChoice::Remote => f.write_str("remote"),
            ConflictChoice::Both => f.write_str("both"),
        }
    }
}

impl FromStr for ConflictChoice {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(ConflictChoice::Local),
            "remote" => Ok(ConflictChoice::Remote),
            "both" => Ok(ConflictChoice::Both),
            other => Err(SyncError::Codec(format!(
                "unknown conflict choice '{}' (expected local, remote or both)",
                other
            ))),
        }
    }
}

/// What the user (or policy) needs to know to decide
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictInfo {
    pub identity: DocumentIdentity,
    pub identity_name: String,
    pub remote_id: RemoteId,
    pub local_saved_at: DateTime<Utc>,
    pub remote_modified_time: DateTime<Utc>,
    pub last_sync: Option<DateTime<Utc>>,
}

/// A decision delivered to the waiting coordinator
#[derive(Debug)]
pub struct Resolution {
    pub choice: ConflictChoice,
    pub local: Document,
    pub remote_id: RemoteId,
}

struct PendingConflict {
    info: ConflictInfo,
    local: Document,
    tx: oneshot::Sender<Resolution>,
}

/// Registry of conflicts waiting for a decision
#[derive(Default)]
pub struct ConflictResolver {
    pending: Mutex<HashMap<DocumentIdentity, PendingConflict>>,
}

impl ConflictResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Park a conflict until `resolve` is called for its identity
    ///
    /// Registering the same identity again supersedes the earlier wait; the
    /// earlier receiver then completes with an error.
    pub fn register(&self, info: ConflictInfo, local: Document) -> oneshot::Receiver<Resolution> {
        let (tx, rx) = oneshot::channel();
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        if pending
            .insert(info.identity.clone(), PendingConflict { info, local, tx })
            .is_some()
        {
            debug!("Superseded an earlier pending conflict");
        }
        rx
    }

    /// Deliver a decision
    pub fn resolve(&self, identity: &DocumentIdentity, choice: ConflictChoice) -> SyncResult<()> {
        let entry = self
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(identity)
            .ok_or_else(|| SyncError::NoPendingConflict(identity.clone()))?;

        let resolution = Resolution {
            choice,
            local: entry.local,
            remote_id: entry.info.remote_id,
        };
        entry
            .tx
            .send(resolution)
            .map_err(|_| SyncError::NoPendingConflict(identity.clone()))
    }

    /// Replace the held local snapshot with a newer edit
    ///
    /// Returns false if no conflict is pending for this document.
    pub fn update_local(&self, doc: &Document) -> bool {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        match pending.get_mut(&doc.identity) {
            Some(entry) => {
                if doc.local_saved_at >= entry.local.local_saved_at {
                    entry.local = doc.clone();
                    entry.info.local_saved_at = doc.local_saved_at;
                }
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self, identity: &DocumentIdentity) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(identity)
    }

    pub fn has_pending(&self) -> bool {
        !self
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_empty()
    }

    /// Conflicts waiting for a decision
    pub fn pending(&self) -> Vec<ConflictInfo> {
        let mut infos: Vec<ConflictInfo> = self
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .map(|p| p.info.clone())
            .collect();
        infos.sort_by(|a, b| a.identity.cmp(&b.identity));
        infos
    }
}
