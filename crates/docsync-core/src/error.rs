//! Sync error handling
//!
//! Provides typed errors for the sync engine and its collaborators. Every
//! failure is classified so the coordinator can decide between retrying,
//! going offline, healing, or surfacing an error status.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::connection::ConnectionState;
use crate::document::DocumentIdentity;

/// Errors that can occur during sync operations
#[derive(Error, Debug)]
pub enum SyncError {
    /// No valid credentials; fatal to the current sync attempt
    #[error("Not authenticated with the remote store. Sign in and try again.")]
    NotAuthenticated,

    /// The network (or the remote target) cannot be reached at all
    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),

    /// The remote object no longer exists
    #[error("Remote object not found: '{id}'")]
    RemoteNotFound { id: String },

    /// Local and remote changed independently since the last sync
    #[error("Document '{identity}' diverged from its remote copy")]
    RemoteConflict { identity: DocumentIdentity },

    /// A failure that is expected to go away if retried
    #[error("Transient failure: {0}")]
    Transient(String),

    /// Retries ran out
    #[error("Sync of '{identity}' failed after {attempts} attempt(s): {last_error}")]
    Exhausted {
        identity: DocumentIdentity,
        attempts: u32,
        last_error: String,
    },

    /// Connection state machine rejected an event
    #[error("Invalid connection transition: '{event}' is not allowed from {from:?}")]
    InvalidStateTransition {
        from: ConnectionState,
        event: String,
    },

    /// No conflict is waiting for the given document
    #[error("No pending conflict for document '{0}'")]
    NoPendingConflict(DocumentIdentity),

    /// Persisted state could not be read or written
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Snapshot encoding failed
    #[error("Codec error: {0}")]
    Codec(String),

    /// Filesystem error with path context
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl SyncError {
    /// Create an error from a remote-side I/O error with path context
    ///
    /// A missing object is reported as not found and connection-like
    /// failures are transient. Everything else, permission errors
    /// included, stays an `Io` error: retried, never treated as auth.
    pub fn from_io(error: io::Error, path: PathBuf) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound => SyncError::RemoteNotFound {
                id: path.display().to_string(),
            },
            io::ErrorKind::TimedOut
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted => SyncError::Transient(error.to_string()),
            _ => SyncError::Io {
                path,
                source: error,
            },
        }
    }

    /// Check if the operation can be retried with backoff
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Transient(_) | SyncError::Io { .. })
    }

    /// Check if this error means the network cannot be reached
    pub fn is_offline(&self) -> bool {
        matches!(self, SyncError::NetworkUnavailable(_))
    }
}

impl From<ciborium::de::Error<io::Error>> for SyncError {
    fn from(e: ciborium::de::Error<io::Error>) -> Self {
        SyncError::Codec(e.to_string())
    }
}

impl From<ciborium::ser::Error<io::Error>> for SyncError {
    fn from(e: ciborium::ser::Error<io::Error>) -> Self {
        SyncError::Codec(e.to_string())
    }
}

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;
