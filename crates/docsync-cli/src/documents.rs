//! Tracked local documents
//!
//! The CLI plays the editing layer: it maps files on disk to document
//! identities and records the remote binding the engine reports back.
//! Entries live in the engine's state database under their own keys:
//!
//! - `document:<identity>` - JSON record (path, remote id)
//! - `path:<canonical path>` - identity

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use docsync_core::{Document, DocumentIdentity, RemoteId, StateStore};

const DOCUMENT_PREFIX: &str = "document:";
const PATH_PREFIX: &str = "path:";

/// A file known to docsync
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedDocument {
    pub identity: DocumentIdentity,
    pub path: PathBuf,
    pub remote_id: Option<RemoteId>,
}

impl TrackedDocument {
    /// Name used to find the remote copy (the file name)
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.identity.to_string())
    }

    /// Snapshot the file as it is on disk now
    ///
    /// The file's modification time is the local save time.
    pub fn snapshot(&self) -> Result<Document> {
        let content = fs::read(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let modified = modified_time(&self.path)?;

        let mut doc = Document::with_identity(self.identity.clone(), self.name(), content);
        doc.local_saved_at = modified;
        doc.remote_id = self.remote_id.clone();
        Ok(doc)
    }
}

/// Modification time of a file
pub fn modified_time(path: &Path) -> Result<DateTime<Utc>> {
    let modified = fs::metadata(path)
        .and_then(|m| m.modified())
        .with_context(|| format!("Failed to stat {}", path.display()))?;
    Ok(DateTime::<Utc>::from(modified))
}

/// Index of tracked documents
pub struct DocumentIndex {
    store: Arc<dyn StateStore>,
}

impl DocumentIndex {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    /// Start tracking a file, or return its existing entry
    pub fn track(&self, path: &Path) -> Result<TrackedDocument> {
        let path = path
            .canonicalize()
            .with_context(|| format!("File not found: {}", path.display()))?;

        if let Some(existing) = self.find_by_path(&path)? {
            return Ok(existing);
        }

        let tracked = TrackedDocument {
            identity: DocumentIdentity::generate(),
            path,
            remote_id: None,
        };
        self.save(&tracked)?;
        Ok(tracked)
    }

    pub fn get(&self, identity: &DocumentIdentity) -> Result<Option<TrackedDocument>> {
        let Some(bytes) = self.store.get(&document_key(identity))? else {
            return Ok(None);
        };
        let tracked = serde_json::from_slice(&bytes)
            .with_context(|| format!("Corrupt index entry for document {}", identity))?;
        Ok(Some(tracked))
    }

    pub fn find_by_path(&self, path: &Path) -> Result<Option<TrackedDocument>> {
        let Some(bytes) = self.store.get(&path_key(path))? else {
            return Ok(None);
        };
        let identity = String::from_utf8(bytes).context("Corrupt path index entry")?;
        self.get(&DocumentIdentity::from(identity))
    }

    pub fn save(&self, tracked: &TrackedDocument) -> Result<()> {
        let json = serde_json::to_vec(tracked).context("Failed to encode index entry")?;
        self.store.put(&document_key(&tracked.identity), &json)?;
        self.store
            .put(&path_key(&tracked.path), tracked.identity.as_str().as_bytes())?;
        Ok(())
    }

    /// Record a remote binding; returns false for an unknown identity
    pub fn bind(&self, identity: &DocumentIdentity, remote_id: &RemoteId) -> Result<bool> {
        let Some(mut tracked) = self.get(identity)? else {
            return Ok(false);
        };
        if tracked.remote_id.as_ref() != Some(remote_id) {
            tracked.remote_id = Some(remote_id.clone());
            self.save(&tracked)?;
        }
        Ok(true)
    }
}

fn document_key(identity: &DocumentIdentity) -> String {
    format!("{}{}", DOCUMENT_PREFIX, identity)
}

fn path_key(path: &Path) -> String {
    format!("{}{}", PATH_PREFIX, path.display())
}
