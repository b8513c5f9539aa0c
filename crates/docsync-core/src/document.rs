//! Document snapshots
//!
//! Defines the values the sync engine moves around: the local document
//! snapshot, its stable identity, the remote binding, and remote metadata.
//! The engine treats content as opaque bytes.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable key for a document
///
/// Used to key sync bookkeeping (queue entries, last-sync timestamps).
/// Unlike the remote id it exists before the document is ever synced.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentIdentity(String);

impl DocumentIdentity {
    /// Generate a fresh identity
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DocumentIdentity {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for DocumentIdentity {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for DocumentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier assigned by the remote store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteId(String);

impl RemoteId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A point-in-time copy of a local document
///
/// `Clone` is a full value copy: the queued snapshot shares nothing with
/// the live document it was taken from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Stable key for bookkeeping
    pub identity: DocumentIdentity,
    /// Name used to look up an existing remote copy before binding
    pub identity_name: String,
    /// Opaque content
    #[serde(with = "serde_bytes")]
    pub content: Vec<u8>,
    /// When the document was last changed locally
    pub local_saved_at: DateTime<Utc>,
    /// Remote binding, set once the document has been synced
    pub remote_id: Option<RemoteId>,
}

impl Document {
    /// Create a new unbound document
    pub fn new(identity_name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            identity: DocumentIdentity::generate(),
            identity_name: identity_name.into(),
            content: content.into(),
            local_saved_at: Utc::now(),
            remote_id: None,
        }
    }

    /// Create a document with a specific identity (for loading from storage)
    pub fn with_identity(
        identity: impl Into<DocumentIdentity>,
        identity_name: impl Into<String>,
        content: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            identity: identity.into(),
            identity_name: identity_name.into(),
            content: content.into(),
            local_saved_at: Utc::now(),
            remote_id: None,
        }
    }

    /// Replace the content and bump the local save time
    pub fn set_content(&mut self, content: impl Into<Vec<u8>>) {
        self.content = content.into();
        self.local_saved_at = Utc::now();
    }

    /// Bind to a remote object
    pub fn bind(&mut self, remote_id: RemoteId) {
        self.remote_id = Some(remote_id);
    }

    pub fn is_bound(&self) -> bool {
        self.remote_id.is_some()
    }

    /// Fork this snapshot into a new, unbound document
    ///
    /// The fork gets a fresh identity and a name carrying a short unique
    /// token, so a later lookup-by-name can never bind it back to the
    /// original's remote object or to another fork.
    pub fn fork(&self) -> Document {
        let identity = DocumentIdentity::generate();
        let token = &identity.as_str()[..8];
        Document {
            identity_name: fork_name(&self.identity_name, token),
            identity,
            content: self.content.clone(),
            local_saved_at: Utc::now(),
            remote_id: None,
        }
    }
}

/// Build the name of a conflict copy, keeping any file extension last
fn fork_name(name: &str, token: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => {
            format!("{} (conflict copy {}).{}", stem, token, ext)
        }
        _ => format!("{} (conflict copy {})", name, token),
    }
}

/// Remote object as returned by the remote store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub id: RemoteId,
    pub content: Vec<u8>,
    pub modified_time: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_document_is_unbound() {
        let doc = Document::new("notes.md", "hello");
        assert!(!doc.is_bound());
        assert_eq!(doc.content, b"hello");
        assert_eq!(doc.identity_name, "notes.md");
    }

    #[test]
    fn test_clone_is_independent() {
        let mut live = Document::new("notes.md", "v1");
        let snapshot = live.clone();

        live.set_content("v2");

        assert_eq!(snapshot.content, b"v1");
        assert_eq!(live.content, b"v2");
        assert!(live.local_saved_at >= snapshot.local_saved_at);
    }

    #[test]
    fn test_fork_is_unbound_with_new_identity() {
        let mut doc = Document::new("report.md", "draft");
        doc.bind(RemoteId::new("remote-1"));

        let fork = doc.fork();

        assert_ne!(fork.identity, doc.identity);
        assert!(!fork.is_bound());
        assert_eq!(fork.content, doc.content);
        assert!(fork.identity_name.starts_with("report (conflict copy "));
        assert!(fork.identity_name.ends_with(").md"));
    }

    #[test]
    fn test_forks_get_distinct_names() {
        let doc = Document::new("report.md", "draft");
        let a = doc.fork();
        let b = doc.fork();
        assert_ne!(a.identity_name, b.identity_name);
    }

    #[test]
    fn test_fork_name_without_extension() {
        assert_eq!(fork_name("journal", "abcd1234"), "journal (conflict copy abcd1234)");
        assert_eq!(fork_name(".hidden", "abcd1234"), ".hidden (conflict copy abcd1234)");
    }
}
