//! Directory-backed remote store
//!
//! Treats a directory (a mounted cloud drive, a network share, or a plain
//! folder) as the remote target container.
//!
//! Files per remote object:
//! - `<id>.bin` - content
//! - `<id>.json` - metadata (name, modified time)
//!
//! Writes are atomic (write to temp file, then rename) so a reader never
//! sees a partially-written object.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use uuid::Uuid;

use super::RemoteStore;
use crate::document::{RemoteFile, RemoteId};
use crate::error::{SyncError, SyncResult};

/// Metadata sidecar for a remote object
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ObjectMeta {
    name: String,
    modified_time: DateTime<Utc>,
}

/// Remote store rooted at a directory
#[derive(Debug, Clone)]
pub struct DirectoryRemote {
    root: PathBuf,
}

impl DirectoryRemote {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// A missing root means the target is not reachable (unmounted, offline)
    async fn ensure_reachable(&self) -> SyncResult<()> {
        match fs::metadata(&self.root).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(SyncError::NetworkUnavailable(format!(
                "remote target '{}' is not a directory",
                self.root.display()
            ))),
            Err(_) => Err(SyncError::NetworkUnavailable(format!(
                "remote target '{}' is not reachable",
                self.root.display()
            ))),
        }
    }

    fn content_path(&self, id: &RemoteId) -> SyncResult<PathBuf> {
        Ok(self.root.join(format!("{}.bin", checked_id(id)?)))
    }

    fn meta_path(&self, id: &RemoteId) -> SyncResult<PathBuf> {
        Ok(self.root.join(format!("{}.json", checked_id(id)?)))
    }

    async fn read_meta(&self, id: &RemoteId) -> SyncResult<ObjectMeta> {
        let path = self.meta_path(id)?;
        let bytes = fs::read(&path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => SyncError::RemoteNotFound {
                id: id.to_string(),
            },
            _ => SyncError::from_io(e, path.clone()),
        })?;
        serde_json::from_slice(&bytes)
            .map_err(|e| SyncError::Codec(format!("invalid metadata in {:?}: {}", path, e)))
    }

    async fn write_object(&self, id: &RemoteId, name: &str, content: &[u8]) -> SyncResult<()> {
        let meta = ObjectMeta {
            name: name.to_string(),
            modified_time: Utc::now(),
        };
        let meta_bytes =
            serde_json::to_vec_pretty(&meta).map_err(|e| SyncError::Codec(e.to_string()))?;

        atomic_write(&self.content_path(id)?, content).await?;
        atomic_write(&self.meta_path(id)?, &meta_bytes).await?;
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for DirectoryRemote {
    async fn get(&self, id: &RemoteId) -> SyncResult<RemoteFile> {
        self.ensure_reachable().await?;
        let meta = self.read_meta(id).await?;

        let path = self.content_path(id)?;
        let content = fs::read(&path).await.map_err(|e| SyncError::from_io(e, path))?;

        Ok(RemoteFile {
            id: id.clone(),
            content,
            modified_time: meta.modified_time,
        })
    }

    async fn create(&self, name: &str, content: &[u8]) -> SyncResult<RemoteId> {
        self.ensure_reachable().await?;
        let id = RemoteId::new(Uuid::new_v4().to_string());
        self.write_object(&id, name, content).await?;
        debug!("Created remote object {} for '{}'", id, name);
        Ok(id)
    }

    async fn update(&self, id: &RemoteId, content: &[u8]) -> SyncResult<()> {
        self.ensure_reachable().await?;
        let meta = self.read_meta(id).await?;
        self.write_object(id, &meta.name, content).await?;
        debug!("Updated remote object {}", id);
        Ok(())
    }

    async fn find_by_name(&self, name: &str) -> SyncResult<Option<RemoteId>> {
        self.ensure_reachable().await?;

        let mut entries = fs::read_dir(&self.root)
            .await
            .map_err(|e| SyncError::from_io(e, self.root.clone()))?;

        let mut matches = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SyncError::from_io(e, self.root.clone()))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let Ok(bytes) = fs::read(&path).await else {
                continue;
            };
            if let Ok(meta) = serde_json::from_slice::<ObjectMeta>(&bytes) {
                if meta.name == name {
                    matches.push(stem.to_string());
                }
            }
        }

        // Directory order is unspecified; keep lookups stable
        matches.sort();
        Ok(matches.into_iter().next().map(RemoteId::new))
    }
}

/// Reject ids that could escape the root directory
fn checked_id(id: &RemoteId) -> SyncResult<&str> {
    let s = id.as_str();
    if s.is_empty() || s.contains(['/', '\\']) || s.starts_with('.') {
        return Err(SyncError::RemoteNotFound { id: s.to_string() });
    }
    Ok(s)
}

/// Write data to a file atomically
///
/// 1. Write to a temporary file in the same directory
/// 2. Sync the file to disk
/// 3. Rename the temp file to the target path
async fn atomic_write(path: &Path, data: &[u8]) -> SyncResult<()> {
    let temp_path = path.with_extension("tmp");

    let mut file = fs::File::create(&temp_path)
        .await
        .map_err(|e| SyncError::from_io(e, temp_path.clone()))?;
    file.write_all(data)
        .await
        .map_err(|e| SyncError::from_io(e, temp_path.clone()))?;
    file.sync_all()
        .await
        .map_err(|e| SyncError::from_io(e, temp_path.clone()))?;

    fs::rename(&temp_path, path)
        .await
        .map_err(|e| SyncError::from_io(e, path.to_path_buf()))?;
    Ok(())
}
