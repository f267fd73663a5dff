//! Local-disk object store: `<root>/<bucket>/<path>`.
//!
//! Writes go to a uniquely named sibling temp file that is renamed into
//! place, so a poller never sees a half-written EPUB and concurrent writers
//! to one path end with the last rename winning. Content types are not
//! persisted; the file extension carries that information on disk.

use super::{validate_path, ObjectStore};
use crate::error::StorageError;
use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// File-system backed object store.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
    bucket: String,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>, bucket: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            bucket: bucket.into(),
        }
    }

    /// Absolute location of `path` on disk.
    pub fn object_path(&self, path: &str) -> Result<PathBuf, StorageError> {
        validate_path(path)?;
        Ok(self.root.join(&self.bucket).join(path))
    }
}

fn io_err(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    fn name(&self) -> &str {
        "fs"
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put(&self, path: &str, body: Vec<u8>, content_type: &str) -> Result<(), StorageError> {
        let target = self.object_path(path)?;
        let parent = target
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| StorageError::InvalidPath(path.to_string()))?;
        tokio::fs::create_dir_all(&parent)
            .await
            .map_err(|e| io_err(&parent, e))?;

        // Atomic write: a uniquely named temp file in the same directory,
        // renamed over the target. Concurrent writers never share a temp file.
        let len = body.len();
        let dest = target.clone();
        tokio::task::spawn_blocking(move || -> Result<(), StorageError> {
            let mut tmp = NamedTempFile::new_in(&parent).map_err(|e| io_err(&parent, e))?;
            tmp.write_all(&body).map_err(|e| io_err(tmp.path(), e))?;
            tmp.persist(&dest).map_err(|e| io_err(&dest, e.error))?;
            Ok(())
        })
        .await
        .map_err(|e| io_err(&target, std::io::Error::other(e)))??;

        debug!(
            "fs put {} ({} bytes, {})",
            target.display(),
            len,
            content_type
        );
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        let target = self.object_path(path)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound {
                bucket: self.bucket.clone(),
                path: path.to_string(),
            }),
            Err(e) => Err(io_err(&target, e)),
        }
    }
}
