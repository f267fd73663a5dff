//! Durable object storage behind a narrow trait.
//!
//! The converter needs exactly two operations: put an object with a content
//! type, and delete an object. Everything else (listing, reading back,
//! metadata) is the poller's business and stays out of the trait.
//!
//! ## Backends
//!
//! 1. [`gcs`]: Google Cloud Storage JSON API over reqwest; one session
//!    (client + token) per call
//! 2. [`fs`]: `<root>/<bucket>/<path>` on a local disk, atomic writes
//! 3. [`memory`]: in-process map, inspectable by tests and dry runs

pub mod fs;
pub mod gcs;
pub mod memory;

use crate::error::StorageError;
use async_trait::async_trait;

pub use fs::FsObjectStore;
pub use gcs::GcsObjectStore;
pub use memory::{MemoryObjectStore, StoredObject};

/// A bucket-scoped object store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// The bucket (or container) this store writes into.
    fn bucket(&self) -> &str;

    /// Write `body` at `path`, replacing any existing object.
    async fn put(&self, path: &str, body: Vec<u8>, content_type: &str) -> Result<(), StorageError>;

    /// Remove the object at `path`.
    async fn delete(&self, path: &str) -> Result<(), StorageError>;
}

/// Reject paths that could escape the bucket on path-based backends.
pub(crate) fn validate_path(path: &str) -> Result<(), StorageError> {
    let bad = path.is_empty()
        || path.starts_with('/')
        || path.contains('\\')
        || path.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if bad {
        Err(StorageError::InvalidPath(path.to_string()))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_status_and_artifact_paths() {
        assert!(validate_path("v1.0.0/129AC0000000089.status").is_ok());
        assert!(validate_path("v1.0.0/a_b_c.epub").is_ok());
    }

    #[test]
    fn rejects_escaping_paths() {
        assert!(validate_path("").is_err());
        assert!(validate_path("/abs/x.epub").is_err());
        assert!(validate_path("v1/../x.epub").is_err());
        assert!(validate_path("v1//x.epub").is_err());
        assert!(validate_path("v1\\x.epub").is_err());
    }
}
