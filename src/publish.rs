//! Artifact publishing: the finished EPUB goes to `{version}/{id}.epub`.

use crate::error::Law2EpubError;
use crate::request::EPUB_CONTENT_TYPE;
use crate::storage::ObjectStore;
use std::sync::Arc;
use tracing::info;

/// Uploads EPUB bytes. Re-publishing the same path overwrites.
#[derive(Clone)]
pub struct ArtifactPublisher {
    store: Arc<dyn ObjectStore>,
}

impl ArtifactPublisher {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    pub async fn publish(&self, path: &str, epub: &[u8]) -> Result<(), Law2EpubError> {
        self.store
            .put(path, epub.to_vec(), EPUB_CONTENT_TYPE)
            .await
            .map_err(|source| Law2EpubError::Publish {
                path: path.to_string(),
                source,
            })?;
        info!(
            "Published {} bytes to {}:{}/{}",
            epub.len(),
            self.store.name(),
            self.store.bucket(),
            path
        );
        Ok(())
    }
}
