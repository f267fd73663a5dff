//! In-memory collaborators for exercising the converter without a network,
//! an EPUB builder, or a cloud bucket.
//!
//! ```rust
//! use law2epub::testing::{MockDocumentSource, MockTransformer};
//! use law2epub::{Converter, MemoryObjectStore};
//! use std::sync::Arc;
//!
//! let source = Arc::new(MockDocumentSource::new().with_law("129AC0000000089", "<Law/>"));
//! let store = Arc::new(MemoryObjectStore::new("test"));
//! let converter = Converter::new(source, Arc::new(MockTransformer::new()), store);
//! ```

use crate::error::{SourceError, StorageError, TransformError};
use crate::pipeline::source::{DocumentSource, LawData};
use crate::pipeline::transform::{EpubTransformer, RevisionContext};
use crate::storage::{MemoryObjectStore, ObjectStore};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

type FetchHook = Box<dyn Fn(&str) + Send + Sync>;

/// A [`DocumentSource`] answering from a fixed table.
///
/// Unknown IDs answer HTTP 404.
#[derive(Default)]
pub struct MockDocumentSource {
    laws: HashMap<String, Result<LawData, u16>>,
    revisions: HashMap<String, serde_json::Value>,
    calls: Mutex<Vec<String>>,
    on_fetch: Option<FetchHook>,
}

impl MockDocumentSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `xml` (base64-encoded, as the real API does) for `id`.
    pub fn with_law(self, id: &str, xml: &str) -> Self {
        self.with_response(id, LawData::from_full_text(STANDARD.encode(xml)))
    }

    /// Serve a raw response for `id`.
    pub fn with_response(mut self, id: &str, data: LawData) -> Self {
        self.laws.insert(id.to_string(), Ok(data));
        self
    }

    /// Answer `id` with an HTTP error status.
    pub fn with_error(mut self, id: &str, status: u16) -> Self {
        self.laws.insert(id.to_string(), Err(status));
        self
    }

    /// Serve a `law_revisions` document for `law_id`.
    pub fn with_revisions(mut self, law_id: &str, revisions: serde_json::Value) -> Self {
        self.revisions.insert(law_id.to_string(), revisions);
        self
    }

    /// Run `hook` at the start of every `fetch_law_data` call.
    pub fn on_fetch(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_fetch = Some(Box::new(hook));
        self
    }

    /// IDs passed to `fetch_law_data`, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

fn not_found(url: String, status: u16) -> SourceError {
    SourceError::Status {
        url,
        status,
        body: Some("mock: no such law".into()),
    }
}

#[async_trait]
impl DocumentSource for MockDocumentSource {
    async fn fetch_law_data(&self, id: &str) -> Result<LawData, SourceError> {
        if let Some(ref hook) = self.on_fetch {
            hook(id);
        }
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(id.to_string());
        match self.laws.get(id) {
            Some(Ok(data)) => Ok(data.clone()),
            Some(Err(status)) => Err(not_found(format!("mock://law_data/{id}"), *status)),
            None => Err(not_found(format!("mock://law_data/{id}"), 404)),
        }
    }

    async fn fetch_law_revisions(&self, law_id: &str) -> Result<serde_json::Value, SourceError> {
        self.revisions
            .get(law_id)
            .cloned()
            .ok_or_else(|| not_found(format!("mock://law_revisions/{law_id}"), 404))
    }
}

/// An [`EpubTransformer`] returning `EPUB:` + the content, deterministically.
#[derive(Default)]
pub struct MockTransformer {
    failure: Option<String>,
    seen_revisions: Mutex<Vec<Option<String>>>,
}

impl MockTransformer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transformer that rejects every document with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::default()
        }
    }

    /// Revision IDs received, one entry per call (`None` for plain laws).
    pub fn seen_revisions(&self) -> Vec<Option<String>> {
        self.seen_revisions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// The bytes this transformer produces for `content`.
    pub fn expected_output(content: &[u8]) -> Vec<u8> {
        let mut out = b"EPUB:".to_vec();
        out.extend_from_slice(content);
        out
    }
}

#[async_trait]
impl EpubTransformer for MockTransformer {
    fn name(&self) -> &str {
        "mock"
    }

    async fn transform(
        &self,
        content: &[u8],
        revision: Option<RevisionContext>,
    ) -> Result<Vec<u8>, TransformError> {
        self.seen_revisions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(revision.map(|r| r.revision_id.to_string()));
        match self.failure {
            Some(ref msg) => Err(TransformError::Rejected(msg.clone())),
            None => Ok(Self::expected_output(content)),
        }
    }
}

/// A [`MemoryObjectStore`] that can be told to fail.
pub struct FailingStore {
    inner: Arc<MemoryObjectStore>,
    failing_suffixes: Mutex<Vec<String>>,
    fail_deletes: AtomicBool,
    put_log: Mutex<Vec<String>>,
}

impl FailingStore {
    pub fn new(inner: Arc<MemoryObjectStore>) -> Self {
        Self {
            inner,
            failing_suffixes: Mutex::new(Vec::new()),
            fail_deletes: AtomicBool::new(false),
            put_log: Mutex::new(Vec::new()),
        }
    }

    /// Make every `put` to a path ending with `suffix` fail.
    pub fn fail_puts_ending_with(&self, suffix: &str) {
        self.failing_suffixes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(suffix.to_string());
    }

    /// Make every `delete` fail.
    pub fn fail_deletes(&self) {
        self.fail_deletes.store(true, Ordering::SeqCst);
    }

    /// Every attempted `put` path, including failed ones.
    pub fn put_log(&self) -> Vec<String> {
        self.put_log.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn inner(&self) -> &MemoryObjectStore {
        &self.inner
    }

    fn injected(path: &str) -> StorageError {
        StorageError::Backend {
            path: path.to_string(),
            status: 503,
            detail: "injected failure".into(),
        }
    }
}

#[async_trait]
impl ObjectStore for FailingStore {
    fn name(&self) -> &str {
        "failing-memory"
    }

    fn bucket(&self) -> &str {
        self.inner.bucket()
    }

    async fn put(&self, path: &str, body: Vec<u8>, content_type: &str) -> Result<(), StorageError> {
        self.put_log
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(path.to_string());
        let fails = self
            .failing_suffixes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .any(|s| path.ends_with(s.as_str()));
        if fails {
            return Err(Self::injected(path));
        }
        self.inner.put(path, body, content_type).await
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(Self::injected(path));
        }
        self.inner.delete(path).await
    }
}
