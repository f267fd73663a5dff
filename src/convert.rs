//! The conversion orchestrator.
//!
//! [`Converter::run`] is the one place that knows the order of operations:
//!
//! ```text
//! status = PROCESSING ─▶ fetch ─▶ extract ─▶ transform ─▶ publish ─▶ delete status
//!                          │         │           │           │
//!                          └─────────┴───────────┴───────────┴──▶ status = FAILED, Err
//! ```
//!
//! Status writes are best-effort: their results go through
//! [`log_status_result`] and are never propagated. Everything else is a
//! single attempt; a failure leaves a FAILED record for pollers and returns
//! the error to the caller, who decides whether to re-invoke.

use crate::config::{ConversionConfig, StorageBackend};
use crate::error::{Law2EpubError, StatusError};
use crate::output::{ConversionOutput, ConversionStats};
use crate::pipeline::extract::extract_content;
use crate::pipeline::source::{DocumentSource, LawApiClient};
use crate::pipeline::transform::{CommandTransformer, EpubTransformer, RevisionContext};
use crate::progress::{ProgressCallback, Stage};
use crate::publish::ArtifactPublisher;
use crate::request::{ConversionRequest, ObjectPaths, DEFAULT_VERSION};
use crate::status::StatusRecorder;
use crate::storage::{FsObjectStore, GcsObjectStore, MemoryObjectStore, ObjectStore};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tempfile::NamedTempFile;
use tracing::{debug, error, info, warn};

/// Sequences the three collaborators and the status record.
///
/// Cheap to share: every field is an `Arc` or a small string, and a run
/// holds no state between calls.
#[derive(Clone)]
pub struct Converter {
    source: Arc<dyn DocumentSource>,
    transformer: Arc<dyn EpubTransformer>,
    store: Arc<dyn ObjectStore>,
    status: StatusRecorder,
    publisher: ArtifactPublisher,
    default_version: String,
    progress: Option<ProgressCallback>,
}

impl Converter {
    pub fn new(
        source: Arc<dyn DocumentSource>,
        transformer: Arc<dyn EpubTransformer>,
        store: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            status: StatusRecorder::new(Arc::clone(&store)),
            publisher: ArtifactPublisher::new(Arc::clone(&store)),
            source,
            transformer,
            store,
            default_version: DEFAULT_VERSION.to_string(),
            progress: None,
        }
    }

    /// Wire up the real collaborators described by `config`.
    pub fn from_config(config: &ConversionConfig) -> Result<Self, Law2EpubError> {
        let source = LawApiClient::new(&config.api_base_url, config.api_timeout_secs)
            .map_err(|e| Law2EpubError::InvalidConfig(e.to_string()))?;

        let transformer = CommandTransformer::new(&config.transformer_program)
            .with_leading_args(config.transformer_args.iter().cloned());

        let store: Arc<dyn ObjectStore> = match config.storage {
            StorageBackend::Gcs => Arc::new(GcsObjectStore::new(&config.bucket)),
            StorageBackend::Filesystem => {
                Arc::new(FsObjectStore::new(&config.storage_root, &config.bucket))
            }
            StorageBackend::Memory => Arc::new(MemoryObjectStore::new(&config.bucket)),
        };
        info!(
            "Storage: {} bucket '{}', law API: {}, EPUB builder: {} ({})",
            store.name(),
            store.bucket(),
            source.base_url(),
            transformer.name(),
            transformer.program().display()
        );

        let mut converter = Self::new(Arc::new(source), Arc::new(transformer), store)
            .with_default_version(&config.default_version);
        if let Some(ref cb) = config.progress_callback {
            converter = converter.with_progress(Arc::clone(cb));
        }
        Ok(converter)
    }

    pub fn with_default_version(mut self, version: impl Into<String>) -> Self {
        self.default_version = version.into();
        self
    }

    pub fn with_progress(mut self, cb: ProgressCallback) -> Self {
        self.progress = Some(cb);
        self
    }

    pub fn default_version(&self) -> &str {
        &self.default_version
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// A request for `document_id`, using this converter's default version
    /// when `version` is `None` or blank.
    pub fn request(&self, document_id: &str, version: Option<&str>) -> ConversionRequest {
        match version {
            Some(v) if !v.trim().is_empty() => ConversionRequest::new(document_id, v),
            _ => ConversionRequest::new(document_id, self.default_version.as_str()),
        }
    }

    /// Run one conversion to its terminal outcome.
    ///
    /// # Errors
    /// Any fetch, extraction, transform, or publish failure. By the time the
    /// error is returned a FAILED status record has been written (unless
    /// that write itself failed, which is only logged).
    pub async fn run(&self, request: &ConversionRequest) -> Result<ConversionOutput, Law2EpubError> {
        let total_start = Instant::now();
        let id = request.document_id.as_str();
        let paths = request.paths();
        info!("Starting conversion: {} (version {})", id, request.version);

        // ── Step 1: PROCESSING ───────────────────────────────────────────────
        log_status_result(self.status.mark_processing(&paths.status).await);
        if let Some(ref cb) = self.progress {
            cb.on_conversion_start(id);
        }

        // ── Steps 2-4: fetch, extract, transform, publish ──────────────────
        let mut stats = ConversionStats::default();
        match self.produce(request, &paths, &mut stats).await {
            Ok((epub, title)) => {
                // ── Success: drop the status record ──────────────────────────
                log_status_result(self.status.clear(&paths.status).await);

                stats.epub_bytes = epub.len();
                stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
                info!(
                    "Successfully converted law ID {} to EPUB ({} bytes, {}ms)",
                    id, stats.epub_bytes, stats.total_duration_ms
                );
                if let Some(ref cb) = self.progress {
                    cb.on_conversion_complete(&paths.artifact, epub.len());
                }

                Ok(ConversionOutput {
                    document_id: request.document_id.clone(),
                    version: request.version.clone(),
                    revision: request.revision().is_some(),
                    title,
                    paths,
                    epub,
                    stats,
                })
            }
            Err((stage, err)) => {
                // ── Step 5: FAILED ───────────────────────────────────────────
                error!("Failed to generate EPUB for {} during {}: {}", id, stage, err);
                let message = err.to_string();
                log_status_result(self.status.mark_failed(&paths.status, &message).await);
                if let Some(ref cb) = self.progress {
                    cb.on_conversion_failed(stage, &message);
                }
                Err(err)
            }
        }
    }

    /// [`run`](Self::run), then also write the EPUB to `path`.
    ///
    /// A local write failure is reported as [`Law2EpubError::Internal`]; the
    /// published artifact and status record are unaffected by it.
    pub async fn run_to_file(
        &self,
        request: &ConversionRequest,
        path: &Path,
    ) -> Result<ConversionOutput, Law2EpubError> {
        let output = self.run(request).await?;
        write_local_copy(path, &output.epub).await?;
        info!("Wrote local copy to {}", path.display());
        Ok(output)
    }

    /// Steps 2-4. Returns the published EPUB and the law title, or the
    /// failing stage with its error.
    async fn produce(
        &self,
        request: &ConversionRequest,
        paths: &ObjectPaths,
        stats: &mut ConversionStats,
    ) -> Result<(Vec<u8>, Option<String>), (Stage, Law2EpubError)> {
        let id = request.document_id.as_str();

        // ── Fetch ────────────────────────────────────────────────────────────
        self.stage_start(Stage::Fetch);
        let started = Instant::now();
        let law_data = self
            .source
            .fetch_law_data(id)
            .await
            .map_err(|source| {
                (
                    Stage::Fetch,
                    Law2EpubError::Fetch {
                        id: id.to_string(),
                        source,
                    },
                )
            })?;
        stats.fetch_duration_ms = started.elapsed().as_millis() as u64;
        self.stage_complete(Stage::Fetch, stats.fetch_duration_ms);

        // ── Extract ──────────────────────────────────────────────────────────
        self.stage_start(Stage::Extract);
        let started = Instant::now();
        let xml = extract_content(&law_data, id).map_err(|e| (Stage::Extract, e))?;
        stats.xml_bytes = xml.len();
        self.stage_complete(Stage::Extract, started.elapsed().as_millis() as u64);

        // ── Transform ────────────────────────────────────────────────────────
        let revision = request.revision().map(|revision_id| RevisionContext {
            revision_id,
            source: Arc::clone(&self.source),
        });
        match revision {
            Some(ref ctx) => debug!("{} is a revision ID; transforming with revision context", ctx.revision_id),
            None => debug!("{} is not a revision ID", id),
        }

        self.stage_start(Stage::Transform);
        debug!("Transforming {} with the {} builder", id, self.transformer.name());
        let started = Instant::now();
        let epub = self
            .transformer
            .transform(&xml, revision)
            .await
            .map_err(|source| {
                (
                    Stage::Transform,
                    Law2EpubError::Transform {
                        id: id.to_string(),
                        source,
                    },
                )
            })?;
        stats.transform_duration_ms = started.elapsed().as_millis() as u64;
        self.stage_complete(Stage::Transform, stats.transform_duration_ms);

        // ── Publish ──────────────────────────────────────────────────────────
        self.stage_start(Stage::Publish);
        let started = Instant::now();
        self.publisher
            .publish(&paths.artifact, &epub)
            .await
            .map_err(|e| (Stage::Publish, e))?;
        stats.publish_duration_ms = started.elapsed().as_millis() as u64;
        self.stage_complete(Stage::Publish, stats.publish_duration_ms);

        Ok((epub, law_data.title().map(str::to_string)))
    }

    fn stage_start(&self, stage: Stage) {
        if let Some(ref cb) = self.progress {
            cb.on_stage_start(stage);
        }
    }

    fn stage_complete(&self, stage: Stage, elapsed_ms: u64) {
        debug!("{} finished in {}ms", stage, elapsed_ms);
        if let Some(ref cb) = self.progress {
            cb.on_stage_complete(stage, elapsed_ms);
        }
    }
}

/// Log a best-effort status operation and drop its result.
pub fn log_status_result(result: Result<(), StatusError>) {
    if let Err(e) = result {
        warn!("{}", e);
    }
}

/// Convert `document_id` with collaborators built from `config`.
///
/// This is the primary entry point for the library.
pub async fn convert(
    document_id: impl AsRef<str>,
    version: Option<&str>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Law2EpubError> {
    let converter = Converter::from_config(config)?;
    let request = converter.request(document_id.as_ref(), version);
    converter.run(&request).await
}

/// Convert, then also write the EPUB to a local file.
///
/// See [`Converter::run_to_file`].
pub async fn convert_to_file(
    document_id: impl AsRef<str>,
    version: Option<&str>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Law2EpubError> {
    let converter = Converter::from_config(config)?;
    let request = converter.request(document_id.as_ref(), version);
    converter.run_to_file(&request, output_path.as_ref()).await
}

fn local_err(path: &Path, e: std::io::Error) -> Law2EpubError {
    Law2EpubError::Internal(format!("writing '{}': {}", path.display(), e))
}

/// Atomically write `epub` to `path`.
///
/// The bytes go to a uniquely named temp file beside `path`, which is then
/// renamed over it.
pub async fn write_local_copy(path: &Path, epub: &[u8]) -> Result<(), Law2EpubError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| local_err(path, e))?;

    let target = path.to_path_buf();
    let body = epub.to_vec();
    tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(&body)?;
        tmp.persist(&target).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(|e| Law2EpubError::Internal(format!("local write task failed: {}", e)))?
    .map_err(|e| local_err(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::{ConversionStatus, StatusRecord};
    use crate::testing::{MockDocumentSource, MockTransformer};
    use std::sync::Mutex;

    #[derive(Default)]
    struct StageLog(Mutex<Vec<String>>);

    impl crate::progress::ConversionProgressCallback for StageLog {
        fn on_stage_start(&self, stage: Stage) {
            self.0.lock().unwrap().push(format!("start:{stage}"));
        }
        fn on_conversion_complete(&self, artifact_path: &str, _epub_bytes: usize) {
            self.0.lock().unwrap().push(format!("done:{artifact_path}"));
        }
        fn on_conversion_failed(&self, stage: Stage, _error: &str) {
            self.0.lock().unwrap().push(format!("failed:{stage}"));
        }
    }

    fn converter(
        source: MockDocumentSource,
        transformer: MockTransformer,
    ) -> (Converter, Arc<MemoryObjectStore>) {
        let store = Arc::new(MemoryObjectStore::new("test"));
        let c = Converter::new(Arc::new(source), Arc::new(transformer), store.clone());
        (c, store)
    }

    #[tokio::test]
    async fn success_publishes_and_clears_status() {
        let (c, store) = converter(
            MockDocumentSource::new().with_law("abc", "<TmpRootTag><Law/></TmpRootTag>"),
            MockTransformer::new(),
        );
        let out = c.run(&c.request("abc", None)).await.unwrap();

        assert_eq!(out.epub, MockTransformer::expected_output(b"<Law/>"));
        assert_eq!(out.paths.artifact, "v1.0.0/abc.epub");
        assert_eq!(out.stats.xml_bytes, 6);
        assert!(!out.revision);
        assert_eq!(store.keys(), vec!["v1.0.0/abc.epub".to_string()]);
    }

    #[tokio::test]
    async fn fetch_failure_records_failed_status() {
        let (c, store) = converter(MockDocumentSource::new(), MockTransformer::new());
        let err = c.run(&c.request("missing", Some("v2"))).await.unwrap_err();
        assert!(matches!(err, Law2EpubError::Fetch { .. }));

        let rec: StatusRecord =
            serde_json::from_slice(&store.get("v2/missing.status").unwrap().body).unwrap();
        assert_eq!(rec.status, ConversionStatus::Failed);
        assert!(rec.error.unwrap().contains("404"));
        assert!(!store.contains("v2/missing.epub"));
    }

    #[tokio::test]
    async fn progress_sees_stages_in_order() {
        let log = Arc::new(StageLog::default());
        let (c, _) = converter(
            MockDocumentSource::new().with_law("abc", "<Law/>"),
            MockTransformer::new(),
        );
        let c = c.with_progress(log.clone());
        c.run(&c.request("abc", None)).await.unwrap();
        assert_eq!(
            *log.0.lock().unwrap(),
            vec![
                "start:fetch",
                "start:extract",
                "start:transform",
                "start:publish",
                "done:v1.0.0/abc.epub"
            ]
        );
    }

    #[tokio::test]
    async fn progress_reports_failing_stage() {
        let log = Arc::new(StageLog::default());
        let (c, _) = converter(
            MockDocumentSource::new().with_law("abc", "<Law/>"),
            MockTransformer::failing("no"),
        );
        let c = c.with_progress(log.clone());
        assert!(c.run(&c.request("abc", None)).await.is_err());
        assert_eq!(
            log.0.lock().unwrap().last().map(String::as_str),
            Some("failed:transform")
        );
    }

    #[test]
    fn request_uses_default_version_for_blank() {
        let (c, _) = converter(MockDocumentSource::new(), MockTransformer::new());
        let c = c.with_default_version("v9");
        assert_eq!(c.request("x", None).version, "v9");
        assert_eq!(c.request("x", Some("  ")).version, "v9");
        assert_eq!(c.request("x", Some("v3")).version, "v3");
    }

    #[tokio::test]
    async fn write_local_copy_leaves_only_the_target() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("out/abc.epub");
        write_local_copy(&path, b"old").await.unwrap();
        write_local_copy(&path, b"epub").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"epub");
        let entries: Vec<_> = std::fs::read_dir(dir.path().join("out"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("abc.epub")]);
    }

    #[tokio::test]
    async fn run_to_file_publishes_and_writes_local_copy() {
        let (c, store) = converter(
            MockDocumentSource::new().with_law("abc", "<Law/>"),
            MockTransformer::new(),
        );
        let dir = tempfile::TempDir::new().unwrap();
        let local = dir.path().join("abc.epub");

        let out = c.run_to_file(&c.request("abc", None), &local).await.unwrap();

        assert_eq!(std::fs::read(&local).unwrap(), out.epub);
        assert_eq!(store.get("v1.0.0/abc.epub").unwrap().body, out.epub);
    }

    #[tokio::test]
    async fn run_to_file_local_write_failure_keeps_published_artifact() {
        let (c, store) = converter(
            MockDocumentSource::new().with_law("abc", "<Law/>"),
            MockTransformer::new(),
        );
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("blocker"), b"").unwrap();
        let local = dir.path().join("blocker/abc.epub");

        let err = c.run_to_file(&c.request("abc", None), &local).await.unwrap_err();

        assert!(matches!(err, Law2EpubError::Internal(_)), "got {err:?}");
        assert!(store.contains("v1.0.0/abc.epub"));
        assert!(!store.contains("v1.0.0/abc.status"));
    }

    #[tokio::test]
    async fn run_to_file_skips_local_write_on_failure() {
        let (c, _) = converter(MockDocumentSource::new(), MockTransformer::new());
        let dir = tempfile::TempDir::new().unwrap();
        let local = dir.path().join("abc.epub");

        assert!(c.run_to_file(&c.request("abc", None), &local).await.is_err());
        assert!(!local.exists());
    }

    /// Answer every request on an ephemeral local port with `body` as JSON.
    async fn serve_json(body: String) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut sock, _)) = listener.accept().await {
                let body = body.clone();
                tokio::spawn(async move {
                    let mut buf = [0u8; 4096];
                    let mut head = Vec::new();
                    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                        match sock.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => head.extend_from_slice(&buf[..n]),
                        }
                    }
                    let response = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\
                         Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    );
                    let _ = sock.write_all(response.as_bytes()).await;
                    let _ = sock.shutdown().await;
                });
            }
        });
        format!("http://{addr}")
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn convert_to_file_runs_configured_collaborators() {
        use base64::{engine::general_purpose::STANDARD, Engine as _};

        let full_text = STANDARD.encode(b"<TmpRootTag><Law/></TmpRootTag>");
        let base_url = serve_json(serde_json::json!({ "law_full_text": full_text }).to_string()).await;
        let dir = tempfile::TempDir::new().unwrap();
        // The builder is called as `-o OUT IN`; copy IN to OUT.
        let config = ConversionConfig::builder()
            .storage(StorageBackend::Filesystem)
            .storage_root(dir.path().join("store"))
            .bucket("b")
            .api_base_url(base_url)
            .transformer_program("sh")
            .transformer_args(vec![
                "-c".to_string(),
                r#"cp "$3" "$2""#.to_string(),
                "builder".to_string(),
            ])
            .build()
            .unwrap();
        let local = dir.path().join("out/abc.epub");

        let out = convert_to_file("abc", Some("v2"), &local, &config)
            .await
            .unwrap();

        assert_eq!(out.epub, b"<Law/>");
        assert_eq!(out.paths.artifact, "v2/abc.epub");
        assert_eq!(std::fs::read(&local).unwrap(), b"<Law/>");
        assert_eq!(
            std::fs::read(dir.path().join("store/b/v2/abc.epub")).unwrap(),
            b"<Law/>"
        );
        assert!(!dir.path().join("store/b/v2/abc.status").exists());
    }

    #[test]
    fn from_config_builds_memory_backend() {
        let config = ConversionConfig::builder()
            .storage(StorageBackend::Memory)
            .bucket("dry-run")
            .default_version("v7")
            .build()
            .unwrap();
        let c = Converter::from_config(&config).unwrap();
        assert_eq!(c.store().name(), "memory");
        assert_eq!(c.store().bucket(), "dry-run");
        assert_eq!(c.default_version(), "v7");
    }
}
