//! # law2epub
//!
//! Turn Japanese statutes into EPUB books and publish them to object storage.
//!
//! A conversion takes a law identifier (a law ID, law number, or revision
//! ID) plus a version label. It fetches the law's full text from the e-Gov
//! law API, runs it through an EPUB builder and stores the result at
//! `<version>/<id>.epub`. While the run is in flight a JSON status record at
//! `<version>/<id>.status` tells pollers what is happening:
//!
//! ```text
//! request ─▶ .status = PROCESSING
//!              │
//!              ├─ 1. Fetch      GET /law_data/{id}?law_full_text_format=xml
//!              ├─ 2. Extract    base64-decode law_full_text, strip wrapper tag
//!              ├─ 3. Transform  EPUB builder (with revision info for revision IDs)
//!              └─ 4. Publish    <version>/<id>.epub
//!              │
//!   success ─▶ .status deleted        failure ─▶ .status = FAILED + error text
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use law2epub::{convert, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Bucket and backend come from EPUB_BUCKET_NAME / LAW2EPUB_STORAGE
//!     let config = ConversionConfig::from_env()?;
//!     let output = convert("129AC0000000089", Some("v1.0.0"), &config).await?;
//!     eprintln!("published {} ({} bytes)", output.paths.artifact, output.stats.epub_bytes);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `cli`    | on      | Enables the `law2epub` binary (clap + anyhow + indicatif) |
//! | `server` | on      | Enables [`server`] and the `law2epub-server` binary (axum) |
//!
//! Disable both when using only the library:
//! ```toml
//! law2epub = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod publish;
pub mod request;
#[cfg(feature = "server")]
pub mod server;
pub mod status;
pub mod storage;
pub mod testing;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, StorageBackend, DEFAULT_BUCKET};
pub use convert::{convert, convert_to_file, Converter};
pub use error::{Law2EpubError, SourceError, StatusError, StorageError, TransformError};
pub use output::{ConversionOutput, ConversionStats};
pub use pipeline::source::{DocumentSource, LawApiClient, LawData};
pub use pipeline::transform::{CommandTransformer, EpubTransformer, RevisionContext};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback, Stage};
pub use publish::ArtifactPublisher;
pub use request::{is_revision_id, ConversionRequest, ObjectPaths, RevisionId, DEFAULT_VERSION};
pub use status::{ConversionStatus, StatusRecord, StatusRecorder};
pub use storage::{FsObjectStore, GcsObjectStore, MemoryObjectStore, ObjectStore, StoredObject};
