//! Configuration types for law-to-EPUB conversion.
//!
//! All wiring decisions (which bucket, which storage backend, where the law
//! API lives, which EPUB builder to run) are made through
//! [`ConversionConfig`], built via its [`ConversionConfigBuilder`] or read
//! from the environment with [`ConversionConfig::from_env`]. Both entry
//! points (CLI and HTTP handler) construct the same struct, which is what
//! keeps their orchestration identical.

use crate::error::Law2EpubError;
use crate::pipeline::source::DEFAULT_API_BASE_URL;
use crate::pipeline::transform::DEFAULT_TRANSFORMER_PROGRAM;
use crate::progress::ProgressCallback;
use crate::request::DEFAULT_VERSION;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Bucket used when neither `EPUB_BUCKET_NAME` nor an override is given.
pub const DEFAULT_BUCKET: &str = "epub-storage";

/// Configuration for a conversion service.
///
/// # Example
/// ```rust
/// use law2epub::{ConversionConfig, StorageBackend};
///
/// let config = ConversionConfig::builder()
///     .bucket("my-epubs")
///     .storage(StorageBackend::Filesystem)
///     .storage_root("/var/lib/law2epub")
///     .build()
///     .unwrap();
/// assert_eq!(config.bucket, "my-epubs");
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Bucket (GCS) or top-level directory (filesystem) holding status
    /// records and artifacts. Default: `epub-storage`.
    pub bucket: String,

    /// Version prefix used when a request names none. Default: `v1.0.0`.
    pub default_version: String,

    /// Object-store backend. Default: [`StorageBackend::Gcs`].
    pub storage: StorageBackend,

    /// Root directory for [`StorageBackend::Filesystem`]. Default: `./storage`.
    pub storage_root: PathBuf,

    /// e-Gov law API v2 base URL.
    pub api_base_url: String,

    /// Overall timeout per law API request. Default: none; the run inherits
    /// whatever deadline its caller has.
    pub api_timeout_secs: Option<u64>,

    /// EPUB builder executable. Default: `jplaw2epub` on `PATH`.
    pub transformer_program: PathBuf,

    /// Arguments placed before the builder's own arguments.
    pub transformer_args: Vec<String>,

    /// Stage-event observer. Default: none.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            bucket: DEFAULT_BUCKET.to_string(),
            default_version: DEFAULT_VERSION.to_string(),
            storage: StorageBackend::default(),
            storage_root: PathBuf::from("storage"),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            api_timeout_secs: None,
            transformer_program: PathBuf::from(DEFAULT_TRANSFORMER_PROGRAM),
            transformer_args: Vec::new(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("bucket", &self.bucket)
            .field("default_version", &self.default_version)
            .field("storage", &self.storage)
            .field("storage_root", &self.storage_root)
            .field("api_base_url", &self.api_base_url)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("transformer_program", &self.transformer_program)
            .field("transformer_args", &self.transformer_args)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Defaults overlaid with the process environment:
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `EPUB_BUCKET_NAME` | `bucket` |
    /// | `LAW2EPUB_VERSION` | `default_version` |
    /// | `LAW2EPUB_STORAGE` | `storage` (`gcs`, `fs`, `memory`) |
    /// | `LAW2EPUB_STORAGE_ROOT` | `storage_root` |
    /// | `LAW2EPUB_API_URL` | `api_base_url` |
    /// | `LAW2EPUB_API_TIMEOUT` | `api_timeout_secs` |
    /// | `LAW2EPUB_TRANSFORMER` | `transformer_program` |
    ///
    /// Empty values are treated as unset.
    pub fn from_env() -> Result<Self, Law2EpubError> {
        Self::builder().env_overrides(|k| std::env::var(k).ok())?.build()
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.config.bucket = bucket.into();
        self
    }

    pub fn default_version(mut self, version: impl Into<String>) -> Self {
        self.config.default_version = version.into();
        self
    }

    pub fn storage(mut self, backend: StorageBackend) -> Self {
        self.config.storage = backend;
        self
    }

    pub fn storage_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.storage_root = root.into();
        self
    }

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_base_url = url.into();
        self
    }

    pub fn api_timeout_secs(mut self, secs: Option<u64>) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn transformer_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.config.transformer_program = program.into();
        self
    }

    pub fn transformer_args(mut self, args: Vec<String>) -> Self {
        self.config.transformer_args = args;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Apply environment overrides read through `lookup`.
    pub fn env_overrides<F>(mut self, lookup: F) -> Result<Self, Law2EpubError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| lookup(k).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("EPUB_BUCKET_NAME") {
            self = self.bucket(v);
        }
        if let Some(v) = get("LAW2EPUB_VERSION") {
            self = self.default_version(v);
        }
        if let Some(v) = get("LAW2EPUB_STORAGE") {
            self = self.storage(v.parse()?);
        }
        if let Some(v) = get("LAW2EPUB_STORAGE_ROOT") {
            self = self.storage_root(v);
        }
        if let Some(v) = get("LAW2EPUB_API_URL") {
            self = self.api_base_url(v);
        }
        if let Some(v) = get("LAW2EPUB_API_TIMEOUT") {
            let secs = v.trim().parse::<u64>().map_err(|_| {
                Law2EpubError::InvalidConfig(format!(
                    "LAW2EPUB_API_TIMEOUT must be a number of seconds, got '{v}'"
                ))
            })?;
            self = self.api_timeout_secs(Some(secs));
        }
        if let Some(v) = get("LAW2EPUB_TRANSFORMER") {
            self = self.transformer_program(v);
        }
        Ok(self)
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Law2EpubError> {
        let c = &self.config;
        if c.bucket.trim().is_empty() || c.bucket.contains('/') {
            return Err(Law2EpubError::InvalidConfig(format!(
                "bucket name must be non-empty and contain no '/', got '{}'",
                c.bucket
            )));
        }
        if c.default_version.trim().is_empty() || c.default_version.contains('/') {
            return Err(Law2EpubError::InvalidConfig(format!(
                "default version must be non-empty and contain no '/', got '{}'",
                c.default_version
            )));
        }
        if !c.api_base_url.starts_with("http://") && !c.api_base_url.starts_with("https://") {
            return Err(Law2EpubError::InvalidConfig(format!(
                "law API URL must be http(s), got '{}'",
                c.api_base_url
            )));
        }
        if c.api_timeout_secs == Some(0) {
            return Err(Law2EpubError::InvalidConfig(
                "law API timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Where status records and artifacts are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Google Cloud Storage (default). Honours `STORAGE_EMULATOR_HOST`.
    #[default]
    Gcs,
    /// `<storage_root>/<bucket>/…` on local disk.
    Filesystem,
    /// In-process only; everything is gone when the process exits.
    Memory,
}

impl FromStr for StorageBackend {
    type Err = Law2EpubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gcs" | "gs" => Ok(StorageBackend::Gcs),
            "fs" | "filesystem" | "file" => Ok(StorageBackend::Filesystem),
            "memory" | "mem" => Ok(StorageBackend::Memory),
            other => Err(Law2EpubError::InvalidConfig(format!(
                "unknown storage backend '{other}' (expected gcs, fs or memory)"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults() {
        let c = ConversionConfig::default();
        assert_eq!(c.bucket, "epub-storage");
        assert_eq!(c.default_version, "v1.0.0");
        assert_eq!(c.storage, StorageBackend::Gcs);
        assert_eq!(c.api_timeout_secs, None);
        assert_eq!(c.transformer_program, PathBuf::from("jplaw2epub"));
    }

    #[test]
    fn env_overrides_apply() {
        let c = ConversionConfig::builder()
            .env_overrides(lookup(&[
                ("EPUB_BUCKET_NAME", "laws"),
                ("LAW2EPUB_STORAGE", "fs"),
                ("LAW2EPUB_STORAGE_ROOT", "/srv/epub"),
                ("LAW2EPUB_API_TIMEOUT", "30"),
            ]))
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(c.bucket, "laws");
        assert_eq!(c.storage, StorageBackend::Filesystem);
        assert_eq!(c.storage_root, PathBuf::from("/srv/epub"));
        assert_eq!(c.api_timeout_secs, Some(30));
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let c = ConversionConfig::builder()
            .env_overrides(lookup(&[("EPUB_BUCKET_NAME", "")]))
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(c.bucket, DEFAULT_BUCKET);
    }

    #[test]
    fn bad_env_values_are_config_errors() {
        let err = ConversionConfig::builder()
            .env_overrides(lookup(&[("LAW2EPUB_STORAGE", "s3")]))
            .unwrap_err();
        assert!(matches!(err, Law2EpubError::InvalidConfig(_)));

        let err = ConversionConfig::builder()
            .env_overrides(lookup(&[("LAW2EPUB_API_TIMEOUT", "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains("LAW2EPUB_API_TIMEOUT"));
    }

    #[test]
    fn build_rejects_bad_values() {
        assert!(ConversionConfig::builder().bucket("").build().is_err());
        assert!(ConversionConfig::builder().bucket("a/b").build().is_err());
        assert!(ConversionConfig::builder().default_version("").build().is_err());
        assert!(ConversionConfig::builder().api_base_url("ftp://x").build().is_err());
        assert!(ConversionConfig::builder().api_timeout_secs(Some(0)).build().is_err());
    }

    #[test]
    fn storage_backend_parsing() {
        assert_eq!("GCS".parse::<StorageBackend>().unwrap(), StorageBackend::Gcs);
        assert_eq!("filesystem".parse::<StorageBackend>().unwrap(), StorageBackend::Filesystem);
        assert_eq!("memory".parse::<StorageBackend>().unwrap(), StorageBackend::Memory);
        assert!("s3".parse::<StorageBackend>().is_err());
    }
}
