//! Error types for the law2epub library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Law2EpubError`]: **fatal**, the conversion run cannot produce an
//!   artifact (the law API rejected the identifier, the content could not be
//!   decoded, the transformer or the artifact upload failed). Returned as
//!   `Err(Law2EpubError)` from [`crate::convert::Converter::run`] after the
//!   failure has been recorded in the status object.
//!
//! * [`StatusError`]: **non-fatal**, writing or deleting the status record
//!   failed. Status tracking is best-effort, so these are logged by the
//!   orchestrator and then dropped. They never replace the outcome of a run.
//!
//! The collaborator errors ([`SourceError`], [`TransformError`],
//! [`StorageError`]) are what the trait implementations in
//! [`crate::pipeline`] and [`crate::storage`] return; the orchestrator wraps
//! them into the matching [`Law2EpubError`] variant.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by a conversion run.
#[derive(Debug, Error)]
pub enum Law2EpubError {
    // ── Fetch errors ──────────────────────────────────────────────────────
    /// The law API was unreachable or rejected the identifier.
    #[error("error fetching law data for '{id}': {source}")]
    Fetch {
        id: String,
        #[source]
        source: SourceError,
    },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// The API response carried no `law_full_text` field.
    #[error("no law content in response for '{id}'")]
    ContentMissing { id: String },

    /// `law_full_text` was present but not a base64 string.
    #[error("invalid XML format in response for '{id}': expected a string, got {found}")]
    FormatMismatch { id: String, found: &'static str },

    /// `law_full_text` was not valid standard base64.
    #[error("error decoding XML content for '{id}': {detail}")]
    Decode { id: String, detail: String },

    // ── Transform errors ──────────────────────────────────────────────────
    /// The EPUB transformer rejected the content.
    #[error("error creating EPUB for '{id}': {source}")]
    Transform {
        id: String,
        #[source]
        source: TransformError,
    },

    // ── Publish errors ────────────────────────────────────────────────────
    /// Writing the finished artifact to the object store failed.
    #[error("failed to upload EPUB to '{path}': {source}")]
    Publish {
        path: String,
        #[source]
        source: StorageError,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Law2EpubError {
    /// True when the failure happened while writing the artifact rather than
    /// while producing it. The HTTP handler uses this to pick its message.
    pub fn is_publish(&self) -> bool {
        matches!(self, Law2EpubError::Publish { .. })
    }
}

/// A non-fatal error from the status recorder.
///
/// Logged and discarded by the orchestrator.
#[derive(Debug, Error)]
pub enum StatusError {
    /// The status record could not be serialised or uploaded.
    #[error("failed to write status '{status}' to '{path}': {detail}")]
    Write {
        path: String,
        status: String,
        detail: String,
    },

    /// The status record could not be removed after a successful run.
    #[error("failed to delete status file '{path}': {detail}")]
    Delete { path: String, detail: String },
}

/// Errors from a [`crate::pipeline::source::DocumentSource`].
#[derive(Debug, Error)]
pub enum SourceError {
    /// The HTTP request could not be sent or the connection broke.
    #[error("request to '{url}' failed: {reason}")]
    Request { url: String, reason: String },

    /// The API answered with a non-success status code.
    #[error("law API returned HTTP {status} for '{url}'{}", body_suffix(.body))]
    Status {
        url: String,
        status: u16,
        body: Option<String>,
    },

    /// The response body was not the expected JSON document.
    #[error("could not decode law API response from '{url}': {reason}")]
    Decode { url: String, reason: String },

    /// The requested revision does not exist in the revision list.
    #[error("revision '{revision_id}' not found")]
    RevisionNotFound { revision_id: String },
}

fn body_suffix(body: &Option<String>) -> String {
    match body {
        Some(b) if !b.is_empty() => format!(": {b}"),
        _ => String::new(),
    }
}

/// Errors from a [`crate::pipeline::transform::EpubTransformer`].
#[derive(Debug, Error)]
pub enum TransformError {
    /// The transformer executable could not be started.
    #[error("failed to start EPUB builder '{program}': {source}\nSet LAW2EPUB_TRANSFORMER or --transformer to the builder executable.")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The transformer ran but reported failure.
    #[error("EPUB builder exited with {code}: {stderr}")]
    Failed { code: String, stderr: String },

    /// The transformer exited cleanly but produced no EPUB.
    #[error("EPUB builder produced no output at '{path}'")]
    EmptyOutput { path: PathBuf },

    /// Resolving revision-specific content through the source failed.
    #[error("could not resolve revision '{revision_id}': {source}")]
    Revision {
        revision_id: String,
        #[source]
        source: SourceError,
    },

    /// Scratch-space I/O around the transformer failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The content was rejected before any EPUB was built.
    #[error("content rejected: {0}")]
    Rejected(String),
}

/// Errors from a [`crate::storage::ObjectStore`].
#[derive(Debug, Error)]
pub enum StorageError {
    /// The object does not exist (only reported by `delete`).
    #[error("object '{path}' not found in bucket '{bucket}'")]
    NotFound { bucket: String, path: String },

    /// Credentials could not be obtained for the backend.
    #[error("could not obtain storage credentials: {0}")]
    Auth(String),

    /// The backend rejected the request.
    #[error("storage backend returned HTTP {status} for '{path}': {detail}")]
    Backend {
        path: String,
        status: u16,
        detail: String,
    },

    /// The request never reached the backend.
    #[error("storage request for '{path}' failed: {reason}")]
    Transport { path: String, reason: String },

    /// The object path is unusable (empty, absolute, or escapes the bucket).
    #[error("invalid object path '{0}'")]
    InvalidPath(String),

    /// Local file-system error.
    #[error("storage I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_error_display_carries_source() {
        let e = Law2EpubError::Fetch {
            id: "129AC0000000089".into(),
            source: SourceError::Status {
                url: "https://example.invalid/law_data/129AC0000000089".into(),
                status: 404,
                body: Some("not found".into()),
            },
        };
        let msg = e.to_string();
        assert!(msg.contains("129AC0000000089"), "got: {msg}");
        assert!(msg.contains("HTTP 404"), "got: {msg}");
        assert!(msg.contains("not found"), "got: {msg}");
    }

    #[test]
    fn status_display_without_body() {
        let e = SourceError::Status {
            url: "u".into(),
            status: 500,
            body: None,
        };
        assert_eq!(e.to_string(), "law API returned HTTP 500 for 'u'");
    }

    #[test]
    fn format_mismatch_names_json_kind() {
        let e = Law2EpubError::FormatMismatch {
            id: "x".into(),
            found: "number",
        };
        assert!(e.to_string().contains("number"));
    }

    #[test]
    fn only_publish_is_publish() {
        let publish = Law2EpubError::Publish {
            path: "v1/x.epub".into(),
            source: StorageError::InvalidPath("".into()),
        };
        assert!(publish.is_publish());
        assert!(!Law2EpubError::ContentMissing { id: "x".into() }.is_publish());
    }

    #[test]
    fn status_delete_display() {
        let e = StatusError::Delete {
            path: "v1.0.0/abc.status".into(),
            detail: "boom".into(),
        };
        assert!(e.to_string().contains("v1.0.0/abc.status"));
        assert!(e.to_string().contains("boom"));
    }
}
