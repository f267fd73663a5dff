//! Work-unit identification: which document, under which version prefix.
//!
//! A conversion is keyed by `(version, document_id)`. Both the status record
//! and the EPUB artifact live at paths derived from that pair, so every
//! caller that knows the pair can poll for the result without talking to the
//! converter.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Version prefix used when a request does not name one.
pub const DEFAULT_VERSION: &str = "v1.0.0";

/// Content type written with the status record.
pub const STATUS_CONTENT_TYPE: &str = "application/json";

/// Content type written with the EPUB artifact.
pub const EPUB_CONTENT_TYPE: &str = "application/epub+zip";

/// One conversion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRequest {
    /// Law ID, law number, or revision ID.
    pub document_id: String,
    /// Storage namespace; see [`DEFAULT_VERSION`].
    pub version: String,
}

impl ConversionRequest {
    /// Build a request, falling back to [`DEFAULT_VERSION`] when `version`
    /// is empty.
    pub fn new(document_id: impl Into<String>, version: impl Into<String>) -> Self {
        let version = version.into();
        Self {
            document_id: document_id.into(),
            version: if version.trim().is_empty() {
                DEFAULT_VERSION.to_string()
            } else {
                version
            },
        }
    }

    /// Build a request under the default version prefix.
    pub fn with_default_version(document_id: impl Into<String>) -> Self {
        Self::new(document_id, DEFAULT_VERSION)
    }

    /// Object paths for this request.
    pub fn paths(&self) -> ObjectPaths {
        ObjectPaths::new(&self.version, &self.document_id)
    }

    /// The revision this request targets, if the identifier is one.
    pub fn revision(&self) -> Option<RevisionId> {
        RevisionId::parse(&self.document_id)
    }
}

/// Deterministic object locations for one `(version, document_id)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectPaths {
    /// `{version}/{document_id}.status`
    pub status: String,
    /// `{version}/{document_id}.epub`
    pub artifact: String,
}

impl ObjectPaths {
    pub fn new(version: &str, document_id: &str) -> Self {
        Self {
            status: format!("{}/{}.status", version, document_id),
            artifact: format!("{}/{}.epub", version, document_id),
        }
    }
}

/// A revision identifier: exactly three `_`-separated components.
///
/// On e-Gov these read `{law_id}_{enforcement_date}_{amendment_law_id}`,
/// e.g. `129AC0000000089_20240401_505AC0000000053`. Only the component count
/// is checked; empty components are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RevisionId {
    raw: String,
}

impl RevisionId {
    /// Parse `id` as a revision identifier. Returns `None` for plain law IDs
    /// and law numbers.
    pub fn parse(id: &str) -> Option<Self> {
        if id.split('_').count() == 3 {
            Some(Self { raw: id.to_string() })
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    fn component(&self, n: usize) -> &str {
        self.raw.split('_').nth(n).unwrap_or_default()
    }

    /// The law this revision belongs to.
    pub fn law_id(&self) -> &str {
        self.component(0)
    }

    /// The enforcement date component (`YYYYMMDD` on e-Gov).
    pub fn enforcement_date(&self) -> &str {
        self.component(1)
    }

    /// The amending law's ID.
    pub fn amendment_law_id(&self) -> &str {
        self.component(2)
    }
}

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// True when `id` is a revision identifier.
pub fn is_revision_id(id: &str) -> bool {
    RevisionId::parse(id).is_some()
}
