//! Result types returned by a successful conversion run.

use crate::request::ObjectPaths;
use serde::{Deserialize, Serialize};

/// A published EPUB plus where it went and how long each stage took.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    pub document_id: String,
    pub version: String,
    /// True when the ID was a revision identifier.
    pub revision: bool,
    /// `revision_info.law_title` from the law API, when present.
    pub title: Option<String>,
    pub paths: ObjectPaths,
    /// The EPUB bytes; skipped when serialising summaries.
    #[serde(skip)]
    pub epub: Vec<u8>,
    pub stats: ConversionStats,
}

/// Per-stage timings and sizes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionStats {
    pub xml_bytes: usize,
    pub epub_bytes: usize,
    pub fetch_duration_ms: u64,
    pub transform_duration_ms: u64,
    pub publish_duration_ms: u64,
    pub total_duration_ms: u64,
}
