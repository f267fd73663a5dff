//! Remote document source: the e-Gov law API v2.
//!
//! `GET {base}/law_data/{id}?law_full_text_format=xml` returns a JSON
//! envelope whose `law_full_text` field holds the law XML, base64 encoded.
//! The identifier may be a law ID, a law number (Japanese text, so it is
//! percent-encoded into the path), or a revision ID.
//!
//! The same client doubles as the fetch capability handed to transformers
//! for revision identifiers; they use [`DocumentSource::fetch_law_revisions`]
//! to look up the revision being rendered.

use crate::error::SourceError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Default e-Gov law API v2 base URL.
pub const DEFAULT_API_BASE_URL: &str = "https://laws.e-gov.go.jp/api/2";

/// The part of a `law_data` response the pipeline consumes.
///
/// `law_full_text` stays untyped: with `law_full_text_format=xml` it is a
/// base64 string, but the API returns a JSON tree for other formats and the
/// extractor reports that as a format mismatch rather than a decode failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LawData {
    #[serde(default)]
    pub law_info: Option<serde_json::Value>,
    #[serde(default)]
    pub revision_info: Option<serde_json::Value>,
    #[serde(default)]
    pub law_full_text: Option<serde_json::Value>,
}

impl LawData {
    /// A response carrying `text` as its base64-encoded full text.
    pub fn from_full_text(text: impl Into<String>) -> Self {
        Self {
            law_full_text: Some(serde_json::Value::String(text.into())),
            ..Default::default()
        }
    }

    /// `revision_info.law_title`, when the API provided one.
    pub fn title(&self) -> Option<&str> {
        self.revision_info
            .as_ref()
            .and_then(|r| r.get("law_title"))
            .and_then(|t| t.as_str())
    }
}

/// Capability to fetch law documents.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Fetch the full text for a law ID, law number, or revision ID.
    async fn fetch_law_data(&self, id: &str) -> Result<LawData, SourceError>;

    /// Fetch the revision history for a law ID.
    async fn fetch_law_revisions(&self, law_id: &str) -> Result<serde_json::Value, SourceError>;
}

/// reqwest client for the e-Gov law API.
#[derive(Debug, Clone)]
pub struct LawApiClient {
    base_url: String,
    client: reqwest::Client,
}

impl LawApiClient {
    /// Client against `base_url`. `timeout_secs = None` leaves reqwest's
    /// default (no overall timeout).
    pub fn new(base_url: impl Into<String>, timeout_secs: Option<u64>) -> Result<Self, SourceError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("law2epub/", env!("CARGO_PKG_VERSION")));
        if let Some(secs) = timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build().map_err(|e| SourceError::Request {
            url: base_url.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn law_data_url(&self, id: &str) -> String {
        format!(
            "{}/law_data/{}?law_full_text_format=xml",
            self.base_url,
            urlencoding::encode(id)
        )
    }

    fn law_revisions_url(&self, law_id: &str) -> String {
        format!(
            "{}/law_revisions/{}",
            self.base_url,
            urlencoding::encode(law_id)
        )
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, SourceError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| SourceError::Request {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.ok().map(|b| truncate(&b, 200));
            return Err(SourceError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        response.json::<T>().await.map_err(|e| SourceError::Decode {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}\u{2026}", &s[..idx]),
        None => s.to_string(),
    }
}

#[async_trait]
impl DocumentSource for LawApiClient {
    async fn fetch_law_data(&self, id: &str) -> Result<LawData, SourceError> {
        info!("Fetching law data for ID: {}", id);
        let url = self.law_data_url(id);
        let data: LawData = self.get_json(&url).await?;
        debug!(
            "law_data {}: title={:?}, full_text present={}",
            id,
            data.title(),
            data.law_full_text.is_some()
        );
        Ok(data)
    }

    async fn fetch_law_revisions(&self, law_id: &str) -> Result<serde_json::Value, SourceError> {
        let url = self.law_revisions_url(law_id);
        self.get_json(&url).await
    }
}

/// Find one revision in a `law_revisions` response.
pub fn find_revision<'a>(
    revisions: &'a serde_json::Value,
    revision_id: &str,
) -> Option<&'a serde_json::Value> {
    revisions
        .get("revisions")?
        .as_array()?
        .iter()
        .find(|r| r.get("law_revision_id").and_then(|v| v.as_str()) == Some(revision_id))
}
