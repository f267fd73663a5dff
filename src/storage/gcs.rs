//! Google Cloud Storage over the JSON API.
//!
//! Each operation opens its own [`GcsSession`] (HTTP client + bearer token)
//! and drops it before returning, on success and on every error path. No
//! connection pool outlives a call.
//!
//! ## Credentials
//!
//! Resolved per session, first match wins:
//! 1. `STORAGE_EMULATOR_HOST` set: talk to the emulator, no token
//! 2. `GCS_ACCESS_TOKEN`: a pre-minted OAuth2 access token
//! 3. GCE/Cloud Run metadata server: the attached service account

use super::ObjectStore;
use crate::error::StorageError;
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use tracing::debug;

const DEFAULT_ENDPOINT: &str = "https://storage.googleapis.com";
const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// GCS bucket client.
#[derive(Debug, Clone)]
pub struct GcsObjectStore {
    bucket: String,
    endpoint: String,
    anonymous: bool,
}

impl GcsObjectStore {
    /// Store for `bucket`, honouring `STORAGE_EMULATOR_HOST`.
    pub fn new(bucket: impl Into<String>) -> Self {
        match std::env::var("STORAGE_EMULATOR_HOST") {
            Ok(host) if !host.is_empty() => Self::with_endpoint(bucket, host, true),
            _ => Self::with_endpoint(bucket, DEFAULT_ENDPOINT, false),
        }
    }

    /// Store for `bucket` at an explicit endpoint. `anonymous` skips token
    /// lookup (emulators, tests).
    pub fn with_endpoint(
        bucket: impl Into<String>,
        endpoint: impl Into<String>,
        anonymous: bool,
    ) -> Self {
        let mut endpoint = endpoint.into();
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            endpoint = format!("http://{endpoint}");
        }
        Self {
            bucket: bucket.into(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            anonymous,
        }
    }

    fn upload_url(&self, path: &str) -> String {
        format!(
            "{}/upload/storage/v1/b/{}/o?uploadType=media&name={}",
            self.endpoint,
            urlencoding::encode(&self.bucket),
            urlencoding::encode(path)
        )
    }

    fn object_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/b/{}/o/{}",
            self.endpoint,
            urlencoding::encode(&self.bucket),
            urlencoding::encode(path)
        )
    }

    async fn connect(&self) -> Result<GcsSession, StorageError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| StorageError::Transport {
                path: String::new(),
                reason: e.to_string(),
            })?;
        let token = if self.anonymous {
            None
        } else {
            Some(fetch_token(&client).await?)
        };
        Ok(GcsSession { client, token })
    }
}

/// One call's worth of client state.
struct GcsSession {
    client: reqwest::Client,
    token: Option<String>,
}

impl GcsSession {
    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.token {
            Some(ref t) => req.header(AUTHORIZATION, format!("Bearer {t}")),
            None => req,
        }
    }
}

#[derive(Deserialize)]
struct MetadataToken {
    access_token: String,
}

async fn fetch_token(client: &reqwest::Client) -> Result<String, StorageError> {
    if let Ok(token) = std::env::var("GCS_ACCESS_TOKEN") {
        if !token.is_empty() {
            return Ok(token);
        }
    }

    let resp = client
        .get(METADATA_TOKEN_URL)
        .header("Metadata-Flavor", "Google")
        .send()
        .await
        .map_err(|e| {
            StorageError::Auth(format!(
                "metadata server unreachable ({e}); set GCS_ACCESS_TOKEN or STORAGE_EMULATOR_HOST"
            ))
        })?;
    if !resp.status().is_success() {
        return Err(StorageError::Auth(format!(
            "metadata server returned HTTP {}",
            resp.status()
        )));
    }
    let token: MetadataToken = resp
        .json()
        .await
        .map_err(|e| StorageError::Auth(format!("bad metadata token response: {e}")))?;
    Ok(token.access_token)
}

async fn check(path: &str, resp: reqwest::Response) -> Result<(), StorageError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(());
    }
    let detail = resp.text().await.unwrap_or_default();
    Err(StorageError::Backend {
        path: path.to_string(),
        status: status.as_u16(),
        detail,
    })
}

fn transport(path: &str, e: reqwest::Error) -> StorageError {
    StorageError::Transport {
        path: path.to_string(),
        reason: e.to_string(),
    }
}

#[async_trait]
impl ObjectStore for GcsObjectStore {
    fn name(&self) -> &str {
        "gcs"
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put(&self, path: &str, body: Vec<u8>, content_type: &str) -> Result<(), StorageError> {
        let session = self.connect().await?;
        let len = body.len();
        let resp = session
            .authorize(session.client.post(self.upload_url(path)))
            .header(CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| transport(path, e))?;
        check(path, resp).await?;
        debug!("gs://{}/{} written ({} bytes)", self.bucket, path, len);
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), StorageError> {
        let session = self.connect().await?;
        let resp = session
            .authorize(session.client.delete(self.object_url(path)))
            .send()
            .await
            .map_err(|e| transport(path, e))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound {
                bucket: self.bucket.clone(),
                path: path.to_string(),
            });
        }
        check(path, resp).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_url_encodes_object_name() {
        let store = GcsObjectStore::with_endpoint("epub-storage", "https://storage.googleapis.com/", false);
        assert_eq!(
            store.upload_url("v1.0.0/abc.epub"),
            "https://storage.googleapis.com/upload/storage/v1/b/epub-storage/o?uploadType=media&name=v1.0.0%2Fabc.epub"
        );
    }

    #[test]
    fn object_url_encodes_slashes() {
        let store = GcsObjectStore::with_endpoint("b", "localhost:4443", true);
        assert_eq!(
            store.object_url("v1.0.0/abc.status"),
            "http://localhost:4443/storage/v1/b/b/o/v1.0.0%2Fabc.status"
        );
    }

    #[test]
    fn non_ascii_law_numbers_are_percent_encoded() {
        let store = GcsObjectStore::with_endpoint("b", "http://h", true);
        let url = store.object_url("v1/昭和二十九年法律第八十九号.epub");
        assert!(url.is_ascii(), "got: {url}");
    }
}
