//! The status record: a tiny JSON object pollers can watch.
//!
//! Only two states are ever written, `PROCESSING` and `FAILED`. A finished
//! conversion is signalled by the record disappearing, and the EPUB showing
//! up at the artifact path. The converter never reads the record back.
//!
//! Every method here returns `Result<(), StatusError>`. Callers are expected
//! to log the error and carry on: a broken status write must not decide the
//! outcome of a conversion.

use crate::error::StatusError;
use crate::request::STATUS_CONTENT_TYPE;
use crate::storage::ObjectStore;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// The two states a status record can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConversionStatus {
    Processing,
    Failed,
}

impl ConversionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversionStatus::Processing => "PROCESSING",
            ConversionStatus::Failed => "FAILED",
        }
    }
}

/// Serialized body of `{version}/{id}.status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRecord {
    pub status: ConversionStatus,
    /// RFC 3339, UTC, whole seconds.
    pub updated_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StatusRecord {
    pub fn processing(at: DateTime<Utc>) -> Self {
        Self {
            status: ConversionStatus::Processing,
            updated_at: timestamp(at),
            error: None,
        }
    }

    pub fn failed(at: DateTime<Utc>, error: impl Into<String>) -> Self {
        Self {
            status: ConversionStatus::Failed,
            updated_at: timestamp(at),
            error: Some(error.into()),
        }
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Writes and clears status records in an [`ObjectStore`].
#[derive(Clone)]
pub struct StatusRecorder {
    store: Arc<dyn ObjectStore>,
}

impl StatusRecorder {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Mark the conversion as started.
    pub async fn mark_processing(&self, path: &str) -> Result<(), StatusError> {
        self.write(path, StatusRecord::processing(Utc::now())).await
    }

    /// Overwrite the record with a failure and its cause.
    pub async fn mark_failed(&self, path: &str, error: &str) -> Result<(), StatusError> {
        self.write(path, StatusRecord::failed(Utc::now(), error)).await
    }

    /// Remove the record after a successful publish.
    pub async fn clear(&self, path: &str) -> Result<(), StatusError> {
        self.store
            .delete(path)
            .await
            .map_err(|e| StatusError::Delete {
                path: path.to_string(),
                detail: e.to_string(),
            })
    }

    async fn write(&self, path: &str, record: StatusRecord) -> Result<(), StatusError> {
        let status = record.status.as_str();
        let write_err = |detail: String| StatusError::Write {
            path: path.to_string(),
            status: status.to_string(),
            detail,
        };

        let mut body = serde_json::to_vec(&record).map_err(|e| write_err(e.to_string()))?;
        body.push(b'\n');
        self.store
            .put(path, body, STATUS_CONTENT_TYPE)
            .await
            .map_err(|e| write_err(e.to_string()))?;

        debug!("status {} → {}", path, status);
        Ok(())
    }
}
