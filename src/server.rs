//! HTTP entry point.
//!
//! One handler, mounted at `POST /` and `POST /generate`, runs a conversion
//! synchronously and answers when it reaches a terminal state. Response
//! bodies never carry internal error detail; that goes to the log and to the
//! FAILED status record.

use crate::convert::Converter;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Shared handler state.
pub struct AppState {
    pub converter: Converter,
}

impl AppState {
    pub fn new(converter: Converter) -> Self {
        Self { converter }
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(generate_epub))
        .route("/generate", post(generate_epub))
        .route("/health", get(health))
        .with_state(state)
}

/// Request body for a conversion.
#[derive(Debug, Deserialize)]
pub struct GenerateBody {
    pub id: String,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub status: &'static str,
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

fn error_response(status: StatusCode, message: &'static str) -> Response {
    (status, Json(ErrorResponse { error: message })).into_response()
}

/// `POST /` and `POST /generate`.
///
/// A body that is not `{"id": ..., "version": ...}` JSON, or whose `id` is
/// blank, answers 400 before anything is written or fetched.
pub async fn generate_epub(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let body: GenerateBody = match serde_json::from_slice(&body) {
        Ok(b) => b,
        Err(e) => {
            warn!("Rejecting request: {}", e);
            return error_response(StatusCode::BAD_REQUEST, "Invalid request");
        }
    };
    if body.id.trim().is_empty() {
        warn!("Rejecting request: empty id");
        return error_response(StatusCode::BAD_REQUEST, "Invalid request");
    }

    let request = state
        .converter
        .request(&body.id, body.version.as_deref());
    info!("Received request for ID: {}, version: {}", request.document_id, request.version);

    match state.converter.run(&request).await {
        Ok(_) => (
            StatusCode::OK,
            Json(SuccessResponse {
                status: "success",
                id: request.document_id,
            }),
        )
            .into_response(),
        Err(e) if e.is_publish() => {
            error!("Failed to save EPUB for {}: {}", request.document_id, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to save EPUB")
        }
        Err(e) => {
            error!("Failed to generate EPUB for {}: {}", request.document_id, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to generate EPUB")
        }
    }
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: VERSION,
    })
}
