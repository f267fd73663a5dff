//! HTTP handler tests.
//!
//! The router runs in-process via `tower::ServiceExt::oneshot`, with mock
//! collaborators behind it.

#![cfg(feature = "server")]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use law2epub::server::{create_router, AppState};
use law2epub::testing::{FailingStore, MockDocumentSource, MockTransformer};
use law2epub::{Converter, MemoryObjectStore, ObjectStore};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const LAW_ID: &str = "129AC0000000089";

struct TestFixture {
    router: Router,
    source: Arc<MockDocumentSource>,
    store: Arc<FailingStore>,
}

#[derive(Debug)]
struct TestResponse {
    status: StatusCode,
    body: Value,
}

impl TestFixture {
    fn new() -> Self {
        Self::with(
            MockDocumentSource::new().with_law(LAW_ID, "<Law/>"),
            MockTransformer::new(),
        )
    }

    fn with(source: MockDocumentSource, transformer: MockTransformer) -> Self {
        let source = Arc::new(source);
        let store = Arc::new(FailingStore::new(Arc::new(MemoryObjectStore::new("test"))));
        let converter = Converter::new(
            source.clone(),
            Arc::new(transformer),
            store.clone() as Arc<dyn ObjectStore>,
        );
        let router = create_router(Arc::new(AppState::new(converter)));
        Self {
            router,
            source,
            store,
        }
    }

    async fn get(&self, path: &str) -> TestResponse {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.post_raw(path, &body.to_string()).await
    }

    async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        TestResponse { status, body }
    }
}

// =============================================================================
// Success
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let fixture = TestFixture::new();
    let response = fixture.get("/health").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
    assert_eq!(response.body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_generate_returns_success_and_publishes() {
    let fixture = TestFixture::new();
    let response = fixture
        .post("/", json!({ "id": LAW_ID, "version": "v2.0.0" }))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, json!({ "status": "success", "id": LAW_ID }));
    assert!(fixture.store.inner().contains("v2.0.0/129AC0000000089.epub"));
    assert!(!fixture.store.inner().contains("v2.0.0/129AC0000000089.status"));
}

#[tokio::test]
async fn test_generate_route_alias_and_default_version() {
    let fixture = TestFixture::new();
    let response = fixture.post("/generate", json!({ "id": LAW_ID })).await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(fixture.store.inner().contains("v1.0.0/129AC0000000089.epub"));
}

// =============================================================================
// Bad requests
// =============================================================================

#[tokio::test]
async fn test_malformed_json_is_rejected_without_side_effects() {
    let fixture = TestFixture::new();
    let response = fixture.post_raw("/", "{not json").await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body, json!({ "error": "Invalid request" }));
    assert!(fixture.store.put_log().is_empty());
    assert!(fixture.source.calls().is_empty());
}

#[tokio::test]
async fn test_missing_or_empty_id_is_rejected() {
    let fixture = TestFixture::new();
    for body in [json!({ "version": "v1" }), json!({ "id": "" }), json!({ "id": 42 })] {
        let response = fixture.post("/", body.clone()).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "body: {body}");
        assert_eq!(response.body["error"], "Invalid request");
    }
    assert!(fixture.store.put_log().is_empty());
    assert!(fixture.source.calls().is_empty());
}

// =============================================================================
// Server errors
// =============================================================================

#[tokio::test]
async fn test_fetch_failure_is_generic_500() {
    let fixture = TestFixture::with(
        MockDocumentSource::new().with_error(LAW_ID, 404),
        MockTransformer::new(),
    );
    let response = fixture.post("/", json!({ "id": LAW_ID })).await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.body, json!({ "error": "Failed to generate EPUB" }));
    assert!(fixture.store.inner().contains("v1.0.0/129AC0000000089.status"));
}

#[tokio::test]
async fn test_transform_failure_does_not_leak_detail() {
    let fixture = TestFixture::with(
        MockDocumentSource::new().with_law(LAW_ID, "<Law/>"),
        MockTransformer::failing("secret internal path /srv/x"),
    );
    let response = fixture.post("/", json!({ "id": LAW_ID })).await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.body, json!({ "error": "Failed to generate EPUB" }));
}

#[tokio::test]
async fn test_publish_failure_reports_save_error() {
    let fixture = TestFixture::new();
    fixture.store.fail_puts_ending_with(".epub");

    let response = fixture.post("/", json!({ "id": LAW_ID })).await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.body, json!({ "error": "Failed to save EPUB" }));
}
