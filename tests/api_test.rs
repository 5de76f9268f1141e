//! HTTP surface tests driven through the router with `oneshot`

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use common::*;
use crash_query::api::{build_router, AppState};
use crash_query::search::SearchBackend;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn app(backend: Arc<dyn SearchBackend>) -> Router {
    build_router(AppState::new(Arc::new(service_with(backend))))
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health() {
    let (status, body) = send(app(Arc::new(RecordingBackend::new())), get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["schema_version"], 1);
    assert!(body["schema_fields"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn test_readiness_follows_backend() {
    let (status, _) = send(app(Arc::new(RecordingBackend::new())), get("/health/ready")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(app(Arc::new(FailingBackend)), get("/health/ready")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "BACKEND_UNAVAILABLE");
}

#[tokio::test]
async fn test_list_fields() {
    let (status, body) = send(app(Arc::new(RecordingBackend::new())), get("/v1/fields")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["schema_version"], 1);
    assert_eq!(body["default_columns"][0], "uuid");

    let fields = body["fields"].as_array().unwrap();
    let signature = fields.iter().find(|f| f["name"] == "signature").unwrap();
    assert_eq!(signature["facetable"], true);
    let operators = signature["operators"].as_array().unwrap();
    assert!(operators.contains(&json!("contains")));
    assert!(!operators.contains(&json!("greaterThan")));
}

#[tokio::test]
async fn test_list_facetable_fields_only() {
    let (_, body) = send(
        app(Arc::new(RecordingBackend::new())),
        get("/v1/fields?facetable=true"),
    )
    .await;

    let fields = body["fields"].as_array().unwrap();
    assert!(!fields.is_empty());
    assert!(fields.iter().all(|f| f["facetable"] == true));
    assert!(!fields.iter().any(|f| f["name"] == "process_type"));
}

#[tokio::test]
async fn test_get_field() {
    let backend: Arc<dyn SearchBackend> = Arc::new(RecordingBackend::new());

    let (status, body) = send(app(backend.clone()), get("/v1/fields/cpu_count")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "cpu_count");
    assert_eq!(body["semantic_type"], "integer");

    let (status, body) = send(app(backend), get("/v1/fields/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_invalid_search_lists_every_problem() {
    let backend = Arc::new(RecordingBackend::new());
    let request = post_json(
        "/v1/search",
        json!({
            "rules": [
                { "field": "date_processed", "operator": ">", "value": "not-a-date" },
                { "field": "nope", "operator": "equals", "value": 1 }
            ],
            "facets": ["process_type"]
        }),
    );
    let (status, body) = send(app(backend.clone()), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_QUERY");
    let details = body["error"]["details"].as_array().unwrap();
    let kinds: Vec<&str> = details.iter().map(|d| d["kind"].as_str().unwrap()).collect();
    assert_eq!(kinds, vec!["TypeMismatch", "UnknownField", "NotFacetable"]);
    assert_eq!(details[0]["field"], "date_processed");
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn test_search_envelope_limits() {
    let request = post_json("/v1/search", json!({ "limit": 0 }));
    let (status, body) = send(app(Arc::new(RecordingBackend::new())), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_search_past_result_window() {
    let backend = Arc::new(RecordingBackend::new());
    let request = post_json("/v1/search", json!({ "offset": 9990, "limit": 20 }));
    let (status, body) = send(app(backend.clone()), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn test_search_success() {
    let backend = Arc::new(RecordingBackend::with_response(canned_response()));
    let request = post_json(
        "/v1/search",
        json!({
            "rules": [
                { "field": "signature", "operator": "contains", "value": "OOM" },
                { "field": "product", "operator": "in", "value": ["Firefox", "Fenix"] }
            ],
            "facets": ["product", { "field": "platform", "size": 5 }],
            "columns": ["uuid", "signature"],
            "limit": 2
        }),
    );
    let (status, body) = send(app(backend.clone()), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 42);
    assert_eq!(body["limit"], 2);
    assert_eq!(body["hits"][0], json!({ "uuid": "a0b1c2d3-0000-4000-8000-000000240315", "signature": "OOM | small" }));
    assert_eq!(body["facets"]["product"][0], json!({ "term": "Firefox", "count": 41 }));
    assert_eq!(body["facets"]["platform"], json!([]));
    assert!(body["date_range"]["from"].is_string());

    let sent = backend.requests();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].facets[1].size, 5);
}

#[tokio::test]
async fn test_backend_outage_is_503() {
    let request = post_json("/v1/search", json!({}));
    let (status, body) = send(app(Arc::new(FailingBackend)), request).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "BACKEND_UNAVAILABLE");
}

#[tokio::test]
async fn test_schema_refresh() {
    let app = app(Arc::new(RecordingBackend::new()));

    let request = Request::builder()
        .method(Method::POST)
        .uri("/v1/schema/refresh")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(app.clone(), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["schema_version"], 2);

    let (_, body) = send(app, get("/health")).await;
    assert_eq!(body["schema_version"], 2);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (status, _) = send_text(app(Arc::new(RecordingBackend::new())), get("/metrics")).await;
    assert_eq!(status, StatusCode::OK);
}

async fn send_text(app: Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}
