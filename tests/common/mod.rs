//! Shared fixtures for the integration tests: in-memory search backends
//! and a service wired to the bundled crash-report schema.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use crash_query::schema::{SchemaRegistry, SchemaSource};
use crash_query::search::{
    BackendError, BackendRequest, BackendResponse, FacetCount, SearchBackend, SearchConfig,
    SearchService,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Fixed clock for tests that look at the default date window
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 15, 12, 0, 0).unwrap()
}

/// Backend that records every request and answers with a canned response
#[derive(Default)]
pub struct RecordingBackend {
    requests: Mutex<Vec<BackendRequest>>,
    response: BackendResponse,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(response: BackendResponse) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            response,
        }
    }

    pub fn requests(&self) -> Vec<BackendRequest> {
        self.requests.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl SearchBackend for RecordingBackend {
    fn name(&self) -> &str {
        "recording"
    }

    async fn search(&self, request: &BackendRequest) -> Result<BackendResponse, BackendError> {
        self.requests.lock().push(request.clone());
        Ok(self.response.clone())
    }

    async fn ping(&self) -> Result<(), BackendError> {
        Ok(())
    }
}

/// Backend whose every call fails
pub struct FailingBackend;

#[async_trait]
impl SearchBackend for FailingBackend {
    fn name(&self) -> &str {
        "failing"
    }

    async fn search(&self, _request: &BackendRequest) -> Result<BackendResponse, BackendError> {
        Err(BackendError::Status {
            status: 503,
            body: "cluster_block_exception".to_string(),
        })
    }

    async fn ping(&self) -> Result<(), BackendError> {
        Err(BackendError::Transport("connection refused".to_string()))
    }
}

/// Backend that answers only after a delay
pub struct SlowBackend(pub Duration);

#[async_trait]
impl SearchBackend for SlowBackend {
    fn name(&self) -> &str {
        "slow"
    }

    async fn search(&self, _request: &BackendRequest) -> Result<BackendResponse, BackendError> {
        tokio::time::sleep(self.0).await;
        Ok(BackendResponse::default())
    }

    async fn ping(&self) -> Result<(), BackendError> {
        Ok(())
    }
}

pub fn bundled_registry() -> Arc<SchemaRegistry> {
    Arc::new(SchemaRegistry::load(SchemaSource::Bundled).unwrap())
}

pub fn service_with(backend: Arc<dyn SearchBackend>) -> SearchService {
    SearchService::new(bundled_registry(), backend, SearchConfig::default())
}

/// Two stored crash reports plus product and platform buckets
pub fn canned_response() -> BackendResponse {
    let mut facets = BTreeMap::new();
    facets.insert(
        "product".to_string(),
        vec![
            FacetCount {
                term: "Firefox".to_string(),
                count: 41,
            },
            FacetCount {
                term: "Fenix".to_string(),
                count: 1,
            },
        ],
    );
    // Not requested by anyone; the service must drop it
    facets.insert(
        "unrequested".to_string(),
        vec![FacetCount {
            term: "x".to_string(),
            count: 1,
        }],
    );

    BackendResponse {
        total: 42,
        hits: vec![
            report("a0b1c2d3-0000-4000-8000-000000240315", "OOM | small", "Firefox"),
            json!({
                "uuid": "a0b1c2d3-0000-4000-8000-000000240314",
                "signature": "js::gc::Heap",
                "json_dump": "{\"status\":\"OK\",\"modules\":[]}"
            }),
        ],
        facets,
    }
}

pub fn report(uuid: &str, signature: &str, product: &str) -> Value {
    json!({
        "uuid": uuid,
        "signature": signature,
        "product": product,
        "date_processed": "2024-03-15T10:00:00+00:00",
        "platform": "Windows NT",
        "build_id": "20240301093000",
    })
}
