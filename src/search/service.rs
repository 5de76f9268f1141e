//! Main search service implementation

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, instrument, warn};

use super::backend::{BackendError, BackendResponse, SearchBackend};
use super::config::SearchConfig;
use super::error::{SearchError, SearchResult};
use super::planner::{SearchPlan, SearchPlanner};
use super::request::{Document, SearchRequest, SearchResponse};
use crate::metrics::{BACKEND_REQUEST_DURATION_SECONDS, QUERY_ERRORS_TOTAL, SEARCH_REQUESTS_TOTAL};
use crate::projection::{ColumnSpec, Projection};
use crate::schema::SchemaRegistry;

/// Default upper bound for a backend round trip
const DEFAULT_BACKEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Main search service
pub struct SearchService {
    registry: Arc<SchemaRegistry>,
    backend: Arc<dyn SearchBackend>,
    planner: SearchPlanner,
    timeout: Duration,
}

impl SearchService {
    pub fn new(
        registry: Arc<SchemaRegistry>,
        backend: Arc<dyn SearchBackend>,
        config: SearchConfig,
    ) -> Self {
        Self {
            registry,
            backend,
            planner: SearchPlanner::new(config),
            timeout: DEFAULT_BACKEND_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    pub fn backend(&self) -> &Arc<dyn SearchBackend> {
        &self.backend
    }

    pub fn config(&self) -> &SearchConfig {
        self.planner.config()
    }

    /// Run a search
    pub async fn execute(&self, request: &SearchRequest) -> SearchResult<SearchResponse> {
        self.execute_at(request, Utc::now()).await
    }

    /// Run a search with an explicit clock for the default date window
    #[instrument(skip(self, request), fields(rules = request.rules.len(), facets = request.facets.len()))]
    pub async fn execute_at(
        &self,
        request: &SearchRequest,
        now: DateTime<Utc>,
    ) -> SearchResult<SearchResponse> {
        let start = Instant::now();
        // One snapshot for the whole request, even if a refresh lands midway
        let schema = self.registry.snapshot();

        let plan = match self.planner.plan(&schema, request, now) {
            Ok(plan) => plan,
            Err(e) => {
                for query_error in e.query_errors() {
                    QUERY_ERRORS_TOTAL
                        .with_label_values(&[query_error.kind().as_ref()])
                        .inc();
                }
                SEARCH_REQUESTS_TOTAL.with_label_values(&["invalid"]).inc();
                warn!(error = %e, "Search request rejected");
                return Err(e);
            }
        };

        let response = match self.call_backend(&plan).await {
            Ok(response) => response,
            Err(e) => {
                SEARCH_REQUESTS_TOTAL
                    .with_label_values(&["backend_unavailable"])
                    .inc();
                error!(backend = self.backend.name(), error = %e, "Search backend call failed");
                return Err(e.into());
            }
        };

        let result = Self::map_response(plan, response, start);
        SEARCH_REQUESTS_TOTAL.with_label_values(&["success"]).inc();
        info!(
            total = result.total,
            returned = result.hits.len(),
            took_ms = result.took_ms,
            schema_version = result.schema_version,
            "Search completed"
        );

        Ok(result)
    }

    /// The single outbound call, bounded by the service timeout
    async fn call_backend(&self, plan: &SearchPlan) -> Result<BackendResponse, BackendError> {
        let start = Instant::now();
        let outcome = tokio::time::timeout(self.timeout, self.backend.search(&plan.request)).await;

        let result = match outcome {
            Ok(result) => result,
            Err(_) => Err(BackendError::Timeout(self.timeout.as_millis() as u64)),
        };

        let label = if result.is_ok() { "success" } else { "failure" };
        BACKEND_REQUEST_DURATION_SECONDS
            .with_label_values(&[self.backend.name(), label])
            .observe(start.elapsed().as_secs_f64());

        result
    }

    fn map_response(plan: SearchPlan, response: BackendResponse, start: Instant) -> SearchResponse {
        let columns = &plan.request.columns;
        let hits = response
            .hits
            .iter()
            .map(|hit| project(hit, columns))
            .collect();

        // Every requested facet appears, even with no buckets
        let mut facets = response.facets;
        for facet in &plan.request.facets {
            facets.entry(facet.name.clone()).or_default();
        }
        facets.retain(|name, _| plan.request.facets.iter().any(|f| &f.name == name));

        SearchResponse {
            hits,
            total: response.total,
            facets,
            date_range: plan.date_range,
            offset: plan.request.from,
            limit: plan.request.size,
            schema_version: plan.schema_version,
            took_ms: start.elapsed().as_millis() as u64,
        }
    }
}

/// Keep only the requested columns of a stored document; missing values
/// come back as `null`
fn project(hit: &Value, columns: &[ColumnSpec]) -> Document {
    columns
        .iter()
        .map(|column| {
            let value = lookup_path(hit, &column.path).cloned().unwrap_or(Value::Null);
            let value = match (column.projection, value) {
                // Dynamic objects are sometimes stored as serialized JSON text
                (Projection::Object, Value::String(s)) => {
                    serde_json::from_str(&s).unwrap_or(Value::String(s))
                }
                (_, v) => v,
            };
            (column.name.clone(), value)
        })
        .collect()
}

/// Resolve a dotted path, accepting both nested objects and flattened keys
fn lookup_path<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    let obj = doc.as_object()?;
    if let Some(v) = obj.get(path) {
        return Some(v);
    }
    let (head, rest) = path.split_once('.')?;
    lookup_path(obj.get(head)?, rest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn column(name: &str, projection: Projection) -> ColumnSpec {
        ColumnSpec {
            name: name.into(),
            path: name.into(),
            projection,
        }
    }

    #[test]
    fn test_lookup_path() {
        let doc = json!({
            "classifications": { "skunk_works": { "classification": "x" } },
            "flat.key": 1
        });
        assert_eq!(
            lookup_path(&doc, "classifications.skunk_works.classification"),
            Some(&json!("x"))
        );
        assert_eq!(lookup_path(&doc, "flat.key"), Some(&json!(1)));
        assert_eq!(lookup_path(&doc, "missing.key"), None);
    }

    #[test]
    fn test_project_fills_missing_with_null() {
        let doc = json!({ "uuid": "abc", "json_dump": { "modules": [] }, "extra": true });
        let projected = project(
            &doc,
            &[
                column("uuid", Projection::Scalar),
                column("signature", Projection::Scalar),
                column("json_dump", Projection::Object),
            ],
        );
        assert_eq!(projected.len(), 3);
        assert_eq!(projected["uuid"], json!("abc"));
        assert_eq!(projected["signature"], Value::Null);
        assert_eq!(projected["json_dump"], json!({ "modules": [] }));
        assert!(!projected.contains_key("extra"));
    }

    #[test]
    fn test_project_decodes_serialized_object() {
        let doc = json!({ "json_dump": "{\"status\":\"OK\"}" });
        let projected = project(&doc, &[column("json_dump", Projection::Object)]);
        assert_eq!(projected["json_dump"], json!({ "status": "OK" }));
    }
}
