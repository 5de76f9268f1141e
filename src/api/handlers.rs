use crate::api::AppState;
use crate::error::{AppError, Result};
use crate::query::Operator;
use crate::schema::{FieldDefinition, FieldSchema, SchemaRegistry};
use crate::search::{SearchRequest, SearchResponse};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    let schema = state.registry().snapshot();
    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        schema_version: schema.version(),
        schema_fields: schema.len(),
    }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub schema_version: u64,
    pub schema_fields: usize,
}

/// Readiness: the backend answers a ping
pub async fn readiness_check(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    let backend = state.service.backend();
    backend
        .ping()
        .await
        .map_err(|e| AppError::BackendUnavailable(format!("{}: {}", backend.name(), e)))?;
    health_check(State(state)).await
}

/// Run a search
pub async fn search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>> {
    let response = state.service.execute(&request).await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct ListFieldsQuery {
    /// Only fields usable as facets
    pub facetable: Option<bool>,
}

/// A catalog entry with what can be done with it
#[derive(Debug, Serialize)]
pub struct FieldResponse {
    #[serde(flatten)]
    pub definition: FieldDefinition,
    pub facetable: bool,
    pub operators: Vec<Operator>,
}

impl From<&FieldDefinition> for FieldResponse {
    fn from(field: &FieldDefinition) -> Self {
        Self {
            definition: field.clone(),
            facetable: field.is_facetable(),
            operators: Operator::legal_for(field.semantic_type),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListFieldsResponse {
    pub schema_version: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_tag: Option<String>,
    pub default_columns: Vec<String>,
    pub fields: Vec<FieldResponse>,
}

/// List the field catalog
pub async fn list_fields(
    State(state): State<AppState>,
    Query(params): Query<ListFieldsQuery>,
) -> Result<Json<ListFieldsResponse>> {
    let schema = state.registry().snapshot();
    let facetable_only = params.facetable.unwrap_or(false);

    let fields = schema
        .fields()
        .filter(|f| !facetable_only || f.is_facetable())
        .map(|f| FieldResponse::from(f.as_ref()))
        .collect();

    Ok(Json(ListFieldsResponse {
        schema_version: schema.version(),
        schema_tag: schema.tag().map(str::to_string),
        default_columns: schema.list_default_columns(),
        fields,
    }))
}

/// Get one field definition
pub async fn get_field(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<FieldResponse>> {
    let schema = state.registry().snapshot();
    let field = schema
        .lookup(&name)
        .ok_or_else(|| AppError::NotFound(format!("Field '{}'", name)))?;
    Ok(Json(FieldResponse::from(field.as_ref())))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub schema_version: u64,
    pub fields: usize,
}

/// Reload the schema from its source
pub async fn refresh_schema(State(state): State<AppState>) -> Result<Json<RefreshResponse>> {
    let schema = reload_schema(state.registry().clone()).await?;

    Ok(Json(RefreshResponse {
        schema_version: schema.version(),
        fields: schema.len(),
    }))
}

/// Re-read the schema source on the blocking pool
pub async fn reload_schema(registry: Arc<SchemaRegistry>) -> Result<Arc<FieldSchema>> {
    let schema = tokio::task::spawn_blocking(move || registry.refresh())
        .await
        .map_err(|e| AppError::Internal(format!("Schema refresh task failed: {}", e)))??;
    Ok(schema)
}

/// Prometheus metrics endpoint
///
/// Returns metrics in Prometheus text exposition format
pub async fn metrics() -> (StatusCode, String) {
    let metrics = crate::metrics::gather_metrics();
    (StatusCode::OK, metrics)
}
