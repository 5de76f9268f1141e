//! Elasticsearch implementation of [`SearchBackend`]

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

use super::backend::{BackendError, BackendRequest, BackendResponse, SearchBackend};
use super::request::FacetCount;
use crate::error::{AppError, Result};
use crate::query::ElasticsearchDsl;

/// Connection settings for the crash-report index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElasticsearchConfig {
    /// Base URL of the cluster
    #[serde(default = "default_url")]
    pub url: String,

    /// Index or alias holding processed crash reports
    #[serde(default = "default_index")]
    pub index: String,

    /// Upper bound for one search round trip
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,
}

fn default_url() -> String {
    "http://localhost:9200".to_string()
}

fn default_index() -> String {
    "socorro_reports".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for ElasticsearchConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            index: default_index(),
            timeout_secs: default_timeout_secs(),
            username: None,
            password: None,
        }
    }
}

/// Search backend talking to Elasticsearch over HTTP
#[derive(Clone)]
pub struct ElasticsearchBackend {
    client: Client,
    config: ElasticsearchConfig,
}

impl ElasticsearchBackend {
    pub fn new(config: ElasticsearchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ElasticsearchConfig {
        &self.config
    }

    fn search_url(&self) -> String {
        format!(
            "{}/{}/_search",
            self.config.url.trim_end_matches('/'),
            self.config.index
        )
    }

    /// Request body for one search
    pub fn request_body(request: &BackendRequest) -> Value {
        let query = ElasticsearchDsl::translate(&request.query);
        let query = match &request.date_filter {
            Some(window) => json!({
                "bool": {
                    "must": [query],
                    "filter": [ElasticsearchDsl::translate_node(window)]
                }
            }),
            None => query,
        };

        let mut body = json!({
            "query": query,
            "_source": ElasticsearchDsl::source_includes(&request.columns),
            "from": request.from,
            "size": request.size,
            "track_total_hits": true,
        });

        if !request.facets.is_empty() {
            body["aggs"] = ElasticsearchDsl::aggregations(&request.facets);
        }
        if let Some(sort) = &request.sort {
            body["sort"] = json!([{ sort.path.as_str(): { "order": sort.order } }]);
        }

        body
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.username {
            Some(user) => builder.basic_auth(user, self.config.password.as_deref()),
            None => builder,
        }
    }

    fn transport_error(&self, e: reqwest::Error) -> BackendError {
        if e.is_timeout() {
            BackendError::Timeout(self.config.timeout_secs * 1000)
        } else {
            BackendError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl SearchBackend for ElasticsearchBackend {
    fn name(&self) -> &str {
        "elasticsearch"
    }

    async fn search(&self, request: &BackendRequest) -> std::result::Result<BackendResponse, BackendError> {
        let body = Self::request_body(request);
        let request_id = uuid::Uuid::new_v4().to_string();
        debug!(request_id = %request_id, url = %self.search_url(), body = %body, "Sending search");

        let response = self
            .authorize(self.client.post(self.search_url()))
            .header("X-Opaque-Id", &request_id)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(request_id = %request_id, status = status.as_u16(), "Search rejected by backend");
            return Err(BackendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let decoded: EsSearchResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))?;

        Ok(decoded.into_backend_response())
    }

    async fn ping(&self) -> std::result::Result<(), BackendError> {
        let url = self.config.url.trim_end_matches('/').to_string();
        let response = self
            .authorize(self.client.get(url))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(BackendError::Status {
                status: status.as_u16(),
                body: String::new(),
            })
        }
    }
}

#[derive(Debug, Deserialize)]
struct EsSearchResponse {
    hits: EsHits,
    #[serde(default)]
    aggregations: BTreeMap<String, EsAggregation>,
}

#[derive(Debug, Deserialize)]
struct EsHits {
    #[serde(default)]
    total: Option<EsTotal>,
    #[serde(default)]
    hits: Vec<EsHit>,
}

/// Older clusters report a bare number, newer ones `{value, relation}`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EsTotal {
    Count(u64),
    Object { value: u64 },
}

#[derive(Debug, Deserialize)]
struct EsHit {
    #[serde(rename = "_source", default)]
    source: Value,
}

#[derive(Debug, Deserialize)]
struct EsAggregation {
    #[serde(default)]
    buckets: Vec<EsBucket>,
}

#[derive(Debug, Deserialize)]
struct EsBucket {
    key: Value,
    #[serde(default)]
    key_as_string: Option<String>,
    doc_count: u64,
}

impl EsBucket {
    fn into_facet_count(self) -> FacetCount {
        let term = match (self.key_as_string, self.key) {
            (Some(s), _) => s,
            (None, Value::String(s)) => s,
            (None, other) => other.to_string(),
        };
        FacetCount {
            term,
            count: self.doc_count,
        }
    }
}

impl EsSearchResponse {
    fn into_backend_response(self) -> BackendResponse {
        let total = match self.hits.total {
            Some(EsTotal::Count(n)) | Some(EsTotal::Object { value: n }) => n,
            None => self.hits.hits.len() as u64,
        };

        let facets = self
            .aggregations
            .into_iter()
            .map(|(name, agg)| {
                let buckets = agg.buckets.into_iter().map(EsBucket::into_facet_count).collect();
                (name, buckets)
            })
            .collect();

        BackendResponse {
            total,
            hits: self.hits.hits.into_iter().map(|h| h.source).collect(),
            facets,
        }
    }
}
