//! Prometheus metrics for the crash search service.
//!
//! Covers HTTP traffic, search outcomes, validation error kinds, backend
//! latency and schema reloads. Metrics live in statics so any module can
//! record without passing handles around; `init_metrics` registers them
//! with [`PROMETHEUS_REGISTRY`] once at startup.
//!
//! # Example
//! ```no_run
//! use crash_query::metrics::{self, SEARCH_REQUESTS_TOTAL};
//!
//! metrics::init_metrics().unwrap();
//! SEARCH_REQUESTS_TOTAL.with_label_values(&["success"]).inc();
//! println!("{}", metrics::gather_metrics());
//! ```

mod middleware;

pub use middleware::track_metrics;

use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Gauge, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry,
};

const NAMESPACE: &str = "crash_query";

lazy_static! {
    /// Global Prometheus registry for all metrics
    pub static ref PROMETHEUS_REGISTRY: Registry = Registry::new();

    /// Labels: method, path, status_code
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests")
            .namespace(NAMESPACE),
        &["method", "path", "status_code"]
    ).expect("Failed to create HTTP_REQUESTS_TOTAL metric");

    /// Labels: method, path
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request duration in seconds"
        )
        .namespace(NAMESPACE)
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["method", "path"]
    ).expect("Failed to create HTTP_REQUEST_DURATION_SECONDS metric");

    /// Searches by outcome
    ///
    /// Labels: outcome (success, invalid, backend_unavailable)
    pub static ref SEARCH_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("search_requests_total", "Total number of search requests")
            .namespace(NAMESPACE),
        &["outcome"]
    ).expect("Failed to create SEARCH_REQUESTS_TOTAL metric");

    /// Rejected rules, facets and columns
    ///
    /// Labels: kind
    pub static ref QUERY_ERRORS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("query_errors_total", "Total number of query validation errors")
            .namespace(NAMESPACE),
        &["kind"]
    ).expect("Failed to create QUERY_ERRORS_TOTAL metric");

    /// Labels: backend, outcome
    pub static ref BACKEND_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "backend_request_duration_seconds",
            "Search backend round-trip time in seconds"
        )
        .namespace(NAMESPACE)
        .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["backend", "outcome"]
    ).expect("Failed to create BACKEND_REQUEST_DURATION_SECONDS metric");

    /// Schema reload attempts
    ///
    /// Labels: outcome (success, failure)
    pub static ref SCHEMA_REFRESH_TOTAL: CounterVec = CounterVec::new(
        Opts::new("schema_refresh_total", "Total number of schema refresh attempts")
            .namespace(NAMESPACE),
        &["outcome"]
    ).expect("Failed to create SCHEMA_REFRESH_TOTAL metric");

    /// Fields in the current schema snapshot
    pub static ref SCHEMA_FIELDS: Gauge = Gauge::with_opts(
        Opts::new("schema_fields", "Number of fields in the active schema")
            .namespace(NAMESPACE)
    ).expect("Failed to create SCHEMA_FIELDS metric");

    /// Labels: version
    pub static ref BUILD_INFO: GaugeVec = GaugeVec::new(
        Opts::new("build_info", "Build information")
            .namespace(NAMESPACE),
        &["version"]
    ).expect("Failed to create BUILD_INFO metric");
}

/// Register every metric with [`PROMETHEUS_REGISTRY`].
///
/// # Errors
/// Fails if a metric is already registered, which happens when this is
/// called more than once.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    PROMETHEUS_REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(SEARCH_REQUESTS_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(QUERY_ERRORS_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(BACKEND_REQUEST_DURATION_SECONDS.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(SCHEMA_REFRESH_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(SCHEMA_FIELDS.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(BUILD_INFO.clone()))?;

    BUILD_INFO
        .with_label_values(&[env!("CARGO_PKG_VERSION")])
        .set(1.0);

    tracing::info!("Prometheus metrics initialized");
    Ok(())
}

/// Prometheus text exposition of every registered metric
pub fn gather_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = PROMETHEUS_REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Failed to convert metrics to string: {}", e);
        String::from("# Error converting metrics\n")
    })
}
