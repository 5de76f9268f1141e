use crash_query::{
    api::{build_router, handlers::reload_schema, AppState},
    config::Config,
    schema::SchemaRegistry,
    search::{ElasticsearchBackend, SearchService},
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration before tracing so the log format can follow it
    let (config, config_error) = match Config::load() {
        Ok(config) => (config, None),
        Err(e) => (Config::embedded()?, Some(e)),
    };

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "crash_query={},tower_http=info",
            config.observability.log_level
        )
        .into()
    });
    let registry = tracing_subscriber::registry().with(filter);
    if config.observability.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    if let Some(e) = config_error {
        tracing::warn!(error = %e, "Failed to load configuration, using embedded defaults");
    }

    tracing::info!(
        service = %config.observability.service_name,
        "Starting crash-query v{}",
        env!("CARGO_PKG_VERSION")
    );

    // Initialize Prometheus metrics
    if config.observability.prometheus_enabled {
        if let Err(e) = crash_query::metrics::init_metrics() {
            tracing::warn!("Failed to initialize metrics: {}", e);
            tracing::warn!("Continuing without metrics");
        }
    } else {
        tracing::info!("Prometheus metrics disabled in configuration");
    }

    // A schema that does not load is fatal
    let schema_registry = match SchemaRegistry::load(config.schema.source()) {
        Ok(registry) => Arc::new(registry),
        Err(e) => {
            tracing::error!(error = %e, "Failed to load field schema");
            return Err(e.into());
        }
    };

    let backend = Arc::new(ElasticsearchBackend::new(config.backend.clone())?);
    tracing::info!(
        url = %config.backend.url,
        index = %config.backend.index,
        timeout_secs = config.backend.timeout_secs,
        "Search backend configured"
    );

    let service = Arc::new(
        SearchService::new(schema_registry.clone(), backend, config.search.clone())
            .with_timeout(Duration::from_secs(config.backend.timeout_secs)),
    );

    if config.schema.reload_on_sighup {
        spawn_sighup_reload(schema_registry.clone())?;
    }

    let app = build_router(AppState::new(service));

    // Start HTTP server
    let http_addr = config.server.bind_address();
    let http_listener = tokio::net::TcpListener::bind(&http_addr).await?;
    tracing::info!("HTTP API server listening on http://{}", http_addr);

    axum::serve(http_listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutdown signal received");
        })
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Refresh the schema whenever the process receives SIGHUP
#[cfg(unix)]
fn spawn_sighup_reload(registry: Arc<SchemaRegistry>) -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangups = signal(SignalKind::hangup())?;
    tokio::spawn(async move {
        while hangups.recv().await.is_some() {
            tracing::info!("SIGHUP received, refreshing schema");
            // The old snapshot stays active when the refresh fails
            match reload_schema(registry.clone()).await {
                Ok(schema) => tracing::info!("Schema reloaded at version {}", schema.version()),
                Err(e) => tracing::error!("SIGHUP schema refresh failed: {}", e),
            }
        }
    });
    Ok(())
}

#[cfg(not(unix))]
fn spawn_sighup_reload(_registry: Arc<SchemaRegistry>) -> std::io::Result<()> {
    tracing::warn!("SIGHUP schema reload is only available on unix");
    Ok(())
}
