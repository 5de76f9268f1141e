pub mod handlers;
pub mod routes;

pub use routes::*;

use crate::schema::SchemaRegistry;
use crate::search::SearchService;
use std::sync::Arc;
use std::time::Instant;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<SearchService>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(service: Arc<SearchService>) -> Self {
        Self {
            service,
            started_at: Instant::now(),
        }
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        self.service.registry()
    }
}
