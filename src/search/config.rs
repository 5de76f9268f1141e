//! Search configuration

use serde::{Deserialize, Serialize};

/// Search orchestration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Primary date field used for the default window and result ordering
    #[serde(default = "default_date_field")]
    pub date_field: String,

    /// Length of the default date window in days
    #[serde(default = "default_days")]
    pub default_days: i64,

    /// Page size when a request names none
    #[serde(default = "default_limit")]
    pub default_limit: usize,

    /// Largest page size a request may ask for
    #[serde(default = "max_limit")]
    pub max_limit: usize,

    /// Buckets per facet when a request names no size
    #[serde(default = "default_facet_size")]
    pub default_facet_size: usize,

    #[serde(default = "max_facet_size")]
    pub max_facet_size: usize,
}

fn default_date_field() -> String {
    "date_processed".to_string()
}

fn default_days() -> i64 {
    7
}

fn default_limit() -> usize {
    100
}

fn max_limit() -> usize {
    1000
}

fn default_facet_size() -> usize {
    50
}

fn max_facet_size() -> usize {
    1000
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            date_field: default_date_field(),
            default_days: default_days(),
            default_limit: default_limit(),
            max_limit: max_limit(),
            default_facet_size: default_facet_size(),
            max_facet_size: max_facet_size(),
        }
    }
}

/// Builder for SearchConfig
pub struct SearchConfigBuilder {
    config: SearchConfig,
}

impl SearchConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: SearchConfig::default(),
        }
    }

    pub fn date_field(mut self, field: impl Into<String>) -> Self {
        self.config.date_field = field.into();
        self
    }

    pub fn default_days(mut self, days: i64) -> Self {
        self.config.default_days = days;
        self
    }

    pub fn default_limit(mut self, limit: usize) -> Self {
        self.config.default_limit = limit;
        self
    }

    pub fn max_limit(mut self, limit: usize) -> Self {
        self.config.max_limit = limit;
        self
    }

    pub fn default_facet_size(mut self, size: usize) -> Self {
        self.config.default_facet_size = size;
        self
    }

    pub fn max_facet_size(mut self, size: usize) -> Self {
        self.config.max_facet_size = size;
        self
    }

    pub fn build(self) -> SearchConfig {
        self.config
    }
}

impl Default for SearchConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
