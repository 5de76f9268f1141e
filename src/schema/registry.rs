//! Field schema registry and snapshot swapping

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use super::error::{SchemaError, SchemaResult};
use super::field::FieldDefinition;
use super::mapping::{parse_mapping_str, ParsedMapping};
use crate::metrics::{SCHEMA_FIELDS, SCHEMA_REFRESH_TOTAL};

/// Crash-report mapping shipped with the crate
pub const BUNDLED_MAPPING: &str = include_str!("../../schema/crash_reports.json");

/// Where the registry reads its mapping from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum SchemaSource {
    /// The bundled crash-report mapping
    Bundled,
    /// A mapping file, re-read on every refresh
    File(PathBuf),
    /// Mapping text held in memory
    Inline(String),
}

impl SchemaSource {
    fn read(&self) -> SchemaResult<String> {
        match self {
            SchemaSource::Bundled => Ok(BUNDLED_MAPPING.to_string()),
            SchemaSource::Inline(text) => Ok(text.clone()),
            SchemaSource::File(path) => {
                std::fs::read_to_string(path).map_err(|source| SchemaError::Read {
                    path: path.display().to_string(),
                    source,
                })
            }
        }
    }

    fn describe(&self) -> String {
        match self {
            SchemaSource::Bundled => "bundled".to_string(),
            SchemaSource::File(path) => path.display().to_string(),
            SchemaSource::Inline(_) => "inline".to_string(),
        }
    }
}

/// Immutable snapshot of the field catalog
#[derive(Debug)]
pub struct FieldSchema {
    version: u64,
    tag: Option<String>,
    loaded_at: DateTime<Utc>,
    fields: BTreeMap<String, Arc<FieldDefinition>>,
    default_columns: Vec<String>,
}

impl FieldSchema {
    /// Build a snapshot from a decoded mapping
    pub fn new(mapping: ParsedMapping, version: u64) -> Self {
        let fields = mapping
            .fields
            .into_iter()
            .map(|field| (field.name.clone(), Arc::new(field)))
            .collect();

        Self {
            version,
            tag: mapping.version_tag,
            loaded_at: Utc::now(),
            fields,
            default_columns: mapping.default_columns,
        }
    }

    /// Parse mapping text into a snapshot
    pub fn from_mapping_str(source: &str, version: u64) -> SchemaResult<Self> {
        Ok(Self::new(parse_mapping_str(source)?, version))
    }

    /// The bundled crash-report schema
    pub fn bundled() -> SchemaResult<Self> {
        Self::from_mapping_str(BUNDLED_MAPPING, 1)
    }

    pub fn lookup(&self, name: &str) -> Option<&Arc<FieldDefinition>> {
        self.fields.get(name)
    }

    /// Names of every facet-eligible field, sorted
    pub fn list_facetable_fields(&self) -> Vec<String> {
        self.fields
            .values()
            .filter(|f| f.is_facetable())
            .map(|f| f.name.clone())
            .collect()
    }

    /// Columns returned when a request names none, in declared order
    pub fn list_default_columns(&self) -> Vec<String> {
        self.default_columns.clone()
    }

    /// All fields, sorted by name
    pub fn fields(&self) -> impl Iterator<Item = &Arc<FieldDefinition>> {
        self.fields.values()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }
}

/// Process-wide holder of the current schema snapshot.
///
/// Readers take an `Arc` of the snapshot and keep it for the whole request;
/// `refresh` builds the replacement completely before swapping the pointer,
/// so a reader never sees a partially loaded catalog and a failed reload
/// leaves the previous snapshot in place.
pub struct SchemaRegistry {
    source: SchemaSource,
    current: RwLock<Arc<FieldSchema>>,
}

impl SchemaRegistry {
    /// Load the initial snapshot. Failure here must stop the process.
    pub fn load(source: SchemaSource) -> SchemaResult<Self> {
        let schema = FieldSchema::from_mapping_str(&source.read()?, 1)?;

        info!(
            source = %source.describe(),
            fields = schema.len(),
            version = schema.version(),
            "Schema loaded"
        );
        SCHEMA_FIELDS.set(schema.len() as f64);

        Ok(Self {
            source,
            current: RwLock::new(Arc::new(schema)),
        })
    }

    /// Current snapshot
    pub fn snapshot(&self) -> Arc<FieldSchema> {
        self.current.read().clone()
    }

    pub fn source(&self) -> &SchemaSource {
        &self.source
    }

    /// Re-read the source and swap in the new snapshot
    pub fn refresh(&self) -> SchemaResult<Arc<FieldSchema>> {
        let parsed = self
            .source
            .read()
            .and_then(|text| parse_mapping_str(&text));

        let parsed = match parsed {
            Ok(parsed) => parsed,
            Err(e) => {
                SCHEMA_REFRESH_TOTAL.with_label_values(&["failure"]).inc();
                error!(
                    source = %self.source.describe(),
                    error = %e,
                    current_version = self.current.read().version(),
                    "Schema refresh failed, keeping current snapshot"
                );
                return Err(e);
            }
        };

        let mut current = self.current.write();
        let schema = Arc::new(FieldSchema::new(parsed, current.version() + 1));
        *current = schema.clone();
        drop(current);

        SCHEMA_REFRESH_TOTAL.with_label_values(&["success"]).inc();
        SCHEMA_FIELDS.set(schema.len() as f64);
        info!(
            source = %self.source.describe(),
            fields = schema.len(),
            version = schema.version(),
            "Schema refreshed"
        );

        Ok(schema)
    }
}
