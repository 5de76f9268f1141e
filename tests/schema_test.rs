//! Schema registry loading and refresh from a mapping file

use crash_query::api::handlers::reload_schema;
use crash_query::error::AppError;
use crash_query::projection::{FacetRequest, ProjectionResolver};
use crash_query::schema::{FieldSchema, SchemaRegistry, SchemaSource, SemanticType};
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;

const MAPPING_V1: &str = r#"{
    "_meta": { "version": "v1", "default_columns": ["uuid", "product"] },
    "properties": {
        "uuid": { "type": "string", "index": "not_analyzed" },
        "product": { "type": "string", "index": "not_analyzed" },
        "signature": {
            "type": "string",
            "fields": { "full": { "type": "string", "index": "not_analyzed" } }
        }
    }
}"#;

const MAPPING_V2: &str = r#"{
    "_meta": { "version": "v2", "default_columns": ["uuid"] },
    "properties": {
        "uuid": { "type": "string", "index": "not_analyzed" },
        "product": { "type": "string", "index": "not_analyzed" },
        "signature": {
            "type": "string",
            "fields": { "full": { "type": "string", "index": "not_analyzed" } }
        },
        "uptime": { "type": "long" }
    }
}"#;

fn write_mapping(file: &mut NamedTempFile, text: &str) {
    let handle = file.as_file_mut();
    handle.set_len(0).unwrap();
    std::io::Seek::rewind(handle).unwrap();
    handle.write_all(text.as_bytes()).unwrap();
    handle.flush().unwrap();
}

fn file_registry(text: &str) -> (NamedTempFile, SchemaRegistry) {
    let mut file = NamedTempFile::new().unwrap();
    write_mapping(&mut file, text);
    let registry = SchemaRegistry::load(SchemaSource::File(file.path().to_path_buf())).unwrap();
    (file, registry)
}

#[test]
fn test_load_from_file() {
    let (_file, registry) = file_registry(MAPPING_V1);
    let schema = registry.snapshot();

    assert_eq!(schema.version(), 1);
    assert_eq!(schema.tag(), Some("v1"));
    assert_eq!(schema.len(), 3);
    assert_eq!(
        schema.list_default_columns(),
        vec!["uuid".to_string(), "product".to_string()]
    );
    assert_eq!(
        schema.list_facetable_fields(),
        vec!["product".to_string(), "signature".to_string(), "uuid".to_string()]
    );
}

#[test]
fn test_refresh_picks_up_file_changes() {
    let (mut file, registry) = file_registry(MAPPING_V1);
    let before = registry.snapshot();
    assert!(before.lookup("uptime").is_none());

    write_mapping(&mut file, MAPPING_V2);
    let after = registry.refresh().unwrap();

    assert_eq!(after.version(), 2);
    assert_eq!(after.tag(), Some("v2"));
    let uptime = after.lookup("uptime").unwrap();
    assert_eq!(uptime.semantic_type, SemanticType::Long);
    assert!(Arc::ptr_eq(&after, &registry.snapshot()));

    // Holders of the old snapshot keep a consistent view
    assert!(before.lookup("uptime").is_none());
    assert_eq!(before.version(), 1);
}

#[test]
fn test_failed_refresh_keeps_current_snapshot() {
    let (mut file, registry) = file_registry(MAPPING_V1);

    write_mapping(&mut file, "{ not json");
    assert!(registry.refresh().is_err());

    let schema = registry.snapshot();
    assert_eq!(schema.version(), 1);
    assert_eq!(schema.tag(), Some("v1"));

    // A later good refresh still advances the version
    write_mapping(&mut file, MAPPING_V2);
    assert_eq!(registry.refresh().unwrap().version(), 2);
}

#[test]
fn test_missing_file_fails_to_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.json");
    assert!(SchemaRegistry::load(SchemaSource::File(path)).is_err());
}

#[test]
fn test_bundled_catalog() {
    let schema = FieldSchema::bundled().unwrap();

    let date = schema.lookup("date_processed").unwrap();
    assert_eq!(date.semantic_type, SemanticType::Date);
    assert!(date.epoch_variant().is_some());

    let signature = schema.lookup("signature").unwrap();
    assert!(signature.is_multi_field());
    assert!(signature.exact_variant().is_some());
    assert!(signature.analyzed_variant().is_some());

    assert!(!schema.lookup("process_type").unwrap().is_facetable());
    assert!(schema.lookup("json_dump").unwrap().is_object());

    let facetable = schema.list_facetable_fields();
    assert!(facetable.contains(&"product".to_string()));
    assert!(!facetable.contains(&"process_type".to_string()));
}

#[test]
fn test_every_facetable_field_resolves_as_facet() {
    let schema = FieldSchema::bundled().unwrap();
    let names = schema.list_facetable_fields();
    assert!(!names.is_empty());

    let requests: Vec<FacetRequest> = names.iter().map(|n| FacetRequest::new(n.as_str())).collect();
    let (facets, errors) = ProjectionResolver::new(&schema, 50, 1000).resolve_facets(&requests);

    assert!(errors.is_empty(), "unexpected facet errors: {:?}", errors);
    let resolved: Vec<&str> = facets.iter().map(|f| f.name.as_str()).collect();
    let expected: Vec<&str> = names.iter().map(String::as_str).collect();
    assert_eq!(resolved, expected);
}

#[tokio::test]
async fn test_reload_reports_failure_and_keeps_snapshot() {
    let (mut file, registry) = file_registry(MAPPING_V1);
    let registry = Arc::new(registry);

    write_mapping(&mut file, MAPPING_V2);
    let schema = reload_schema(registry.clone()).await.unwrap();
    assert_eq!(schema.version(), 2);

    write_mapping(&mut file, "{ not json");
    let err = reload_schema(registry.clone()).await.unwrap_err();
    assert!(matches!(err, AppError::SchemaLoad(_)));
    assert_eq!(err.error_code(), "SCHEMA_LOAD_FAILURE");
    assert_eq!(registry.snapshot().version(), 2);
}
