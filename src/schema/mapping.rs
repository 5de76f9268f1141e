//! Mapping source parsing
//!
//! The schema source is an index mapping body:
//!
//! ```text
//! {
//!   "_meta": { "default_columns": ["uuid", "date_processed", "signature"] },
//!   "properties": {
//!     "signature": {
//!       "type": "string",
//!       "analyzer": "semicolon_keywords",
//!       "fields": { "full": { "type": "string", "index": "not_analyzed" } }
//!     },
//!     "date_processed": {
//!       "type": "date",
//!       "format": "yyyy-MM-dd'T'HH:mm:ssZZ||yyyy-MM-dd'T'HH:mm:ss.SSSSSSZZ",
//!       "fields": { "epoch": { "type": "date", "format": "epoch_second" } }
//!     },
//!     "addons_checked": { "type": "boolean", "null_value": false },
//!     "json_dump": { "type": "object", "dynamic": true }
//!   }
//! }
//! ```
//!
//! Full mapping documents (`{"mappings": {...}}`, optionally with a single
//! legacy document type level) are unwrapped first.

use serde_json::{Map, Value};
use std::collections::HashSet;

use super::date_format::{DateFormat, DEFAULT_DATE_FORMAT};
use super::error::{SchemaError, SchemaResult};
use super::field::{EpochUnit, FieldDefinition, IndexingVariant, NullValue, SemanticType, VariantKind};

/// Field catalog decoded from a mapping source
#[derive(Debug, Clone)]
pub struct ParsedMapping {
    /// Definitions in declaration order; object children follow their parent
    pub fields: Vec<FieldDefinition>,

    /// Names listed under `_meta.default_columns`
    pub default_columns: Vec<String>,

    /// Free-form `_meta.version` tag
    pub version_tag: Option<String>,
}

/// Decode a mapping body from JSON text
pub fn parse_mapping_str(source: &str) -> SchemaResult<ParsedMapping> {
    let value: Value = serde_json::from_str(source)?;
    parse_mapping(&value)
}

/// Decode a mapping body
pub fn parse_mapping(source: &Value) -> SchemaResult<ParsedMapping> {
    let body = unwrap_mapping_body(source)?;

    let properties = body
        .get("properties")
        .and_then(Value::as_object)
        .ok_or_else(|| SchemaError::InvalidStructure("missing 'properties' object".to_string()))?;

    if properties.is_empty() {
        return Err(SchemaError::InvalidStructure(
            "mapping declares no fields".to_string(),
        ));
    }

    let mut fields = Vec::new();
    for (name, entry) in properties {
        parse_entry(name, entry, &mut fields)?;
    }

    let mut seen = HashSet::new();
    for field in &fields {
        if !seen.insert(field.name.as_str()) {
            return Err(SchemaError::field(&field.name, "declared more than once"));
        }
    }

    let meta = body.get("_meta").and_then(Value::as_object);
    let default_columns = match meta.and_then(|m| m.get("default_columns")) {
        None => Vec::new(),
        Some(Value::Array(columns)) => columns
            .iter()
            .map(|c| {
                c.as_str().map(str::to_string).ok_or_else(|| {
                    SchemaError::InvalidStructure(
                        "'_meta.default_columns' must contain strings".to_string(),
                    )
                })
            })
            .collect::<SchemaResult<Vec<_>>>()?,
        Some(_) => {
            return Err(SchemaError::InvalidStructure(
                "'_meta.default_columns' must be an array".to_string(),
            ))
        }
    };

    for column in &default_columns {
        match fields.iter_mut().find(|f| &f.name == column) {
            Some(field) => field.default_column = true,
            None => return Err(SchemaError::UnknownDefaultColumn(column.clone())),
        }
    }

    let version_tag = meta
        .and_then(|m| m.get("version"))
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        });

    Ok(ParsedMapping {
        fields,
        default_columns,
        version_tag,
    })
}

fn unwrap_mapping_body(source: &Value) -> SchemaResult<&Map<String, Value>> {
    let mut body = source
        .as_object()
        .ok_or_else(|| SchemaError::InvalidStructure("mapping must be a JSON object".to_string()))?;

    if let Some(mappings) = body.get("mappings") {
        body = mappings.as_object().ok_or_else(|| {
            SchemaError::InvalidStructure("'mappings' must be an object".to_string())
        })?;
    }

    // Legacy mappings nest properties under a single document type
    if !body.contains_key("properties") && body.len() == 1 {
        if let Some(inner) = body.values().next().and_then(Value::as_object) {
            if inner.contains_key("properties") {
                body = inner;
            }
        }
    }

    Ok(body)
}

fn parse_entry(name: &str, entry: &Value, out: &mut Vec<FieldDefinition>) -> SchemaResult<()> {
    if name.is_empty() || name.chars().any(char::is_whitespace) {
        return Err(SchemaError::field(name, "field names must be non-empty and contain no whitespace"));
    }

    let spec = entry
        .as_object()
        .ok_or_else(|| SchemaError::field(name, "entry must be an object"))?;

    let declared_type = match spec.get("type") {
        Some(Value::String(t)) => t.as_str(),
        Some(_) => return Err(SchemaError::field(name, "'type' must be a string")),
        None if spec.contains_key("properties") => "object",
        None => return Err(SchemaError::field(name, "missing 'type'")),
    };

    if declared_type == "multi_field" {
        out.push(parse_legacy_multi_field(name, spec)?);
        return Ok(());
    }

    let (kind, semantic_type) = variant_kind(name, declared_type, spec, None)?;
    let root = IndexingVariant::root(name, kind).with_analyzer(analyzer_of(spec));

    let mut variants = vec![root];
    if let Some(sub) = spec.get("fields") {
        let sub = sub
            .as_object()
            .ok_or_else(|| SchemaError::field(name, "'fields' must be an object"))?;
        for (variant_name, variant_spec) in sub {
            variants.push(parse_variant(name, variant_name, variant_spec, semantic_type)?);
        }
    }

    let field = build_definition(name, semantic_type, variants, spec)?;
    out.push(field);

    if semantic_type == SemanticType::NestedObject {
        if let Some(children) = spec.get("properties") {
            let children = children
                .as_object()
                .ok_or_else(|| SchemaError::field(name, "'properties' must be an object"))?;
            for (child, child_entry) in children {
                parse_entry(&format!("{}.{}", name, child), child_entry, out)?;
            }
        }
    }

    Ok(())
}

/// `{"type": "multi_field", "fields": {"<leaf>": {...}, "full": {...}}}` where
/// the variant named after the field is the root.
fn parse_legacy_multi_field(name: &str, spec: &Map<String, Value>) -> SchemaResult<FieldDefinition> {
    let sub = spec
        .get("fields")
        .and_then(Value::as_object)
        .ok_or_else(|| SchemaError::field(name, "multi_field requires a 'fields' object"))?;

    let leaf = name.rsplit('.').next().unwrap_or(name);
    let root_spec = sub
        .get(leaf)
        .and_then(Value::as_object)
        .ok_or_else(|| SchemaError::field(name, format!("multi_field has no '{}' root variant", leaf)))?;

    let root_type = root_spec
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| SchemaError::field(name, "multi_field root variant needs a 'type'"))?;
    let (kind, semantic_type) = variant_kind(name, root_type, root_spec, None)?;

    let mut variants = vec![IndexingVariant::root(name, kind).with_analyzer(analyzer_of(root_spec))];
    for (variant_name, variant_spec) in sub {
        if variant_name == leaf {
            continue;
        }
        variants.push(parse_variant(name, variant_name, variant_spec, semantic_type)?);
    }

    build_definition(name, semantic_type, variants, root_spec)
}

fn parse_variant(
    field: &str,
    variant_name: &str,
    spec: &Value,
    field_type: SemanticType,
) -> SchemaResult<IndexingVariant> {
    let spec = spec
        .as_object()
        .ok_or_else(|| SchemaError::field(field, format!("variant '{}' must be an object", variant_name)))?;
    let declared_type = spec
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| SchemaError::field(field, format!("variant '{}' needs a 'type'", variant_name)))?;

    let (kind, _) = variant_kind(field, declared_type, spec, Some(field_type))?;
    if kind == VariantKind::Object {
        return Err(SchemaError::field(
            field,
            format!("variant '{}' cannot be an object", variant_name),
        ));
    }

    Ok(IndexingVariant::named(field, variant_name, kind).with_analyzer(analyzer_of(spec)))
}

/// Classify one indexing declaration
fn variant_kind(
    field: &str,
    declared_type: &str,
    spec: &Map<String, Value>,
    parent: Option<SemanticType>,
) -> SchemaResult<(VariantKind, SemanticType)> {
    if is_not_indexed(spec) {
        return Err(SchemaError::field(field, "field is not indexed"));
    }

    let classified = match declared_type {
        "string" => match spec.get("index").and_then(Value::as_str) {
            Some("not_analyzed") => (VariantKind::Exact, SemanticType::Keyword),
            _ => (VariantKind::Analyzed, SemanticType::String),
        },
        "text" => (VariantKind::Analyzed, SemanticType::String),
        "keyword" => (VariantKind::Exact, SemanticType::Keyword),
        "boolean" => (VariantKind::Boolean, SemanticType::Boolean),
        "integer" | "short" | "byte" => (VariantKind::Numeric, SemanticType::Integer),
        "long" => (VariantKind::Numeric, SemanticType::Long),
        "float" | "double" | "half_float" | "scaled_float" => {
            (VariantKind::Numeric, SemanticType::Double)
        }
        "date" => {
            let formats = date_formats(field, spec)?;
            // A sub-variant indexed only as epoch numbers is the numeric
            // representation of its parent date field
            let kind = match (parent, formats.first().map(DateFormat::pattern)) {
                (Some(SemanticType::Date), Some("epoch_second")) => VariantKind::Epoch(EpochUnit::Seconds),
                (Some(SemanticType::Date), Some("epoch_millis")) => VariantKind::Epoch(EpochUnit::Millis),
                _ => VariantKind::Date,
            };
            (kind, SemanticType::Date)
        }
        "object" | "nested" => (VariantKind::Object, SemanticType::NestedObject),
        other => {
            return Err(SchemaError::field(field, format!("unsupported type '{}'", other)));
        }
    };

    Ok(classified)
}

fn build_definition(
    name: &str,
    semantic_type: SemanticType,
    variants: Vec<IndexingVariant>,
    spec: &Map<String, Value>,
) -> SchemaResult<FieldDefinition> {
    let date_formats = if semantic_type == SemanticType::Date {
        date_formats(name, spec)?
    } else {
        if spec.contains_key("format") {
            return Err(SchemaError::field(name, "'format' is only valid on date fields"));
        }
        Vec::new()
    };

    let dynamic_children = if semantic_type == SemanticType::NestedObject {
        match spec.get("dynamic") {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s == "true",
            Some(_) => return Err(SchemaError::field(name, "'dynamic' must be a boolean or string")),
            None => !spec.contains_key("properties"),
        }
    } else {
        false
    };

    let default_null_value = match spec.get("null_value") {
        None | Some(Value::Null) => None,
        Some(value) => Some(null_value(name, semantic_type, value)?),
    };

    Ok(FieldDefinition {
        name: name.to_string(),
        semantic_type,
        indexing_variants: variants,
        date_formats,
        dynamic_children,
        default_null_value,
        default_column: false,
    })
}

fn date_formats(field: &str, spec: &Map<String, Value>) -> SchemaResult<Vec<DateFormat>> {
    let raw = match spec.get("format") {
        None => DEFAULT_DATE_FORMAT,
        Some(Value::String(s)) => s.as_str(),
        Some(_) => return Err(SchemaError::field(field, "'format' must be a string")),
    };
    DateFormat::parse_list(raw).map_err(|reason| SchemaError::field(field, reason))
}

fn null_value(field: &str, semantic_type: SemanticType, value: &Value) -> SchemaResult<NullValue> {
    let mismatch = || {
        SchemaError::field(
            field,
            format!("null_value {} does not fit type {}", value, semantic_type),
        )
    };

    match semantic_type {
        SemanticType::Boolean => match value {
            Value::Bool(b) => Ok(NullValue::Boolean(*b)),
            Value::String(s) if s == "true" => Ok(NullValue::Boolean(true)),
            Value::String(s) if s == "false" => Ok(NullValue::Boolean(false)),
            _ => Err(mismatch()),
        },
        SemanticType::Integer | SemanticType::Long => {
            value.as_i64().map(NullValue::Integer).ok_or_else(mismatch)
        }
        SemanticType::Double => value.as_f64().map(NullValue::Double).ok_or_else(mismatch),
        SemanticType::String | SemanticType::Keyword => value
            .as_str()
            .map(|s| NullValue::Text(s.to_string()))
            .ok_or_else(mismatch),
        SemanticType::Date | SemanticType::NestedObject => Err(mismatch()),
    }
}

fn is_not_indexed(spec: &Map<String, Value>) -> bool {
    matches!(spec.get("index"), Some(Value::Bool(false)))
        || matches!(spec.get("index").and_then(Value::as_str), Some("no"))
}

fn analyzer_of(spec: &Map<String, Value>) -> Option<String> {
    spec.get("analyzer").and_then(Value::as_str).map(str::to_string)
}
