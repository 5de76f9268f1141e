//! Field definitions: semantic types and indexing variants

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use super::date_format::DateFormat;

/// Semantic type of a searchable field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum SemanticType {
    /// Analyzed free text (may also carry an exact variant)
    String,
    /// Verbatim string value
    Keyword,
    Boolean,
    /// 32-bit signed integer
    Integer,
    /// 64-bit signed integer
    Long,
    Double,
    Date,
    /// Object field, either with declared children or dynamic
    NestedObject,
}

/// Unit of an epoch-encoded date variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpochUnit {
    Seconds,
    Millis,
}

/// How a single variant of a field is indexed by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "unit")]
pub enum VariantKind {
    /// Tokenized full-text index
    Analyzed,
    /// Verbatim (not analyzed / keyword) index
    Exact,
    Numeric,
    Boolean,
    /// Date stored in one of the field's string formats
    Date,
    /// Date stored as a numeric epoch timestamp
    Epoch(EpochUnit),
    /// Object sub-tree
    Object,
}

impl VariantKind {
    /// Whether the variant stores values verbatim, which makes it usable for
    /// exact matching and terms aggregations.
    pub fn is_exact(&self) -> bool {
        !matches!(self, Self::Analyzed | Self::Object)
    }
}

/// One named sub-index of a logical field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexingVariant {
    /// Variant name; `None` for the root variant
    pub name: Option<String>,

    /// Backend path addressed by queries (e.g. `signature.full`)
    pub path: String,

    pub kind: VariantKind,

    /// Analyzer declared for analyzed variants
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analyzer: Option<String>,
}

impl IndexingVariant {
    pub fn root(path: impl Into<String>, kind: VariantKind) -> Self {
        Self {
            name: None,
            path: path.into(),
            kind,
            analyzer: None,
        }
    }

    pub fn named(field: &str, name: impl Into<String>, kind: VariantKind) -> Self {
        let name = name.into();
        Self {
            path: format!("{}.{}", field, name),
            name: Some(name),
            kind,
            analyzer: None,
        }
    }

    pub fn with_analyzer(mut self, analyzer: Option<String>) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn is_root(&self) -> bool {
        self.name.is_none()
    }
}

/// Value substituted for a missing input on fields declaring `null_value`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NullValue {
    Boolean(bool),
    Integer(i64),
    Double(f64),
    Text(String),
}

/// A searchable field of the crash-report schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    pub semantic_type: SemanticType,

    /// Ordered indexing variants, root first
    pub indexing_variants: Vec<IndexingVariant>,

    /// Accepted date patterns, in the order they are tried
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub date_formats: Vec<DateFormat>,

    /// Open-ended object whose sub-keys are not declared
    #[serde(default)]
    pub dynamic_children: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_null_value: Option<NullValue>,

    /// Shown as a result column when the request names none
    #[serde(default)]
    pub default_column: bool,
}

impl FieldDefinition {
    /// The variant addressed by the bare field name
    pub fn root_variant(&self) -> &IndexingVariant {
        // Loader guarantees at least one variant
        &self.indexing_variants[0]
    }

    /// First variant storing values verbatim
    pub fn exact_variant(&self) -> Option<&IndexingVariant> {
        self.indexing_variants.iter().find(|v| v.kind.is_exact())
    }

    /// First tokenized full-text variant
    pub fn analyzed_variant(&self) -> Option<&IndexingVariant> {
        self.indexing_variants
            .iter()
            .find(|v| v.kind == VariantKind::Analyzed)
    }

    /// First numeric epoch variant of a date field
    pub fn epoch_variant(&self) -> Option<&IndexingVariant> {
        self.indexing_variants
            .iter()
            .find(|v| matches!(v.kind, VariantKind::Epoch(_)))
    }

    /// First string-formatted date variant
    pub fn date_variant(&self) -> Option<&IndexingVariant> {
        self.indexing_variants
            .iter()
            .find(|v| v.kind == VariantKind::Date)
    }

    pub fn is_multi_field(&self) -> bool {
        self.indexing_variants.len() > 1
    }

    /// Facets need a variant that aggregates on verbatim values
    pub fn is_facetable(&self) -> bool {
        self.semantic_type != SemanticType::NestedObject && self.exact_variant().is_some()
    }

    pub fn is_object(&self) -> bool {
        self.semantic_type == SemanticType::NestedObject
    }
}
