//! The feature store interface and the records it yields.

use std::collections::BTreeMap;
use std::fmt;

use geo::Geometry;
use serde::Serialize;

use crate::error::DatasetError;
use crate::spatial::{BBox, Crs};

// =============================================================================
// Records
// =============================================================================

/// A feature read from a dataset layer, in the layer's native CRS.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFeature {
    /// Numeric feature id, when the source carries one
    pub id: Option<u64>,

    pub geometry: Geometry<f64>,

    /// Attribute values keyed by lowercased field name
    pub properties: serde_json::Map<String, serde_json::Value>,
}

impl SourceFeature {
    pub fn new(geometry: Geometry<f64>) -> Self {
        Self {
            id: None,
            geometry,
            properties: serde_json::Map::new(),
        }
    }

    pub fn with_id(mut self, id: u64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_property(
        mut self,
        name: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.properties
            .insert(name.into().to_lowercase(), value.into());
        self
    }
}

/// Lazy sequence of features returned by [`FeatureStore::filter_by_bbox`].
pub type FeatureIter<'a> = Box<dyn Iterator<Item = Result<SourceFeature, DatasetError>> + Send + 'a>;

/// Geometry classification of a layer.
///
/// A layer whose features do not share one type is `Unknown`. The variant
/// order is the drawing order used by the starter style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum GeometryType {
    Point,
    MultiPoint,
    LineString,
    MultiLineString,
    Polygon,
    MultiPolygon,
    Unknown,
}

impl GeometryType {
    pub fn of(geometry: &Geometry<f64>) -> Self {
        match geometry {
            Geometry::Point(_) => GeometryType::Point,
            Geometry::MultiPoint(_) => GeometryType::MultiPoint,
            Geometry::Line(_) | Geometry::LineString(_) => GeometryType::LineString,
            Geometry::MultiLineString(_) => GeometryType::MultiLineString,
            Geometry::Polygon(_) | Geometry::Rect(_) | Geometry::Triangle(_) => {
                GeometryType::Polygon
            }
            Geometry::MultiPolygon(_) => GeometryType::MultiPolygon,
            Geometry::GeometryCollection(_) => GeometryType::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GeometryType::Point => "Point",
            GeometryType::MultiPoint => "MultiPoint",
            GeometryType::LineString => "LineString",
            GeometryType::MultiLineString => "MultiLineString",
            GeometryType::Polygon => "Polygon",
            GeometryType::MultiPolygon => "MultiPolygon",
            GeometryType::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for GeometryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Attribute type of a layer field, derived from the first non-null value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Str,
    Int,
    Float,
    Bool,
    Json,
}

impl FieldType {
    /// Classify a JSON value; `None` for null.
    pub fn of(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Null => None,
            serde_json::Value::Bool(_) => Some(FieldType::Bool),
            serde_json::Value::Number(n) if n.is_f64() => Some(FieldType::Float),
            serde_json::Value::Number(_) => Some(FieldType::Int),
            serde_json::Value::String(_) => Some(FieldType::Str),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => Some(FieldType::Json),
        }
    }
}

/// Schema of one layer.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerSchema {
    pub geometry_type: GeometryType,
    pub fields: BTreeMap<String, FieldType>,
    pub crs: Crs,
}

// =============================================================================
// FeatureStore Trait
// =============================================================================

/// Read access to vector datasets.
///
/// Calls are synchronous and may block on I/O; async callers run them on the
/// blocking thread pool.
pub trait FeatureStore: Send + Sync + 'static {
    /// Names of all datasets, sorted.
    fn list_datasets(&self) -> Result<Vec<String>, DatasetError>;

    /// Names of the layers in a dataset, sorted.
    fn list_layers(&self, dataset: &str) -> Result<Vec<String>, DatasetError>;

    fn schema(&self, dataset: &str, layer: &str) -> Result<LayerSchema, DatasetError>;

    /// Native-CRS envelope of a layer, `None` when it has no features.
    fn bounds(&self, dataset: &str, layer: &str) -> Result<Option<BBox>, DatasetError>;

    /// Features whose envelope intersects `bbox` (given in the layer's CRS).
    fn filter_by_bbox<'a>(
        &'a self,
        dataset: &str,
        layer: &str,
        bbox: &BBox,
    ) -> Result<FeatureIter<'a>, DatasetError>;

    /// Human-readable reference to where a dataset lives.
    fn source_ref(&self, dataset: &str) -> String {
        dataset.to_string()
    }
}
