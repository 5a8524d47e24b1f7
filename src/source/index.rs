//! In-memory layer with an R-tree over feature envelopes.

use std::collections::BTreeMap;
use std::sync::Arc;

use geo::BoundingRect;
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{RTree, AABB};

use crate::spatial::{BBox, Crs};

use super::store::{FeatureIter, FieldType, GeometryType, LayerSchema, SourceFeature};

type IndexEntry = GeomWithData<Rectangle<[f64; 2]>, usize>;

/// A fully loaded layer: its features, derived schema and spatial index.
#[derive(Debug)]
pub struct IndexedLayer {
    features: Vec<SourceFeature>,
    index: RTree<IndexEntry>,
    schema: LayerSchema,
    bounds: Option<BBox>,
}

impl IndexedLayer {
    pub fn new(features: Vec<SourceFeature>, crs: Crs) -> Self {
        let mut entries = Vec::with_capacity(features.len());
        let mut bounds: Option<BBox> = None;

        for (idx, feature) in features.iter().enumerate() {
            let Some(rect) = feature.geometry.bounding_rect() else {
                continue;
            };
            let envelope = BBox::from_rect(&rect);
            if !envelope.is_valid() {
                continue;
            }
            bounds = Some(match bounds {
                Some(acc) => acc.union(&envelope),
                None => envelope,
            });
            entries.push(GeomWithData::new(
                Rectangle::from_corners(
                    [envelope.west, envelope.south],
                    [envelope.east, envelope.north],
                ),
                idx,
            ));
        }

        let schema = derive_schema(&features, crs);
        Self {
            features,
            index: RTree::bulk_load(entries),
            schema,
            bounds,
        }
    }

    pub fn schema(&self) -> &LayerSchema {
        &self.schema
    }

    pub fn bounds(&self) -> Option<BBox> {
        self.bounds
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn feature(&self, idx: usize) -> Option<&SourceFeature> {
        self.features.get(idx)
    }

    /// Indices of features whose envelope intersects `bbox`, in source order.
    pub fn query(&self, bbox: &BBox) -> Vec<usize> {
        let envelope = AABB::from_corners([bbox.west, bbox.south], [bbox.east, bbox.north]);
        let mut hits: Vec<usize> = self
            .index
            .locate_in_envelope_intersecting(&envelope)
            .map(|entry| entry.data)
            .collect();
        hits.sort_unstable();
        hits
    }

    /// Lazily yield clones of the features matching `bbox`.
    pub fn features_in(self: &Arc<Self>, bbox: &BBox) -> FeatureIter<'static> {
        let layer = Arc::clone(self);
        let hits = layer.query(bbox);
        Box::new(
            hits.into_iter()
                .filter_map(move |idx| layer.feature(idx).cloned().map(Ok)),
        )
    }
}

fn derive_schema(features: &[SourceFeature], crs: Crs) -> LayerSchema {
    let mut geometry_type: Option<GeometryType> = None;
    let mut fields: BTreeMap<String, FieldType> = BTreeMap::new();

    for feature in features {
        let kind = GeometryType::of(&feature.geometry);
        geometry_type = match geometry_type {
            None => Some(kind),
            Some(current) if current == kind => Some(current),
            Some(_) => Some(GeometryType::Unknown),
        };

        for (name, value) in &feature.properties {
            if fields.contains_key(name) {
                continue;
            }
            if let Some(field_type) = FieldType::of(value) {
                fields.insert(name.clone(), field_type);
            }
        }
    }

    // Fields that are null everywhere still belong to the schema.
    for feature in features {
        for name in feature.properties.keys() {
            fields.entry(name.clone()).or_insert(FieldType::Str);
        }
    }

    LayerSchema {
        geometry_type: geometry_type.unwrap_or(GeometryType::Unknown),
        fields,
        crs,
    }
}
