//! Feature store over datasets assembled in memory.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::DatasetError;
use crate::spatial::{BBox, Crs};

use super::index::IndexedLayer;
use super::store::{FeatureIter, FeatureStore, LayerSchema, SourceFeature};

/// A [`FeatureStore`] holding programmatically built datasets.
///
/// Useful for embedding the tile engine without files on disk, and in tests.
#[derive(Debug, Default)]
pub struct MemoryFeatureStore {
    datasets: BTreeMap<String, BTreeMap<String, Arc<IndexedLayer>>>,
}

impl MemoryFeatureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a layer, creating its dataset on first use.
    pub fn with_layer(
        mut self,
        dataset: impl Into<String>,
        layer: impl Into<String>,
        crs: Crs,
        features: Vec<SourceFeature>,
    ) -> Self {
        self.insert_layer(dataset, layer, crs, features);
        self
    }

    pub fn insert_layer(
        &mut self,
        dataset: impl Into<String>,
        layer: impl Into<String>,
        crs: Crs,
        features: Vec<SourceFeature>,
    ) {
        self.datasets
            .entry(dataset.into())
            .or_default()
            .insert(layer.into(), Arc::new(IndexedLayer::new(features, crs)));
    }

    fn layer(&self, dataset: &str, layer: &str) -> Result<&Arc<IndexedLayer>, DatasetError> {
        self.datasets
            .get(dataset)
            .ok_or_else(|| DatasetError::NotFound(dataset.to_string()))?
            .get(layer)
            .ok_or_else(|| DatasetError::MissingLayer {
                dataset: dataset.to_string(),
                layer: layer.to_string(),
            })
    }
}

impl FeatureStore for MemoryFeatureStore {
    fn list_datasets(&self) -> Result<Vec<String>, DatasetError> {
        Ok(self.datasets.keys().cloned().collect())
    }

    fn list_layers(&self, dataset: &str) -> Result<Vec<String>, DatasetError> {
        self.datasets
            .get(dataset)
            .map(|layers| layers.keys().cloned().collect())
            .ok_or_else(|| DatasetError::NotFound(dataset.to_string()))
    }

    fn schema(&self, dataset: &str, layer: &str) -> Result<LayerSchema, DatasetError> {
        Ok(self.layer(dataset, layer)?.schema().clone())
    }

    fn bounds(&self, dataset: &str, layer: &str) -> Result<Option<BBox>, DatasetError> {
        Ok(self.layer(dataset, layer)?.bounds())
    }

    fn filter_by_bbox<'a>(
        &'a self,
        dataset: &str,
        layer: &str,
        bbox: &BBox,
    ) -> Result<FeatureIter<'a>, DatasetError> {
        Ok(self.layer(dataset, layer)?.features_in(bbox))
    }

    fn source_ref(&self, dataset: &str) -> String {
        format!("memory://{}", dataset)
    }
}
