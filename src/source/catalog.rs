//! The tileset catalog: the immutable list of tilesets for the process.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::error::DatasetError;
use crate::spatial::{BBox, Crs, GeometryEngine};

use super::store::{FeatureStore, FieldType, GeometryType};

// =============================================================================
// Tileset
// =============================================================================

/// One layer of a tileset, as derived from the feature store.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerInfo {
    pub name: String,
    pub geometry_type: GeometryType,
    pub fields: BTreeMap<String, FieldType>,

    /// Native CRS of the layer's features
    pub crs: Crs,

    /// Native-CRS envelope, `None` when the layer has no features
    pub bounds: Option<BBox>,
}

/// A named dataset served as a vector tile source.
#[derive(Debug, Clone, PartialEq)]
pub struct Tileset {
    pub name: String,

    /// Where the dataset lives (file path, URI)
    pub source: String,

    /// Native CRS of the dataset
    pub crs: Crs,

    /// Geographic (EPSG:4326) envelope of all features; `None` when the
    /// tileset has no features or its bounds could not be reprojected
    pub bounds: Option<BBox>,

    pub min_zoom: u8,
    pub max_zoom: u8,
    pub layers: Vec<LayerInfo>,
}

impl Tileset {
    /// Feature envelope used for tile pruning.
    pub fn envelope(&self) -> Option<BBox> {
        self.bounds
    }

    pub fn center(&self) -> Option<(f64, f64)> {
        self.bounds.map(|b| b.center())
    }

    pub fn layer(&self, name: &str) -> Option<&LayerInfo> {
        self.layers.iter().find(|layer| layer.name == name)
    }
}

// =============================================================================
// TilesetCatalog
// =============================================================================

/// Explicit context object holding every configured tileset.
///
/// Built once at startup and shared read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct TilesetCatalog {
    tilesets: BTreeMap<String, Arc<Tileset>>,
}

impl TilesetCatalog {
    /// Derive the catalog from every dataset in `store`.
    ///
    /// A dataset that cannot be read is logged and left out; only a failure
    /// to list datasets at all is returned.
    pub fn load<F: FeatureStore + ?Sized>(
        store: &F,
        engine: &dyn GeometryEngine,
        min_zoom: u8,
        max_zoom: u8,
    ) -> Result<Self, DatasetError> {
        let mut tilesets = Vec::new();
        for dataset in store.list_datasets()? {
            match load_tileset(store, engine, &dataset, min_zoom, max_zoom) {
                Ok(tileset) => tilesets.push(tileset),
                Err(e) => warn!(tileset = %dataset, error = %e, "Skipping unreadable dataset"),
            }
        }
        info!(count = tilesets.len(), "Loaded tileset catalog");
        Ok(Self::from_tilesets(tilesets))
    }

    pub fn from_tilesets(tilesets: impl IntoIterator<Item = Tileset>) -> Self {
        Self {
            tilesets: tilesets
                .into_iter()
                .map(|t| (t.name.clone(), Arc::new(t)))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<Tileset>> {
        self.tilesets.get(name).cloned()
    }

    /// Tileset names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.tilesets.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Tileset>> {
        self.tilesets.values()
    }

    pub fn len(&self) -> usize {
        self.tilesets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tilesets.is_empty()
    }
}

fn load_tileset<F: FeatureStore + ?Sized>(
    store: &F,
    engine: &dyn GeometryEngine,
    dataset: &str,
    min_zoom: u8,
    max_zoom: u8,
) -> Result<Tileset, DatasetError> {
    let mut layers = Vec::new();
    for name in store.list_layers(dataset)? {
        let schema = store.schema(dataset, &name)?;
        let bounds = match store.bounds(dataset, &name) {
            Ok(bounds) => bounds,
            Err(e) => {
                warn!(tileset = %dataset, layer = %name, error = %e, "Ignoring layer bounds");
                None
            }
        };
        layers.push(LayerInfo {
            name,
            geometry_type: schema.geometry_type,
            fields: schema.fields,
            crs: schema.crs,
            bounds,
        });
    }

    let crs = layers
        .first()
        .map(|layer| layer.crs.clone())
        .unwrap_or_default();

    Ok(Tileset {
        name: dataset.to_string(),
        source: store.source_ref(dataset),
        bounds: geographic_bounds(engine, dataset, &layers),
        crs,
        min_zoom,
        max_zoom,
        layers,
    })
}

/// Union of the layer envelopes in EPSG:4326.
fn geographic_bounds(
    engine: &dyn GeometryEngine,
    dataset: &str,
    layers: &[LayerInfo],
) -> Option<BBox> {
    let mut boxes = Vec::with_capacity(layers.len());
    for layer in layers {
        let Some(native) = layer.bounds else {
            continue;
        };
        match engine.reproject_bbox(&native, &layer.crs, &Crs::Wgs84) {
            Ok(bbox) => boxes.push(bbox),
            Err(e) => {
                warn!(
                    tileset = %dataset,
                    layer = %layer.name,
                    error = %e,
                    "Cannot reproject layer bounds; tileset bounds left empty"
                );
                return None;
            }
        }
    }
    engine.union_bboxes(&boxes)
}
