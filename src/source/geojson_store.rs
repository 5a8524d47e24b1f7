//! Directory-backed feature store reading GeoJSON files.
//!
//! Layout of the data directory:
//!
//! ```text
//! data/
//! ├── roads/              dataset "roads"
//! │   ├── highways.geojson    layer "highways"
//! │   └── streets.json        layer "streets"
//! └── parks.geojson       dataset "parks" with a single layer "parks"
//! ```
//!
//! Layers are parsed on first access and kept in memory with a spatial index.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use geojson::{feature::Id, GeoJson, JsonObject};
use tracing::{debug, warn};

use crate::error::DatasetError;
use crate::spatial::{BBox, Crs};

use super::index::IndexedLayer;
use super::store::{FeatureIter, FeatureStore, LayerSchema, SourceFeature};

const LAYER_EXTENSIONS: [&str; 2] = ["geojson", "json"];

/// [`FeatureStore`] over a directory of GeoJSON files.
#[derive(Debug)]
pub struct GeoJsonStore {
    root: PathBuf,

    /// dataset -> layer -> file
    datasets: BTreeMap<String, BTreeMap<String, PathBuf>>,

    /// Parsed layers keyed by (dataset, layer)
    loaded: RwLock<HashMap<(String, String), Arc<IndexedLayer>>>,
}

impl GeoJsonStore {
    /// Scan `root` for datasets.
    ///
    /// Only the directory layout is read here; file contents are parsed
    /// lazily.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, DatasetError> {
        let root = root.into();
        let read_error = |e: std::io::Error| DatasetError::Read {
            dataset: root.display().to_string(),
            message: e.to_string(),
        };

        let mut datasets = BTreeMap::new();
        for entry in fs::read_dir(&root).map_err(read_error)? {
            let path = entry.map_err(read_error)?.path();
            let Some(name) = file_stem(&path) else {
                continue;
            };

            if path.is_dir() {
                let layers = scan_layers(&path).map_err(read_error)?;
                if layers.is_empty() {
                    debug!(dataset = %name, "Skipping directory without GeoJSON layers");
                    continue;
                }
                datasets.insert(name, layers);
            } else if is_layer_file(&path) {
                let mut layers = BTreeMap::new();
                layers.insert(name.clone(), path);
                datasets.insert(name, layers);
            }
        }

        Ok(Self {
            root,
            datasets,
            loaded: RwLock::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn layer_path(&self, dataset: &str, layer: &str) -> Result<&PathBuf, DatasetError> {
        self.datasets
            .get(dataset)
            .ok_or_else(|| DatasetError::NotFound(dataset.to_string()))?
            .get(layer)
            .ok_or_else(|| DatasetError::MissingLayer {
                dataset: dataset.to_string(),
                layer: layer.to_string(),
            })
    }

    fn layer(&self, dataset: &str, layer: &str) -> Result<Arc<IndexedLayer>, DatasetError> {
        let key = (dataset.to_string(), layer.to_string());
        if let Some(loaded) = self
            .loaded
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key)
        {
            return Ok(Arc::clone(loaded));
        }

        let path = self.layer_path(dataset, layer)?;
        let parsed = Arc::new(read_layer(dataset, path)?);
        debug!(
            dataset = %dataset,
            layer = %layer,
            features = parsed.len(),
            "Loaded GeoJSON layer"
        );

        let mut loaded = self.loaded.write().unwrap_or_else(|e| e.into_inner());
        Ok(Arc::clone(loaded.entry(key).or_insert(parsed)))
    }
}

impl FeatureStore for GeoJsonStore {
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
        match self.datasets.get(dataset) {
            Some(layers) if layers.len() == 1 && layers.contains_key(dataset) => layers
                .values()
                .next()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            _ => self.root.join(dataset).display().to_string(),
        }
    }
}

fn file_stem(path: &Path) -> Option<String> {
    let stem = if path.is_dir() {
        path.file_name()
    } else {
        path.file_stem()
    };
    let stem = stem?.to_str()?;
    (!stem.starts_with('.')).then(|| stem.to_string())
}

fn is_layer_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| LAYER_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
}

fn scan_layers(dir: &Path) -> std::io::Result<BTreeMap<String, PathBuf>> {
    let mut layers = BTreeMap::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !is_layer_file(&path) {
            continue;
        }
        if let Some(name) = file_stem(&path) {
            layers.insert(name, path);
        }
    }
    Ok(layers)
}

fn read_layer(dataset: &str, path: &Path) -> Result<IndexedLayer, DatasetError> {
    let text = fs::read_to_string(path).map_err(|e| DatasetError::Read {
        dataset: dataset.to_string(),
        message: format!("{}: {}", path.display(), e),
    })?;
    let invalid = |message: String| DatasetError::Invalid {
        dataset: dataset.to_string(),
        message: format!("{}: {}", path.display(), message),
    };

    let geojson: GeoJson = text.parse().map_err(|e: geojson::Error| invalid(e.to_string()))?;

    let (raw, crs) = match geojson {
        GeoJson::FeatureCollection(collection) => {
            let crs = collection
                .foreign_members
                .as_ref()
                .and_then(crs_member)
                .unwrap_or_default();
            (collection.features, crs)
        }
        GeoJson::Feature(feature) => {
            let crs = feature
                .foreign_members
                .as_ref()
                .and_then(crs_member)
                .unwrap_or_default();
            (vec![feature], crs)
        }
        GeoJson::Geometry(geometry) => (vec![geojson::Feature::from(geometry)], Crs::Wgs84),
    };

    let mut features = Vec::with_capacity(raw.len());
    let mut skipped = 0usize;
    for feature in raw {
        let Some(geometry) = feature.geometry else {
            skipped += 1;
            continue;
        };
        let geometry = geo::Geometry::<f64>::try_from(geometry)
            .map_err(|e| invalid(e.to_string()))?;

        let properties = feature
            .properties
            .unwrap_or_default()
            .into_iter()
            .map(|(name, value)| (name.to_lowercase(), value))
            .collect();

        features.push(SourceFeature {
            id: feature.id.and_then(numeric_id),
            geometry,
            properties,
        });
    }

    if skipped > 0 {
        warn!(
            dataset = %dataset,
            path = %path.display(),
            skipped,
            "Skipped features without geometry"
        );
    }

    Ok(IndexedLayer::new(features, crs))
}

/// Read the legacy `crs` member: `{"type": "name", "properties": {"name": ...}}`.
fn crs_member(members: &JsonObject) -> Option<Crs> {
    let name = members
        .get("crs")?
        .get("properties")?
        .get("name")?
        .as_str()?;
    Some(Crs::parse(name))
}

fn numeric_id(id: Id) -> Option<u64> {
    match id {
        Id::Number(n) => n.as_u64(),
        Id::String(s) => s.parse().ok(),
    }
}
