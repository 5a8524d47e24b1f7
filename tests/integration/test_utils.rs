//! Test utilities for integration tests.
//!
//! Provides:
//! - Ready-made feature stores (polygon, points, empty dataset)
//! - Store wrappers that delay or fail queries
//! - Router and service builders plus a request helper

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use bytes::Bytes;
use geo::{point, polygon, Geometry};
use http_body_util::BodyExt;
use tower::ServiceExt;

use geotiller::error::DatasetError;
use geotiller::source::{
    FeatureIter, FeatureStore, LayerSchema, MemoryFeatureStore, SourceFeature, TilesetCatalog,
};
use geotiller::spatial::{BBox, Crs, GeoEngine};
use geotiller::tile::{PipelineConfig, TilePipeline, TileService};
use geotiller::{create_router, RouterConfig};

pub const PUBLIC_URL: &str = "http://tiles.test";

// =============================================================================
// Feature Stores
// =============================================================================

/// Square polygon spanning (-10, -10, 10, 10).
pub fn square_polygon() -> SourceFeature {
    SourceFeature::new(Geometry::Polygon(polygon![
        (x: -10.0, y: -10.0),
        (x: 10.0, y: -10.0),
        (x: 10.0, y: 10.0),
        (x: -10.0, y: 10.0),
        (x: -10.0, y: -10.0),
    ]))
    .with_id(1)
    .with_property("name", "square")
}

/// Dataset `parcels` with one polygon layer `lots`, plus a dataset `empty`
/// whose only layer has no features.
pub fn polygon_store() -> MemoryFeatureStore {
    MemoryFeatureStore::new()
        .with_layer("parcels", "lots", Crs::Wgs84, vec![square_polygon()])
        .with_layer("empty", "nothing", Crs::Wgs84, Vec::new())
}

/// Dataset `cities` with a few points spread over both hemispheres.
pub fn cities_store() -> MemoryFeatureStore {
    let cities = [
        ("berlin", 13.40, 52.52),
        ("nairobi", 36.82, -1.29),
        ("lima", -77.04, -12.05),
        ("toronto", -79.38, 43.65),
    ];
    let features = cities
        .iter()
        .enumerate()
        .map(|(i, (name, lng, lat))| {
            SourceFeature::new(Geometry::Point(point!(x: *lng, y: *lat)))
                .with_id(i as u64 + 1)
                .with_property("name", *name)
        })
        .collect();
    MemoryFeatureStore::new().with_layer("cities", "places", Crs::Wgs84, features)
}

/// Wraps a store and sleeps inside every feature query.
pub struct SlowStore<F> {
    inner: F,
    delay: Duration,
    queries: AtomicUsize,
}

impl<F: FeatureStore> SlowStore<F> {
    pub fn new(inner: F, delay: Duration) -> Self {
        Self {
            inner,
            delay,
            queries: AtomicUsize::new(0),
        }
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

impl<F: FeatureStore> FeatureStore for SlowStore<F> {
    fn list_datasets(&self) -> Result<Vec<String>, DatasetError> {
        self.inner.list_datasets()
    }

    fn list_layers(&self, dataset: &str) -> Result<Vec<String>, DatasetError> {
        self.inner.list_layers(dataset)
    }

    fn schema(&self, dataset: &str, layer: &str) -> Result<LayerSchema, DatasetError> {
        self.inner.schema(dataset, layer)
    }

    fn bounds(&self, dataset: &str, layer: &str) -> Result<Option<BBox>, DatasetError> {
        self.inner.bounds(dataset, layer)
    }

    fn filter_by_bbox<'a>(
        &'a self,
        dataset: &str,
        layer: &str,
        bbox: &BBox,
    ) -> Result<FeatureIter<'a>, DatasetError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        self.inner.filter_by_bbox(dataset, layer, bbox)
    }
}

/// Wraps a store and fails every query whose box reaches west of `meridian`.
pub struct FailingStore<F> {
    inner: F,
    meridian: f64,
}

impl<F: FeatureStore> FailingStore<F> {
    pub fn new(inner: F, meridian: f64) -> Self {
        Self { inner, meridian }
    }
}

impl<F: FeatureStore> FeatureStore for FailingStore<F> {
    fn list_datasets(&self) -> Result<Vec<String>, DatasetError> {
        self.inner.list_datasets()
    }

    fn list_layers(&self, dataset: &str) -> Result<Vec<String>, DatasetError> {
        self.inner.list_layers(dataset)
    }

    fn schema(&self, dataset: &str, layer: &str) -> Result<LayerSchema, DatasetError> {
        self.inner.schema(dataset, layer)
    }

    fn bounds(&self, dataset: &str, layer: &str) -> Result<Option<BBox>, DatasetError> {
        self.inner.bounds(dataset, layer)
    }

    fn filter_by_bbox<'a>(
        &'a self,
        dataset: &str,
        layer: &str,
        bbox: &BBox,
    ) -> Result<FeatureIter<'a>, DatasetError> {
        if bbox.west < self.meridian {
            return Err(DatasetError::Read {
                dataset: dataset.to_string(),
                message: "corrupt feature".to_string(),
            });
        }
        self.inner.filter_by_bbox(dataset, layer, bbox)
    }
}

// =============================================================================
// Services
// =============================================================================

pub fn catalog<F: FeatureStore>(store: &F, min_zoom: u8, max_zoom: u8) -> Arc<TilesetCatalog> {
    Arc::new(TilesetCatalog::load(store, &GeoEngine::new(), min_zoom, max_zoom).unwrap())
}

pub fn pipeline<F: FeatureStore>(store: Arc<F>, config: PipelineConfig) -> Arc<TilePipeline<F>> {
    Arc::new(TilePipeline::new(store, config))
}

/// Service computing tiles on demand over zooms 0-14.
pub fn service<F: FeatureStore>(store: F, config: PipelineConfig) -> TileService<F> {
    let catalog = catalog(&store, 0, 14);
    TileService::new(catalog, pipeline(Arc::new(store), config))
}

pub fn router<F: FeatureStore>(service: TileService<F>) -> Router {
    create_router(service, RouterConfig::new(PUBLIC_URL).with_tracing(false))
}

/// Issue a GET against the router.
pub async fn get(router: Router, uri: &str) -> (StatusCode, HeaderMap, Bytes) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, headers, body)
}

pub async fn get_json(router: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let (status, _, body) = get(router, uri).await;
    (status, serde_json::from_slice(&body).unwrap())
}

// =============================================================================
// Files
// =============================================================================

pub fn write_file(dir: &Path, relative: &str, contents: &str) {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

/// FeatureCollection with one line string in EPSG:3857.
pub const MERCATOR_ROADS: &str = r#"{
    "type": "FeatureCollection",
    "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::3857"}},
    "features": [
        {"type": "Feature", "id": 7, "properties": {"Kind": "primary", "lanes": 2},
         "geometry": {"type": "LineString",
                      "coordinates": [[1447153.38, 6891041.21], [1502813.17, 6945372.37]]}}
    ]
}"#;

/// FeatureCollection with a polygon and a point (mixed geometry types).
pub const MIXED_FEATURES: &str = r#"{
    "type": "FeatureCollection",
    "features": [
        {"type": "Feature", "properties": {"name": "field"},
         "geometry": {"type": "Polygon",
                      "coordinates": [[[2.0, 48.0], [3.0, 48.0], [3.0, 49.0], [2.0, 49.0], [2.0, 48.0]]]}},
        {"type": "Feature", "properties": {"name": "well", "depth": 12.5},
         "geometry": {"type": "Point", "coordinates": [2.5, 48.5]}}
    ]
}"#;
