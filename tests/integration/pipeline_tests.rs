//! On-demand pipeline integration tests.
//!
//! Tests verify:
//! - The polygon scenario at z0 and far away at z10
//! - Timeout enforcement against a slow feature store
//! - Projected datasets are queried in their own CRS
//! - Datasets in a UTM zone are cataloged and served

use std::sync::Arc;
use std::time::{Duration, Instant};

use geo::{point, Geometry};
use tempfile::TempDir;

use geotiller::error::TileError;
use geotiller::source::{GeoJsonStore, MemoryFeatureStore, SourceFeature};
use geotiller::spatial::{lng_lat_to_tile, BBox, Crs, GeoEngine, GeometryEngine};
use geotiller::tile::{Deadline, PipelineConfig, TileCoord};

use super::test_utils::{catalog, pipeline, polygon_store, write_file, SlowStore, MERCATOR_ROADS};

#[test]
fn test_polygon_scenario() {
    let store = Arc::new(polygon_store());
    let catalog = catalog(store.as_ref(), 0, 14);
    let pipeline = pipeline(store, PipelineConfig::default());
    let tileset = catalog.get("parcels").unwrap();

    let near = pipeline
        .compute(&tileset, TileCoord::new(0, 0, 0), &Deadline::unbounded())
        .unwrap();
    assert_eq!(near.feature_count, 1);
    assert!(!near.is_empty());

    let far = pipeline
        .compute(&tileset, TileCoord::new(10, 0, 0), &Deadline::unbounded())
        .unwrap();
    assert!(far.is_empty());
    assert_eq!(far.feature_count, 0);
}

#[tokio::test]
async fn test_timeout_returns_within_deadline() {
    let store = Arc::new(SlowStore::new(polygon_store(), Duration::from_millis(400)));
    let catalog = catalog(store.as_ref(), 0, 14);
    let timeout = Duration::from_millis(50);
    let pipeline = pipeline(
        store.clone(),
        PipelineConfig {
            timeout,
            ..PipelineConfig::default()
        },
    );
    let tileset = catalog.get("parcels").unwrap();

    let started = Instant::now();
    let result = pipeline
        .compute_with_timeout(tileset, TileCoord::new(0, 0, 0))
        .await;
    let elapsed = started.elapsed();

    match result {
        Err(TileError::Timeout { timeout_ms, z, .. }) => {
            assert_eq!(timeout_ms, 50);
            assert_eq!(z, 0);
        }
        other => panic!("expected timeout, got {:?}", other),
    }
    assert!(elapsed < timeout + Duration::from_millis(250), "took {:?}", elapsed);
    assert_eq!(store.query_count(), 1);
}

#[test]
fn test_expired_deadline_stops_computation() {
    let store = Arc::new(polygon_store());
    let catalog = catalog(store.as_ref(), 0, 14);
    let pipeline = pipeline(store, PipelineConfig::default());
    let tileset = catalog.get("parcels").unwrap();

    let deadline = Deadline::after(Duration::ZERO);
    std::thread::sleep(Duration::from_millis(1));
    let result = pipeline.compute(&tileset, TileCoord::new(0, 0, 0), &deadline);
    assert!(matches!(result, Err(TileError::Timeout { .. })));
}

#[test]
fn test_projected_dataset() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "roads.geojson", MERCATOR_ROADS);
    let store = Arc::new(GeoJsonStore::open(dir.path()).unwrap());
    let catalog = catalog(store.as_ref(), 0, 14);
    let tileset = catalog.get("roads").unwrap();

    assert_eq!(tileset.crs, Crs::WebMercator);
    let bounds = tileset.bounds.unwrap();
    assert!((bounds.west - 13.0).abs() < 0.01, "{:?}", bounds);
    assert!((bounds.north - 52.8).abs() < 0.05, "{:?}", bounds);

    let (x, y) = lng_lat_to_tile(13.15, 52.6, 8);
    let pipeline = pipeline(store, PipelineConfig::default());
    let output = pipeline
        .compute(&tileset, TileCoord::new(8, x, y), &Deadline::unbounded())
        .unwrap();
    assert_eq!(output.feature_count, 1);
}

#[test]
fn test_bbox_reprojection_round_trip() {
    let engine = GeoEngine::new();
    let projected = BBox::new(1_000_000.0, 5_000_000.0, 1_500_000.0, 5_600_000.0);

    let geographic = engine
        .reproject_bbox(&projected, &Crs::WebMercator, &Crs::Wgs84)
        .unwrap();
    let back = engine
        .reproject_bbox(&geographic, &Crs::Wgs84, &Crs::WebMercator)
        .unwrap();

    for (a, b) in projected.to_array().iter().zip(back.to_array()) {
        assert!((a - b).abs() < 1e-3, "{} vs {}", a, b);
    }
}

#[test]
fn test_utm_dataset() {
    let engine = GeoEngine::new();
    let utm = Crs::parse("EPSG:32633");
    let berlin = engine
        .reproject(&Geometry::Point(point!(x: 13.4, y: 52.52)), &Crs::Wgs84, &utm)
        .unwrap();
    let store = Arc::new(MemoryFeatureStore::new().with_layer(
        "berlin",
        "sites",
        utm,
        vec![SourceFeature::new(berlin).with_id(7)],
    ));
    let catalog = catalog(store.as_ref(), 0, 14);
    let tileset = catalog.get("berlin").unwrap();

    let bounds = tileset.bounds.unwrap();
    assert!((bounds.west - 13.4).abs() < 1e-6, "{:?}", bounds);
    assert!((bounds.north - 52.52).abs() < 1e-6, "{:?}", bounds);

    let pipeline = pipeline(store, PipelineConfig::default());
    let world = pipeline
        .compute(&tileset, TileCoord::new(0, 0, 0), &Deadline::unbounded())
        .unwrap();
    assert_eq!(world.feature_count, 1);

    let (x, y) = lng_lat_to_tile(13.4, 52.52, 8);
    let local = pipeline
        .compute(&tileset, TileCoord::new(8, x, y), &Deadline::unbounded())
        .unwrap();
    assert_eq!(local.feature_count, 1);

    let away = pipeline
        .compute(&tileset, TileCoord::new(8, x + 3, y), &Deadline::unbounded())
        .unwrap();
    assert!(away.is_empty());
}
