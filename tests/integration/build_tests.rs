//! Cache builder integration tests.
//!
//! Tests verify:
//! - Planned tiles land in the cache, empty ones as zero-length entries
//! - Tilesets without features are skipped
//! - Rebuilding an unchanged dataset is idempotent
//! - One failing tile does not abort its tileset
//! - A built cache is served by the tile endpoint

use std::collections::HashSet;
use std::sync::Arc;

use axum::http::StatusCode;
use tempfile::TempDir;

use geotiller::build::{BuildStatus, CacheBuilder, JobParam, PyramidPlanner};
use geotiller::cache::{CacheStore, MemoryCacheStore, SqliteCacheStore};
use geotiller::source::FeatureStore;
use geotiller::tile::{PipelineConfig, TileCoord, TileKey, TileService};

use super::test_utils::{
    catalog, cities_store, get, pipeline, polygon_store, router, FailingStore,
};

fn param(concurrency: usize, batch_size: usize) -> JobParam {
    JobParam {
        concurrency,
        batch_size,
        all_levels: false,
    }
}

fn builder<F: FeatureStore>(
    store: F,
    min_zoom: u8,
    max_zoom: u8,
    cache: Arc<dyn CacheStore>,
) -> CacheBuilder<F> {
    let catalog = catalog(&store, min_zoom, max_zoom);
    CacheBuilder::new(
        pipeline(Arc::new(store), PipelineConfig::default()),
        catalog,
        cache,
    )
}

#[tokio::test]
async fn test_build_writes_planned_tiles() {
    let cache = Arc::new(MemoryCacheStore::new());
    let builder = builder(polygon_store(), 0, 4, cache.clone());

    let report = builder.build_all(&param(4, 7)).await.unwrap();

    let parcels = report.tileset("parcels").unwrap();
    assert_eq!(parcels.status, BuildStatus::Built);
    assert_eq!(parcels.failed, 0);
    assert_eq!(parcels.written, parcels.planned);
    assert_eq!(cache.count(Some("parcels")).await.unwrap(), parcels.written);

    let envelope = geotiller::spatial::BBox::new(-10.0, -10.0, 10.0, 10.0);
    let expected: HashSet<TileCoord> = PyramidPlanner::new(envelope, 0, 4)
        .plan()
        .tiles
        .into_iter()
        .collect();
    let cached: HashSet<TileCoord> = cache
        .entries()
        .await
        .into_iter()
        .filter(|e| &*e.key.tileset == "parcels")
        .map(|e| e.key.coord())
        .collect();
    assert_eq!(cached, expected);
    assert!(cached.iter().all(|c| c.z == 4));
}

#[tokio::test]
async fn test_empty_dataset_is_skipped() {
    let cache = Arc::new(MemoryCacheStore::new());
    let builder = builder(polygon_store(), 0, 3, cache.clone());

    let report = builder.build_all(&param(2, 100)).await.unwrap();

    let empty = report.tileset("empty").unwrap();
    assert_eq!(empty.status, BuildStatus::Skipped);
    assert_eq!(empty.written, 0);
    assert_eq!(cache.count(Some("empty")).await.unwrap(), 0);
}

#[tokio::test]
async fn test_build_is_idempotent() {
    let cache = Arc::new(MemoryCacheStore::new());
    let builder = builder(cities_store(), 0, 6, cache.clone());

    builder.build_all(&param(3, 5)).await.unwrap();
    let first = cache.entries().await;
    builder.build_all(&param(1, 1000)).await.unwrap();
    let second = cache.entries().await;

    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_all_levels_build() {
    let cache = Arc::new(MemoryCacheStore::new());
    let builder = builder(cities_store(), 0, 3, cache.clone());

    let param = JobParam {
        all_levels: true,
        ..param(2, 16)
    };
    builder.build_all(&param).await.unwrap();

    let zooms: HashSet<u8> = cache.entries().await.iter().map(|e| e.key.z).collect();
    assert_eq!(zooms, (0..=3).collect());
    assert!(cache
        .get(&TileKey::new("cities", TileCoord::new(0, 0, 0)))
        .await
        .unwrap()
        .is_some_and(|payload| !payload.is_empty()));
}

#[tokio::test]
async fn test_failing_tiles_do_not_abort_build() {
    let cache = Arc::new(MemoryCacheStore::new());
    // Queries reaching west of the prime meridian fail.
    let builder = builder(FailingStore::new(cities_store(), 0.0), 0, 3, cache.clone());

    let report = builder.build_all(&param(2, 4)).await.unwrap();

    let cities = report.tileset("cities").unwrap();
    assert!(cities.failed > 0);
    assert!(cities.written > 0);
    assert_eq!(cities.planned, cities.written + cities.failed);
    assert_eq!(cache.count(Some("cities")).await.unwrap(), cities.written);
}

#[tokio::test]
async fn test_build_single_tileset_keeps_others() {
    let cache = Arc::new(MemoryCacheStore::new());
    let builder = builder(polygon_store(), 0, 2, cache.clone());
    builder.build_all(&param(2, 10)).await.unwrap();
    let before = cache.count(None).await.unwrap();

    let report = builder
        .build_tileset("parcels", &param(2, 10))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report.status, BuildStatus::Built);
    assert_eq!(cache.count(None).await.unwrap(), before);

    assert!(builder
        .build_tileset("missing", &param(2, 10))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_built_sqlite_cache_is_served() {
    let dir = TempDir::new().unwrap();
    let cache: Arc<dyn CacheStore> = Arc::new(SqliteCacheStore::open(dir.path()).unwrap());
    builder(polygon_store(), 0, 3, cache.clone())
        .build_all(&param(2, 50))
        .await
        .unwrap();

    let store = Arc::new(polygon_store());
    let service = TileService::new(
        catalog(store.as_ref(), 0, 14),
        pipeline(store, PipelineConfig::default()),
    )
    .with_cache(cache);
    let router = router(service);

    // Intersecting tile at the target level comes from the cache.
    let (status, headers, body) = get(router.clone(), "/tilesets/parcels/tiles/3/3/3.mvt").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get("x-tile-cache-hit").unwrap(), "true");
    assert!(!body.is_empty());

    // Below the built range the service falls back to on-demand computation.
    let (status, headers, _) = get(router, "/tilesets/parcels/tiles/0/0/0.mvt").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get("x-tile-cache-hit").unwrap(), "false");
}
