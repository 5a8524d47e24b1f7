//! API integration tests for tiles, metadata documents and error handling.
//!
//! Tests verify:
//! - Tile retrieval and the empty-tile 404
//! - TileJSON and starter style documents
//! - Error cases (unknown tileset, invalid coordinates, timeouts)
//! - HTTP response codes and headers

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use bytes::Bytes;

use geotiller::cache::{CacheStore, MemoryCacheStore};
use geotiller::tile::{PipelineConfig, TileCoord, TileKey};

use super::test_utils::{
    cities_store, get, get_json, polygon_store, router, service, SlowStore, PUBLIC_URL,
};

// =============================================================================
// Tile Retrieval
// =============================================================================

#[tokio::test]
async fn test_tile_retrieval_success() {
    let router = router(service(polygon_store(), PipelineConfig::default()));

    let (status, headers, body) = get(router, "/tilesets/parcels/tiles/0/0/0.mvt").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        headers.get("content-type").unwrap(),
        "application/vnd.mapbox-vector-tile"
    );
    assert_eq!(headers.get("cache-control").unwrap(), "no-cache, no-store");
    assert_eq!(headers.get("x-tile-cache-hit").unwrap(), "false");
    assert!(!body.is_empty());
    // The layer name is stored verbatim in the protobuf payload.
    assert!(body.windows(4).any(|w| w == b"lots"));
}

#[tokio::test]
async fn test_tile_without_extension() {
    let router = router(service(polygon_store(), PipelineConfig::default()));
    let (status, _, body) = get(router, "/tilesets/parcels/tiles/1/0/0").await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body.is_empty());
}

#[tokio::test]
async fn test_tile_far_from_features_is_404() {
    let router = router(service(polygon_store(), PipelineConfig::default()));

    let (status, _, body) = get(router, "/tilesets/parcels/tiles/10/0/0.mvt").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "empty_tile");
}

#[tokio::test]
async fn test_cached_tile_is_served() {
    let cache = Arc::new(MemoryCacheStore::new());
    cache
        .upsert(
            TileKey::new("parcels", TileCoord::new(10, 0, 0)),
            Bytes::from_static(b"\x1a\x00"),
        )
        .await
        .unwrap();
    let router = router(service(polygon_store(), PipelineConfig::default()).with_cache(cache));

    let (status, headers, body) = get(router, "/tilesets/parcels/tiles/10/0/0.mvt").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get("x-tile-cache-hit").unwrap(), "true");
    assert_eq!(body, Bytes::from_static(b"\x1a\x00"));
}

#[tokio::test]
async fn test_cached_empty_tile_is_404() {
    let cache = Arc::new(MemoryCacheStore::new());
    cache
        .upsert(TileKey::new("parcels", TileCoord::new(0, 0, 0)), Bytes::new())
        .await
        .unwrap();
    let router = router(service(polygon_store(), PipelineConfig::default()).with_cache(cache));

    let (status, _, _) = get(router, "/tilesets/parcels/tiles/0/0/0.mvt").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =============================================================================
// Error Cases
// =============================================================================

#[tokio::test]
async fn test_unknown_tileset() {
    let router = router(service(polygon_store(), PipelineConfig::default()));
    let (status, json) = get_json(router, "/tilesets/nope/tiles/0/0/0.mvt").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "not_found");
    assert_eq!(json["status"], 404);
}

#[tokio::test]
async fn test_coordinate_outside_grid() {
    let router = router(service(polygon_store(), PipelineConfig::default()));
    let (status, json) = get_json(router, "/tilesets/parcels/tiles/2/4/0.mvt").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid_coordinate");
}

#[tokio::test]
async fn test_zoom_above_max() {
    let router = router(service(polygon_store(), PipelineConfig::default()));
    let (status, _) = get_json(router, "/tilesets/parcels/tiles/15/0/0.mvt").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unparseable_y() {
    let router = router(service(polygon_store(), PipelineConfig::default()));
    let (status, _) = get_json(router, "/tilesets/parcels/tiles/0/0/abc.mvt").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_slow_store_times_out() {
    let store = SlowStore::new(polygon_store(), Duration::from_millis(500));
    let config = PipelineConfig {
        timeout: Duration::from_millis(50),
        ..PipelineConfig::default()
    };
    let router = router(service(store, config));

    let started = std::time::Instant::now();
    let (status, json) = get_json(router, "/tilesets/parcels/tiles/0/0/0.mvt").await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(json["error"], "timeout");
    assert!(started.elapsed() < Duration::from_millis(450));
}

// =============================================================================
// Metadata
// =============================================================================

#[tokio::test]
async fn test_tilejson() {
    let router = router(service(polygon_store(), PipelineConfig::default()));

    let (status, headers, body) = get(router, "/tilesets/parcels/info/tile.json").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get("cache-control").unwrap(), "no-cache, no-store");

    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["tilejson"], "3.0.0");
    assert_eq!(json["id"], "parcels");
    assert_eq!(json["scheme"], "xyz");
    assert_eq!(
        json["tiles"][0],
        format!("{}/tilesets/parcels/tiles/{{z}}/{{x}}/{{y}}.mvt", PUBLIC_URL)
    );
    assert_eq!(json["minzoom"], 0);
    assert_eq!(json["maxzoom"], 14);
    assert_eq!(json["crs"], "EPSG:4326");

    let bounds: Vec<f64> = serde_json::from_value(json["bounds"].clone()).unwrap();
    let expected = [-10.0, -10.0, 10.0, 10.0];
    for (got, want) in bounds.iter().zip(expected) {
        assert!((got - want).abs() < 1e-9);
    }
    assert_eq!(json["center"][2], 0);

    let layer = &json["vector_layers"][0];
    assert_eq!(layer["id"], "lots");
    assert_eq!(layer["geometryType"], "Polygon");
    assert_eq!(layer["fields"]["name"], "str");
}

#[tokio::test]
async fn test_tilejson_empty_dataset() {
    let router = router(service(polygon_store(), PipelineConfig::default()));
    let (status, json) = get_json(router, "/tilesets/empty/info/tile.json").await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["bounds"].is_null());
    assert!(json["center"].is_null());
}

#[tokio::test]
async fn test_tilejson_unknown_tileset() {
    let router = router(service(polygon_store(), PipelineConfig::default()));
    let (status, _) = get_json(router, "/tilesets/nope/info/tile.json").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_starter_style() {
    let router = router(service(polygon_store(), PipelineConfig::default()));
    let (status, json) = get_json(router, "/styles/starter.json").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["version"], 8);
    assert_eq!(
        json["sources"]["parcels"]["url"],
        format!("{}/tilesets/parcels/info/tile.json", PUBLIC_URL)
    );
    assert!(json["sources"]["empty"].is_object());

    let ids: Vec<&str> = json["layers"]
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l["id"].as_str().unwrap())
        .collect();
    assert_eq!(
        ids,
        vec![
            "parcels_lots",
            "empty_nothing_point",
            "empty_nothing_linestring",
            "empty_nothing_polygon",
        ]
    );
}

#[tokio::test]
async fn test_tilesets_list() {
    let router = router(service(cities_store(), PipelineConfig::default()));
    let (status, json) = get_json(router, "/tilesets").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["tilesets"][0]["name"], "cities");
    assert_eq!(
        json["tilesets"][0]["tilejson"],
        format!("{}/tilesets/cities/info/tile.json", PUBLIC_URL)
    );
}

#[tokio::test]
async fn test_index_and_health() {
    let router = router(service(cities_store(), PipelineConfig::default()));
    let (status, _, body) = get(router.clone(), "/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body.is_empty());

    let (status, json) = get_json(router, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}
