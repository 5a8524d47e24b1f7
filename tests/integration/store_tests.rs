//! Feature store and catalog integration tests.
//!
//! Tests verify:
//! - Dataset discovery in a data directory
//! - Schema derivation (lowercased fields, mixed geometry types)
//! - Catalog metadata over GeoJSON datasets
//! - Serving a GeoJSON directory end to end

use std::sync::Arc;

use axum::http::StatusCode;
use tempfile::TempDir;

use geotiller::source::{FeatureStore, FieldType, GeoJsonStore, GeometryType};
use geotiller::tile::{PipelineConfig, TileService};

use super::test_utils::{
    catalog, get, get_json, pipeline, router, write_file, MERCATOR_ROADS, MIXED_FEATURES,
};

fn data_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "city/roads.geojson", MERCATOR_ROADS);
    write_file(dir.path(), "city/sites.json", MIXED_FEATURES);
    write_file(dir.path(), "farms.geojson", MIXED_FEATURES);
    write_file(dir.path(), "notes.txt", "not a dataset");
    dir
}

#[test]
fn test_discovery() {
    let dir = data_dir();
    let store = GeoJsonStore::open(dir.path()).unwrap();

    assert_eq!(
        store.list_datasets().unwrap(),
        vec!["city".to_string(), "farms".to_string()]
    );
    assert_eq!(
        store.list_layers("city").unwrap(),
        vec!["roads".to_string(), "sites".to_string()]
    );
    assert!(store.list_layers("notes").is_err());
}

#[test]
fn test_schema_derivation() {
    let dir = data_dir();
    let store = GeoJsonStore::open(dir.path()).unwrap();

    let roads = store.schema("city", "roads").unwrap();
    assert_eq!(roads.geometry_type, GeometryType::LineString);
    assert_eq!(roads.fields.get("kind"), Some(&FieldType::Str));
    assert_eq!(roads.fields.get("lanes"), Some(&FieldType::Int));

    let sites = store.schema("city", "sites").unwrap();
    assert_eq!(sites.geometry_type, GeometryType::Unknown);
    assert_eq!(sites.fields.get("depth"), Some(&FieldType::Float));
}

#[test]
fn test_catalog_over_directory() {
    let dir = data_dir();
    let store = GeoJsonStore::open(dir.path()).unwrap();
    let catalog = catalog(&store, 0, 12);

    assert_eq!(catalog.names(), vec!["city".to_string(), "farms".to_string()]);

    let city = catalog.get("city").unwrap();
    assert_eq!(city.layers.len(), 2);
    assert_eq!(city.max_zoom, 12);
    // Union of a Berlin road (Web Mercator) and sites near Paris (EPSG:4326).
    let bounds = city.bounds.unwrap();
    assert!((bounds.west - 2.0).abs() < 1e-9);
    assert!((bounds.east - 13.5).abs() < 0.01);
    assert!(city.source.contains("city"));
}

#[tokio::test]
async fn test_serve_geojson_directory() {
    let dir = data_dir();
    let store = Arc::new(GeoJsonStore::open(dir.path()).unwrap());
    let service = TileService::new(
        catalog(store.as_ref(), 0, 14),
        pipeline(store, PipelineConfig::default()),
    );
    let router = router(service);

    let (status, _, body) = get(router.clone(), "/tilesets/farms/tiles/0/0/0.mvt").await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body.is_empty());

    let (status, json) = get_json(router, "/styles/starter.json").await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = json["layers"]
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l["id"].as_str().unwrap())
        .collect();
    assert_eq!(
        ids,
        vec![
            "city_roads",
            "city_sites_point",
            "city_sites_linestring",
            "city_sites_polygon",
            "farms_farms_point",
            "farms_farms_linestring",
            "farms_farms_polygon",
        ]
    );
}
