//! # geotiller
//!
//! A vector tile server for GeoJSON datasets.
//!
//! Tiles are served from a pre-built SQLite cache when one exists and are
//! otherwise computed on demand: features intersecting the tile are queried,
//! clipped, simplified, reprojected to EPSG:4326 and encoded as Mapbox Vector
//! Tiles. An offline builder walks each tileset's tile pyramid, pruning
//! subtrees that miss the data, and fills the cache.
//!
//! ## Features
//!
//! - **On-demand pipeline** with a hard per-tile deadline
//! - **Pre-built cache** in a single-table SQLite database
//! - **Pruned pyramid builds** on a bounded worker pool
//! - **TileJSON 3.0.0** metadata and a starter map style
//!
//! ## Architecture
//!
//! - [`spatial`] - Bounding boxes, tile math, CRS transforms, geometry engine
//! - [`source`] - Feature stores and the tileset catalog
//! - [`tile`] - Tile coordinates, MVT encoding, pipeline and tile service
//! - [`cache`] - Tile cache stores
//! - [`build`] - Pyramid planner and cache builder
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use geotiller::{create_router, GeoEngine, GeoJsonStore, PipelineConfig, RouterConfig};
//! use geotiller::{TilePipeline, TileService, TilesetCatalog};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(GeoJsonStore::open("./data")?);
//!     let catalog = TilesetCatalog::load(store.as_ref(), &GeoEngine::new(), 0, 22)?;
//!     let pipeline = TilePipeline::new(store, PipelineConfig::default());
//!     let service = TileService::new(Arc::new(catalog), Arc::new(pipeline));
//!
//!     let router = create_router(service, RouterConfig::new("http://localhost:8080"));
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//!     axum::serve(listener, router).await?;
//!     Ok(())
//! }
//! ```

pub mod build;
pub mod cache;
pub mod config;
pub mod error;
pub mod server;
pub mod source;
pub mod spatial;
pub mod tile;

// Re-export commonly used types
pub use build::{BuildReport, CacheBuilder, JobParam, PyramidPlanner};
pub use cache::{CacheEntry, CacheStore, MemoryCacheStore, SqliteCacheStore};
pub use config::{BuildConfig, CheckConfig, Cli, Command, ServeConfig};
pub use error::{BuildError, CacheError, DatasetError, ProjectionError, TileError};
pub use server::{create_router, AppState, ErrorResponse, RouterConfig};
pub use source::{
    FeatureStore, GeoJsonStore, MemoryFeatureStore, SourceFeature, Tileset, TilesetCatalog,
};
pub use spatial::{BBox, Crs, GeoEngine, GeometryEngine};
pub use tile::{
    Deadline, MvtEncoder, PipelineConfig, TileCoord, TileEncoder, TileKey, TilePipeline,
    TileRequest, TileResponse, TileService,
};
