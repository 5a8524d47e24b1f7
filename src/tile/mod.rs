//! Tile computation and serving.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              HTTP Handlers              │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │              Tile Service               │
//! │  ┌──────────────┐  ┌─────────────────┐  │
//! │  │  CacheStore  │  │  TilePipeline   │  │
//! │  │  (pre-built  │  │  (query, clip,  │  │
//! │  │   tiles)     │  │   encode)       │  │
//! │  └──────────────┘  └─────────────────┘  │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │              FeatureStore               │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`TileService`]: Entry point for tile requests (cache, then pipeline)
//! - [`TilePipeline`]: Computes one tile under a [`Deadline`]
//! - [`TileEncoder`] / [`MvtEncoder`]: Serialize processed features
//! - [`TileCoord`] / [`TileKey`]: Grid positions and cache keys

mod coord;
mod encoder;
mod pipeline;
mod service;

pub use coord::{TileCoord, TileKey, MAX_ZOOM};
pub use encoder::{LayerFeatures, MvtEncoder, ProcessedFeature, TileEncoder, DEFAULT_EXTENT};
pub use pipeline::{
    Deadline, PipelineConfig, TileOutput, TilePipeline, DEFAULT_SIMPLIFY_BELOW_ZOOM,
    DEFAULT_SIMPLIFY_TOLERANCE, DEFAULT_TILE_TIMEOUT,
};
pub use service::{TileRequest, TileResponse, TileService};
