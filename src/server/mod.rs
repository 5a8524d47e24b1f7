//! HTTP server layer.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │         GET /tilesets/{tileset}/tiles/{z}/{x}/{y}.mvt           │
//! │                                                                 │
//! │  ┌─────────────┐  ┌──────────────────┐  ┌───────────────────┐   │
//! │  │  handlers   │  │     metadata     │  │      routes       │   │
//! │  │ (requests)  │  │ (TileJSON, style)│  │  (router config)  │   │
//! │  └─────────────┘  └──────────────────┘  └───────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod handlers;
pub mod metadata;
pub mod routes;

pub use handlers::{
    health_handler, index_handler, style_handler, tile_handler, tilejson_handler,
    tilesets_handler, AppState, ErrorResponse, HealthResponse, TilePathParams, TilesetSummary,
    TilesetsResponse, CACHE_HIT_HEADER, NO_CACHE,
};
pub use metadata::{starter_style, tilejson, PALETTE, TILEJSON_VERSION};
pub use routes::{create_router, RouterConfig};
