//! Router configuration.
//!
//! # Route Structure
//!
//! ```text
//! /                                              - Liveness placeholder
//! /health                                        - Health check
//! /tilesets                                      - List tilesets
//! /tilesets/{tileset}/info/tile.json             - TileJSON
//! /tilesets/{tileset}/tiles/{z}/{x}/{y}.mvt      - Tile endpoint
//! /styles/starter.json                           - Starter style
//! ```
//!
//! # Example
//!
//! ```ignore
//! use geotiller::server::{create_router, RouterConfig};
//!
//! let config = RouterConfig::new("http://localhost:8080")
//!     .with_cors_origins(vec!["https://example.com".to_string()]);
//! let router = create_router(tile_service, config);
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, router).await?;
//! ```

use std::time::Duration;

use axum::{routing::get, Router};
use http::header::CONTENT_TYPE;
use http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    health_handler, index_handler, style_handler, tile_handler, tilejson_handler,
    tilesets_handler, AppState,
};
use crate::source::FeatureStore;
use crate::tile::TileService;

// =============================================================================
// Router Configuration
// =============================================================================

/// Configuration for the HTTP router.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Base URL clients use to reach this server
    pub public_url: String,

    /// Allowed CORS origins (None = allow any origin)
    pub cors_origins: Option<Vec<String>>,

    /// Whether to enable request tracing
    pub enable_tracing: bool,
}

impl RouterConfig {
    /// By default CORS allows any origin and tracing is enabled.
    pub fn new(public_url: impl Into<String>) -> Self {
        Self {
            public_url: public_url.into(),
            cors_origins: None,
            enable_tracing: true,
        }
    }

    /// Set specific allowed CORS origins.
    ///
    /// Pass an empty vec to disallow all cross-origin requests.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    pub fn with_cors_any_origin(mut self) -> Self {
        self.cors_origins = None;
        self
    }

    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.enable_tracing = enabled;
        self
    }
}

// =============================================================================
// Router Builder
// =============================================================================

/// Create the main application router.
///
/// Uses `{filename}` to capture both `{y}` and `{y}.mvt`.
pub fn create_router<F: FeatureStore>(tile_service: TileService<F>, config: RouterConfig) -> Router {
    let app_state = AppState::new(tile_service, config.public_url.clone());
    let cors = build_cors_layer(&config);

    let router = Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/tilesets", get(tilesets_handler::<F>))
        .route(
            "/tilesets/{tileset}/info/tile.json",
            get(tilejson_handler::<F>),
        )
        .route(
            "/tilesets/{tileset}/tiles/{z}/{x}/{filename}",
            get(tile_handler::<F>),
        )
        .route("/styles/starter.json", get(style_handler::<F>))
        .with_state(app_state)
        .layer(cors);

    if config.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// Build the CORS layer based on configuration.
fn build_cors_layer(config: &RouterConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(86400));

    match &config.cors_origins {
        None => cors.allow_origin(Any),
        Some(origins) if origins.is_empty() => cors,
        Some(origins) => {
            let parsed_origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            cors.allow_origin(parsed_origins)
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
