//! HTTP request handlers for the vector tile API.
//!
//! # Endpoints
//!
//! - `GET /` - Liveness placeholder
//! - `GET /health` - Health check
//! - `GET /tilesets` - Tileset names and TileJSON URLs
//! - `GET /tilesets/{tileset}/info/tile.json` - TileJSON document
//! - `GET /tilesets/{tileset}/tiles/{z}/{x}/{y}.mvt` - Serve a tile
//! - `GET /styles/starter.json` - Starter map style

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::error::TileError;
use crate::source::FeatureStore;
use crate::tile::{TileRequest, TileService};

use super::metadata;

/// Tiles and documents are never cached by clients.
pub const NO_CACHE: &str = "no-cache, no-store";

/// Header telling whether a tile came from the pre-built cache.
pub const CACHE_HIT_HEADER: &str = "x-tile-cache-hit";

// =============================================================================
// Application State
// =============================================================================

/// Shared application state containing the tile service.
///
/// This is passed to all handlers via Axum's State extractor.
pub struct AppState<F: FeatureStore> {
    pub tile_service: Arc<TileService<F>>,

    /// Base URL written into TileJSON and style documents
    pub public_url: String,
}

impl<F: FeatureStore> AppState<F> {
    pub fn new(tile_service: TileService<F>, public_url: impl Into<String>) -> Self {
        Self {
            tile_service: Arc::new(tile_service),
            public_url: public_url.into().trim_end_matches('/').to_string(),
        }
    }
}

impl<F: FeatureStore> Clone for AppState<F> {
    fn clone(&self) -> Self {
        Self {
            tile_service: Arc::clone(&self.tile_service),
            public_url: self.public_url.clone(),
        }
    }
}

// =============================================================================
// Request Parameters
// =============================================================================

/// Path parameters for tile requests.
///
/// Extracted from: `/tilesets/{tileset}/tiles/{z}/{x}/{filename}`
/// where filename is `{y}` or `{y}.mvt`
#[derive(Debug, Deserialize)]
pub struct TilePathParams {
    pub tileset: String,
    pub z: u8,
    pub x: u32,

    /// Tile Y coordinate with optional .mvt extension (e.g., "0" or "0.mvt")
    pub filename: String,
}

impl TilePathParams {
    /// Parse the Y coordinate from the filename, stripping any .mvt extension.
    pub fn y(&self) -> Result<u32, std::num::ParseIntError> {
        let y_str = self
            .filename
            .strip_suffix(".mvt")
            .unwrap_or(&self.filename);
        y_str.parse()
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "not_found", "timeout")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// HTTP status code (included for convenience)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(
        error: impl Into<String>,
        message: impl Into<String>,
        status: StatusCode,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            status: Some(status.as_u16()),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct TilesetSummary {
    pub name: String,
    pub tilejson: String,
}

/// Response from the tileset list endpoint.
#[derive(Debug, Serialize)]
pub struct TilesetsResponse {
    pub tilesets: Vec<TilesetSummary>,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Convert TileError to HTTP response.
///
/// - 5xx errors are logged at ERROR level
/// - 404s are logged at DEBUG level
/// - other 4xx errors are logged at WARN level
impl IntoResponse for TileError {
    fn into_response(self) -> Response {
        let (status, error_type) = match &self {
            TileError::TilesetNotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
            TileError::InvalidCoordinate { .. } => (StatusCode::BAD_REQUEST, "invalid_coordinate"),
            TileError::Timeout { .. } => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
            TileError::Dataset(_) => (StatusCode::INTERNAL_SERVER_ERROR, "dataset_error"),
            TileError::Projection(_) => (StatusCode::INTERNAL_SERVER_ERROR, "projection_error"),
            TileError::Encode { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "encode_error"),
            TileError::Cache(_) => (StatusCode::INTERNAL_SERVER_ERROR, "cache_error"),
            TileError::Worker { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "worker_error"),
        };
        let message = self.to_string();

        if status.is_server_error() {
            error!(
                error_type = error_type,
                status = status.as_u16(),
                "Server error: {}",
                message
            );
        } else if status == StatusCode::NOT_FOUND {
            debug!(
                error_type = error_type,
                status = status.as_u16(),
                "Resource not found: {}",
                message
            );
        } else {
            warn!(
                error_type = error_type,
                status = status.as_u16(),
                "Client error: {}",
                message
            );
        }

        let error_response = ErrorResponse::with_status(error_type, message, status);
        (status, Json(error_response)).into_response()
    }
}

fn empty_tile_response(request: &TileRequest) -> Response {
    let message = format!("Tile {}/{} has no features", request.tileset, request.coord);
    debug!(
        tileset = %request.tileset,
        z = request.coord.z,
        x = request.coord.x,
        y = request.coord.y,
        "Empty tile"
    );
    let status = StatusCode::NOT_FOUND;
    (
        status,
        [(header::CACHE_CONTROL, HeaderValue::from_static(NO_CACHE))],
        Json(ErrorResponse::with_status("empty_tile", message, status)),
    )
        .into_response()
}

fn json_document(value: Value) -> Response {
    (
        [(header::CACHE_CONTROL, HeaderValue::from_static(NO_CACHE))],
        Json(value),
    )
        .into_response()
}

// =============================================================================
// Handlers
// =============================================================================

/// Serve one vector tile.
///
/// A tile without features (computed or cached) is answered with 404.
pub async fn tile_handler<F: FeatureStore>(
    State(state): State<AppState<F>>,
    Path(params): Path<TilePathParams>,
) -> Result<Response, TileError> {
    let y = match params.y() {
        Ok(y) => y,
        Err(_) => {
            let tileset = state.tile_service.tileset(&params.tileset)?;
            return Err(TileError::InvalidCoordinate {
                z: params.z,
                x: params.x,
                y: u32::MAX,
                max_zoom: tileset.max_zoom,
            });
        }
    };
    let request = TileRequest::new(params.tileset, params.z, params.x, y);

    let response = state.tile_service.get_tile(request.clone()).await?;
    if response.is_empty() {
        return Ok(empty_tile_response(&request));
    }

    let content_type = state.tile_service.pipeline().content_type();
    let cache_hit = if response.cache_hit { "true" } else { "false" };
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(content_type)),
            (header::CACHE_CONTROL, HeaderValue::from_static(NO_CACHE)),
            (
                HeaderName::from_static(CACHE_HIT_HEADER),
                HeaderValue::from_static(cache_hit),
            ),
        ],
        response.data,
    )
        .into_response())
}

/// TileJSON document of one tileset.
pub async fn tilejson_handler<F: FeatureStore>(
    State(state): State<AppState<F>>,
    Path(tileset): Path<String>,
) -> Result<Response, TileError> {
    let tileset = state.tile_service.tileset(&tileset)?;
    Ok(json_document(metadata::tilejson(&tileset, &state.public_url)))
}

/// Starter style covering every tileset.
pub async fn style_handler<F: FeatureStore>(State(state): State<AppState<F>>) -> Response {
    json_document(metadata::starter_style(
        state.tile_service.catalog(),
        &state.public_url,
    ))
}

pub async fn tilesets_handler<F: FeatureStore>(
    State(state): State<AppState<F>>,
) -> Json<TilesetsResponse> {
    let tilesets = state
        .tile_service
        .catalog()
        .names()
        .into_iter()
        .map(|name| TilesetSummary {
            tilejson: metadata::tilejson_url(&state.public_url, &name),
            name,
        })
        .collect();
    Json(TilesetsResponse { tilesets })
}

pub async fn index_handler() -> &'static str {
    "Welcome to geotiller"
}

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// =============================================================================
// Tests
// =============================================================================
