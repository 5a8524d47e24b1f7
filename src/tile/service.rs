//! Tile Service: resolves tile requests from the cache or the pipeline.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         TileService                          │
//! │                                                              │
//! │   Received ──► CacheLookup ──► Hit ─────────────► Respond    │
//! │                    │                                         │
//! │                    └─► Miss ──► OnDemandCompute ─► Respond   │
//! │                                       │                      │
//! │                                       └─► Timeout/Error      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Serving never writes to the cache; only builds do.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::cache::CacheStore;
use crate::error::TileError;
use crate::source::{FeatureStore, Tileset, TilesetCatalog};

use super::coord::{TileCoord, TileKey};
use super::pipeline::TilePipeline;

// =============================================================================
// Tile Request
// =============================================================================

/// A request for one tile of a tileset.
#[derive(Debug, Clone)]
pub struct TileRequest {
    pub tileset: String,
    pub coord: TileCoord,
}

impl TileRequest {
    pub fn new(tileset: impl Into<String>, z: u8, x: u32, y: u32) -> Self {
        Self {
            tileset: tileset.into(),
            coord: TileCoord::new(z, x, y),
        }
    }
}

// =============================================================================
// Tile Response
// =============================================================================

/// Response from the tile service.
#[derive(Debug, Clone)]
pub struct TileResponse {
    /// The encoded tile; empty when the tile has no features
    pub data: Bytes,

    /// Whether this tile was served from the pre-built cache
    pub cache_hit: bool,
}

impl TileResponse {
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

// =============================================================================
// Tile Service
// =============================================================================

/// Serves tiles for every tileset in a catalog.
///
/// # Type Parameters
///
/// * `F` - The feature store backing the on-demand pipeline
pub struct TileService<F: FeatureStore> {
    catalog: Arc<TilesetCatalog>,
    pipeline: Arc<TilePipeline<F>>,

    /// Pre-built cache consulted before computing
    cache: Option<Arc<dyn CacheStore>>,
}

impl<F: FeatureStore> TileService<F> {
    /// Create a service computing every tile on demand.
    pub fn new(catalog: Arc<TilesetCatalog>, pipeline: Arc<TilePipeline<F>>) -> Self {
        Self {
            catalog,
            pipeline,
            cache: None,
        }
    }

    /// Consult `cache` before computing.
    pub fn with_cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn catalog(&self) -> &Arc<TilesetCatalog> {
        &self.catalog
    }

    pub fn pipeline(&self) -> &Arc<TilePipeline<F>> {
        &self.pipeline
    }

    pub fn has_cache(&self) -> bool {
        self.cache.is_some()
    }

    /// Look up a tileset by name.
    pub fn tileset(&self, name: &str) -> Result<Arc<Tileset>, TileError> {
        self.catalog
            .get(name)
            .ok_or_else(|| TileError::TilesetNotFound {
                tileset: name.to_string(),
            })
    }

    /// Get a tile, from the cache when it holds one.
    ///
    /// A failing cache is logged and treated as a miss.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The tileset does not exist
    /// - The coordinate is outside the grid or above the tileset's max zoom
    /// - The on-demand computation times out or fails
    pub async fn get_tile(&self, request: TileRequest) -> Result<TileResponse, TileError> {
        let tileset = self.tileset(&request.tileset)?;
        let coord = request.coord;
        coord.validate(tileset.max_zoom)?;

        if let Some(cache) = &self.cache {
            let key = TileKey::new(tileset.name.as_str(), coord);
            match cache.get(&key).await {
                Ok(Some(data)) => {
                    debug!(tileset = %tileset.name, z = coord.z, x = coord.x, y = coord.y, "Cache hit");
                    return Ok(TileResponse {
                        data,
                        cache_hit: true,
                    });
                }
                Ok(None) => {}
                Err(e) => warn!(
                    tileset = %tileset.name,
                    z = coord.z,
                    x = coord.x,
                    y = coord.y,
                    error = %e,
                    "Cache lookup failed; computing on demand"
                ),
            }
        }

        let output = self.pipeline.compute_with_timeout(tileset, coord).await?;
        Ok(TileResponse {
            data: output.data,
            cache_hit: false,
        })
    }
}
