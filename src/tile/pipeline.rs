//! On-demand tile pipeline.
//!
//! ```text
//! TileCoord ──► tile bounds (EPSG:4326)
//!                   │  reproject per layer CRS
//!                   ▼
//!            FeatureStore::filter_by_bbox   (per layer, lazy)
//!                   │  clip ─► simplify (z < threshold) ─► reproject to 4326
//!                   ▼
//!            TileEncoder::encode ──► payload (empty when no features)
//! ```
//!
//! Every step runs under a [`Deadline`]. The async entry point runs the
//! blocking work on the blocking thread pool and stops waiting once the
//! deadline passes; the abandoned worker notices the expired deadline at its
//! next check and exits.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::debug;

use crate::error::TileError;
use crate::source::{FeatureStore, Tileset};
use crate::spatial::{Crs, GeoEngine, GeometryEngine};

use super::coord::TileCoord;
use super::encoder::{LayerFeatures, MvtEncoder, ProcessedFeature, TileEncoder};

/// Default wall-clock limit for one tile computation.
pub const DEFAULT_TILE_TIMEOUT: Duration = Duration::from_secs(1);

/// Zoom levels strictly below this are simplified by default.
pub const DEFAULT_SIMPLIFY_BELOW_ZOOM: u8 = 13;

/// Default simplification tolerance, in source CRS units.
pub const DEFAULT_SIMPLIFY_TOLERANCE: f64 = 0.00005;

// =============================================================================
// Configuration
// =============================================================================

/// Tuning knobs for [`TilePipeline`].
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Hard deadline for on-demand computations
    pub timeout: Duration,

    /// Simplify when `z < simplify_below_zoom`
    pub simplify_below_zoom: u8,

    /// Ramer-Douglas-Peucker tolerance
    pub simplify_tolerance: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TILE_TIMEOUT,
            simplify_below_zoom: DEFAULT_SIMPLIFY_BELOW_ZOOM,
            simplify_tolerance: DEFAULT_SIMPLIFY_TOLERANCE,
        }
    }
}

impl PipelineConfig {
    pub fn should_simplify(&self, z: u8) -> bool {
        z < self.simplify_below_zoom && self.simplify_tolerance > 0.0
    }
}

// =============================================================================
// Deadline
// =============================================================================

/// A cancellation context carried through a tile computation.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    expires_at: Option<Instant>,
}

impl Deadline {
    pub fn after(timeout: Duration) -> Self {
        Self {
            expires_at: Instant::now().checked_add(timeout),
        }
    }

    /// A deadline that never expires (offline builds).
    pub fn unbounded() -> Self {
        Self { expires_at: None }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at
            .map(|at| Instant::now() >= at)
            .unwrap_or(false)
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }
}

// =============================================================================
// Output
// =============================================================================

/// Result of one tile computation.
#[derive(Debug, Clone, PartialEq)]
pub struct TileOutput {
    /// Encoded payload; empty when no feature intersects the tile
    pub data: Bytes,

    /// Number of features handed to the encoder
    pub feature_count: usize,
}

impl TileOutput {
    pub fn empty() -> Self {
        Self {
            data: Bytes::new(),
            feature_count: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

// =============================================================================
// Tile Pipeline
// =============================================================================

/// Computes tiles from a feature store.
pub struct TilePipeline<F: FeatureStore> {
    store: Arc<F>,
    engine: Arc<dyn GeometryEngine>,
    encoder: Arc<dyn TileEncoder>,
    config: PipelineConfig,
}

impl<F: FeatureStore> TilePipeline<F> {
    /// Pipeline with the `geo` engine and the MVT encoder.
    pub fn new(store: Arc<F>, config: PipelineConfig) -> Self {
        Self::with_components(
            store,
            Arc::new(GeoEngine::new()),
            Arc::new(MvtEncoder::new()),
            config,
        )
    }

    pub fn with_components(
        store: Arc<F>,
        engine: Arc<dyn GeometryEngine>,
        encoder: Arc<dyn TileEncoder>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            engine,
            encoder,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<F> {
        &self.store
    }

    pub fn engine(&self) -> &Arc<dyn GeometryEngine> {
        &self.engine
    }

    pub fn content_type(&self) -> &'static str {
        self.encoder.content_type()
    }

    /// Compute a tile synchronously.
    ///
    /// Blocks on the feature store. The deadline is checked before every
    /// layer query and every feature.
    ///
    /// # Errors
    ///
    /// - [`TileError::InvalidCoordinate`] for coordinates outside the grid or
    ///   above the tileset's max zoom
    /// - [`TileError::Timeout`] once `deadline` has passed
    /// - [`TileError::Dataset`], [`TileError::Projection`],
    ///   [`TileError::Encode`] from the collaborators
    pub fn compute(
        &self,
        tileset: &Tileset,
        coord: TileCoord,
        deadline: &Deadline,
    ) -> Result<TileOutput, TileError> {
        coord.validate(tileset.max_zoom)?;

        let tile_bbox = coord.bounds();
        let simplify = self.config.should_simplify(coord.z);
        let mut layers = Vec::with_capacity(tileset.layers.len());
        let mut feature_count = 0;

        for layer in &tileset.layers {
            self.check_deadline(tileset, coord, deadline)?;

            let query_bbox = self
                .engine
                .reproject_bbox(&tile_bbox, &Crs::Wgs84, &layer.crs)?;
            match layer.bounds {
                Some(bounds) if bounds.intersects(&query_bbox) => {}
                _ => continue,
            }

            let mut out = LayerFeatures::new(layer.name.clone());
            for feature in self
                .store
                .filter_by_bbox(&tileset.name, &layer.name, &query_bbox)?
            {
                self.check_deadline(tileset, coord, deadline)?;
                let feature = feature?;

                let Some(clipped) = self.engine.clip(&feature.geometry, &query_bbox) else {
                    continue;
                };
                let geometry = if simplify {
                    self.engine
                        .simplify(&clipped, self.config.simplify_tolerance)
                } else {
                    clipped
                };
                let geometry = self.engine.reproject(&geometry, &layer.crs, &Crs::Wgs84)?;

                out.features.push(ProcessedFeature {
                    id: feature.id,
                    geometry,
                    properties: feature.properties,
                });
            }

            feature_count += out.features.len();
            if !out.is_empty() {
                layers.push(out);
            }
        }

        if feature_count == 0 {
            return Ok(TileOutput::empty());
        }

        self.check_deadline(tileset, coord, deadline)?;
        let data = self.encoder.encode(&coord, &layers)?;
        debug!(
            tileset = %tileset.name,
            z = coord.z,
            x = coord.x,
            y = coord.y,
            features = feature_count,
            bytes = data.len(),
            "Computed tile"
        );

        Ok(TileOutput {
            data,
            feature_count,
        })
    }

    /// Compute a tile on the blocking pool under the configured timeout.
    ///
    /// Returns [`TileError::Timeout`] as soon as the timeout elapses, without
    /// waiting for the worker to finish.
    pub async fn compute_with_timeout(
        self: &Arc<Self>,
        tileset: Arc<Tileset>,
        coord: TileCoord,
    ) -> Result<TileOutput, TileError> {
        let timeout = self.config.timeout;
        let deadline = Deadline::after(timeout);
        let timeout_error = TileError::Timeout {
            tileset: tileset.name.clone(),
            z: coord.z,
            x: coord.x,
            y: coord.y,
            timeout_ms: timeout.as_millis() as u64,
        };

        let pipeline = Arc::clone(self);
        let task =
            tokio::task::spawn_blocking(move || pipeline.compute(&tileset, coord, &deadline));

        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(TileError::Worker {
                message: join_error.to_string(),
            }),
            Err(_) => Err(timeout_error),
        }
    }

    fn check_deadline(
        &self,
        tileset: &Tileset,
        coord: TileCoord,
        deadline: &Deadline,
    ) -> Result<(), TileError> {
        if deadline.is_expired() {
            return Err(TileError::Timeout {
                tileset: tileset.name.clone(),
                z: coord.z,
                x: coord.x,
                y: coord.y,
                timeout_ms: self.config.timeout.as_millis() as u64,
            });
        }
        Ok(())
    }
}
