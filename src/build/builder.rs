//! Cache builder.
//!
//! ```text
//!               ┌──────────────┐
//!               │   Planner    │  frontier: independent subtrees
//!               └──────┬───────┘
//!                      ▼
//!  ┌──────────────────────────────────────────┐
//!  │ worker pool (spawn_blocking, semaphore)  │  descend subtree,
//!  │   worker 1   worker 2   ...   worker N   │  compute each tile
//!  └──────────────────────┬───────────────────┘
//!                         │ bounded mpsc channel
//!                         ▼
//!               ┌──────────────────┐
//!               │ single consumer  │  owns the BuildJob:
//!               │ (BuildJob)       │  counters + pending batch
//!               └────────┬─────────┘
//!                        ▼
//!               CacheStore::bulk_upsert
//! ```
//!
//! Workers never touch shared mutable state; every result flows through the
//! channel to the one task that owns the accumulator.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::cache::{CacheEntry, CacheStore};
use crate::error::{BuildError, TileError};
use crate::source::{FeatureStore, Tileset, TilesetCatalog};
use crate::spatial::BBox;
use crate::tile::{Deadline, TileCoord, TileKey, TileOutput, TilePipeline};

use super::planner::{PlanStats, PyramidPlanner};

/// Default number of cache rows per write transaction.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Tiles between two progress log lines.
const PROGRESS_EVERY: u64 = 1000;

/// Subtrees handed out per worker, to even out uneven subtrees.
const ROOTS_PER_WORKER: usize = 4;

// =============================================================================
// Parameters and Reports
// =============================================================================

/// Parameters of a build run.
///
/// The cache location is the [`CacheStore`] handed to [`CacheBuilder::new`].
#[derive(Debug, Clone)]
pub struct JobParam {
    /// Worker pool width
    pub concurrency: usize,

    /// Rows per `bulk_upsert` call
    pub batch_size: usize,

    /// Emit intermediate zoom levels, not just the target level
    pub all_levels: bool,
}

impl Default for JobParam {
    fn default() -> Self {
        Self {
            concurrency: num_cpus::get(),
            batch_size: DEFAULT_BATCH_SIZE,
            all_levels: false,
        }
    }
}

/// Outcome of one tileset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStatus {
    Built,
    /// No features (null envelope); nothing planned or written
    Skipped,
}

/// Per-tileset build summary.
#[derive(Debug, Clone)]
pub struct TilesetReport {
    pub name: String,
    pub status: BuildStatus,

    /// Tiles the planner emitted
    pub planned: u64,

    /// Cache rows written (including empty payloads)
    pub written: u64,

    /// Tiles computed with zero features
    pub empty: u64,

    /// Tiles whose computation failed; not written
    pub failed: u64,

    pub plan: PlanStats,
    pub elapsed: Duration,
}

impl TilesetReport {
    fn skipped(name: &str) -> Self {
        Self {
            name: name.to_string(),
            status: BuildStatus::Skipped,
            planned: 0,
            written: 0,
            empty: 0,
            failed: 0,
            plan: PlanStats::default(),
            elapsed: Duration::ZERO,
        }
    }
}

/// Summary of a whole build run.
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub tilesets: Vec<TilesetReport>,
    pub elapsed: Duration,
}

impl BuildReport {
    pub fn total_written(&self) -> u64 {
        self.tilesets.iter().map(|t| t.written).sum()
    }

    pub fn total_failed(&self) -> u64 {
        self.tilesets.iter().map(|t| t.failed).sum()
    }

    pub fn tileset(&self, name: &str) -> Option<&TilesetReport> {
        self.tilesets.iter().find(|t| t.name == name)
    }
}

// =============================================================================
// BuildJob
// =============================================================================

/// A computed tile travelling from a worker to the consumer.
struct TileResult {
    coord: TileCoord,
    outcome: Result<TileOutput, TileError>,
}

/// In-flight state of one tileset build, owned by the consumer task.
#[derive(Debug)]
pub struct BuildJob {
    pub tileset: Arc<Tileset>,
    pub envelope: BBox,
    pub min_zoom: u8,
    pub max_zoom: u8,

    pending: Vec<CacheEntry>,
    planned: u64,
    written: u64,
    empty: u64,
    failed: u64,
    started: Instant,
}

impl BuildJob {
    fn new(tileset: Arc<Tileset>, envelope: BBox, batch_size: usize) -> Self {
        Self {
            min_zoom: tileset.min_zoom,
            max_zoom: tileset.max_zoom,
            tileset,
            envelope,
            pending: Vec::with_capacity(batch_size),
            planned: 0,
            written: 0,
            empty: 0,
            failed: 0,
            started: Instant::now(),
        }
    }

    fn record(&mut self, result: TileResult) {
        self.planned += 1;
        let coord = result.coord;
        match result.outcome {
            Ok(output) => {
                if output.is_empty() {
                    self.empty += 1;
                }
                self.pending.push(CacheEntry::new(
                    TileKey::new(self.tileset.name.as_str(), coord),
                    output.data,
                ));
            }
            Err(e) => {
                self.failed += 1;
                warn!(
                    tileset = %self.tileset.name,
                    z = coord.z,
                    x = coord.x,
                    y = coord.y,
                    error = %e,
                    "Tile failed; not cached"
                );
            }
        }

        if self.planned % PROGRESS_EVERY == 0 {
            info!(
                tileset = %self.tileset.name,
                processed = self.planned,
                written = self.written,
                empty = self.empty,
                failed = self.failed,
                "Build progress"
            );
        }
    }

    async fn flush(&mut self, cache: &dyn CacheStore) -> Result<(), BuildError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(&mut self.pending);
        self.written += cache.bulk_upsert(batch).await? as u64;
        Ok(())
    }

    fn finish(self, plan: PlanStats) -> TilesetReport {
        TilesetReport {
            name: self.tileset.name.clone(),
            status: BuildStatus::Built,
            planned: self.planned,
            written: self.written,
            empty: self.empty,
            failed: self.failed,
            plan,
            elapsed: self.started.elapsed(),
        }
    }
}

// =============================================================================
// Cache Builder
// =============================================================================

/// Materializes tile pyramids into a cache store.
pub struct CacheBuilder<F: FeatureStore> {
    pipeline: Arc<TilePipeline<F>>,
    catalog: Arc<TilesetCatalog>,
    cache: Arc<dyn CacheStore>,
}

impl<F: FeatureStore> CacheBuilder<F> {
    pub fn new(
        pipeline: Arc<TilePipeline<F>>,
        catalog: Arc<TilesetCatalog>,
        cache: Arc<dyn CacheStore>,
    ) -> Self {
        Self {
            pipeline,
            catalog,
            cache,
        }
    }

    /// Reset the whole cache, then build every tileset in turn.
    ///
    /// Destructive: concurrent readers may see a partially filled cache
    /// until the run completes.
    pub async fn build_all(&self, param: &JobParam) -> Result<BuildReport, BuildError> {
        let started = Instant::now();
        self.cache.reset(None).await?;

        let mut report = BuildReport::default();
        for tileset in self.catalog.iter() {
            report
                .tilesets
                .push(self.run(Arc::clone(tileset), param).await?);
        }
        report.elapsed = started.elapsed();

        info!(
            tilesets = report.tilesets.len(),
            written = report.total_written(),
            failed = report.total_failed(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Cache build complete"
        );
        Ok(report)
    }

    /// Reset and rebuild a single tileset.
    pub async fn build_tileset(
        &self,
        name: &str,
        param: &JobParam,
    ) -> Result<Option<TilesetReport>, BuildError> {
        let Some(tileset) = self.catalog.get(name) else {
            return Ok(None);
        };
        self.cache.reset(Some(name)).await?;
        self.run(tileset, param).await.map(Some)
    }

    async fn run(
        &self,
        tileset: Arc<Tileset>,
        param: &JobParam,
    ) -> Result<TilesetReport, BuildError> {
        let Some(envelope) = tileset.envelope() else {
            info!(tileset = %tileset.name, "Skipping tileset without features");
            return Ok(TilesetReport::skipped(&tileset.name));
        };

        let concurrency = param.concurrency.max(1);
        let batch_size = param.batch_size.max(1);
        let planner = Arc::new(
            PyramidPlanner::new(envelope, tileset.min_zoom, tileset.max_zoom)
                .with_all_levels(param.all_levels),
        );
        info!(
            tileset = %tileset.name,
            min_zoom = planner.min_zoom(),
            max_zoom = planner.max_zoom(),
            workers = concurrency,
            "Building tileset"
        );

        let (tx, mut rx) = mpsc::channel::<TileResult>(batch_size * 2);
        let dispatcher = tokio::spawn(dispatch(
            Arc::clone(&self.pipeline),
            Arc::clone(&tileset),
            planner,
            concurrency,
            tx,
        ));

        let mut job = BuildJob::new(tileset, envelope, batch_size);
        while let Some(result) = rx.recv().await {
            job.record(result);
            if job.pending.len() >= batch_size {
                if let Err(e) = job.flush(self.cache.as_ref()).await {
                    dispatcher.abort();
                    return Err(e);
                }
            }
        }
        job.flush(self.cache.as_ref()).await?;

        let plan = dispatcher
            .await
            .map_err(|e| BuildError::Worker(e.to_string()))?;
        let report = job.finish(plan);

        info!(
            tileset = %report.name,
            planned = report.planned,
            written = report.written,
            empty = report.empty,
            failed = report.failed,
            pruned = report.plan.pruned,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Tileset built"
        );
        Ok(report)
    }
}

/// Fan subtrees out to blocking workers; returns the merged plan counters.
async fn dispatch<F: FeatureStore>(
    pipeline: Arc<TilePipeline<F>>,
    tileset: Arc<Tileset>,
    planner: Arc<PyramidPlanner>,
    concurrency: usize,
    tx: mpsc::Sender<TileResult>,
) -> PlanStats {
    let frontier = planner.frontier(concurrency * ROOTS_PER_WORKER);
    let mut stats = frontier.stats;
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let mut workers = JoinSet::new();

    let mut units: Vec<WorkUnit> = frontier.roots.into_iter().map(WorkUnit::Subtree).collect();
    if !frontier.above.is_empty() {
        units.push(WorkUnit::Tiles(frontier.above));
    }

    for unit in units {
        let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
            break;
        };
        let pipeline = Arc::clone(&pipeline);
        let tileset = Arc::clone(&tileset);
        let planner = Arc::clone(&planner);
        let tx = tx.clone();
        workers.spawn_blocking(move || {
            let _permit = permit;
            run_unit(&pipeline, &tileset, &planner, unit, &tx)
        });
    }
    drop(tx);

    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok(unit_stats) => stats.merge(unit_stats),
            Err(e) => error!(tileset = %tileset.name, error = %e, "Build worker panicked"),
        }
    }
    stats
}

enum WorkUnit {
    Subtree(TileCoord),
    Tiles(Vec<TileCoord>),
}

fn run_unit<F: FeatureStore>(
    pipeline: &TilePipeline<F>,
    tileset: &Tileset,
    planner: &PyramidPlanner,
    unit: WorkUnit,
    tx: &mpsc::Sender<TileResult>,
) -> PlanStats {
    let deadline = Deadline::unbounded();
    let mut closed = false;
    let mut compute = |coord: TileCoord| {
        if closed {
            return;
        }
        let outcome = pipeline.compute(tileset, coord, &deadline);
        if tx.blocking_send(TileResult { coord, outcome }).is_err() {
            closed = true;
        }
    };

    match unit {
        WorkUnit::Subtree(root) => planner.descend(root, &mut compute),
        WorkUnit::Tiles(tiles) => {
            tiles.into_iter().for_each(&mut compute);
            PlanStats::default()
        }
    }
}
