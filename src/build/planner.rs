//! Tile pyramid planner.
//!
//! Expands the seed tiles covering a tileset's envelope at the minimum zoom
//! into the tiles that must be materialized at the maximum zoom. A tile whose
//! bounds miss the envelope is pruned together with its whole subtree, since
//! every descendant lies inside it.
//!
//! Recursion depth is bounded by `max_zoom - min_zoom`.

use crate::spatial::{tiles_covering, BBox};
use crate::tile::TileCoord;

/// Node counters from a descent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanStats {
    /// Nodes examined
    pub visited: u64,

    /// Nodes whose subtree was discarded
    pub pruned: u64,
}

impl PlanStats {
    pub fn merge(&mut self, other: PlanStats) {
        self.visited += other.visited;
        self.pruned += other.pruned;
    }
}

/// Independent subtrees to hand out to workers.
#[derive(Debug, Clone, Default)]
pub struct Frontier {
    /// Subtree roots; disjoint, all intersecting the envelope
    pub roots: Vec<TileCoord>,

    /// Ancestors of the roots to emit themselves (only with all levels)
    pub above: Vec<TileCoord>,

    pub stats: PlanStats,
}

/// Output of a full sequential plan.
#[derive(Debug, Clone, Default)]
pub struct PlanResult {
    pub tiles: Vec<TileCoord>,
    pub stats: PlanStats,
}

/// Quadtree descent with envelope-intersection pruning.
#[derive(Debug, Clone)]
pub struct PyramidPlanner {
    envelope: BBox,
    min_zoom: u8,
    max_zoom: u8,
    emit_all_levels: bool,
}

impl PyramidPlanner {
    /// Plan from `min_zoom` (seed level) down to `max_zoom` (target level).
    ///
    /// A `min_zoom` above `max_zoom` is lowered to `max_zoom`.
    pub fn new(envelope: BBox, min_zoom: u8, max_zoom: u8) -> Self {
        Self {
            envelope,
            min_zoom: min_zoom.min(max_zoom),
            max_zoom,
            emit_all_levels: false,
        }
    }

    /// Also emit intermediate tiles between the seed and target levels.
    pub fn with_all_levels(mut self, emit_all_levels: bool) -> Self {
        self.emit_all_levels = emit_all_levels;
        self
    }

    pub fn envelope(&self) -> &BBox {
        &self.envelope
    }

    pub fn min_zoom(&self) -> u8 {
        self.min_zoom
    }

    pub fn max_zoom(&self) -> u8 {
        self.max_zoom
    }

    /// Tiles at the seed level covering the envelope.
    pub fn seed_tiles(&self) -> Vec<TileCoord> {
        let mut seeds: Vec<TileCoord> = tiles_covering(&self.envelope, self.min_zoom)
            .into_iter()
            .map(|(x, y)| TileCoord::new(self.min_zoom, x, y))
            .collect();
        seeds.sort();
        seeds
    }

    /// Whether a tile may contain features.
    pub fn intersects(&self, tile: &TileCoord) -> bool {
        tile.bounds().intersects(&self.envelope)
    }

    /// Walk the subtree under `root`, passing every emitted tile to `sink`.
    pub fn descend<S: FnMut(TileCoord)>(&self, root: TileCoord, sink: &mut S) -> PlanStats {
        let mut stats = PlanStats::default();
        self.visit(root, sink, &mut stats);
        stats
    }

    fn visit<S: FnMut(TileCoord)>(&self, tile: TileCoord, sink: &mut S, stats: &mut PlanStats) {
        stats.visited += 1;
        if !self.intersects(&tile) {
            stats.pruned += 1;
            return;
        }
        if tile.z >= self.max_zoom {
            sink(tile);
            return;
        }
        if self.emit_all_levels && tile.z >= self.min_zoom {
            sink(tile);
        }
        for child in tile.children() {
            self.visit(child, sink, stats);
        }
    }

    /// Split the pyramid into at least `min_roots` subtrees where possible.
    ///
    /// Expands level by level from the seeds until enough roots exist or the
    /// target level is reached.
    pub fn frontier(&self, min_roots: usize) -> Frontier {
        let mut stats = PlanStats::default();
        let mut above = Vec::new();
        let mut level: Vec<TileCoord> = Vec::new();

        for seed in self.seed_tiles() {
            stats.visited += 1;
            if self.intersects(&seed) {
                level.push(seed);
            } else {
                stats.pruned += 1;
            }
        }

        while !level.is_empty() && level.len() < min_roots && level[0].z < self.max_zoom {
            let mut next = Vec::with_capacity(level.len() * 4);
            for tile in level {
                if self.emit_all_levels {
                    above.push(tile);
                }
                for child in tile.children() {
                    stats.visited += 1;
                    if self.intersects(&child) {
                        next.push(child);
                    } else {
                        stats.pruned += 1;
                    }
                }
            }
            level = next;
        }

        // Roots are re-examined by `descend`.
        stats.visited -= level.len() as u64;

        Frontier {
            roots: level,
            above,
            stats,
        }
    }

    /// Run the whole plan sequentially.
    pub fn plan(&self) -> PlanResult {
        let mut tiles = Vec::new();
        let mut stats = PlanStats::default();
        for seed in self.seed_tiles() {
            stats.merge(self.descend(seed, &mut |tile| tiles.push(tile)));
        }
        PlanResult { tiles, stats }
    }
}
