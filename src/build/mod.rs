//! Offline cache builds.
//!
//! - [`PyramidPlanner`]: which tiles a tileset needs, with subtree pruning
//! - [`CacheBuilder`]: computes planned tiles on a worker pool and writes
//!   them to a [`CacheStore`](crate::cache::CacheStore) in batches

mod builder;
mod planner;

pub use builder::{
    BuildJob, BuildReport, BuildStatus, CacheBuilder, JobParam, TilesetReport, DEFAULT_BATCH_SIZE,
};
pub use planner::{Frontier, PlanResult, PlanStats, PyramidPlanner};
