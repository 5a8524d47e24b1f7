//! Persistent tile cache.
//!
//! A keyed blob store mapping `(tileset, z, x, y)` to an encoded tile. A
//! zero-length payload records a tile that was computed and found to have no
//! features, which is different from a tile that was never computed.
//!
//! # Write semantics
//!
//! - `upsert` is idempotent; the last writer wins. Concurrent writes to the
//!   same key are not arbitrated.
//! - `bulk_upsert` is atomic per batch when the backend is transactional
//!   (SQLite); otherwise it is only a throughput optimization.
//! - `reset` must finish before a rebuild writes to the same tileset.
//!
//! # Backends
//!
//! - [`SqliteCacheStore`]: single-table SQLite database behind an `r2d2` pool
//! - [`MemoryCacheStore`]: in-process map, for tests and ephemeral servers

mod memory;
mod sqlite;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::CacheError;
use crate::tile::TileKey;

pub use memory::MemoryCacheStore;
pub use sqlite::{SqliteCacheStore, CACHE_FILE_NAME};

/// One cache row.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: TileKey,
    pub payload: Bytes,
}

impl CacheEntry {
    pub fn new(key: TileKey, payload: Bytes) -> Self {
        Self { key, payload }
    }
}

/// Keyed store for encoded tiles.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Look up a tile. `Ok(None)` means the tile was never written.
    async fn get(&self, key: &TileKey) -> Result<Option<Bytes>, CacheError>;

    async fn upsert(&self, key: TileKey, payload: Bytes) -> Result<(), CacheError>;

    /// Write a batch; returns the number of rows written.
    async fn bulk_upsert(&self, entries: Vec<CacheEntry>) -> Result<usize, CacheError>;

    /// Drop every entry, or every entry of one tileset.
    async fn reset(&self, tileset: Option<&str>) -> Result<(), CacheError>;

    /// Number of entries, overall or for one tileset.
    async fn count(&self, tileset: Option<&str>) -> Result<u64, CacheError>;
}
