//! In-process cache store.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use crate::error::CacheError;
use crate::tile::TileKey;

use super::{CacheEntry, CacheStore};

/// [`CacheStore`] keeping every tile in a `HashMap`.
///
/// Nothing is evicted; entries live until [`CacheStore::reset`] or drop.
///
/// # Example
///
/// ```
/// use bytes::Bytes;
/// use geotiller::cache::{CacheStore, MemoryCacheStore};
/// use geotiller::tile::{TileCoord, TileKey};
///
/// #[tokio::main]
/// async fn main() {
///     let cache = MemoryCacheStore::new();
///     let key = TileKey::new("roads", TileCoord::new(3, 1, 2));
///
///     cache.upsert(key.clone(), Bytes::from_static(b"tile")).await.unwrap();
///     assert_eq!(cache.get(&key).await.unwrap(), Some(Bytes::from_static(b"tile")));
/// }
/// ```
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    tiles: RwLock<HashMap<TileKey, Bytes>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all entries, sorted by key for stable comparisons.
    pub async fn entries(&self) -> Vec<CacheEntry> {
        let tiles = self.tiles.read().await;
        let mut entries: Vec<CacheEntry> = tiles
            .iter()
            .map(|(key, payload)| CacheEntry::new(key.clone(), payload.clone()))
            .collect();
        entries.sort_by(|a, b| {
            (&a.key.tileset, a.key.z, a.key.x, a.key.y)
                .cmp(&(&b.key.tileset, b.key.z, b.key.x, b.key.y))
        });
        entries
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &TileKey) -> Result<Option<Bytes>, CacheError> {
        Ok(self.tiles.read().await.get(key).cloned())
    }

    async fn upsert(&self, key: TileKey, payload: Bytes) -> Result<(), CacheError> {
        self.tiles.write().await.insert(key, payload);
        Ok(())
    }

    async fn bulk_upsert(&self, entries: Vec<CacheEntry>) -> Result<usize, CacheError> {
        let count = entries.len();
        let mut tiles = self.tiles.write().await;
        for entry in entries {
            tiles.insert(entry.key, entry.payload);
        }
        Ok(count)
    }

    async fn reset(&self, tileset: Option<&str>) -> Result<(), CacheError> {
        let mut tiles = self.tiles.write().await;
        match tileset {
            Some(name) => tiles.retain(|key, _| &*key.tileset != name),
            None => tiles.clear(),
        }
        Ok(())
    }

    async fn count(&self, tileset: Option<&str>) -> Result<u64, CacheError> {
        let tiles = self.tiles.read().await;
        let count = match tileset {
            Some(name) => tiles.keys().filter(|key| &*key.tileset == name).count(),
            None => tiles.len(),
        };
        Ok(count as u64)
    }
}
