//! Cache store integration tests.
//!
//! Tests verify:
//! - Get after upsert returns the written payload
//! - Keys that differ in any component never collide
//! - Empty payloads are distinct from missing entries
//! - Reset semantics and persistence across reopen

use bytes::Bytes;
use tempfile::TempDir;

use geotiller::cache::{CacheEntry, CacheStore, MemoryCacheStore, SqliteCacheStore, CACHE_FILE_NAME};
use geotiller::tile::{TileCoord, TileKey};

fn key(tileset: &str, z: u8, x: u32, y: u32) -> TileKey {
    TileKey::new(tileset, TileCoord::new(z, x, y))
}

/// Keys differing from `a/3/1/2` in exactly one component.
fn neighbours() -> Vec<TileKey> {
    vec![
        key("a", 3, 1, 2),
        key("b", 3, 1, 2),
        key("a", 4, 1, 2),
        key("a", 3, 2, 1),
        key("a", 3, 1, 3),
    ]
}

async fn check_key_uniqueness(cache: &dyn CacheStore) {
    for (i, k) in neighbours().into_iter().enumerate() {
        cache
            .upsert(k, Bytes::from(vec![i as u8; i + 1]))
            .await
            .unwrap();
    }
    for (i, k) in neighbours().into_iter().enumerate() {
        assert_eq!(
            cache.get(&k).await.unwrap(),
            Some(Bytes::from(vec![i as u8; i + 1])),
            "payload for {}",
            k
        );
    }
    assert_eq!(cache.count(None).await.unwrap(), neighbours().len() as u64);
}

#[tokio::test]
async fn test_sqlite_key_uniqueness() {
    let dir = TempDir::new().unwrap();
    let cache = SqliteCacheStore::open(dir.path()).unwrap();
    check_key_uniqueness(&cache).await;
}

#[tokio::test]
async fn test_memory_key_uniqueness() {
    check_key_uniqueness(&MemoryCacheStore::new()).await;
}

#[tokio::test]
async fn test_sqlite_file_location() {
    let dir = TempDir::new().unwrap();
    let nested = dir.path().join("nested/cache");
    let cache = SqliteCacheStore::open(&nested).unwrap();
    assert_eq!(cache.path(), nested.join(CACHE_FILE_NAME));
    assert!(nested.join(CACHE_FILE_NAME).exists());
}

#[tokio::test]
async fn test_sqlite_empty_payload_persists() {
    let dir = TempDir::new().unwrap();
    {
        let cache = SqliteCacheStore::open(dir.path()).unwrap();
        cache
            .bulk_upsert(vec![
                CacheEntry::new(key("roads", 5, 17, 10), Bytes::new()),
                CacheEntry::new(key("roads", 5, 17, 11), Bytes::from_static(b"tile")),
            ])
            .await
            .unwrap();
    }

    let cache = SqliteCacheStore::open(dir.path()).unwrap();
    assert_eq!(cache.get(&key("roads", 5, 17, 10)).await.unwrap(), Some(Bytes::new()));
    assert_eq!(
        cache.get(&key("roads", 5, 17, 11)).await.unwrap(),
        Some(Bytes::from_static(b"tile"))
    );
    assert_eq!(cache.get(&key("roads", 5, 17, 12)).await.unwrap(), None);
}

#[tokio::test]
async fn test_sqlite_reset_scoped_to_tileset() {
    let dir = TempDir::new().unwrap();
    let cache = SqliteCacheStore::open(dir.path()).unwrap();
    cache
        .bulk_upsert(vec![
            CacheEntry::new(key("roads", 0, 0, 0), Bytes::from_static(b"r")),
            CacheEntry::new(key("parks", 0, 0, 0), Bytes::from_static(b"p")),
            CacheEntry::new(key("parks", 1, 0, 0), Bytes::from_static(b"p")),
        ])
        .await
        .unwrap();

    cache.reset(Some("parks")).await.unwrap();
    assert_eq!(cache.count(Some("parks")).await.unwrap(), 0);
    assert_eq!(cache.count(Some("roads")).await.unwrap(), 1);

    cache.reset(None).await.unwrap();
    assert_eq!(cache.count(None).await.unwrap(), 0);
}

#[tokio::test]
async fn test_sqlite_concurrent_readers_and_writer() {
    let dir = TempDir::new().unwrap();
    let cache = std::sync::Arc::new(SqliteCacheStore::open(dir.path()).unwrap());

    let writer = {
        let cache = cache.clone();
        tokio::spawn(async move {
            for x in 0..8u32 {
                let batch = (0..8u32)
                    .map(|y| CacheEntry::new(key("grid", 3, x, y), Bytes::from(vec![x as u8, y as u8])))
                    .collect();
                cache.bulk_upsert(batch).await.unwrap();
            }
        })
    };
    let reader = {
        let cache = cache.clone();
        tokio::spawn(async move {
            for x in 0..8u32 {
                if let Some(payload) = cache.get(&key("grid", 3, x, 0)).await.unwrap() {
                    assert_eq!(payload, Bytes::from(vec![x as u8, 0]));
                }
            }
        })
    };

    writer.await.unwrap();
    reader.await.unwrap();
    assert_eq!(cache.count(Some("grid")).await.unwrap(), 64);
}
