//! SQLite-backed cache store.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::rusqlite::{params, OptionalExtension};
use r2d2_sqlite::SqliteConnectionManager;
use tracing::debug;

use crate::error::CacheError;
use crate::tile::TileKey;

use super::{CacheEntry, CacheStore};

/// File name of the cache database inside the cache directory.
pub const CACHE_FILE_NAME: &str = "cache.mbtiles";

const MAX_CONNECTIONS: u32 = 8;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS tiles (
    tileset TEXT NOT NULL,
    x INTEGER NOT NULL,
    y INTEGER NOT NULL,
    z INTEGER NOT NULL,
    data BLOB,
    PRIMARY KEY (tileset, x, y, z)
);";

const UPSERT: &str = "INSERT OR REPLACE INTO tiles (tileset, x, y, z, data) VALUES (?1, ?2, ?3, ?4, ?5)";

type Connection = PooledConnection<SqliteConnectionManager>;

/// [`CacheStore`] persisting tiles in `<cache-dir>/cache.mbtiles`.
///
/// The database runs in WAL mode so a server can keep reading while a build
/// writes. All statements run on the blocking thread pool.
#[derive(Clone)]
pub struct SqliteCacheStore {
    pool: Pool<SqliteConnectionManager>,
    path: PathBuf,
}

impl SqliteCacheStore {
    /// Open (creating if needed) the cache database in `dir`.
    pub fn open(dir: &Path) -> Result<Self, CacheError> {
        fs::create_dir_all(dir)
            .map_err(|e| CacheError::Io(format!("{}: {}", dir.display(), e)))?;
        Self::open_file(dir.join(CACHE_FILE_NAME))
    }

    /// Open (creating if needed) a cache database at an explicit path.
    pub fn open_file(path: PathBuf) -> Result<Self, CacheError> {
        let manager = SqliteConnectionManager::file(&path).with_init(|conn| {
            conn.busy_timeout(BUSY_TIMEOUT)?;
            conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
            conn.execute_batch("PRAGMA synchronous = NORMAL")
        });
        let pool = Pool::builder()
            .max_size(MAX_CONNECTIONS)
            .build(manager)
            .map_err(|e| CacheError::Pool(e.to_string()))?;

        pool.get()
            .map_err(|e| CacheError::Pool(e.to_string()))?
            .execute_batch(SCHEMA)
            .map_err(db_error)?;

        debug!(path = %path.display(), "Opened SQLite tile cache");
        Ok(Self { pool, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` with a pooled connection on the blocking thread pool.
    async fn with_connection<T, F>(&self, f: F) -> Result<T, CacheError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, CacheError> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(|e| CacheError::Pool(e.to_string()))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| CacheError::Worker(e.to_string()))?
    }
}

fn db_error(e: r2d2_sqlite::rusqlite::Error) -> CacheError {
    CacheError::Database(e.to_string())
}

#[async_trait]
impl CacheStore for SqliteCacheStore {
    async fn get(&self, key: &TileKey) -> Result<Option<Bytes>, CacheError> {
        let key = key.clone();
        self.with_connection(move |conn| {
            let row: Option<Option<Vec<u8>>> = conn
                .query_row(
                    "SELECT data FROM tiles WHERE tileset = ?1 AND x = ?2 AND y = ?3 AND z = ?4",
                    params![&*key.tileset, key.x, key.y, key.z],
                    |row| row.get(0),
                )
                .optional()
                .map_err(db_error)?;
            Ok(row.map(|data| Bytes::from(data.unwrap_or_default())))
        })
        .await
    }

    async fn upsert(&self, key: TileKey, payload: Bytes) -> Result<(), CacheError> {
        self.with_connection(move |conn| {
            conn.execute(
                UPSERT,
                params![&*key.tileset, key.x, key.y, key.z, &payload[..]],
            )
            .map_err(db_error)?;
            Ok(())
        })
        .await
    }

    async fn bulk_upsert(&self, entries: Vec<CacheEntry>) -> Result<usize, CacheError> {
        if entries.is_empty() {
            return Ok(0);
        }
        self.with_connection(move |conn| {
            let transaction = conn.transaction().map_err(db_error)?;
            {
                let mut stmt = transaction.prepare_cached(UPSERT).map_err(db_error)?;
                for entry in &entries {
                    let key = &entry.key;
                    stmt.execute(params![
                        &*key.tileset,
                        key.x,
                        key.y,
                        key.z,
                        &entry.payload[..]
                    ])
                    .map_err(db_error)?;
                }
            }
            transaction.commit().map_err(db_error)?;
            Ok(entries.len())
        })
        .await
    }

    async fn reset(&self, tileset: Option<&str>) -> Result<(), CacheError> {
        let tileset = tileset.map(str::to_owned);
        self.with_connection(move |conn| {
            let deleted = match &tileset {
                Some(name) => conn.execute("DELETE FROM tiles WHERE tileset = ?1", params![name]),
                None => conn.execute("DELETE FROM tiles", []),
            }
            .map_err(db_error)?;
            debug!(tileset = ?tileset, deleted, "Reset tile cache");
            Ok(())
        })
        .await
    }

    async fn count(&self, tileset: Option<&str>) -> Result<u64, CacheError> {
        let tileset = tileset.map(str::to_owned);
        self.with_connection(move |conn| {
            let count: i64 = match &tileset {
                Some(name) => conn.query_row(
                    "SELECT COUNT(*) FROM tiles WHERE tileset = ?1",
                    params![name],
                    |row| row.get(0),
                ),
                None => conn.query_row("SELECT COUNT(*) FROM tiles", [], |row| row.get(0)),
            }
            .map_err(db_error)?;
            Ok(count.max(0) as u64)
        })
        .await
    }
}
