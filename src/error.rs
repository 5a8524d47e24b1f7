use thiserror::Error;

/// Errors raised by a feature store while reading a dataset.
///
/// These are fatal for the affected tileset only; sibling tilesets keep
/// serving and building.
#[derive(Debug, Clone, Error)]
pub enum DatasetError {
    /// The dataset does not exist in the store
    #[error("Dataset not found: {0}")]
    NotFound(String),

    /// The dataset exists but has no layer with this name
    #[error("Layer '{layer}' not found in dataset '{dataset}'")]
    MissingLayer { dataset: String, layer: String },

    /// The dataset source could not be read
    #[error("Failed to read dataset '{dataset}': {message}")]
    Read { dataset: String, message: String },

    /// The dataset source was read but its content is malformed
    #[error("Invalid data in dataset '{dataset}': {message}")]
    Invalid { dataset: String, message: String },
}

/// Errors raised when transforming coordinates between reference systems.
#[derive(Debug, Clone, Error)]
pub enum ProjectionError {
    /// The reference system could not be resolved to a definition
    #[error("Unknown CRS {crs}: {message}")]
    Definition { crs: String, message: String },

    /// The transform exists but produced no usable coordinates
    #[error("CRS transform {from} -> {to} failed: {message}")]
    Transform {
        from: String,
        to: String,
        message: String,
    },
}

/// Errors raised by a tile cache store.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// The cache location could not be prepared
    #[error("Cache I/O error: {0}")]
    Io(String),

    /// The connection pool could not hand out a connection
    #[error("Cache connection pool error: {0}")]
    Pool(String),

    /// A statement against the backing database failed
    #[error("Cache database error: {0}")]
    Database(String),

    /// A blocking cache worker panicked or was cancelled
    #[error("Cache worker failed: {0}")]
    Worker(String),
}

/// Errors that can occur while resolving or computing a tile.
#[derive(Debug, Clone, Error)]
pub enum TileError {
    /// No tileset with this name is configured
    #[error("Tileset not found: {tileset}")]
    TilesetNotFound { tileset: String },

    /// Coordinates outside the tile grid or the tileset's zoom range
    #[error("Invalid tile coordinate {z}/{x}/{y} (max zoom {max_zoom})")]
    InvalidCoordinate { z: u8, x: u32, y: u32, max_zoom: u8 },

    /// The pipeline exceeded its wall-clock deadline
    #[error("Tile {tileset}/{z}/{x}/{y} timed out after {timeout_ms}ms")]
    Timeout {
        tileset: String,
        z: u8,
        x: u32,
        y: u32,
        timeout_ms: u64,
    },

    /// The feature store failed
    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),

    /// The query bounding box or a geometry could not be reprojected
    #[error("Projection error: {0}")]
    Projection(#[from] ProjectionError),

    /// The tile encoder rejected the processed features
    #[error("Failed to encode tile: {message}")]
    Encode { message: String },

    /// The cache store failed
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// The blocking pipeline worker panicked
    #[error("Tile worker failed: {message}")]
    Worker { message: String },
}

/// Errors that abort a cache build.
///
/// Per-tile failures never surface here; they are logged and counted in the
/// build report.
#[derive(Debug, Clone, Error)]
pub enum BuildError {
    /// Writing to or resetting the cache store failed
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// The worker pool could not be driven to completion
    #[error("Build worker pool failed: {0}")]
    Worker(String),
}
