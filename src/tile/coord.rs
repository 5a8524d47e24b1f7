//! Tile coordinates and cache keys.

use std::fmt;
use std::sync::Arc;

use crate::error::TileError;
use crate::spatial::{tile_bounds, BBox};

/// Highest zoom level the tile grid supports.
pub const MAX_ZOOM: u8 = 30;

// =============================================================================
// TileCoord
// =============================================================================

/// A tile position `z/x/y` in the XYZ grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TileCoord {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    pub fn new(z: u8, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    /// Check the coordinate against the grid and a zoom ceiling.
    ///
    /// # Errors
    ///
    /// Returns [`TileError::InvalidCoordinate`] when `z` exceeds `max_zoom`
    /// (or the grid limit) or `x`/`y` fall outside the `2^z` grid.
    pub fn validate(&self, max_zoom: u8) -> Result<(), TileError> {
        let ceiling = max_zoom.min(MAX_ZOOM);
        let invalid = TileError::InvalidCoordinate {
            z: self.z,
            x: self.x,
            y: self.y,
            max_zoom: ceiling,
        };
        if self.z > ceiling {
            return Err(invalid);
        }
        let dim = 1u64 << self.z;
        if u64::from(self.x) >= dim || u64::from(self.y) >= dim {
            return Err(invalid);
        }
        Ok(())
    }

    /// Geographic bounds of this tile.
    pub fn bounds(&self) -> BBox {
        tile_bounds(self.z, self.x, self.y)
    }

    /// The four tiles one zoom level deeper.
    pub fn children(&self) -> [TileCoord; 4] {
        let (z, x, y) = (self.z + 1, self.x * 2, self.y * 2);
        [
            TileCoord::new(z, x, y),
            TileCoord::new(z, x + 1, y),
            TileCoord::new(z, x, y + 1),
            TileCoord::new(z, x + 1, y + 1),
        ]
    }

    pub fn parent(&self) -> Option<TileCoord> {
        (self.z > 0).then(|| TileCoord::new(self.z - 1, self.x / 2, self.y / 2))
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

// =============================================================================
// TileKey
// =============================================================================

/// Cache key: a tile position within a named tileset.
///
/// Equality and hashing cover all four fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TileKey {
    pub tileset: Arc<str>,
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

impl TileKey {
    pub fn new(tileset: impl Into<Arc<str>>, coord: TileCoord) -> Self {
        Self {
            tileset: tileset.into(),
            z: coord.z,
            x: coord.x,
            y: coord.y,
        }
    }

    pub fn coord(&self) -> TileCoord {
        TileCoord::new(self.z, self.x, self.y)
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}/{}", self.tileset, self.z, self.x, self.y)
    }
}
