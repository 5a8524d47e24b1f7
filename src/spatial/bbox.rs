//! Bounding boxes and slippy-tile math.
//!
//! All tile math uses the standard XYZ scheme: tile (0, 0) at zoom `z` is the
//! north-west corner of the Web Mercator square, and the grid is `2^z` tiles
//! wide.

use std::f64::consts::PI;

use geo::{coord, Rect};
use serde::Serialize;

/// Latitude limit of the Web Mercator square, in degrees.
pub const MAX_MERCATOR_LAT: f64 = 85.051_128_779_806_59;

/// An axis-aligned rectangle `(west, south, east, north)`.
///
/// The reference system is implied by where the box came from; tile bounds
/// are always geographic (EPSG:4326).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BBox {
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Build from `[west, south, east, north]`.
    pub fn from_array(values: [f64; 4]) -> Self {
        Self::new(values[0], values[1], values[2], values[3])
    }

    pub fn to_array(&self) -> [f64; 4] {
        [self.west, self.south, self.east, self.north]
    }

    /// Whether all edges are finite and the box is not inverted.
    pub fn is_valid(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
            && self.west <= self.east
            && self.south <= self.north
    }

    /// Closed-interval intersection test: boxes that only touch intersect.
    pub fn intersects(&self, other: &BBox) -> bool {
        self.west <= other.east
            && other.west <= self.east
            && self.south <= other.north
            && other.south <= self.north
    }

    /// Whether `other` lies completely inside this box.
    pub fn contains(&self, other: &BBox) -> bool {
        self.west <= other.west
            && self.south <= other.south
            && self.east >= other.east
            && self.north >= other.north
    }

    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.west && x <= self.east && y >= self.south && y <= self.north
    }

    /// Smallest box containing both boxes.
    pub fn union(&self, other: &BBox) -> BBox {
        BBox::new(
            self.west.min(other.west),
            self.south.min(other.south),
            self.east.max(other.east),
            self.north.max(other.north),
        )
    }

    pub fn center(&self) -> (f64, f64) {
        (
            (self.west + self.east) / 2.0,
            (self.south + self.north) / 2.0,
        )
    }

    pub fn to_rect(&self) -> Rect<f64> {
        Rect::new(
            coord! { x: self.west, y: self.south },
            coord! { x: self.east, y: self.north },
        )
    }

    pub fn from_rect(rect: &Rect<f64>) -> Self {
        Self::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
    }
}

/// Geographic bounds of tile `z/x/y`.
pub fn tile_bounds(z: u8, x: u32, y: u32) -> BBox {
    let n = 2f64.powi(i32::from(z));
    let west = f64::from(x) / n * 360.0 - 180.0;
    let east = f64::from(x + 1) / n * 360.0 - 180.0;
    let north = tile_y_to_lat(f64::from(y), n);
    let south = tile_y_to_lat(f64::from(y + 1), n);
    BBox::new(west, south, east, north)
}

fn tile_y_to_lat(y: f64, n: f64) -> f64 {
    (PI * (1.0 - 2.0 * y / n)).sinh().atan().to_degrees()
}

/// Position of a longitude/latitude on the Web Mercator square, as fractions
/// of the world width measured from the north-west corner.
///
/// Latitudes are clamped to the Mercator range.
pub fn lng_lat_to_world(lng: f64, lat: f64) -> (f64, f64) {
    let lat = lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT).to_radians();
    let x = (lng + 180.0) / 360.0;
    let y = (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0;
    (x, y)
}

/// Tile column/row containing a longitude/latitude at zoom `z`.
///
/// Inputs are clamped to the Web Mercator square so that every result is a
/// valid tile.
pub fn lng_lat_to_tile(lng: f64, lat: f64, z: u8) -> (u32, u32) {
    let n = 2f64.powi(i32::from(z));
    let max_index = n - 1.0;
    let (x, y) = lng_lat_to_world(lng.clamp(-180.0, 180.0), lat);

    let x = (x * n).floor().clamp(0.0, max_index);
    let y = (y * n).floor().clamp(0.0, max_index);
    (x as u32, y as u32)
}

/// All tiles at zoom `z` whose bounds intersect `bbox` (a tile burn of the
/// rectangle).
pub fn tiles_covering(bbox: &BBox, z: u8) -> Vec<(u32, u32)> {
    if !bbox.is_valid() {
        return Vec::new();
    }
    let (min_x, min_y) = lng_lat_to_tile(bbox.west, bbox.north, z);
    let (max_x, max_y) = lng_lat_to_tile(bbox.east, bbox.south, z);

    let mut tiles = Vec::with_capacity(((max_x - min_x + 1) * (max_y - min_y + 1)) as usize);
    for x in min_x..=max_x {
        for y in min_y..=max_y {
            tiles.push((x, y));
        }
    }
    tiles
}
