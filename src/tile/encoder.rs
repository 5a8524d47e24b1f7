//! Mapbox Vector Tile encoder.
//!
//! Processed features arrive in geographic coordinates (EPSG:4326). The
//! encoder places them on the Web Mercator square, maps them into the tile's
//! integer grid and serializes one MVT layer per input layer.
//!
//! # Conventions
//!
//! - Layers without features are left out of the tile.
//! - Exterior rings have positive area in tile space (clockwise with y
//!   pointing down), interior rings negative area.
//! - Rings are written without their closing point; the encoder emits
//!   `ClosePath` instead.
//! - Geometry collections are split into one feature per member.

use bytes::Bytes;
use geo::orient::{Direction, Orient};
use geo::{Coord, Geometry, LineString, Polygon};
use mvt::{Feature, GeomData, GeomEncoder, GeomType, Layer, Tile};
use serde_json::Value;

use crate::error::TileError;
use crate::spatial::lng_lat_to_world;

use super::coord::TileCoord;

/// Default tile extent (grid resolution) in tile units.
pub const DEFAULT_EXTENT: u32 = 4096;

// =============================================================================
// Encoder Input
// =============================================================================

/// A feature ready for encoding: clipped, simplified and in EPSG:4326.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedFeature {
    pub id: Option<u64>,
    pub geometry: Geometry<f64>,
    pub properties: serde_json::Map<String, Value>,
}

/// The processed features of one named layer.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerFeatures {
    pub name: String,
    pub features: Vec<ProcessedFeature>,
}

impl LayerFeatures {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            features: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

// =============================================================================
// TileEncoder Trait
// =============================================================================

/// Serializes per-layer features into a binary tile payload.
pub trait TileEncoder: Send + Sync {
    /// Content type of the produced payload.
    fn content_type(&self) -> &'static str;

    fn encode(&self, coord: &TileCoord, layers: &[LayerFeatures]) -> Result<Bytes, TileError>;
}

// =============================================================================
// MVT Encoder
// =============================================================================

/// [`TileEncoder`] producing Mapbox Vector Tiles with the `mvt` crate.
#[derive(Debug, Clone)]
pub struct MvtEncoder {
    extent: u32,
}

impl Default for MvtEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MvtEncoder {
    pub fn new() -> Self {
        Self::with_extent(DEFAULT_EXTENT)
    }

    pub fn with_extent(extent: u32) -> Self {
        Self { extent }
    }

    pub fn extent(&self) -> u32 {
        self.extent
    }

    fn encode_layer(
        &self,
        tile: &Tile,
        grid: &TileGrid,
        input: &LayerFeatures,
    ) -> Result<Layer, mvt::Error> {
        let mut layer = tile.create_layer(&input.name);
        for feature in &input.features {
            layer = encode_geometry(layer, grid, feature, &feature.geometry)?;
        }
        Ok(layer)
    }
}

impl TileEncoder for MvtEncoder {
    fn content_type(&self) -> &'static str {
        "application/vnd.mapbox-vector-tile"
    }

    fn encode(&self, coord: &TileCoord, layers: &[LayerFeatures]) -> Result<Bytes, TileError> {
        let grid = TileGrid::new(coord, self.extent);
        let mut tile = Tile::new(self.extent);

        for input in layers.iter().filter(|l| !l.is_empty()) {
            let layer = self
                .encode_layer(&tile, &grid, input)
                .map_err(encode_error)?;
            if layer.num_features() > 0 {
                tile.add_layer(layer).map_err(encode_error)?;
            }
        }

        let data = tile.to_bytes().map_err(encode_error)?;
        Ok(Bytes::from(data))
    }
}

fn encode_error(e: mvt::Error) -> TileError {
    TileError::Encode {
        message: e.to_string(),
    }
}

// =============================================================================
// Geometry Encoding
// =============================================================================

/// Maps geographic coordinates into a tile's integer grid.
struct TileGrid {
    /// Tiles per world edge at the tile's zoom
    tiles: f64,
    x: f64,
    y: f64,
    extent: f64,
}

impl TileGrid {
    fn new(coord: &TileCoord, extent: u32) -> Self {
        Self {
            tiles: 2f64.powi(i32::from(coord.z)),
            x: f64::from(coord.x),
            y: f64::from(coord.y),
            extent: f64::from(extent),
        }
    }

    fn project(&self, c: Coord<f64>) -> (f64, f64) {
        let (wx, wy) = lng_lat_to_world(c.x, c.y);
        (
            ((wx * self.tiles - self.x) * self.extent).round(),
            ((wy * self.tiles - self.y) * self.extent).round(),
        )
    }

    /// Project a path, dropping consecutive duplicates created by rounding.
    fn project_path(&self, line: &LineString<f64>) -> Vec<(f64, f64)> {
        let mut out: Vec<(f64, f64)> = Vec::with_capacity(line.0.len());
        for c in line.coords() {
            let p = self.project(*c);
            if out.last() != Some(&p) {
                out.push(p);
            }
        }
        out
    }

    /// Project a ring without its closing point; `None` when degenerate.
    fn project_ring(&self, ring: &LineString<f64>) -> Option<Vec<(f64, f64)>> {
        let mut points = self.project_path(ring);
        if points.len() > 1 && points.first() == points.last() {
            points.pop();
        }
        (points.len() >= 3).then_some(points)
    }
}

fn encode_geometry(
    layer: Layer,
    grid: &TileGrid,
    feature: &ProcessedFeature,
    geometry: &Geometry<f64>,
) -> Result<Layer, mvt::Error> {
    let data = match geometry {
        Geometry::Point(p) => {
            let (x, y) = grid.project(p.0);
            Some(GeomEncoder::new(GeomType::Point).point(x, y)?.encode()?)
        }
        Geometry::MultiPoint(points) if points.0.is_empty() => None,
        Geometry::MultiPoint(points) => {
            let mut encoder = GeomEncoder::new(GeomType::Point);
            for p in points.iter() {
                let (x, y) = grid.project(p.0);
                encoder = encoder.point(x, y)?;
            }
            Some(encoder.encode()?)
        }
        Geometry::Line(line) => {
            encode_lines(grid, &[LineString::new(vec![line.start, line.end])])?
        }
        Geometry::LineString(line) => encode_lines(grid, std::slice::from_ref(line))?,
        Geometry::MultiLineString(lines) => encode_lines(grid, &lines.0)?,
        Geometry::Polygon(polygon) => encode_polygons(grid, std::slice::from_ref(polygon))?,
        Geometry::MultiPolygon(polygons) => encode_polygons(grid, &polygons.0)?,
        Geometry::Rect(rect) => encode_polygons(grid, &[rect.to_polygon()])?,
        Geometry::Triangle(triangle) => encode_polygons(grid, &[triangle.to_polygon()])?,
        Geometry::GeometryCollection(collection) => {
            let mut layer = layer;
            for member in collection.iter() {
                layer = encode_geometry(layer, grid, feature, member)?;
            }
            return Ok(layer);
        }
    };

    let Some(data) = data else {
        return Ok(layer);
    };

    let mut out = layer.into_feature(data);
    if let Some(id) = feature.id {
        out.set_id(id);
    }
    add_tags(&mut out, &feature.properties);
    Ok(out.into_layer())
}

fn encode_lines(
    grid: &TileGrid,
    lines: &[LineString<f64>],
) -> Result<Option<GeomData>, mvt::Error> {
    let mut encoder = GeomEncoder::new(GeomType::Linestring);
    let mut written = 0;
    for line in lines {
        let points = grid.project_path(line);
        if points.len() < 2 {
            continue;
        }
        for (x, y) in points {
            encoder = encoder.point(x, y)?;
        }
        encoder = encoder.complete()?;
        written += 1;
    }
    if written == 0 {
        return Ok(None);
    }
    Ok(Some(encoder.encode()?))
}

fn encode_polygons(
    grid: &TileGrid,
    polygons: &[Polygon<f64>],
) -> Result<Option<GeomData>, mvt::Error> {
    let mut encoder = GeomEncoder::new(GeomType::Polygon);
    let mut written = 0;
    for polygon in polygons {
        // Clockwise with y up turns into positive area once y is flipped.
        let oriented = polygon.orient(Direction::Reversed);
        let Some(exterior) = grid.project_ring(oriented.exterior()) else {
            continue;
        };
        for (x, y) in exterior {
            encoder = encoder.point(x, y)?;
        }
        encoder = encoder.complete()?;

        for interior in oriented.interiors() {
            let Some(ring) = grid.project_ring(interior) else {
                continue;
            };
            for (x, y) in ring {
                encoder = encoder.point(x, y)?;
            }
            encoder = encoder.complete()?;
        }
        written += 1;
    }
    if written == 0 {
        return Ok(None);
    }
    Ok(Some(encoder.encode()?))
}

fn add_tags(feature: &mut Feature, properties: &serde_json::Map<String, Value>) {
    for (key, value) in properties {
        match value {
            Value::Null => {}
            Value::Bool(b) => feature.add_tag_bool(key, *b),
            Value::Number(n) => {
                if let Some(u) = n.as_u64() {
                    feature.add_tag_uint(key, u);
                } else if let Some(i) = n.as_i64() {
                    feature.add_tag_sint(key, i);
                } else if let Some(f) = n.as_f64() {
                    feature.add_tag_double(key, f);
                }
            }
            Value::String(s) => feature.add_tag_string(key, s),
            Value::Array(_) | Value::Object(_) => feature.add_tag_string(key, &value.to_string()),
        }
    }
}
