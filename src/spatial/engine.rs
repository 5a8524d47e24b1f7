//! Geometry engine: clipping, simplification and reprojection.
//!
//! The engine is a narrow capability interface so the tile pipeline does not
//! depend on a particular geometry library. [`GeoEngine`] implements it on top
//! of the `geo` crate.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use geo::{
    BooleanOps, BoundingRect, Coord, Geometry, GeometryCollection, LineString, MapCoords,
    MultiLineString, MultiPoint, MultiPolygon, Point, Polygon, Simplify,
};

use crate::error::ProjectionError;

use super::bbox::BBox;
use super::crs::{Crs, Transform};

/// Samples taken along each edge when reprojecting a bounding box.
pub const BBOX_DENSIFY_POINTS: usize = 21;

/// Geometry operations consumed by the tile pipeline and the catalog.
pub trait GeometryEngine: Send + Sync {
    /// Clip a geometry to a bounding box.
    ///
    /// Returns `None` when nothing of the geometry remains inside the box.
    fn clip(&self, geometry: &Geometry<f64>, bbox: &BBox) -> Option<Geometry<f64>>;

    /// Simplify a geometry with the given tolerance, in the geometry's units.
    fn simplify(&self, geometry: &Geometry<f64>, tolerance: f64) -> Geometry<f64>;

    /// Reproject a geometry between reference systems.
    fn reproject(
        &self,
        geometry: &Geometry<f64>,
        from: &Crs,
        to: &Crs,
    ) -> Result<Geometry<f64>, ProjectionError>;

    /// Reproject a bounding box between reference systems.
    fn reproject_bbox(&self, bbox: &BBox, from: &Crs, to: &Crs) -> Result<BBox, ProjectionError>;

    /// Smallest box containing every input box, or `None` for no input.
    fn union_bboxes(&self, boxes: &[BBox]) -> Option<BBox> {
        boxes
            .iter()
            .copied()
            .reduce(|acc, bbox| acc.union(&bbox))
    }
}

/// [`GeometryEngine`] backed by the `geo` crate, with reprojection through
/// `proj4rs`.
#[derive(Debug, Default)]
pub struct GeoEngine {
    transforms: TransformCache,
}

impl GeoEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Resolved transforms keyed by `(from, to)`.
///
/// Parsing a definition is far more expensive than applying it, and the
/// pipeline asks for the same pair on every tile.
#[derive(Debug, Default)]
struct TransformCache {
    cache: RwLock<HashMap<(Crs, Crs), Arc<Transform>>>,
}

impl TransformCache {
    fn get(&self, from: &Crs, to: &Crs) -> Result<Arc<Transform>, ProjectionError> {
        let key = (from.clone(), to.clone());
        {
            let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
            if let Some(transform) = cache.get(&key) {
                return Ok(transform.clone());
            }
        }

        let transform = Arc::new(Transform::between(from, to)?);
        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        cache.insert(key, transform.clone());
        Ok(transform)
    }
}

impl GeometryEngine for GeoEngine {
    fn clip(&self, geometry: &Geometry<f64>, bbox: &BBox) -> Option<Geometry<f64>> {
        let extent = BBox::from_rect(&geometry.bounding_rect()?);
        if !bbox.intersects(&extent) {
            return None;
        }
        if bbox.contains(&extent) {
            return Some(geometry.clone());
        }

        let window = bbox.to_rect().to_polygon();
        match geometry {
            Geometry::Point(point) => {
                bbox.contains_point(point.x(), point.y()).then(|| geometry.clone())
            }
            Geometry::MultiPoint(points) => {
                let kept: Vec<Point<f64>> = points
                    .iter()
                    .filter(|p| bbox.contains_point(p.x(), p.y()))
                    .copied()
                    .collect();
                match kept.len() {
                    0 => None,
                    1 => Some(Geometry::Point(kept[0])),
                    _ => Some(Geometry::MultiPoint(MultiPoint::new(kept))),
                }
            }
            Geometry::Line(line) => clip_lines(
                &window,
                MultiLineString::new(vec![LineString::new(vec![line.start, line.end])]),
            ),
            Geometry::LineString(line) => {
                clip_lines(&window, MultiLineString::new(vec![line.clone()]))
            }
            Geometry::MultiLineString(lines) => clip_lines(&window, lines.clone()),
            Geometry::Polygon(polygon) => clip_polygons(polygon.intersection(&window)),
            Geometry::MultiPolygon(polygons) => {
                clip_polygons(polygons.intersection(&MultiPolygon::new(vec![window])))
            }
            Geometry::Rect(rect) => {
                clip_polygons(rect.to_polygon().intersection(&window))
            }
            Geometry::Triangle(triangle) => {
                clip_polygons(triangle.to_polygon().intersection(&window))
            }
            Geometry::GeometryCollection(collection) => {
                let members: Vec<Geometry<f64>> = collection
                    .iter()
                    .filter_map(|member| self.clip(member, bbox))
                    .collect();
                (!members.is_empty())
                    .then(|| Geometry::GeometryCollection(GeometryCollection(members)))
            }
        }
    }

    fn simplify(&self, geometry: &Geometry<f64>, tolerance: f64) -> Geometry<f64> {
        if tolerance <= 0.0 {
            return geometry.clone();
        }
        match geometry {
            Geometry::LineString(line) => Geometry::LineString(line.simplify(&tolerance)),
            Geometry::MultiLineString(lines) => {
                Geometry::MultiLineString(lines.simplify(&tolerance))
            }
            Geometry::Polygon(polygon) => Geometry::Polygon(polygon.simplify(&tolerance)),
            Geometry::MultiPolygon(polygons) => {
                Geometry::MultiPolygon(polygons.simplify(&tolerance))
            }
            Geometry::GeometryCollection(collection) => {
                Geometry::GeometryCollection(GeometryCollection(
                    collection
                        .iter()
                        .map(|member| self.simplify(member, tolerance))
                        .collect(),
                ))
            }
            other => other.clone(),
        }
    }

    fn reproject(
        &self,
        geometry: &Geometry<f64>,
        from: &Crs,
        to: &Crs,
    ) -> Result<Geometry<f64>, ProjectionError> {
        let transform = self.transforms.get(from, to)?;
        if transform.is_identity() {
            return Ok(geometry.clone());
        }
        geometry.try_map_coords(|c| -> Result<Coord<f64>, ProjectionError> {
            let (x, y) = transform.apply(c.x, c.y)?;
            Ok(Coord { x, y })
        })
    }

    fn reproject_bbox(&self, bbox: &BBox, from: &Crs, to: &Crs) -> Result<BBox, ProjectionError> {
        let transform = self.transforms.get(from, to)?;
        if transform.is_identity() {
            return Ok(*bbox);
        }

        // Samples outside the target system's domain are skipped; the box is
        // built from whatever remains.
        let mut out: Option<BBox> = None;
        for (x, y) in densify_edges(bbox) {
            let Ok((px, py)) = transform.apply(x, y) else {
                continue;
            };
            let point = BBox::new(px, py, px, py);
            out = Some(match out {
                Some(acc) => acc.union(&point),
                None => point,
            });
        }

        out.ok_or_else(|| ProjectionError::Transform {
            from: from.to_string(),
            to: to.to_string(),
            message: format!("no finite corner for bbox {:?}", bbox.to_array()),
        })
    }
}

fn clip_lines(window: &Polygon<f64>, lines: MultiLineString<f64>) -> Option<Geometry<f64>> {
    let mut clipped = window.clip(&lines, false);
    clipped.0.retain(|line| line.0.len() >= 2);
    match clipped.0.len() {
        0 => None,
        1 => clipped.0.pop().map(Geometry::LineString),
        _ => Some(Geometry::MultiLineString(clipped)),
    }
}

fn clip_polygons(mut result: MultiPolygon<f64>) -> Option<Geometry<f64>> {
    result.0.retain(|polygon| polygon.exterior().0.len() >= 4);
    match result.0.len() {
        0 => None,
        1 => result.0.pop().map(Geometry::Polygon),
        _ => Some(Geometry::MultiPolygon(result)),
    }
}

/// Points along the four edges of `bbox`, corners included.
fn densify_edges(bbox: &BBox) -> Vec<(f64, f64)> {
    let steps = (BBOX_DENSIFY_POINTS - 1) as f64;
    let mut points = Vec::with_capacity(BBOX_DENSIFY_POINTS * 4);
    for i in 0..BBOX_DENSIFY_POINTS {
        let t = i as f64 / steps;
        let x = bbox.west + (bbox.east - bbox.west) * t;
        let y = bbox.south + (bbox.north - bbox.south) * t;
        points.push((x, bbox.south));
        points.push((x, bbox.north));
        points.push((bbox.west, y));
        points.push((bbox.east, y));
    }
    points
}
