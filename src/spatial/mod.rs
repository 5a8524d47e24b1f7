//! Coordinate, bounds and geometry utilities.
//!
//! - [`BBox`] and the slippy-tile functions map `z/x/y` to geographic bounds
//!   and burn rectangles into tile sets.
//! - [`Crs`] and [`Transform`] resolve reference systems by EPSG code or
//!   PROJ string and transform points between them.
//! - [`GeometryEngine`] is the capability interface for clipping,
//!   simplification and reprojection, implemented by [`GeoEngine`].

mod bbox;
mod crs;
mod engine;

pub use bbox::{
    lng_lat_to_tile, lng_lat_to_world, tile_bounds, tiles_covering, BBox, MAX_MERCATOR_LAT,
};
pub use crs::{Crs, Transform};
pub use engine::{GeoEngine, GeometryEngine, BBOX_DENSIFY_POINTS};
