//! Coordinate reference systems and the transforms between them.
//!
//! Transforms are resolved through `proj4rs`, which knows the EPSG registry
//! by code and also accepts raw PROJ strings. Geographic systems are handled
//! in degrees at this boundary; the conversion to and from radians happens
//! inside [`Transform::apply`].

use std::fmt;

use proj4rs::adaptors::transform_vertex_2d;
use proj4rs::Proj;

use crate::error::ProjectionError;

use super::bbox::MAX_MERCATOR_LAT;

/// A coordinate reference system, identified by its authority code.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum Crs {
    /// Geographic longitude/latitude on WGS84 (EPSG:4326, OGC:CRS84)
    #[default]
    Wgs84,
    /// Spherical Web Mercator (EPSG:3857 and its legacy aliases)
    WebMercator,
    /// Any other EPSG code
    Epsg(u16),
    /// A PROJ string or an identifier outside the EPSG registry
    Custom(String),
}

impl Crs {
    /// Parse an authority string such as `EPSG:32633`, an OGC URN or a PROJ
    /// string starting with `+proj=`.
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.starts_with('+') {
            return Crs::Custom(value.to_string());
        }

        let normalized = value.to_ascii_uppercase();
        let code = normalized
            .rsplit(|c: char| c == ':' || c == '/')
            .find(|part| !part.is_empty())
            .unwrap_or("");

        match code {
            "4326" | "CRS84" => Crs::Wgs84,
            "3857" | "900913" | "3785" | "102100" => Crs::WebMercator,
            _ => match code.parse::<u16>() {
                Ok(epsg) if normalized.contains("EPSG") || normalized == code => Crs::Epsg(epsg),
                _ => Crs::Custom(value.to_string()),
            },
        }
    }

    pub fn is_geographic(&self) -> bool {
        matches!(self, Crs::Wgs84)
    }

    /// Build the `proj4rs` definition for this system.
    fn definition(&self) -> Result<Proj, ProjectionError> {
        let result = match self {
            Crs::Wgs84 => Proj::from_epsg_code(4326),
            Crs::WebMercator => Proj::from_epsg_code(3857),
            Crs::Epsg(code) => Proj::from_epsg_code(*code),
            Crs::Custom(definition) => Proj::from_user_string(definition),
        };
        result.map_err(|e| ProjectionError::Definition {
            crs: self.to_string(),
            message: e.to_string(),
        })
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Crs::Wgs84 => write!(f, "EPSG:4326"),
            Crs::WebMercator => write!(f, "EPSG:3857"),
            Crs::Epsg(code) => write!(f, "EPSG:{}", code),
            Crs::Custom(definition) => write!(f, "{}", definition),
        }
    }
}

/// A point transform between two reference systems.
#[derive(Debug, Clone)]
pub struct Transform {
    from: Crs,
    to: Crs,
    /// Source and target definitions; `None` when both systems are equal.
    projections: Option<(Proj, Proj)>,
}

impl Transform {
    /// Resolve the transform for `from -> to`.
    pub fn between(from: &Crs, to: &Crs) -> Result<Self, ProjectionError> {
        let projections = if from == to {
            None
        } else {
            Some((from.definition()?, to.definition()?))
        };
        Ok(Self {
            from: from.clone(),
            to: to.clone(),
            projections,
        })
    }

    pub fn is_identity(&self) -> bool {
        self.projections.is_none()
    }

    /// Transform one coordinate pair.
    ///
    /// Latitudes are clamped to the Web Mercator range when projecting onto
    /// EPSG:3857, so the poles map to the edge of the square.
    pub fn apply(&self, x: f64, y: f64) -> Result<(f64, f64), ProjectionError> {
        let Some((source, target)) = &self.projections else {
            return Ok((x, y));
        };

        let input = if source.is_latlong() {
            let lat = if self.to == Crs::WebMercator {
                y.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT)
            } else {
                y
            };
            (x.to_radians(), lat.to_radians())
        } else {
            (x, y)
        };

        let (px, py) =
            transform_vertex_2d(source, target, input).map_err(|e| self.failed(x, y, e))?;
        let output = if target.is_latlong() {
            (px.to_degrees(), py.to_degrees())
        } else {
            (px, py)
        };

        if output.0.is_finite() && output.1.is_finite() {
            Ok(output)
        } else {
            Err(self.failed(x, y, "non-finite result"))
        }
    }

    fn failed(&self, x: f64, y: f64, reason: impl fmt::Display) -> ProjectionError {
        ProjectionError::Transform {
            from: self.from.to_string(),
            to: self.to.to_string(),
            message: format!("{} for ({}, {})", reason, x, y),
        }
    }
}
