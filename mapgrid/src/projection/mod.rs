//! Projection handling
//!
//! Maps speak one spatial reference, layers may speak another. This module
//! parses SRS strings into a [`Projection`], moves coordinates between two
//! projections with [`ProjTransform`], and maps a geographic extent onto a
//! device grid with [`ViewTransform`].
//!
//! Only the two projections tile servers actually use are supported:
//! geographic longitude/latitude and spherical (web) mercator.

mod view;

pub use view::ViewTransform;

use std::f64::consts::PI;

use thiserror::Error;

use crate::geometry::{Coord, Envelope};

/// Earth radius used by spherical mercator, in metres.
pub const EARTH_RADIUS: f64 = 6_378_137.0;

/// Maximum latitude representable in web mercator.
pub const MAX_LAT: f64 = 85.051_128_779_806_59;

/// Minimum latitude representable in web mercator.
pub const MIN_LAT: f64 = -MAX_LAT;

/// Default SRS for new maps and layers.
pub const DEFAULT_SRS: &str = "+proj=longlat +ellps=WGS84 +datum=WGS84 +no_defs";

/// Errors raised while parsing or applying a projection.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProjectionError {
    /// SRS string names a projection we cannot construct.
    #[error("failed to initialize projection with: '{0}'")]
    Unsupported(String),

    /// A coordinate could not be transformed.
    #[error("projection transform failed for ({x}, {y})")]
    Transform { x: f64, y: f64 },
}

/// A supported spatial reference system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    /// Longitude/latitude in degrees.
    Geographic,
    /// Spherical mercator in metres.
    WebMercator,
}

impl Projection {
    /// Parses an SRS definition (EPSG code or proj4 string).
    pub fn from_srs(srs: &str) -> Result<Self, ProjectionError> {
        let lower = srs.trim().to_ascii_lowercase();
        if lower.contains("epsg:4326")
            || lower.contains("+proj=longlat")
            || lower.contains("+proj=latlong")
        {
            Ok(Projection::Geographic)
        } else if lower.contains("epsg:3857")
            || lower.contains("epsg:900913")
            || lower.contains("+proj=merc")
        {
            Ok(Projection::WebMercator)
        } else {
            Err(ProjectionError::Unsupported(srs.to_string()))
        }
    }

    /// True for projections whose units are degrees.
    pub fn is_geographic(&self) -> bool {
        matches!(self, Projection::Geographic)
    }

    /// Converts a longitude/latitude pair into this projection.
    pub fn project(&self, c: Coord) -> Result<Coord, ProjectionError> {
        if !c.x.is_finite() || !c.y.is_finite() || !(-90.0..=90.0).contains(&c.y) {
            return Err(ProjectionError::Transform { x: c.x, y: c.y });
        }
        match self {
            Projection::Geographic => Ok(c),
            Projection::WebMercator => {
                let lat = c.y.clamp(MIN_LAT, MAX_LAT);
                let x = c.x * PI / 180.0 * EARTH_RADIUS;
                let lat_rad = lat * PI / 180.0;
                let y = lat_rad.tan().asinh() * EARTH_RADIUS;
                Ok(Coord::new(x, y))
            }
        }
    }

    /// Converts a coordinate in this projection to longitude/latitude.
    pub fn unproject(&self, c: Coord) -> Result<Coord, ProjectionError> {
        if !c.x.is_finite() || !c.y.is_finite() {
            return Err(ProjectionError::Transform { x: c.x, y: c.y });
        }
        match self {
            Projection::Geographic => {
                if !(-90.0..=90.0).contains(&c.y) {
                    return Err(ProjectionError::Transform { x: c.x, y: c.y });
                }
                Ok(c)
            }
            Projection::WebMercator => {
                let lon = c.x / EARTH_RADIUS * 180.0 / PI;
                let lat = (c.y / EARTH_RADIUS).sinh().atan() * 180.0 / PI;
                Ok(Coord::new(lon, lat))
            }
        }
    }
}

/// Transform between a map's projection (source) and a layer's (dest).
///
/// `forward` goes map → layer, `backward` goes layer → map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjTransform {
    source: Projection,
    dest: Projection,
}

impl ProjTransform {
    pub fn new(source: Projection, dest: Projection) -> Self {
        Self { source, dest }
    }

    /// Builds a transform from two SRS strings.
    pub fn from_srs(map_srs: &str, layer_srs: &str) -> Result<Self, ProjectionError> {
        Ok(Self::new(
            Projection::from_srs(map_srs)?,
            Projection::from_srs(layer_srs)?,
        ))
    }

    /// True when both sides use the same projection.
    pub fn is_identity(&self) -> bool {
        self.source == self.dest
    }

    /// Map coordinate → layer coordinate.
    pub fn forward(&self, c: Coord) -> Result<Coord, ProjectionError> {
        if self.is_identity() {
            return Ok(c);
        }
        self.dest.project(self.source.unproject(c)?)
    }

    /// Layer coordinate → map coordinate.
    pub fn backward(&self, c: Coord) -> Result<Coord, ProjectionError> {
        if self.is_identity() {
            return Ok(c);
        }
        self.source.project(self.dest.unproject(c)?)
    }

    /// Map envelope → layer envelope.
    pub fn forward_envelope(&self, e: &Envelope) -> Result<Envelope, ProjectionError> {
        self.transform_envelope(e, |c| self.forward(c))
    }

    /// Layer envelope → map envelope.
    pub fn backward_envelope(&self, e: &Envelope) -> Result<Envelope, ProjectionError> {
        self.transform_envelope(e, |c| self.backward(c))
    }

    // Both supported projections are axis-separable, so the corners bound
    // the transformed box.
    fn transform_envelope<F>(&self, e: &Envelope, f: F) -> Result<Envelope, ProjectionError>
    where
        F: Fn(Coord) -> Result<Coord, ProjectionError>,
    {
        let a = f(Coord::new(e.minx, e.miny))?;
        let b = f(Coord::new(e.maxx, e.maxy))?;
        Ok(Envelope::new(a.x, a.y, b.x, b.y))
    }
}
