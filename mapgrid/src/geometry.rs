//! Geometry primitives: coordinates, envelopes and feature geometries.

use serde::Serialize;

/// A 2-D coordinate in some projection's units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Coord {
    pub x: f64,
    pub y: f64,
}

impl Coord {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Envelope {
    pub minx: f64,
    pub miny: f64,
    pub maxx: f64,
    pub maxy: f64,
}

impl Envelope {
    /// Creates an envelope, normalising swapped corners.
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self {
            minx: x0.min(x1),
            miny: y0.min(y1),
            maxx: x0.max(x1),
            maxy: y0.max(y1),
        }
    }

    /// Takes the bounds as given, without reordering corners.
    ///
    /// Use at input boundaries where an inverted or non-finite box must be
    /// rejected rather than repaired.
    pub const fn from_corners(minx: f64, miny: f64, maxx: f64, maxy: f64) -> Self {
        Self {
            minx,
            miny,
            maxx,
            maxy,
        }
    }

    /// Envelope from `[minx, miny, maxx, maxy]`.
    pub fn from_array(a: [f64; 4]) -> Self {
        Self::new(a[0], a[1], a[2], a[3])
    }

    /// Returns `[minx, miny, maxx, maxy]`.
    pub fn to_array(&self) -> [f64; 4] {
        [self.minx, self.miny, self.maxx, self.maxy]
    }

    /// Envelope covering a single coordinate.
    pub fn from_coord(c: Coord) -> Self {
        Self {
            minx: c.x,
            miny: c.y,
            maxx: c.x,
            maxy: c.y,
        }
    }

    pub fn width(&self) -> f64 {
        self.maxx - self.minx
    }

    pub fn height(&self) -> f64 {
        self.maxy - self.miny
    }

    pub fn center(&self) -> Coord {
        Coord::new(
            (self.minx + self.maxx) / 2.0,
            (self.miny + self.maxy) / 2.0,
        )
    }

    /// True when every bound is a finite number.
    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|v| v.is_finite())
    }

    /// Boxes that only touch along an edge still intersect.
    pub fn intersects(&self, other: &Envelope) -> bool {
        !(other.minx > self.maxx
            || other.maxx < self.minx
            || other.miny > self.maxy
            || other.maxy < self.miny)
    }

    /// Overlapping region of two envelopes, if any.
    pub fn intersection(&self, other: &Envelope) -> Option<Envelope> {
        if !self.intersects(other) {
            return None;
        }
        Some(Envelope {
            minx: self.minx.max(other.minx),
            miny: self.miny.max(other.miny),
            maxx: self.maxx.min(other.maxx),
            maxy: self.maxy.min(other.maxy),
        })
    }

    pub fn contains(&self, c: Coord) -> bool {
        c.x >= self.minx && c.x <= self.maxx && c.y >= self.miny && c.y <= self.maxy
    }

    pub fn expand_to_include(&mut self, other: &Envelope) {
        self.minx = self.minx.min(other.minx);
        self.miny = self.miny.min(other.miny);
        self.maxx = self.maxx.max(other.maxx);
        self.maxy = self.maxy.max(other.maxy);
    }

    /// Envelope grown by `dx`/`dy` on every side.
    pub fn grow(&self, dx: f64, dy: f64) -> Envelope {
        Envelope {
            minx: self.minx - dx,
            miny: self.miny - dy,
            maxx: self.maxx + dx,
            maxy: self.maxy + dy,
        }
    }
}

impl Serialize for Envelope {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_array().serialize(serializer)
    }
}

/// A single geometry owned by a feature.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Coord),
    MultiPoint(Vec<Coord>),
    LineString(Vec<Coord>),
    /// Outer ring first, then holes. Rings need not repeat their first vertex.
    Polygon(Vec<Vec<Coord>>),
}

/// Geometry kind as reported by layer descriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GeometryType {
    Point,
    LineString,
    Polygon,
    Unknown,
}

impl Geometry {
    /// Reported kind. Multi-point collections have no dedicated kind.
    pub fn geometry_type(&self) -> GeometryType {
        match self {
            Geometry::Point(_) => GeometryType::Point,
            Geometry::LineString(_) => GeometryType::LineString,
            Geometry::Polygon(_) => GeometryType::Polygon,
            Geometry::MultiPoint(_) => GeometryType::Unknown,
        }
    }

    /// Total vertex count across all parts.
    pub fn num_points(&self) -> usize {
        match self {
            Geometry::Point(_) => 1,
            Geometry::MultiPoint(pts) | Geometry::LineString(pts) => pts.len(),
            Geometry::Polygon(rings) => rings.iter().map(Vec::len).sum(),
        }
    }

    /// Position used to place a point marker.
    ///
    /// Points use themselves; other geometries use their envelope centre.
    pub fn label_position(&self) -> Option<Coord> {
        match self {
            Geometry::Point(c) => Some(*c),
            _ => self.envelope().map(|e| e.center()),
        }
    }

    /// Vertices in path order; polygon rings are concatenated.
    pub fn coords(&self) -> Box<dyn Iterator<Item = &Coord> + '_> {
        match self {
            Geometry::Point(c) => Box::new(std::iter::once(c)),
            Geometry::MultiPoint(pts) | Geometry::LineString(pts) => Box::new(pts.iter()),
            Geometry::Polygon(rings) => Box::new(rings.iter().flatten()),
        }
    }

    /// Bounding box, or `None` for an empty geometry.
    pub fn envelope(&self) -> Option<Envelope> {
        let mut coords = self.coords();
        let first = coords.next()?;
        let mut env = Envelope::from_coord(*first);
        for c in coords {
            env.expand_to_include(&Envelope::from_coord(*c));
        }
        Some(env)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_normalises_corners() {
        let e = Envelope::new(10.0, 5.0, -10.0, -5.0);
        assert_eq!(e.to_array(), [-10.0, -5.0, 10.0, 5.0]);
        assert_eq!(e.width(), 20.0);
        assert_eq!(e.height(), 10.0);
    }

    #[test]
    fn test_from_corners_keeps_bounds_as_given() {
        let e = Envelope::from_corners(5.0, 5.0, -5.0, -5.0);
        assert_eq!(e.to_array(), [5.0, 5.0, -5.0, -5.0]);
        let e = Envelope::from_corners(0.0, 0.0, f64::NAN, 1.0);
        assert!(!e.is_finite());
    }

    #[test]
    fn test_envelope_intersection() {
        let a = Envelope::new(0.0, 0.0, 10.0, 10.0);
        let b = Envelope::new(5.0, 5.0, 20.0, 20.0);
        let c = Envelope::new(11.0, 11.0, 12.0, 12.0);
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
        assert_eq!(
            a.intersection(&b),
            Some(Envelope::new(5.0, 5.0, 10.0, 10.0))
        );
        assert_eq!(a.intersection(&c), None);
    }

    #[test]
    fn test_touching_envelopes_intersect() {
        let a = Envelope::new(0.0, 0.0, 10.0, 10.0);
        let b = Envelope::new(10.0, 0.0, 20.0, 10.0);
        assert!(a.intersects(&b));
    }

    #[test]
    fn test_geometry_envelope_and_kind() {
        let line = Geometry::LineString(vec![Coord::new(0.0, 1.0), Coord::new(4.0, -2.0)]);
        assert_eq!(line.envelope(), Some(Envelope::new(0.0, -2.0, 4.0, 1.0)));
        assert_eq!(line.geometry_type(), GeometryType::LineString);
        assert_eq!(line.num_points(), 2);

        let multi = Geometry::MultiPoint(vec![Coord::new(1.0, 1.0)]);
        assert_eq!(multi.geometry_type(), GeometryType::Unknown);
        assert_eq!(Geometry::MultiPoint(vec![]).envelope(), None);
    }

    #[test]
    fn test_point_label_position_is_point() {
        let p = Geometry::Point(Coord::new(3.0, 4.0));
        assert_eq!(p.label_position(), Some(Coord::new(3.0, 4.0)));
    }

    #[test]
    fn test_geometry_type_serializes_lowercase() {
        let json = serde_json::to_string(&GeometryType::LineString).unwrap();
        assert_eq!(json, "\"linestring\"");
    }
}
