//! Extent-to-device coordinate transform.

use crate::geometry::{Coord, Envelope};

/// Maps a map-space extent onto a `width` × `height` device grid.
///
/// Device y grows downward: the extent's `maxy` edge lands on row 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    width: u32,
    height: u32,
    extent: Envelope,
    sx: f64,
    sy: f64,
}

impl ViewTransform {
    pub fn new(width: u32, height: u32, extent: Envelope) -> Self {
        let sx = if extent.width() > 0.0 {
            f64::from(width) / extent.width()
        } else {
            1.0
        };
        let sy = if extent.height() > 0.0 {
            f64::from(height) / extent.height()
        } else {
            1.0
        };
        Self {
            width,
            height,
            extent,
            sx,
            sy,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn extent(&self) -> &Envelope {
        &self.extent
    }

    /// Map units per device pixel along x.
    pub fn scale(&self) -> f64 {
        1.0 / self.sx
    }

    /// Map coordinate → device coordinate.
    pub fn forward(&self, c: Coord) -> Coord {
        Coord::new(
            (c.x - self.extent.minx) * self.sx,
            (self.extent.maxy - c.y) * self.sy,
        )
    }

    /// Device coordinate → map coordinate.
    pub fn backward(&self, c: Coord) -> Coord {
        Coord::new(
            c.x / self.sx + self.extent.minx,
            self.extent.maxy - c.y / self.sy,
        )
    }
}
