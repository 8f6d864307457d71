//! Geometry to device-space path conversion.
//!
//! Both the image painter and the grid rasterizer build `tiny-skia` paths
//! through [`DeviceProjector`], which moves layer coordinates into map
//! coordinates and then onto the device grid.

use tiny_skia::{Path, PathBuilder};

use crate::error::MapResult;
use crate::geometry::{Coord, Geometry};
use crate::projection::{ProjTransform, ViewTransform};

/// Number of segments used to approximate a point marker circle.
pub const CIRCLE_STEPS: u32 = 360;

/// Layer coordinates → device coordinates.
#[derive(Debug, Clone, Copy)]
pub struct DeviceProjector {
    proj: ProjTransform,
    view: ViewTransform,
}

impl DeviceProjector {
    pub fn new(proj: ProjTransform, view: ViewTransform) -> Self {
        Self { proj, view }
    }

    pub fn to_device(&self, c: Coord) -> MapResult<Coord> {
        Ok(self.view.forward(self.proj.backward(c)?))
    }

    /// Circle marker around a geometry's label position.
    pub fn circle(&self, geometry: &Geometry, radius: f32) -> MapResult<Option<Path>> {
        let Some(center) = geometry.label_position() else {
            return Ok(None);
        };
        Ok(circle_path(self.to_device(center)?, radius))
    }

    /// Open polyline through the geometry's vertices.
    pub fn polyline(&self, coords: &[Coord]) -> MapResult<Option<Path>> {
        let mut pb = PathBuilder::new();
        for (i, c) in coords.iter().enumerate() {
            let d = self.to_device(*c)?;
            if i == 0 {
                pb.move_to(d.x as f32, d.y as f32);
            } else {
                pb.line_to(d.x as f32, d.y as f32);
            }
        }
        Ok(pb.finish())
    }

    /// Closed rings, one sub-path per ring.
    pub fn rings(&self, rings: &[Vec<Coord>]) -> MapResult<Option<Path>> {
        let mut pb = PathBuilder::new();
        for ring in rings.iter().filter(|r| !r.is_empty()) {
            for (i, c) in ring.iter().enumerate() {
                let d = self.to_device(*c)?;
                if i == 0 {
                    pb.move_to(d.x as f32, d.y as f32);
                } else {
                    pb.line_to(d.x as f32, d.y as f32);
                }
            }
            pb.close();
        }
        Ok(pb.finish())
    }
}

/// A closed [`CIRCLE_STEPS`]-gon approximating a circle.
pub fn circle_path(center: Coord, radius: f32) -> Option<Path> {
    let (cx, cy) = (center.x as f32, center.y as f32);
    let mut pb = PathBuilder::new();
    pb.move_to(cx + radius, cy);
    for i in 1..CIRCLE_STEPS {
        let a = (i as f32 * 360.0 / CIRCLE_STEPS as f32).to_radians();
        pb.line_to(cx + a.cos() * radius, cy + a.sin() * radius);
    }
    pb.close();
    pb.finish()
}
