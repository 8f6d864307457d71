//! Image rendering.
//!
//! Paints every layer of a map, in order, onto a `tiny-skia` pixmap using
//! the layer's [`LayerStyle`](crate::style::LayerStyle), then hands the
//! pixels to the `image` crate for encoding.

mod format;

pub use format::{ImageFormat, DEFAULT_JPEG_QUALITY};

use image::RgbaImage;
use tiny_skia::{FillRule, Paint, Path, Pixmap, Stroke, Transform};
use tracing::debug;

use crate::datasource::{DatasourceKind, Query};
use crate::draw::{circle_path, DeviceProjector};
use crate::error::{MapError, MapResult};
use crate::geometry::{Envelope, Geometry};
use crate::map::{Layer, Map};
use crate::projection::{ProjTransform, Projection, ViewTransform};
use crate::style::{Color, LayerStyle};

/// Renders `map` at its current extent.
///
/// # Errors
///
/// `Configuration` without an extent, `Render` for a zero-sized map, plus
/// any datasource or projection failure.
pub fn render_image(map: &Map) -> MapResult<RgbaImage> {
    let extent = map.require_extent()?;
    let mut pixmap = Pixmap::new(map.width(), map.height()).ok_or_else(|| {
        MapError::Render(format!(
            "cannot create a {}x{} image",
            map.width(),
            map.height()
        ))
    })?;
    pixmap.fill(map.background().unwrap_or(Color::TRANSPARENT).to_skia());

    let view = ViewTransform::new(map.width(), map.height(), extent);
    let query_extent = map.buffered_extent()?;
    let map_proj = map.projection()?;

    for layer in map.layer_slice() {
        paint_layer(&mut pixmap, layer, map_proj, view, query_extent)?;
    }

    Ok(to_image(&pixmap))
}

/// Renders and encodes `map` in one step.
pub fn render_encoded(map: &Map, format: ImageFormat) -> MapResult<Vec<u8>> {
    let image = render_image(map)?;
    format.encode(&image)
}

fn paint_layer(
    pixmap: &mut Pixmap,
    layer: &Layer,
    map_proj: Projection,
    view: ViewTransform,
    query_extent: Envelope,
) -> MapResult<()> {
    let Some(ds) = layer.datasource() else {
        return Ok(());
    };
    if ds.kind() == DatasourceKind::Raster {
        debug!(layer = layer.name(), "Raster layer has no painter, skipping");
        return Ok(());
    }

    let proj = ProjTransform::new(map_proj, Projection::from_srs(layer.srs())?);
    let layer_extent = proj.backward_envelope(&ds.envelope())?;
    let Some(clipped) = layer_extent.intersection(&query_extent) else {
        return Ok(());
    };

    let projector = DeviceProjector::new(proj, view);
    let style = layer.style();
    let mut painted = 0usize;

    for feature in ds.features(&Query::new(proj.forward_envelope(&clipped)?))? {
        let feature = feature?;
        for geometry in &feature.geometries {
            paint_geometry(pixmap, &projector, style, geometry)?;
        }
        painted += 1;
    }

    debug!(layer = layer.name(), features = painted, "Painted layer");
    Ok(())
}

fn paint_geometry(
    pixmap: &mut Pixmap,
    projector: &DeviceProjector,
    style: &LayerStyle,
    geometry: &Geometry,
) -> MapResult<()> {
    match geometry {
        Geometry::Point(c) => {
            let center = projector.to_device(*c)?;
            if let Some(path) = circle_path(center, style.point_radius) {
                fill(pixmap, &path, style.fill);
                stroke(pixmap, &path, style.stroke, style.stroke_width);
            }
        }
        Geometry::MultiPoint(coords) => {
            for c in coords {
                let center = projector.to_device(*c)?;
                if let Some(path) = circle_path(center, style.point_radius) {
                    fill(pixmap, &path, style.fill);
                    stroke(pixmap, &path, style.stroke, style.stroke_width);
                }
            }
        }
        Geometry::LineString(coords) => {
            if let Some(path) = projector.polyline(coords)? {
                stroke(pixmap, &path, style.stroke.or(style.fill), style.stroke_width);
            }
        }
        Geometry::Polygon(rings) => {
            if let Some(path) = projector.rings(rings)? {
                fill(pixmap, &path, style.fill);
                stroke(pixmap, &path, style.stroke, style.stroke_width);
            }
        }
    }
    Ok(())
}

fn paint(color: Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(color.to_skia());
    paint.anti_alias = true;
    paint
}

fn fill(pixmap: &mut Pixmap, path: &Path, color: Option<Color>) {
    if let Some(color) = color {
        pixmap.fill_path(path, &paint(color), FillRule::EvenOdd, Transform::identity(), None);
    }
}

fn stroke(pixmap: &mut Pixmap, path: &Path, color: Option<Color>, width: f32) {
    if let Some(color) = color {
        let stroke = Stroke {
            width,
            ..Stroke::default()
        };
        pixmap.stroke_path(path, &paint(color), &stroke, Transform::identity(), None);
    }
}

fn to_image(pixmap: &Pixmap) -> RgbaImage {
    let mut image = RgbaImage::new(pixmap.width(), pixmap.height());
    for (dst, src) in image.pixels_mut().zip(pixmap.pixels()) {
        let c = src.demultiply();
        *dst = image::Rgba([c.red(), c.green(), c.blue(), c.alpha()]);
    }
    image
}
