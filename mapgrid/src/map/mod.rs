//! Map state: dimensions, spatial reference, current extent and layers.
//!
//! A [`Map`] is plain data. Rendering jobs work on a cloned snapshot of it
//! (layers share their datasources through `Arc`), so a job never sees a
//! map that is being changed by the control thread.

mod describe;
mod layer;

pub use describe::{describe_layers, list_features, DatasourceDescription, FeatureRecord};
pub use layer::{Layer, LayerInfo};

use std::f64::consts::PI;
use std::fmt;

use crate::error::{MapError, MapResult};
use crate::geometry::Envelope;
use crate::projection::{ProjTransform, Projection, ViewTransform, DEFAULT_SRS, EARTH_RADIUS};
use crate::style::Color;

/// Standard rendering pixel size in metres (0.28 mm).
const PIXEL_SIZE_METRES: f64 = 0.000_28;

/// Identifies a layer by name or zero-based position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerSelector {
    Name(String),
    Index(usize),
}

impl From<&str> for LayerSelector {
    fn from(name: &str) -> Self {
        LayerSelector::Name(name.to_string())
    }
}

impl From<String> for LayerSelector {
    fn from(name: String) -> Self {
        LayerSelector::Name(name)
    }
}

impl From<usize> for LayerSelector {
    fn from(index: usize) -> Self {
        LayerSelector::Index(index)
    }
}

impl fmt::Display for LayerSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerSelector::Name(name) => write!(f, "{}", name),
            LayerSelector::Index(i) => write!(f, "#{}", i),
        }
    }
}

/// A renderable map.
#[derive(Debug, Clone)]
pub struct Map {
    width: u32,
    height: u32,
    srs: String,
    extent: Option<Envelope>,
    maximum_extent: Option<Envelope>,
    buffer_size: u32,
    background: Option<Color>,
    layers: Vec<Layer>,
}

impl Map {
    /// Creates a map in geographic coordinates with no layers and no extent.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            srs: DEFAULT_SRS.to_string(),
            extent: None,
            maximum_extent: None,
            buffer_size: 0,
            background: None,
            layers: Vec::new(),
        }
    }

    pub fn with_srs(mut self, srs: impl Into<String>) -> Self {
        self.srs = srs.into();
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn srs(&self) -> &str {
        &self.srs
    }

    pub fn set_srs(&mut self, srs: impl Into<String>) {
        self.srs = srs.into();
    }

    pub fn projection(&self) -> MapResult<Projection> {
        Ok(Projection::from_srs(&self.srs)?)
    }

    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }

    pub fn set_buffer_size(&mut self, pixels: u32) {
        self.buffer_size = pixels;
    }

    pub fn background(&self) -> Option<Color> {
        self.background
    }

    pub fn set_background(&mut self, color: Option<Color>) {
        self.background = color;
    }

    pub fn maximum_extent(&self) -> Option<Envelope> {
        self.maximum_extent
    }

    pub fn set_maximum_extent(&mut self, extent: Option<Envelope>) {
        self.maximum_extent = extent;
    }

    /// Current extent, if one has been set by a zoom.
    pub fn extent(&self) -> Option<Envelope> {
        self.extent
    }

    /// Current extent or a configuration error.
    pub fn require_extent(&self) -> MapResult<Envelope> {
        self.extent.ok_or_else(MapError::extent_not_set)
    }

    /// Current extent grown by `buffer_size` pixels on every side.
    pub fn buffered_extent(&self) -> MapResult<Envelope> {
        let extent = self.require_extent()?;
        if self.width == 0 || self.height == 0 {
            return Ok(extent);
        }
        let dx = extent.width() / f64::from(self.width) * f64::from(self.buffer_size);
        let dy = extent.height() / f64::from(self.height) * f64::from(self.buffer_size);
        Ok(extent.grow(dx, dy))
    }

    /// Changes the pixel dimensions, re-fitting the extent to the new aspect.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        if let Some(extent) = self.extent {
            self.zoom_to_box(extent);
        }
    }

    /// Removes every layer.
    pub fn clear(&mut self) {
        self.layers.clear();
    }

    pub fn add_layer(&mut self, layer: Layer) {
        self.layers.push(layer);
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Summary of every layer, in drawing order.
    pub fn layers(&self) -> Vec<LayerInfo> {
        self.layers.iter().map(Layer::info).collect()
    }

    pub(crate) fn layer_slice(&self) -> &[Layer] {
        &self.layers
    }

    /// Resolves a selector to a layer position.
    ///
    /// Names match exactly; the first match wins.
    pub fn layer_index(&self, selector: &LayerSelector) -> MapResult<usize> {
        match selector {
            LayerSelector::Name(name) => self
                .layers
                .iter()
                .position(|l| l.name() == name)
                .ok_or_else(|| MapError::layer_not_found(name)),
            LayerSelector::Index(index) if *index < self.layers.len() => Ok(*index),
            LayerSelector::Index(index) => {
                Err(MapError::index_out_of_range(*index, self.layers.len()))
            }
        }
    }

    pub fn layer(&self, selector: &LayerSelector) -> MapResult<&Layer> {
        let index = self.layer_index(selector)?;
        Ok(&self.layers[index])
    }

    /// Sets the extent to `bbox`, grown along one axis to match the map's
    /// aspect ratio.
    pub fn zoom_to_box(&mut self, bbox: Envelope) {
        self.extent = Some(self.fit_aspect(bbox));
    }

    fn fit_aspect(&self, bbox: Envelope) -> Envelope {
        if self.width == 0 || self.height == 0 || bbox.width() <= 0.0 || bbox.height() <= 0.0 {
            return bbox;
        }
        let map_ratio = f64::from(self.width) / f64::from(self.height);
        let box_ratio = bbox.width() / bbox.height();
        let center = bbox.center();
        if box_ratio > map_ratio {
            let half = bbox.width() / map_ratio / 2.0;
            Envelope::new(bbox.minx, center.y - half, bbox.maxx, center.y + half)
        } else if box_ratio < map_ratio {
            let half = bbox.height() * map_ratio / 2.0;
            Envelope::new(center.x - half, bbox.miny, center.x + half, bbox.maxy)
        } else {
            bbox
        }
    }

    /// Zooms to the union of all layer envelopes, reprojected to the map SRS
    /// and clamped to the maximum extent when one is set.
    ///
    /// Layers without a datasource, or whose envelope cannot be reprojected,
    /// are ignored. With nothing to zoom to the extent is left unchanged.
    pub fn zoom_all(&mut self) -> MapResult<()> {
        let map_proj = self.projection()?;
        let mut union: Option<Envelope> = None;

        for layer in &self.layers {
            let Some(env) = layer.envelope() else {
                continue;
            };
            let transform = ProjTransform::new(map_proj, Projection::from_srs(layer.srs())?);
            match transform.backward_envelope(&env) {
                Ok(map_env) => match union.as_mut() {
                    Some(u) => u.expand_to_include(&map_env),
                    None => union = Some(map_env),
                },
                Err(e) => {
                    tracing::warn!(layer = layer.name(), error = %e, "Skipping layer in zoom_all");
                }
            }
        }

        let Some(mut extent) = union else {
            return Ok(());
        };
        if let Some(max) = self.maximum_extent {
            extent = extent.intersection(&max).unwrap_or(max);
        }
        self.zoom_to_box(extent);
        Ok(())
    }

    /// Map units per pixel along x.
    pub fn scale(&self) -> MapResult<f64> {
        let extent = self.require_extent()?;
        if self.width == 0 {
            return Err(MapError::Configuration("map width is zero".to_string()));
        }
        Ok(extent.width() / f64::from(self.width))
    }

    /// OGC scale denominator for the current extent.
    pub fn scale_denominator(&self) -> MapResult<f64> {
        let scale = self.scale()?;
        let factor = if self.projection()?.is_geographic() {
            EARTH_RADIUS * 2.0 * PI / 360.0
        } else {
            1.0
        };
        Ok(scale * factor / PIXEL_SIZE_METRES)
    }

    /// Transform from the current extent onto a `width` × `height` grid.
    pub fn view_transform(&self, width: u32, height: u32) -> MapResult<ViewTransform> {
        Ok(ViewTransform::new(width, height, self.require_extent()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::{Feature, MemoryDatasource};
    use crate::geometry::{Coord, Geometry};

    fn layer_with_points(name: &str, pts: &[(f64, f64)]) -> Layer {
        let mut ds = MemoryDatasource::new(name);
        for (i, (x, y)) in pts.iter().enumerate() {
            ds.push(Feature::new(i as i64 + 1).with_geometry(Geometry::Point(Coord::new(*x, *y))));
        }
        Layer::new(name).with_datasource(ds)
    }

    #[test]
    fn test_layer_lookup_by_name_first_match() {
        let mut map = Map::new(256, 256);
        map.add_layer(layer_with_points("a", &[(0.0, 0.0)]));
        map.add_layer(layer_with_points("b", &[(1.0, 1.0)]));
        map.add_layer(layer_with_points("a", &[(2.0, 2.0)]));
        assert_eq!(map.layer_index(&"a".into()).unwrap(), 0);
        assert_eq!(map.layer_index(&"b".into()).unwrap(), 1);
    }

    #[test]
    fn test_layer_lookup_errors() {
        let mut map = Map::new(256, 256);
        map.add_layer(Layer::new("only"));

        let err = map.layer(&"missing".into()).unwrap_err();
        assert_eq!(err.to_string(), "Layer name 'missing' not found");

        let err = map.layer(&LayerSelector::Index(1)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Zero-based layer index '1' not valid, only '1' layers are in map"
        );
    }

    #[test]
    fn test_zoom_to_box_grows_to_aspect() {
        let mut map = Map::new(200, 100);
        map.zoom_to_box(Envelope::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(map.extent(), Some(Envelope::new(-5.0, 0.0, 15.0, 10.0)));

        map.zoom_to_box(Envelope::new(0.0, 0.0, 40.0, 10.0));
        assert_eq!(map.extent(), Some(Envelope::new(0.0, -5.0, 40.0, 15.0)));
    }

    #[test]
    fn test_zoom_all_unions_layers() {
        let mut map = Map::new(100, 100);
        map.add_layer(layer_with_points("a", &[(0.0, 0.0), (10.0, 10.0)]));
        map.add_layer(layer_with_points("b", &[(-10.0, -10.0)]));
        map.zoom_all().unwrap();
        assert_eq!(map.extent(), Some(Envelope::new(-10.0, -10.0, 10.0, 10.0)));
    }

    #[test]
    fn test_zoom_all_respects_maximum_extent() {
        let mut map = Map::new(100, 100);
        map.set_maximum_extent(Some(Envelope::new(0.0, 0.0, 5.0, 5.0)));
        map.add_layer(layer_with_points("a", &[(-10.0, -10.0), (10.0, 10.0)]));
        map.zoom_all().unwrap();
        assert_eq!(map.extent(), Some(Envelope::new(0.0, 0.0, 5.0, 5.0)));
    }

    #[test]
    fn test_zoom_all_without_layers_keeps_extent() {
        let mut map = Map::new(100, 100);
        map.zoom_all().unwrap();
        assert_eq!(map.extent(), None);
    }

    #[test]
    fn test_zoom_all_reprojects_layer_envelopes() {
        let mut map = Map::new(100, 100).with_srs("EPSG:3857");
        map.add_layer(layer_with_points("a", &[(-180.0, -85.0), (180.0, 85.0)]));
        map.zoom_all().unwrap();
        let extent = map.extent().unwrap();
        assert!((extent.maxx - 20_037_508.342_789).abs() < 1e-3);
    }

    #[test]
    fn test_scale_denominator() {
        let mut map = Map::new(256, 256).with_srs("EPSG:3857");
        assert!(map.scale_denominator().is_err());
        map.zoom_to_box(Envelope::new(0.0, 0.0, 256.0 * 0.000_28, 256.0 * 0.000_28));
        assert!((map.scale_denominator().unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_buffered_extent() {
        let mut map = Map::new(100, 100);
        map.zoom_to_box(Envelope::new(0.0, 0.0, 100.0, 100.0));
        map.set_buffer_size(10);
        assert_eq!(
            map.buffered_extent().unwrap(),
            Envelope::new(-10.0, -10.0, 110.0, 110.0)
        );
    }

    #[test]
    fn test_resize_and_clear() {
        let mut map = Map::new(100, 100);
        map.add_layer(Layer::new("a"));
        map.zoom_to_box(Envelope::new(0.0, 0.0, 10.0, 10.0));
        map.resize(200, 100);
        assert_eq!(map.width(), 200);
        assert_eq!(map.extent(), Some(Envelope::new(-5.0, 0.0, 15.0, 10.0)));
        map.clear();
        assert_eq!(map.layer_count(), 0);
        assert!(map.layers().is_empty());
    }

    #[test]
    fn test_missing_extent_is_configuration_error() {
        let map = Map::new(10, 10);
        let err = map.view_transform(10, 10).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Configuration);
    }
}
