//! Feature-id rasterization.
//!
//! Every feature returned by the layer query gets the next id from the
//! [`FeatureKeyTable`] and its footprint is stamped into an
//! [`IndexedRaster`]. Stamping overwrites: the last feature drawn at a cell
//! owns it.
//!
//! # Drawing
//!
//! ```text
//! Point            -> filled 360-gon, radius max(10 / step, 1) cells
//! LineString (2+)  -> stroke, width 1 cell
//! other (2+ pts)   -> filled path, even-odd
//! ```
//!
//! Each feature is first drawn non-anti-aliased into a scratch
//! `tiny_skia::Mask`; any covered mask byte stamps the feature id. Only the
//! cells under the feature's path bounds are visited when stamping and
//! clearing the mask.

use std::collections::HashMap;

use tiny_skia::{FillRule, Mask, Path, Rect, Stroke, Transform};
use tracing::debug;

use super::query::AttributeQuery;
use crate::datasource::{DatasourceKind, Feature};
use crate::draw::DeviceProjector;
use crate::error::{MapError, MapResult};
use crate::geometry::Geometry;
use crate::map::{Layer, Map};
use crate::projection::{ProjTransform, Projection, ViewTransform};
use crate::value::Properties;

/// Integer id assigned to a feature during rasterization.
pub type FeatureId = u32;

/// Id of cells no feature covers.
pub const NO_FEATURE: FeatureId = 0;

/// Line width used when stroking line geometries, in grid cells.
const LINE_WIDTH: f32 = 1.0;

/// Point marker radius in map pixels, before dividing by the step.
const POINT_RADIUS: u32 = 10;

/// Row-major grid of feature ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedRaster {
    width: u32,
    height: u32,
    cells: Vec<FeatureId>,
}

impl IndexedRaster {
    /// Creates a raster with every cell set to [`NO_FEATURE`].
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: vec![NO_FEATURE; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, x: u32, y: u32) -> FeatureId {
        self.cells[(y * self.width + x) as usize]
    }

    pub fn set(&mut self, x: u32, y: u32, id: FeatureId) {
        self.cells[(y * self.width + x) as usize] = id;
    }

    /// Cells of row `y`.
    pub fn row(&self, y: u32) -> &[FeatureId] {
        let start = (y * self.width) as usize;
        &self.cells[start..start + self.width as usize]
    }

    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(|&c| c == NO_FEATURE)
    }
}

/// Feature id → join value. Id 0 is pre-registered with the empty string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureKeyTable {
    keys: Vec<String>,
}

impl Default for FeatureKeyTable {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureKeyTable {
    pub fn new() -> Self {
        Self {
            keys: vec![String::new()],
        }
    }

    /// Registers the next feature and returns its id.
    pub fn push(&mut self, key: String) -> MapResult<FeatureId> {
        let id = FeatureId::try_from(self.keys.len())
            .map_err(|_| MapError::Render("too many features for one grid".to_string()))?;
        self.keys.push(key);
        Ok(id)
    }

    pub fn key(&self, id: FeatureId) -> Option<&str> {
        self.keys.get(id as usize).map(String::as_str)
    }

    /// Number of registered ids, including the sentinel.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.len() <= 1
    }
}

/// Output of rasterizing one layer.
#[derive(Debug, Clone, Default)]
pub struct RasterizedLayer {
    pub raster: IndexedRaster,
    pub keys: FeatureKeyTable,
    /// Property bag per non-empty join value, as fetched. Last feature wins.
    pub attributes: HashMap<String, Properties>,
}

impl Default for IndexedRaster {
    fn default() -> Self {
        Self::new(0, 0)
    }
}

/// Stamps feature footprints of one layer into an [`IndexedRaster`].
#[derive(Debug, Clone, Copy)]
pub struct Rasterizer {
    width: u32,
    height: u32,
    step: u32,
}

impl Rasterizer {
    /// Grid of `floor(map_width / step)` × `floor(map_height / step)` cells.
    pub fn new(map_width: u32, map_height: u32, step: u32) -> MapResult<Self> {
        if step == 0 {
            return Err(MapError::Configuration(
                "resolution must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            width: map_width / step,
            height: map_height / step,
            step,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn point_radius(&self) -> f32 {
        (POINT_RADIUS / self.step).max(1) as f32
    }

    /// Queries `layer` over the map's current extent and rasterizes every
    /// returned feature in iteration order.
    ///
    /// A layer whose envelope misses the extent yields an empty raster.
    ///
    /// # Errors
    ///
    /// - `Configuration` for raster layers or a map without an extent
    /// - `DataSource` when the layer has no datasource or the query fails
    /// - `Projection` when coordinates cannot be transformed
    pub fn rasterize(
        &self,
        map: &Map,
        layer: &Layer,
        query: &AttributeQuery,
    ) -> MapResult<RasterizedLayer> {
        let ds = layer.datasource().ok_or_else(|| {
            MapError::DataSource("Layer does not have a Datasource".to_string())
        })?;
        if ds.kind() == DatasourceKind::Raster {
            return Err(MapError::Configuration(
                "Raster layers are not yet supported".to_string(),
            ));
        }

        let extent = map.require_extent()?;
        let proj = ProjTransform::new(map.projection()?, Projection::from_srs(layer.srs())?);

        let mut out = RasterizedLayer {
            raster: IndexedRaster::new(self.width, self.height),
            ..Default::default()
        };

        let layer_extent = proj.backward_envelope(&ds.envelope())?;
        let Some(clipped) = layer_extent.intersection(&extent) else {
            debug!(layer = layer.name(), "Layer does not intersect map extent, skipping");
            return Ok(out);
        };
        let Some(mut mask) = Mask::new(self.width, self.height) else {
            return Ok(out);
        };

        let bbox = proj.forward_envelope(&clipped)?;
        let projector =
            DeviceProjector::new(proj, ViewTransform::new(self.width, self.height, extent));

        let mut count = 0usize;
        for feature in ds.features(&query.to_query(bbox))? {
            let feature = feature?;
            let key = join_value(&feature, query);
            let id = out.keys.push(key.clone())?;

            if let Some(area) = self.draw_feature(&mut mask, &projector, &feature)? {
                stamp(&mut mask, &mut out.raster, id, area);
            }
            if !key.is_empty() {
                out.attributes.insert(key, feature.properties);
            }
            count += 1;
        }

        debug!(
            layer = layer.name(),
            features = count,
            width = self.width,
            height = self.height,
            "Rasterized layer"
        );
        Ok(out)
    }

    fn draw_feature(
        &self,
        mask: &mut Mask,
        projector: &DeviceProjector,
        feature: &Feature,
    ) -> MapResult<Option<CellRect>> {
        let mut area: Option<CellRect> = None;
        for geometry in &feature.geometries {
            let path = match geometry {
                Geometry::Point(_) => projector
                    .circle(geometry, self.point_radius())?
                    .map(|p| (p, false)),
                Geometry::LineString(coords) if coords.len() > 1 => {
                    projector.polyline(coords)?.map(|p| (p, true))
                }
                Geometry::MultiPoint(coords) if coords.len() > 1 => {
                    projector.rings(std::slice::from_ref(coords))?.map(|p| (p, false))
                }
                Geometry::Polygon(rings) if geometry.num_points() > 1 => {
                    projector.rings(rings)?.map(|p| (p, false))
                }
                _ => None,
            };
            if let Some((path, stroked)) = path {
                if let Some(bounds) = fill_mask(mask, &path, stroked) {
                    let rect = CellRect::covering(bounds, self.width, self.height);
                    area = Some(area.map_or(rect, |a| a.union(rect)));
                }
            }
        }
        Ok(area)
    }
}

/// Half-open cell rectangle `[x0, x1) × [y0, y1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CellRect {
    x0: u32,
    y0: u32,
    x1: u32,
    y1: u32,
}

impl CellRect {
    /// Cells under `bounds`, padded by one cell and clipped to the grid.
    fn covering(bounds: Rect, width: u32, height: u32) -> Self {
        let lo = |v: f32, max: u32| ((v.floor() - 1.0).max(0.0) as u32).min(max);
        let hi = |v: f32, max: u32| ((v.ceil() + 1.0).max(0.0) as u32).min(max);
        Self {
            x0: lo(bounds.left(), width),
            y0: lo(bounds.top(), height),
            x1: hi(bounds.right(), width),
            y1: hi(bounds.bottom(), height),
        }
    }

    fn union(self, other: Self) -> Self {
        Self {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }
}

/// Fills `path` into the mask and returns the bounds of what was filled.
fn fill_mask(mask: &mut Mask, path: &Path, stroked: bool) -> Option<Rect> {
    if stroked {
        let stroke = Stroke {
            width: LINE_WIDTH,
            ..Stroke::default()
        };
        let outline = path.stroke(&stroke, 1.0)?;
        mask.fill_path(&outline, FillRule::Winding, false, Transform::identity());
        Some(outline.bounds())
    } else {
        mask.fill_path(path, FillRule::EvenOdd, false, Transform::identity());
        Some(path.bounds())
    }
}

/// Copies covered mask cells inside `area` into the raster as `id` and
/// clears them.
fn stamp(mask: &mut Mask, raster: &mut IndexedRaster, id: FeatureId, area: CellRect) {
    let width = raster.width as usize;
    let coverage = mask.data_mut();
    for y in area.y0..area.y1 {
        let start = y as usize * width;
        let span = start + area.x0 as usize..start + area.x1 as usize;
        for (cell, covered) in raster.cells[span.clone()]
            .iter_mut()
            .zip(coverage[span].iter_mut())
        {
            if *covered > 0 {
                *cell = id;
                *covered = 0;
            }
        }
    }
}

fn join_value(feature: &Feature, query: &AttributeQuery) -> String {
    if query.is_synthetic_join() {
        return feature.id.to_string();
    }
    feature
        .get(query.join_field())
        .map(|v| v.to_key_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::{AttributeDescriptor, AttributeKind, MemoryDatasource};
    use crate::geometry::{Coord, Envelope};
    use crate::map::LayerSelector;

    fn map_with(ds: MemoryDatasource, size: u32) -> Map {
        let mut map = Map::new(size, size);
        map.add_layer(Layer::new("layer").with_datasource(ds));
        map.zoom_to_box(Envelope::new(0.0, 0.0, f64::from(size), f64::from(size)));
        map
    }

    fn point(id: i64, x: f64, y: f64, key: &str) -> Feature {
        Feature::new(id)
            .with_geometry(Geometry::Point(Coord::new(x, y)))
            .with_property("key", key)
    }

    fn run(map: &Map, step: u32, join: &str) -> RasterizedLayer {
        let layer = map.layer(&LayerSelector::Index(0)).unwrap();
        let desc = layer.datasource().unwrap().descriptor();
        let query = AttributeQuery::resolve(&desc, join, None).unwrap();
        Rasterizer::new(map.width(), map.height(), step)
            .unwrap()
            .rasterize(map, layer, &query)
            .unwrap()
    }

    #[test]
    fn test_dimensions_floor() {
        let r = Rasterizer::new(257, 130, 4).unwrap();
        assert_eq!((r.width(), r.height()), (64, 32));
        assert!(Rasterizer::new(10, 10, 0).is_err());
    }

    #[test]
    fn test_key_table_ids_start_at_one() {
        let mut table = FeatureKeyTable::new();
        assert_eq!(table.key(NO_FEATURE), Some(""));
        assert_eq!(table.push("a".to_string()).unwrap(), 1);
        assert_eq!(table.push("b".to_string()).unwrap(), 2);
        assert_eq!(table.key(2), Some("b"));
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_raster_rows() {
        let mut raster = IndexedRaster::new(3, 2);
        raster.set(1, 1, 7);
        assert_eq!(raster.row(1), &[0, 7, 0]);
        assert!(!raster.is_empty());
    }

    #[test]
    fn test_cell_rect_is_padded_and_clipped() {
        let bounds = Rect::from_ltrb(4.2, 5.5, 6.8, 7.0).unwrap();
        let rect = CellRect::covering(bounds, 16, 16);
        assert_eq!(rect, CellRect { x0: 3, y0: 4, x1: 8, y1: 8 });

        let bounds = Rect::from_ltrb(-20.0, 10.0, 40.0, 30.0).unwrap();
        let rect = CellRect::covering(bounds, 16, 16);
        assert_eq!(rect, CellRect { x0: 0, y0: 9, x1: 16, y1: 16 });
    }

    #[test]
    fn test_stamp_only_touches_feature_bounds() {
        let mut raster = IndexedRaster::new(16, 16);
        for y in 0..16 {
            for x in 0..16 {
                raster.set(x, y, 9);
            }
        }
        let mut mask = Mask::new(16, 16).unwrap();
        let path = tiny_skia::PathBuilder::from_rect(Rect::from_ltrb(4.0, 4.0, 6.0, 6.0).unwrap());
        let bounds = fill_mask(&mut mask, &path, false).unwrap();
        let area = CellRect::covering(bounds, 16, 16);

        stamp(&mut mask, &mut raster, 2, area);

        for y in 0..16 {
            for x in 0..16 {
                let inside = (4..6).contains(&x) && (4..6).contains(&y);
                let expected = if inside { 2 } else { 9 };
                assert_eq!(raster.get(x, y), expected, "cell ({}, {})", x, y);
            }
        }
        assert!(mask.data().iter().all(|&c| c == 0));
    }

    #[test]
    fn test_small_feature_keeps_cells_outside_its_marker() {
        let ds = MemoryDatasource::new("p")
            .with_feature(
                Feature::new(1)
                    .with_geometry(Geometry::Polygon(vec![vec![
                        Coord::new(0.0, 0.0),
                        Coord::new(64.0, 0.0),
                        Coord::new(64.0, 64.0),
                        Coord::new(0.0, 64.0),
                    ]]))
                    .with_property("key", "land"),
            )
            .with_feature(point(2, 32.0, 32.0, "city"));
        let map = map_with(ds, 64);
        let out = run(&map, 4, "key");

        // radius max(10 / 4, 1) = 2 cells around (8, 8)
        for y in 0..16 {
            for x in 0..16 {
                let id = out.raster.get(x, y);
                if id == 2 {
                    assert!((5..=11).contains(&x) && (5..=11).contains(&y));
                } else {
                    assert_eq!(id, 1, "cell ({}, {})", x, y);
                }
            }
        }
        assert_eq!(out.raster.get(8, 8), 2);
        assert_eq!(out.raster.get(0, 0), 1);
        assert_eq!(out.raster.get(15, 15), 1);
    }

    #[test]
    fn test_empty_datasource_leaves_sentinel() {
        let map = map_with(MemoryDatasource::new("empty"), 64);
        let out = run(&map, 4, "__id__");
        assert!(out.raster.is_empty());
        assert_eq!(out.keys.len(), 1);
    }

    #[test]
    fn test_point_stamped_at_its_cell() {
        let ds = MemoryDatasource::new("p").with_feature(point(9, 32.0, 32.0, "x"));
        let map = map_with(ds, 64);
        let out = run(&map, 4, "key");
        assert_eq!(out.raster.get(8, 8), 1);
        assert_eq!(out.keys.key(1), Some("x"));
        assert!(out.attributes.contains_key("x"));
    }

    #[test]
    fn test_later_feature_overwrites() {
        let ds = MemoryDatasource::new("p")
            .with_feature(point(1, 32.0, 32.0, "first"))
            .with_feature(point(2, 32.0, 32.0, "second"));
        let map = map_with(ds, 64);
        let out = run(&map, 4, "key");
        let id = out.raster.get(8, 8);
        assert_eq!(out.keys.key(id), Some("second"));
    }

    #[test]
    fn test_synthetic_join_uses_feature_id() {
        let ds = MemoryDatasource::new("p").with_feature(point(42, 10.0, 10.0, "x"));
        let map = map_with(ds, 64);
        let out = run(&map, 4, "__id__");
        assert_eq!(out.keys.key(1), Some("42"));
    }

    #[test]
    fn test_polygon_fills_interior() {
        let ds = MemoryDatasource::new("poly").with_feature(
            Feature::new(1)
                .with_geometry(Geometry::Polygon(vec![vec![
                    Coord::new(0.0, 0.0),
                    Coord::new(64.0, 0.0),
                    Coord::new(64.0, 32.0),
                    Coord::new(0.0, 32.0),
                ]]))
                .with_property("key", "south"),
        );
        let map = map_with(ds, 64);
        let out = run(&map, 4, "key");
        // bottom half of the map is the bottom half of the grid
        assert_eq!(out.raster.get(3, 12), 1);
        assert_eq!(out.raster.get(3, 3), NO_FEATURE);
    }

    #[test]
    fn test_line_is_stroked() {
        let ds = MemoryDatasource::new("line").with_feature(
            Feature::new(1)
                .with_geometry(Geometry::LineString(vec![
                    Coord::new(0.0, 30.0),
                    Coord::new(64.0, 30.0),
                ]))
                .with_property("key", "road"),
        );
        let map = map_with(ds, 64);
        let out = run(&map, 4, "key");
        let covered = out.raster.row(8).iter().filter(|&&c| c == 1).count()
            + out.raster.row(9).iter().filter(|&&c| c == 1).count();
        assert!(covered >= 16);
    }

    #[test]
    fn test_disjoint_layer_is_skipped() {
        let ds = MemoryDatasource::new("far").with_feature(point(1, 500.0, 500.0, "x"));
        let map = map_with(ds, 64);
        let out = run(&map, 4, "key");
        assert!(out.raster.is_empty());
        assert!(out.keys.is_empty());
    }

    #[test]
    fn test_empty_join_value_has_no_bag() {
        let ds = MemoryDatasource::new("p")
            .with_attribute(AttributeDescriptor::new("key", AttributeKind::String))
            .with_feature(Feature::new(1).with_geometry(Geometry::Point(Coord::new(5.0, 5.0))));
        let map = map_with(ds, 64);
        let out = run(&map, 4, "key");
        assert_eq!(out.keys.key(1), Some(""));
        assert!(out.attributes.is_empty());
    }

    #[test]
    fn test_layer_without_datasource() {
        let mut map = Map::new(16, 16);
        map.add_layer(Layer::new("bare"));
        map.zoom_to_box(Envelope::new(0.0, 0.0, 1.0, 1.0));
        let layer = map.layer(&LayerSelector::Index(0)).unwrap();
        let query =
            AttributeQuery::resolve(&crate::datasource::LayerDescriptor::new("x"), "__id__", None)
                .unwrap();
        let err = Rasterizer::new(16, 16, 4)
            .unwrap()
            .rasterize(&map, layer, &query)
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::DataSource);
    }
}
