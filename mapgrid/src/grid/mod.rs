//! Interaction grid rendering.
//!
//! Turns one layer of a map into a UTF-grid: rows of text where each
//! character identifies the feature under that grid cell, the key list that
//! decodes the characters, and attribute data for each visible key.
//!
//! # Pipeline
//!
//! ```text
//! GridOptions ──► AttributeQuery ──► Rasterizer ──► encoder ──► collector
//!                 (projection)       (ids + keys)   (rows,keys)  (data)
//! ```
//!
//! Every stage works on data owned by the current call; nothing is shared
//! with other renders.

mod collector;
mod encoder;
mod query;
mod raster;

pub use collector::{collect, FeatureData};
pub use encoder::{encode, is_safe_code, CodeTable, EncodedRows, FIRST_CODE};
pub use query::{AttributeQuery, OutputFilter, SYNTHETIC_ID_FIELD};
pub use raster::{
    FeatureId, FeatureKeyTable, IndexedRaster, RasterizedLayer, Rasterizer, NO_FEATURE,
};

use serde::Serialize;
use tracing::debug;

use crate::datasource::DatasourceKind;
use crate::error::{MapError, MapResult};
use crate::map::{LayerSelector, Map};

/// Default grid resolution (map pixels per grid cell).
pub const DEFAULT_RESOLUTION: u32 = 4;

/// Options for [`render_grid`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridOptions {
    /// Attribute whose value identifies a feature; `__id__` uses the id.
    pub join_field: String,
    /// Map pixels per grid cell along each axis.
    pub resolution: u32,
    /// Attributes to include in feature data; `None` includes all.
    pub fields: Option<Vec<String>>,
}

impl Default for GridOptions {
    fn default() -> Self {
        Self {
            join_field: SYNTHETIC_ID_FIELD.to_string(),
            resolution: DEFAULT_RESOLUTION,
            fields: None,
        }
    }
}

impl GridOptions {
    pub fn with_join_field(mut self, join_field: impl Into<String>) -> Self {
        self.join_field = join_field.into();
        self
    }

    pub fn with_resolution(mut self, resolution: u32) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Checks option shapes.
    pub fn validate(&self) -> MapResult<()> {
        if self.resolution == 0 {
            return Err(MapError::Configuration(
                "resolution must be a positive integer".to_string(),
            ));
        }
        if self.join_field.is_empty() {
            return Err(MapError::Configuration(
                "join_field must be a non-empty string".to_string(),
            ));
        }
        Ok(())
    }
}

/// A rendered interaction grid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EncodedGrid {
    pub grid: Vec<String>,
    pub keys: Vec<String>,
    pub data: FeatureData,
}

/// Renders the selected layer of `map` into a UTF-grid.
///
/// # Errors
///
/// - `Configuration` for bad options, a missing extent, or a raster layer
/// - `Attribute` for a join field the datasource does not declare
/// - `Resolution` when the layer cannot be found
/// - `DataSource`, `Projection`, `Render` from the pipeline stages
pub fn render_grid(
    map: &Map,
    selector: &LayerSelector,
    options: &GridOptions,
) -> MapResult<EncodedGrid> {
    options.validate()?;
    let layer = map.layer(selector)?;
    let ds = layer.datasource().ok_or_else(|| {
        MapError::DataSource("Layer does not have a Datasource".to_string())
    })?;
    if ds.kind() == DatasourceKind::Raster {
        return Err(MapError::Configuration(
            "Raster layers are not yet supported".to_string(),
        ));
    }
    map.require_extent()?;

    let query = AttributeQuery::resolve(
        &ds.descriptor(),
        &options.join_field,
        options.fields.as_deref(),
    )?;
    let rasterized = Rasterizer::new(map.width(), map.height(), options.resolution)?
        .rasterize(map, layer, &query)?;
    let encoded = encode(&rasterized.raster, &rasterized.keys)?;
    let data = collect(&encoded.keys, &rasterized.attributes, &query);

    debug!(
        layer = layer.name(),
        rows = encoded.rows.len(),
        keys = encoded.keys.len(),
        "Encoded grid"
    );

    Ok(EncodedGrid {
        grid: encoded.rows,
        keys: encoded.keys,
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::{Feature, MemoryDatasource};
    use crate::error::ErrorKind;
    use crate::geometry::{Coord, Envelope, Geometry};
    use crate::map::Layer;

    fn sample_map() -> Map {
        let ds = MemoryDatasource::new("pts")
            .with_feature(
                Feature::new(1)
                    .with_geometry(Geometry::Point(Coord::new(-100.0, 40.0)))
                    .with_property("name", "west")
                    .with_property("code", "W"),
            )
            .with_feature(
                Feature::new(2)
                    .with_geometry(Geometry::Point(Coord::new(100.0, -40.0)))
                    .with_property("name", "east")
                    .with_property("code", "E"),
            );
        let mut map = Map::new(256, 256);
        map.add_layer(Layer::new("pts").with_datasource(ds));
        map.zoom_to_box(Envelope::new(-180.0, -180.0, 180.0, 180.0));
        map
    }

    #[test]
    fn test_options_defaults_and_validation() {
        let opts = GridOptions::default();
        assert_eq!(opts.join_field, "__id__");
        assert_eq!(opts.resolution, 4);
        assert!(opts.validate().is_ok());
        assert!(GridOptions::default().with_resolution(0).validate().is_err());
        assert!(GridOptions::default().with_join_field("").validate().is_err());
    }

    #[test]
    fn test_render_grid_dimensions_and_keys() {
        let grid = render_grid(&sample_map(), &"pts".into(), &GridOptions::default()).unwrap();
        assert_eq!(grid.grid.len(), 64);
        assert!(grid.grid.iter().all(|row| row.chars().count() == 64));
        assert_eq!(grid.keys, vec!["", "1", "2"]);
        assert_eq!(grid.data.keys().collect::<Vec<_>>(), vec!["1", "2"]);
    }

    #[test]
    fn test_render_grid_with_join_field_and_fields() {
        let opts = GridOptions::default()
            .with_join_field("code")
            .with_fields(["name"]);
        let grid = render_grid(&sample_map(), &LayerSelector::Index(0), &opts).unwrap();
        assert_eq!(grid.keys, vec!["", "W", "E"]);
        assert_eq!(grid.data["W"].len(), 1);
        assert!(grid.data["W"].contains_key("name"));
    }

    #[test]
    fn test_render_grid_is_deterministic() {
        let map = sample_map();
        let a = render_grid(&map, &"pts".into(), &GridOptions::default()).unwrap();
        let b = render_grid(&map, &"pts".into(), &GridOptions::default()).unwrap();
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn test_render_grid_errors() {
        let map = sample_map();
        let err = render_grid(&map, &"nope".into(), &GridOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Resolution);

        let mut unzoomed = Map::new(64, 64);
        unzoomed.add_layer(Layer::new("a").with_datasource(MemoryDatasource::new("a")));
        let err = render_grid(&unzoomed, &"a".into(), &GridOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_grid_json_shape() {
        let grid = render_grid(&sample_map(), &"pts".into(), &GridOptions::default()).unwrap();
        let json = serde_json::to_value(&grid).unwrap();
        assert!(json["grid"].is_array());
        assert_eq!(json["keys"][1], "1");
        assert_eq!(json["data"]["1"]["name"], "west");
    }
}
