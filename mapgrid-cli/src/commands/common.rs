//! Map options shared by the map commands.

use std::path::PathBuf;
use std::str::FromStr;

use clap::Args;
use mapgrid::datasource::GeoJsonDatasource;
use mapgrid::{Envelope, Layer, LayerSelector, Map};

use crate::error::CliError;

/// A `name=path.geojson` layer option.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerSpec {
    pub name: String,
    pub path: PathBuf,
}

impl FromStr for LayerSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, path) = s
            .split_once('=')
            .ok_or_else(|| format!("expected NAME=PATH, got '{}'", s))?;
        if name.is_empty() || path.is_empty() {
            return Err(format!("expected NAME=PATH, got '{}'", s));
        }
        Ok(LayerSpec {
            name: name.to_string(),
            path: PathBuf::from(path),
        })
    }
}

/// Parses `minx,miny,maxx,maxy`, rejecting non-finite or inverted boxes.
pub fn parse_extent(s: &str) -> Result<Envelope, String> {
    let values = s
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid extent '{}': {}", s, e))?;
    let [minx, miny, maxx, maxy] = values[..] else {
        return Err(format!("extent needs four numbers, got '{}'", s));
    };
    let extent = Envelope::from_corners(minx, miny, maxx, maxy);
    if !extent.is_finite() {
        return Err(format!("extent '{}' must contain four finite numbers", s));
    }
    if minx >= maxx || miny >= maxy {
        return Err(format!(
            "extent '{}' must have minx < maxx and miny < maxy",
            s
        ));
    }
    Ok(extent)
}

/// Numeric text selects by index, anything else by name.
pub fn parse_selector(s: &str) -> LayerSelector {
    match s.parse::<usize>() {
        Ok(index) => LayerSelector::Index(index),
        Err(_) => LayerSelector::Name(s.to_string()),
    }
}

/// Options describing the map to build.
#[derive(Debug, Clone, Args)]
pub struct MapArgs {
    /// Add a GeoJSON layer (repeatable), e.g. --layer cities=cities.geojson
    #[arg(long = "layer", value_name = "NAME=PATH", global = true)]
    pub layers: Vec<LayerSpec>,

    /// Map width in pixels
    #[arg(long, default_value_t = 256, global = true)]
    pub width: u32,

    /// Map height in pixels
    #[arg(long, default_value_t = 256, global = true)]
    pub height: u32,

    /// Map spatial reference (e.g. EPSG:3857); layers are EPSG:4326
    #[arg(long, global = true)]
    pub srs: Option<String>,

    /// Extent as minx,miny,maxx,maxy in map units (default: all layers)
    #[arg(long, value_parser = parse_extent, allow_hyphen_values = true, global = true)]
    pub extent: Option<Envelope>,
}

/// Builds a map from the options and zooms it.
pub fn build_map(args: &MapArgs) -> Result<Map, CliError> {
    let mut map = Map::new(args.width, args.height);
    if let Some(srs) = &args.srs {
        map.set_srs(srs.clone());
    }

    for spec in &args.layers {
        let ds = GeoJsonDatasource::from_path(&spec.path).map_err(|e| CliError::Layer {
            name: spec.name.clone(),
            message: e.to_string(),
        })?;
        map.add_layer(Layer::new(spec.name.clone()).with_datasource(ds));
    }

    match args.extent {
        Some(extent) => map.zoom_to_box(extent),
        None => map.zoom_all()?,
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapgrid::Coord;
    use std::io::Write;

    #[test]
    fn test_layer_spec() {
        let spec: LayerSpec = "roads=data/roads.geojson".parse().unwrap();
        assert_eq!(spec.name, "roads");
        assert_eq!(spec.path, PathBuf::from("data/roads.geojson"));
        assert!("roads".parse::<LayerSpec>().is_err());
        assert!("=x.geojson".parse::<LayerSpec>().is_err());
    }

    #[test]
    fn test_parse_extent() {
        let e = parse_extent("-180,-90,180,90").unwrap();
        assert_eq!(e, Envelope::new(-180.0, -90.0, 180.0, 90.0));
        assert!(parse_extent("1,2,3").is_err());
        assert!(parse_extent("a,b,c,d").is_err());
        assert!(parse_extent("5,5,-5,-5").unwrap_err().contains("minx < maxx"));
        assert!(parse_extent("0,0,NaN,1").unwrap_err().contains("finite"));
    }

    #[test]
    fn test_parse_selector() {
        assert_eq!(parse_selector("2"), LayerSelector::Index(2));
        assert_eq!(parse_selector("roads"), LayerSelector::Name("roads".to_string()));
    }

    #[test]
    fn test_build_map_zooms_to_layers() {
        let mut file = tempfile::Builder::new().suffix(".geojson").tempfile().unwrap();
        write!(
            file,
            r#"{{"type":"FeatureCollection","features":[
                {{"type":"Feature","geometry":{{"type":"Point","coordinates":[10,20]}},"properties":{{"name":"a"}}}},
                {{"type":"Feature","geometry":{{"type":"Point","coordinates":[30,40]}},"properties":{{"name":"b"}}}}
            ]}}"#
        )
        .unwrap();

        let args = MapArgs {
            layers: vec![LayerSpec {
                name: "pts".to_string(),
                path: file.path().to_path_buf(),
            }],
            width: 100,
            height: 100,
            srs: None,
            extent: None,
        };
        let map = build_map(&args).unwrap();
        assert_eq!(map.layer_count(), 1);
        let extent = map.extent().unwrap();
        assert!(extent.contains(Coord::new(10.0, 20.0)));
        assert!(extent.contains(Coord::new(30.0, 40.0)));
    }

    #[test]
    fn test_build_map_reports_bad_layer() {
        let args = MapArgs {
            layers: vec![LayerSpec {
                name: "missing".to_string(),
                path: PathBuf::from("/nonexistent/missing.geojson"),
            }],
            width: 10,
            height: 10,
            srs: None,
            extent: Some(Envelope::new(0.0, 0.0, 1.0, 1.0)),
        };
        let err = build_map(&args).unwrap_err();
        assert!(err.to_string().contains("'missing'"));
    }
}
