//! GeoJSON datasource.
//!
//! Loads a `FeatureCollection` (or a single `Feature`) into memory. The
//! attribute schema is inferred from the first non-null value seen for each
//! property name, in first-seen order.

use std::path::Path;

use serde_json::Value as Json;

use super::{
    AttributeDescriptor, AttributeKind, Datasource, DatasourceError, Feature, Featureset,
    LayerDescriptor, MemoryDatasource, Query,
};
use crate::geometry::{Coord, Envelope, Geometry};
use crate::value::Value;

/// Features parsed from a GeoJSON document.
#[derive(Debug, Clone)]
pub struct GeoJsonDatasource {
    inner: MemoryDatasource,
    attributes: Vec<AttributeDescriptor>,
}

impl GeoJsonDatasource {
    /// Reads and parses a GeoJSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DatasourceError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "geojson".to_string());
        Self::parse(&name, &text)
    }

    /// Parses GeoJSON text.
    pub fn parse(name: &str, text: &str) -> Result<Self, DatasourceError> {
        let doc: Json =
            serde_json::from_str(text).map_err(|e| DatasourceError::Parse(e.to_string()))?;

        let members = match doc.get("type").and_then(Json::as_str) {
            Some("FeatureCollection") => doc
                .get("features")
                .and_then(Json::as_array)
                .cloned()
                .ok_or_else(|| DatasourceError::Parse("missing 'features' array".to_string()))?,
            Some("Feature") => vec![doc],
            Some(other) => {
                return Err(DatasourceError::Parse(format!(
                    "unsupported GeoJSON type '{}'",
                    other
                )))
            }
            None => return Err(DatasourceError::Parse("missing 'type' member".to_string())),
        };

        let mut inner = MemoryDatasource::new(name);
        let mut attributes: Vec<AttributeDescriptor> = Vec::new();

        for (index, member) in members.iter().enumerate() {
            let feature = parse_feature(member, index)?;
            for (key, value) in &feature.properties {
                infer_attribute(&mut attributes, key, value);
            }
            inner.push(feature);
        }

        // Properties that were only ever null default to strings.
        for attr in attributes.iter_mut() {
            if attr.kind == AttributeKind::Object {
                attr.kind = AttributeKind::String;
            }
        }

        tracing::debug!(
            name,
            features = inner.len(),
            attributes = attributes.len(),
            "Loaded GeoJSON datasource"
        );

        Ok(Self { inner, attributes })
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl Datasource for GeoJsonDatasource {
    fn envelope(&self) -> Envelope {
        self.inner.envelope()
    }

    fn descriptor(&self) -> LayerDescriptor {
        let mut desc = self.inner.descriptor();
        desc.attributes = self.attributes.clone();
        desc
    }

    fn features(&self, query: &Query) -> Result<Featureset, DatasourceError> {
        let project = !self.attributes.is_empty();
        let features = self.inner.features(query)?;
        if !project {
            return Ok(features);
        }
        let names = query.property_names.clone();
        Ok(Box::new(features.map(move |f| {
            f.map(|mut f| {
                f.properties.retain(|k, _| names.contains(k));
                f
            })
        })))
    }
}

// Object kind marks "seen, but only null so far".
fn infer_attribute(attributes: &mut Vec<AttributeDescriptor>, key: &str, value: &Value) {
    let kind = match value {
        Value::Int(_) => AttributeKind::Integer,
        Value::Float(_) => AttributeKind::Double,
        Value::Text(_) => AttributeKind::String,
        Value::Null => AttributeKind::Object,
    };
    match attributes.iter_mut().find(|a| a.name == key) {
        Some(existing) if existing.kind == AttributeKind::Object => existing.kind = kind,
        Some(existing) if existing.kind == AttributeKind::Integer && kind == AttributeKind::Double => {
            existing.kind = AttributeKind::Double
        }
        Some(_) => {}
        None => attributes.push(AttributeDescriptor::new(key, kind)),
    }
}

fn parse_feature(member: &Json, index: usize) -> Result<Feature, DatasourceError> {
    if member.get("type").and_then(Json::as_str) != Some("Feature") {
        return Err(DatasourceError::Parse(format!(
            "member {} is not a Feature",
            index
        )));
    }

    let id = member
        .get("id")
        .and_then(Json::as_i64)
        .unwrap_or(index as i64 + 1);
    let mut feature = Feature::new(id);

    if let Some(props) = member.get("properties").and_then(Json::as_object) {
        for (key, value) in props {
            feature.properties.insert(key.clone(), Value::from(value));
        }
    }

    match member.get("geometry") {
        None | Some(Json::Null) => {}
        Some(geom) => parse_geometry(geom, &mut feature.geometries)?,
    }

    Ok(feature)
}

fn parse_geometry(geom: &Json, out: &mut Vec<Geometry>) -> Result<(), DatasourceError> {
    let kind = geom
        .get("type")
        .and_then(Json::as_str)
        .ok_or_else(|| DatasourceError::InvalidGeometry("missing geometry type".to_string()))?;

    if kind == "GeometryCollection" {
        let parts = geom
            .get("geometries")
            .and_then(Json::as_array)
            .ok_or_else(|| DatasourceError::InvalidGeometry("missing 'geometries'".to_string()))?;
        for part in parts {
            parse_geometry(part, out)?;
        }
        return Ok(());
    }

    let coords = geom
        .get("coordinates")
        .ok_or_else(|| DatasourceError::InvalidGeometry(format!("{} without coordinates", kind)))?;

    match kind {
        "Point" => out.push(Geometry::Point(position(coords)?)),
        "MultiPoint" => out.push(Geometry::MultiPoint(positions(coords)?)),
        "LineString" => out.push(Geometry::LineString(positions(coords)?)),
        "MultiLineString" => {
            for line in array(coords)? {
                out.push(Geometry::LineString(positions(line)?));
            }
        }
        "Polygon" => out.push(Geometry::Polygon(rings(coords)?)),
        "MultiPolygon" => {
            for poly in array(coords)? {
                out.push(Geometry::Polygon(rings(poly)?));
            }
        }
        other => {
            return Err(DatasourceError::InvalidGeometry(format!(
                "unsupported geometry type '{}'",
                other
            )))
        }
    }
    Ok(())
}

fn array(v: &Json) -> Result<&Vec<Json>, DatasourceError> {
    v.as_array()
        .ok_or_else(|| DatasourceError::InvalidGeometry("expected an array".to_string()))
}

fn position(v: &Json) -> Result<Coord, DatasourceError> {
    let parts = array(v)?;
    match (
        parts.first().and_then(Json::as_f64),
        parts.get(1).and_then(Json::as_f64),
    ) {
        (Some(x), Some(y)) => Ok(Coord::new(x, y)),
        _ => Err(DatasourceError::InvalidGeometry(format!(
            "invalid position {}",
            v
        ))),
    }
}

fn positions(v: &Json) -> Result<Vec<Coord>, DatasourceError> {
    array(v)?.iter().map(position).collect()
}

fn rings(v: &Json) -> Result<Vec<Vec<Coord>>, DatasourceError> {
    array(v)?.iter().map(positions).collect()
}
