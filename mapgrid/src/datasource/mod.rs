//! Datasource abstraction.
//!
//! A [`Datasource`] hands out features in iteration order for a [`Query`]
//! (bounding box plus the attribute names the caller needs). Features carry
//! an integer id, zero or more geometries and a property bag.
//!
//! # Implementors
//!
//! - [`MemoryDatasource`] - features held in memory, optional declared schema
//! - [`GeoJsonDatasource`] - a GeoJSON `FeatureCollection` loaded from disk

mod geojson;
mod memory;

pub use geojson::GeoJsonDatasource;
pub use memory::MemoryDatasource;

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::geometry::{Envelope, Geometry};
use crate::value::{Properties, Value};

/// Errors raised by datasources.
#[derive(Debug, Error)]
pub enum DatasourceError {
    /// I/O error while reading the backing store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backing data could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A geometry was structurally invalid.
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// The query could not be executed.
    #[error("Query failed: {0}")]
    Query(String),
}

/// Raster or vector data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasourceKind {
    Vector,
    Raster,
}

/// Declared type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    Integer,
    Float,
    Double,
    String,
    Geometry,
    Object,
}

/// Attribute type as reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FieldKind {
    Number,
    String,
    Geometry,
    Object,
}

impl AttributeKind {
    pub fn field_kind(&self) -> FieldKind {
        match self {
            AttributeKind::Integer | AttributeKind::Float | AttributeKind::Double => {
                FieldKind::Number
            }
            AttributeKind::String => FieldKind::String,
            AttributeKind::Geometry => FieldKind::Geometry,
            AttributeKind::Object => FieldKind::Object,
        }
    }
}

/// Name and type of one declared attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDescriptor {
    pub name: String,
    pub kind: AttributeKind,
}

impl AttributeDescriptor {
    pub fn new(name: impl Into<String>, kind: AttributeKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Schema information a datasource declares about itself.
///
/// An empty attribute list means the datasource is schemaless: it cannot
/// tell in advance which attributes its features carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerDescriptor {
    pub name: String,
    pub encoding: String,
    pub attributes: Vec<AttributeDescriptor>,
}

impl LayerDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            encoding: "utf-8".to_string(),
            attributes: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, kind: AttributeKind) -> Self {
        self.attributes.push(AttributeDescriptor::new(name, kind));
        self
    }

    pub fn is_schemaless(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| a.name == name)
    }

    /// Declared attribute names in declaration order.
    pub fn attribute_names(&self) -> Vec<String> {
        self.attributes.iter().map(|a| a.name.clone()).collect()
    }
}

/// A feature returned by a datasource.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub id: i64,
    pub geometries: Vec<Geometry>,
    pub properties: Properties,
}

impl Feature {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            geometries: Vec::new(),
            properties: Properties::new(),
        }
    }

    pub fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.geometries.push(geometry);
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// Union of all geometry envelopes.
    pub fn envelope(&self) -> Option<Envelope> {
        let mut envelopes = self.geometries.iter().filter_map(Geometry::envelope);
        let mut env = envelopes.next()?;
        for e in envelopes {
            env.expand_to_include(&e);
        }
        Some(env)
    }
}

/// What a caller asks a datasource for.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub bbox: Envelope,
    pub property_names: BTreeSet<String>,
}

impl Query {
    pub fn new(bbox: Envelope) -> Self {
        Self {
            bbox,
            property_names: BTreeSet::new(),
        }
    }

    pub fn add_property_name(&mut self, name: impl Into<String>) {
        self.property_names.insert(name.into());
    }

    pub fn with_property_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.property_names.extend(names.into_iter().map(Into::into));
        self
    }
}

/// Lazily produced features, in datasource iteration order.
pub type Featureset = Box<dyn Iterator<Item = Result<Feature, DatasourceError>> + Send>;

/// A source of features for a layer.
///
/// Implementations must be thread-safe: jobs query datasources from
/// background workers.
///
/// Implementations may return more properties than the query names; grid
/// output filters them again.
pub trait Datasource: Send + Sync + fmt::Debug {
    /// Raster or vector. Defaults to vector.
    fn kind(&self) -> DatasourceKind {
        DatasourceKind::Vector
    }

    /// Bounding box of all data, in the layer's projection.
    fn envelope(&self) -> Envelope;

    /// Schema information.
    fn descriptor(&self) -> LayerDescriptor;

    /// Runs a query.
    ///
    /// # Errors
    ///
    /// Returns `DatasourceError` if the backing store cannot be read.
    fn features(&self, query: &Query) -> Result<Featureset, DatasourceError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Coord;

    #[test]
    fn test_attribute_kind_mapping() {
        assert_eq!(AttributeKind::Integer.field_kind(), FieldKind::Number);
        assert_eq!(AttributeKind::Double.field_kind(), FieldKind::Number);
        assert_eq!(AttributeKind::String.field_kind(), FieldKind::String);
        assert_eq!(AttributeKind::Object.field_kind(), FieldKind::Object);
    }

    #[test]
    fn test_descriptor_schemaless() {
        let desc = LayerDescriptor::new("memory");
        assert!(desc.is_schemaless());

        let desc = desc.with_attribute("name", AttributeKind::String);
        assert!(!desc.is_schemaless());
        assert!(desc.has_attribute("name"));
        assert!(!desc.has_attribute("pop"));
        assert_eq!(desc.attribute_names(), vec!["name".to_string()]);
    }

    #[test]
    fn test_feature_envelope_spans_geometries() {
        let f = Feature::new(1)
            .with_geometry(Geometry::Point(Coord::new(0.0, 0.0)))
            .with_geometry(Geometry::Point(Coord::new(5.0, -3.0)));
        assert_eq!(f.envelope(), Some(Envelope::new(0.0, -3.0, 5.0, 0.0)));
        assert_eq!(Feature::new(2).envelope(), None);
    }

    #[test]
    fn test_field_kind_serialization() {
        assert_eq!(serde_json::to_string(&FieldKind::Number).unwrap(), "\"Number\"");
        assert_eq!(
            serde_json::to_string(&DatasourceKind::Raster).unwrap(),
            "\"raster\""
        );
    }
}
