//! In-memory datasource.

use std::sync::Arc;

use super::{
    AttributeDescriptor, Datasource, DatasourceError, Feature, Featureset, LayerDescriptor, Query,
};
use crate::geometry::Envelope;

/// Features held in memory.
///
/// Without a declared schema the datasource is schemaless and returns every
/// property of every feature. With a schema, properties are projected down
/// to the query's property names.
///
/// # Example
///
/// ```
/// use mapgrid::datasource::{Datasource, Feature, MemoryDatasource, Query};
/// use mapgrid::geometry::{Coord, Geometry};
///
/// let ds = MemoryDatasource::new("points")
///     .with_feature(Feature::new(1).with_geometry(Geometry::Point(Coord::new(1.0, 2.0))));
///
/// let features: Vec<_> = ds.features(&Query::new(ds.envelope())).unwrap().collect();
/// assert_eq!(features.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct MemoryDatasource {
    name: String,
    features: Arc<Vec<Feature>>,
    attributes: Vec<AttributeDescriptor>,
    envelope: Option<Envelope>,
}

impl MemoryDatasource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            features: Arc::new(Vec::new()),
            attributes: Vec::new(),
            envelope: None,
        }
    }

    /// Adds a feature, extending the envelope.
    pub fn with_feature(mut self, feature: Feature) -> Self {
        self.push(feature);
        self
    }

    /// Declares an attribute. Declaring any attribute ends schemaless mode.
    pub fn with_attribute(mut self, descriptor: AttributeDescriptor) -> Self {
        self.attributes.push(descriptor);
        self
    }

    pub fn push(&mut self, feature: Feature) {
        if let Some(env) = feature.envelope() {
            match self.envelope.as_mut() {
                Some(current) => current.expand_to_include(&env),
                None => self.envelope = Some(env),
            }
        }
        Arc::make_mut(&mut self.features).push(feature);
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

impl Datasource for MemoryDatasource {
    fn envelope(&self) -> Envelope {
        self.envelope.unwrap_or_default()
    }

    fn descriptor(&self) -> LayerDescriptor {
        LayerDescriptor {
            name: self.name.clone(),
            encoding: "utf-8".to_string(),
            attributes: self.attributes.clone(),
        }
    }

    fn features(&self, query: &Query) -> Result<Featureset, DatasourceError> {
        let project = !self.attributes.is_empty();
        let matched: Vec<Feature> = self
            .features
            .iter()
            .filter(|f| match f.envelope() {
                Some(env) => env.intersects(&query.bbox),
                None => true,
            })
            .map(|f| {
                let mut feature = f.clone();
                if project {
                    feature
                        .properties
                        .retain(|name, _| query.property_names.contains(name));
                }
                feature
            })
            .collect();
        Ok(Box::new(matched.into_iter().map(Ok)))
    }
}
