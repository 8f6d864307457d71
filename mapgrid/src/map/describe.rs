//! Layer introspection: datasource descriptions and raw feature listings.

use std::collections::BTreeMap;

use serde::Serialize;

use super::{LayerSelector, Map};
use crate::datasource::{DatasourceKind, FieldKind, Query};
use crate::error::MapResult;
use crate::geometry::{Envelope, GeometryType};
use crate::value::Properties;

/// What a layer's datasource reports about itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasourceDescription {
    #[serde(rename = "type")]
    pub kind: DatasourceKind,
    pub extent: Envelope,
    pub encoding: String,
    pub fields: BTreeMap<String, FieldKind>,
    /// Kind of the first geometry of the first feature. Absent for raster
    /// sources and for vector sources without features.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry_type: Option<GeometryType>,
    pub has_features: bool,
}

/// One feature as returned by [`list_features`]: its attributes plus its
/// id under the `__id__` key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureRecord {
    #[serde(flatten)]
    pub attributes: Properties,
    #[serde(rename = "__id__")]
    pub id: i64,
}

/// Describes every layer's datasource, keyed by layer name.
///
/// Layers without a datasource map to `None`. Later layers win when two
/// layers share a name.
pub fn describe_layers(map: &Map) -> MapResult<BTreeMap<String, Option<DatasourceDescription>>> {
    let mut out = BTreeMap::new();
    for layer in map.layer_slice() {
        let description = match layer.datasource() {
            None => None,
            Some(ds) => {
                let descriptor = ds.descriptor();
                let kind = ds.kind();
                let extent = ds.envelope();

                let mut query = Query::new(extent);
                for attr in &descriptor.attributes {
                    query.add_property_name(attr.name.clone());
                }
                let first = ds.features(&query)?.next().transpose()?;

                let geometry_type = match kind {
                    DatasourceKind::Raster => None,
                    DatasourceKind::Vector => first
                        .as_ref()
                        .and_then(|f| f.geometries.first())
                        .map(|g| g.geometry_type()),
                };

                Some(DatasourceDescription {
                    kind,
                    extent,
                    encoding: descriptor.encoding.clone(),
                    fields: descriptor
                        .attributes
                        .iter()
                        .map(|a| (a.name.clone(), a.kind.field_kind()))
                        .collect(),
                    geometry_type,
                    has_features: first.is_some(),
                })
            }
        };
        out.insert(layer.name().to_string(), description);
    }
    Ok(out)
}

/// Lists features of the layer at `index`, by position in datasource order.
///
/// Positions `first..=last` are returned; `last == 0` means "to the end".
/// A layer without a datasource yields no records.
pub fn list_features(map: &Map, index: usize, first: usize, last: usize) -> MapResult<Vec<FeatureRecord>> {
    let layer = map.layer(&LayerSelector::Index(index))?;
    let Some(ds) = layer.datasource() else {
        return Ok(Vec::new());
    };

    let mut query = Query::new(ds.envelope());
    for attr in ds.descriptor().attributes {
        query.add_property_name(attr.name);
    }

    let mut records = Vec::new();
    for (position, feature) in ds.features(&query)?.enumerate() {
        if last != 0 && position > last {
            break;
        }
        let feature = feature?;
        if position >= first {
            records.push(FeatureRecord {
                attributes: feature.properties,
                id: feature.id,
            });
        }
    }
    Ok(records)
}
