//! Attribute projection for grid rendering.

use std::collections::BTreeSet;

use crate::datasource::{LayerDescriptor, Query};
use crate::error::{MapError, MapResult};
use crate::geometry::Envelope;

/// Join field name that refers to the feature id instead of an attribute.
pub const SYNTHETIC_ID_FIELD: &str = "__id__";

/// Which attributes end up in the grid's feature data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputFilter {
    /// No allow-list was given.
    All,
    /// Only the named attributes.
    Only(BTreeSet<String>),
}

impl OutputFilter {
    pub fn allows(&self, name: &str) -> bool {
        match self {
            OutputFilter::All => true,
            OutputFilter::Only(names) => names.contains(name),
        }
    }
}

/// Resolved attribute projection for one grid job.
///
/// Built once before rasterizing and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeQuery {
    join_field: String,
    synthetic_join: bool,
    property_names: BTreeSet<String>,
    filter: OutputFilter,
}

impl AttributeQuery {
    /// Resolves the projection for a layer's datasource.
    ///
    /// - With an allow-list only the listed attributes are fetched.
    /// - Without one every declared attribute is fetched.
    /// - A real join field is always fetched; `__id__` never is.
    /// - A schemaless datasource is trusted to carry the join field.
    ///
    /// # Errors
    ///
    /// [`MapError::Attribute`] when the datasource declares attributes and
    /// none of them is the join field.
    pub fn resolve(
        descriptor: &LayerDescriptor,
        join_field: &str,
        fields: Option<&[String]>,
    ) -> MapResult<Self> {
        let synthetic_join = join_field == SYNTHETIC_ID_FIELD;

        if !synthetic_join && !descriptor.is_schemaless() && !descriptor.has_attribute(join_field) {
            return Err(MapError::Attribute {
                field: join_field.to_string(),
                valid: descriptor.attribute_names(),
            });
        }

        let mut property_names: BTreeSet<String> = match fields {
            Some(list) => list
                .iter()
                .filter(|name| descriptor.is_schemaless() || descriptor.has_attribute(name))
                .filter(|name| name.as_str() != SYNTHETIC_ID_FIELD)
                .cloned()
                .collect(),
            None => descriptor.attribute_names().into_iter().collect(),
        };
        if !synthetic_join {
            property_names.insert(join_field.to_string());
        }

        let filter = match fields {
            Some(list) => OutputFilter::Only(list.iter().cloned().collect()),
            None => OutputFilter::All,
        };

        Ok(Self {
            join_field: join_field.to_string(),
            synthetic_join,
            property_names,
            filter,
        })
    }

    pub fn join_field(&self) -> &str {
        &self.join_field
    }

    /// True when the join value comes from the feature id.
    pub fn is_synthetic_join(&self) -> bool {
        self.synthetic_join
    }

    /// Attribute names requested from the datasource.
    pub fn property_names(&self) -> &BTreeSet<String> {
        &self.property_names
    }

    pub fn filter(&self) -> &OutputFilter {
        &self.filter
    }

    /// Whether the join field's own value belongs in feature data.
    pub fn outputs_join_field(&self) -> bool {
        !self.synthetic_join && self.filter.allows(&self.join_field)
    }

    /// Whether a non-join attribute belongs in feature data.
    pub fn outputs(&self, name: &str) -> bool {
        if name == self.join_field {
            return self.outputs_join_field();
        }
        self.filter.allows(name)
    }

    pub fn to_query(&self, bbox: Envelope) -> Query {
        Query::new(bbox).with_property_names(self.property_names.iter().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::AttributeKind;
    use crate::error::ErrorKind;

    fn descriptor() -> LayerDescriptor {
        LayerDescriptor::new("cities")
            .with_attribute("name", AttributeKind::String)
            .with_attribute("pop", AttributeKind::Integer)
            .with_attribute("code", AttributeKind::String)
    }

    fn names(q: &AttributeQuery) -> Vec<&str> {
        q.property_names().iter().map(String::as_str).collect()
    }

    #[test]
    fn test_no_allow_list_fetches_everything() {
        let q = AttributeQuery::resolve(&descriptor(), "code", None).unwrap();
        assert_eq!(names(&q), vec!["code", "name", "pop"]);
        assert!(q.outputs_join_field());
        assert!(q.outputs("pop"));
    }

    #[test]
    fn test_allow_list_forces_join_field() {
        let fields = vec!["name".to_string()];
        let q = AttributeQuery::resolve(&descriptor(), "code", Some(fields.as_slice())).unwrap();
        assert_eq!(names(&q), vec!["code", "name"]);
        assert!(!q.outputs_join_field());
        assert!(q.outputs("name"));
        assert!(!q.outputs("pop"));
    }

    #[test]
    fn test_join_field_in_allow_list_is_output() {
        let fields = vec!["code".to_string(), "pop".to_string()];
        let q = AttributeQuery::resolve(&descriptor(), "code", Some(fields.as_slice())).unwrap();
        assert!(q.outputs_join_field());
    }

    #[test]
    fn test_synthetic_join_is_never_fetched() {
        let q = AttributeQuery::resolve(&descriptor(), SYNTHETIC_ID_FIELD, None).unwrap();
        assert!(q.is_synthetic_join());
        assert!(!q.property_names().contains(SYNTHETIC_ID_FIELD));
        assert!(!q.outputs_join_field());

        let fields = vec![SYNTHETIC_ID_FIELD.to_string()];
        let q = AttributeQuery::resolve(&descriptor(), SYNTHETIC_ID_FIELD, Some(fields.as_slice())).unwrap();
        assert!(q.property_names().is_empty());
        assert!(!q.outputs(SYNTHETIC_ID_FIELD));
    }

    #[test]
    fn test_empty_allow_list_outputs_nothing() {
        let q = AttributeQuery::resolve(&descriptor(), "name", Some(&[][..])).unwrap();
        assert_eq!(names(&q), vec!["name"]);
        assert!(!q.outputs("pop"));
        assert!(!q.outputs_join_field());
    }

    #[test]
    fn test_schemaless_trusts_join_field() {
        let desc = LayerDescriptor::new("memory");
        let q = AttributeQuery::resolve(&desc, "anything", None).unwrap();
        assert_eq!(names(&q), vec!["anything"]);

        let fields = vec!["label".to_string()];
        let q = AttributeQuery::resolve(&desc, "anything", Some(fields.as_slice())).unwrap();
        assert_eq!(names(&q), vec!["anything", "label"]);
    }

    #[test]
    fn test_unknown_join_field_is_attribute_error() {
        let err = AttributeQuery::resolve(&descriptor(), "missing", None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(
            err.to_string(),
            "join_field: 'missing' is not a valid attribute name\nValid fields are: name pop code"
        );
    }

    #[test]
    fn test_to_query_carries_names() {
        let q = AttributeQuery::resolve(&descriptor(), "code", None).unwrap();
        let query = q.to_query(Envelope::new(0.0, 0.0, 1.0, 1.0));
        assert_eq!(query.property_names.len(), 3);
    }
}
