//! Feature data for the keys that survived into a grid.

use std::collections::{BTreeMap, HashMap};

use tracing::warn;

use super::query::AttributeQuery;
use crate::value::Properties;

/// Join value → filtered attributes.
pub type FeatureData = BTreeMap<String, Properties>;

/// Builds feature data for every non-empty key in `key_order`.
///
/// Values that were drawn but fully overwritten are not in `key_order` and
/// get no entry. A key with no recorded bag is skipped with a warning.
pub fn collect(
    key_order: &[String],
    bags: &HashMap<String, Properties>,
    query: &AttributeQuery,
) -> FeatureData {
    let mut data = FeatureData::new();
    for key in key_order.iter().filter(|k| !k.is_empty()) {
        let Some(bag) = bags.get(key) else {
            warn!(key = %key, "No attributes recorded for grid key, skipping");
            continue;
        };
        let attrs: Properties = bag
            .iter()
            .filter(|(name, _)| query.outputs(name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        data.insert(key.clone(), attrs);
    }
    data
}
