//! Builders for the data shapes most tests need.

use ctx_core::{
    Device, Dimension, JsonObject, ScopeRef, ScopeRestrictions, ScopedDocument, TreeIndex
};
use serde_json::Value;

/// JSON object literal helper. Non-object values yield an empty object.
pub fn object(value: Value) -> JsonObject {
    match value {
        Value::Object(map) => map,
        _ => JsonObject::new()
    }
}

/// Active document with the given weight, data and no restrictions.
pub fn document(name: &str, weight: i32, data: Value) -> ScopedDocument {
    ScopedDocument::new(name, object(data)).with_weight(weight)
}

/// Active document restricted on a single dimension.
pub fn scoped_document(
    name: &str,
    weight: i32,
    data: Value,
    dimension: Dimension,
    values: &[&str]
) -> ScopedDocument {
    document(name, weight, data)
        .with_scope(ScopeRestrictions::default().with(dimension, values.iter().copied()))
}

/// Device at `site`, optionally placed in `region`.
pub fn device(id: &str, site: Option<&str>, region: Option<&str>) -> Device {
    let mut device = Device::new(id, id);
    device.site = site.map(ScopeRef::from);
    device.region = region.map(ScopeRef::from);
    device
}

/// Region tree from `(id, parent)` pairs; node names equal their ids.
pub fn region_tree(nodes: &[(&str, Option<&str>)]) -> TreeIndex {
    TreeIndex::from_nodes(
        nodes
            .iter()
            .map(|(id, parent)| (ScopeRef::from(*id), id.to_string(), parent.map(ScopeRef::from)))
    )
    .unwrap_or_default()
}
