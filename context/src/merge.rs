//! Recursive key-wise merge of JSON objects.
//!
//! Keys present on one side only are copied. When both sides hold an object
//! under the same key the merge recurses; any other collision takes the
//! overlay value. Arrays are replaced, never concatenated.

use ctx_core::JsonObject;
use serde_json::Value;

/// Merge `overlay` on top of `base`. Neither input is modified.
pub fn deep_merge(base: &JsonObject, overlay: &JsonObject) -> JsonObject {
    let mut merged = base.clone();
    merge_into(&mut merged, overlay);
    merged
}

/// Fold [`deep_merge`] over `layers` left to right; later layers win.
pub fn merge_all<'a, I>(layers: I) -> JsonObject
where
    I: IntoIterator<Item = &'a JsonObject>
{
    let mut merged = JsonObject::new();
    for layer in layers {
        merge_into(&mut merged, layer);
    }
    merged
}

fn merge_into(target: &mut JsonObject, overlay: &JsonObject) {
    for (key, value) in overlay {
        match (target.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                merge_into(existing, incoming);
            }
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}
