//! Deep merge of JSON values

use serde_json::Value;

/// Merge `overrides` into `base`.
///
/// Objects merge key by key, recursively. Any other value in `overrides`
/// replaces the one in `base`, arrays included. `null` overrides are ignored.
pub fn merge_json(base: &mut Value, overrides: Value) {
    match (base, overrides) {
        (_, Value::Null) => {}
        (Value::Object(base_map), Value::Object(override_map)) => {
            for (key, value) in override_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_json(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, value) => *base = value,
    }
}
