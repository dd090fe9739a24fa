// Structural repair for model-generated insight documents.
// Missing required keys are filled from a default table instead of
// rejecting the whole response.

use serde_json::{Map, Value};

/// A key the document must carry, with the value used when it is absent.
pub struct RequiredKey {
    pub key: &'static str,
    pub default: fn() -> Value,
}

/// Insert defaults for every missing key. Returns the keys that were filled.
pub fn fill_missing(object: &mut Map<String, Value>, table: &[RequiredKey]) -> Vec<&'static str> {
    let mut filled = Vec::new();
    for required in table {
        if !object.contains_key(required.key) {
            object.insert(required.key.to_string(), (required.default)());
            filled.push(required.key);
        }
    }
    filled
}

/// Replace `object[key]` with its default unless it already has the
/// expected JSON shape. Returns true when the value was replaced.
pub fn ensure_shape(
    object: &mut Map<String, Value>,
    required: &RequiredKey,
    is_valid: fn(&Value) -> bool,
) -> bool {
    let valid = object.get(required.key).is_some_and(is_valid);
    if !valid {
        object.insert(required.key.to_string(), (required.default)());
    }
    !valid
}

/// Keep only object entries of the array at `key`, filling each from
/// `table`. Returns how many non-object entries were dropped.
pub fn repair_entries(
    object: &mut Map<String, Value>,
    key: &str,
    table: &[RequiredKey],
) -> usize {
    let Some(Value::Array(entries)) = object.get_mut(key) else {
        return 0;
    };
    let before = entries.len();
    entries.retain(Value::is_object);
    for entry in entries.iter_mut() {
        if let Value::Object(fields) = entry {
            fill_missing(fields, table);
        }
    }
    before - entries.len()
}
