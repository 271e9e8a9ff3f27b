//! Value export utilities
//!
//! Snapshots of the live values, for saving presets or copy-paste.

use crate::store::Store;
use crate::types::Value;

/// Export every live value as a flat `path -> value` map
///
/// Output format (with the default separator):
/// ```json
/// { "speed": 1, "player.health": 100, "player.attacks.punch": 5 }
/// ```
pub fn flat_values(store: &Store) -> serde_json::Map<String, Value> {
    store
        .inputs()
        .into_iter()
        .map(|(path, input)| (path, input.value))
        .collect()
}

/// Export every live value as a JSON object nested by folder
///
/// Output format:
/// ```json
/// { "speed": 1, "player": { "health": 100, "attacks": { "punch": 5 } } }
/// ```
pub fn nested_values(store: &Store) -> Value {
    let separator = store.config().separator.clone();
    let mut root = serde_json::Map::new();

    for (path, input) in store.inputs() {
        let parts: Vec<&str> = path.split(separator.as_str()).collect();
        insert_nested(&mut root, &parts, input.value);
    }

    Value::Object(root)
}

fn insert_nested(node: &mut serde_json::Map<String, Value>, parts: &[&str], value: Value) {
    let Some((first, rest)) = parts.split_first() else {
        return;
    };

    if rest.is_empty() {
        node.insert(first.to_string(), value);
        return;
    }

    let child = node
        .entry(first.to_string())
        .or_insert_with(|| Value::Object(serde_json::Map::new()));
    // one binding's leaf can share its path with another binding's folder
    if !child.is_object() {
        tracing::warn!("export: '{}' is both a value and a folder, value replaced", first);
        *child = Value::Object(serde_json::Map::new());
    }
    if let Value::Object(map) = child {
        insert_nested(map, rest, value);
    }
}
