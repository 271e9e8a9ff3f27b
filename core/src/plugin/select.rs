//! Select input: one value out of a list or a labelled map of options

use super::{Normalized, Plugin, display_key};
use crate::types::{Settings, Value};

/// Select plugin
///
/// `options` is either an array of values (keys are the values' display
/// form) or an object of `label -> value`. Normalized settings carry
/// parallel `keys` and `values` arrays plus a private copy of `options`.
pub struct SelectPlugin;

impl Plugin for SelectPlugin {
    fn type_tag(&self) -> &'static str {
        "select"
    }

    fn schema(&self, _value: Option<&Value>, settings: &Settings) -> bool {
        matches!(
            settings.get("options"),
            Some(Value::Array(_)) | Some(Value::Object(_))
        )
    }

    fn normalize(&self, value: Option<&Value>, settings: &Settings) -> Normalized {
        let mut options = settings.get("options").cloned().unwrap_or(Value::Null);

        let (mut keys, mut values): (Vec<Value>, Vec<Value>) = match &options {
            Value::Array(items) => (
                items.iter().map(|o| Value::String(display_key(o))).collect(),
                items.clone(),
            ),
            Value::Object(map) => (
                map.keys().cloned().map(Value::String).collect(),
                map.values().cloned().collect(),
            ),
            _ => (Vec::new(), Vec::new()),
        };

        let value = match value {
            None => values.first().cloned().unwrap_or(Value::Null),
            Some(v) => {
                if !values.contains(v) {
                    // a one-off custom value becomes the first option
                    keys.insert(0, Value::String(display_key(v)));
                    values.insert(0, v.clone());
                    match &mut options {
                        Value::Array(items) => items.insert(0, v.clone()),
                        Value::Object(map) => {
                            map.insert(display_key(v), v.clone());
                        }
                        _ => {}
                    }
                }
                v.clone()
            }
        };

        let mut out = Settings::new();
        out.insert("options".to_string(), options);
        out.insert("keys".to_string(), Value::Array(keys));
        out.insert("values".to_string(), Value::Array(values));
        Normalized {
            value,
            settings: out,
        }
    }

    /// Index of `value` within `settings.values`, `-1` when absent
    fn format(&self, value: &Value, settings: &Settings) -> Value {
        let index = settings
            .get("values")
            .and_then(Value::as_array)
            .and_then(|values| values.iter().position(|v| v == value))
            .map(|i| i as i64)
            .unwrap_or(-1);
        Value::from(index)
    }

    fn infers(&self, _value: Option<&Value>, settings: &Settings) -> bool {
        settings.contains_key("options")
    }
}
