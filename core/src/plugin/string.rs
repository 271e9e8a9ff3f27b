//! Free text input

use super::{Normalized, Plugin, SanitizeError};
use crate::types::{Settings, Value};

/// String plugin
///
/// Settings: `rows` (optional, multi-line hint for renderers).
pub struct StringPlugin;

impl Plugin for StringPlugin {
    fn type_tag(&self) -> &'static str {
        "string"
    }

    fn schema(&self, value: Option<&Value>, settings: &Settings) -> bool {
        value.is_none_or(Value::is_string)
            && settings.get("rows").is_none_or(|rows| rows.is_u64())
    }

    fn normalize(&self, value: Option<&Value>, settings: &Settings) -> Normalized {
        let mut out = Settings::new();
        if let Some(rows) = settings.get("rows") {
            out.insert("rows".to_string(), rows.clone());
        }
        Normalized {
            value: value.cloned().unwrap_or_else(|| Value::String(String::new())),
            settings: out,
        }
    }

    fn sanitize(&self, value: Value, _settings: &Settings) -> Result<Value, SanitizeError> {
        match value {
            Value::String(_) => Ok(value),
            other => Err(SanitizeError::new(
                "string",
                format!("expected a string, got {}", other),
            )),
        }
    }

    fn infers(&self, value: Option<&Value>, _settings: &Settings) -> bool {
        value.is_some_and(Value::is_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_normalize() {
        let n = StringPlugin.normalize(Some(&json!("hi")), &Settings::new());
        assert_eq!(n.value, json!("hi"));
        assert!(n.settings.is_empty());
        assert_eq!(StringPlugin.normalize(None, &Settings::new()).value, json!(""));
    }

    #[test]
    fn test_string_rows_must_be_unsigned() {
        let mut settings = Settings::new();
        settings.insert("rows".to_string(), json!(-2));
        assert!(!StringPlugin.schema(Some(&json!("a")), &settings));
        settings.insert("rows".to_string(), json!(3));
        assert!(StringPlugin.schema(Some(&json!("a")), &settings));
    }

    #[test]
    fn test_string_sanitize() {
        assert!(StringPlugin.sanitize(json!(5), &Settings::new()).is_err());
        assert_eq!(StringPlugin.sanitize(json!("x"), &Settings::new()), Ok(json!("x")));
    }
}
