//! Boolean toggle

use super::{Normalized, Plugin, SanitizeError};
use crate::types::{Settings, Value};

/// Boolean plugin
pub struct BooleanPlugin;

impl Plugin for BooleanPlugin {
    fn type_tag(&self) -> &'static str {
        "boolean"
    }

    fn schema(&self, value: Option<&Value>, _settings: &Settings) -> bool {
        value.is_none_or(Value::is_boolean)
    }

    fn normalize(&self, value: Option<&Value>, _settings: &Settings) -> Normalized {
        Normalized {
            value: value.cloned().unwrap_or(Value::Bool(false)),
            settings: Settings::new(),
        }
    }

    fn sanitize(&self, value: Value, _settings: &Settings) -> Result<Value, SanitizeError> {
        match value {
            Value::Bool(_) => Ok(value),
            other => Err(SanitizeError::new(
                "boolean",
                format!("expected a boolean, got {}", other),
            )),
        }
    }

    fn infers(&self, value: Option<&Value>, _settings: &Settings) -> bool {
        value.is_some_and(Value::is_boolean)
    }
}
