//! Number input with optional range and step

use super::{Normalized, Plugin, SanitizeError};
use crate::types::{Settings, Value};

/// Number plugin
///
/// Settings: `min`, `max`, `step` (all optional numbers).
pub struct NumberPlugin;

fn bound(settings: &Settings, key: &str) -> Option<f64> {
    settings.get(key).and_then(Value::as_f64)
}

/// JSON form of `n`, integral when possible; `None` for NaN and infinities
fn to_value(n: f64) -> Option<Value> {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Some(Value::from(n as i64))
    } else {
        serde_json::Number::from_f64(n).map(Value::Number)
    }
}

impl Plugin for NumberPlugin {
    fn type_tag(&self) -> &'static str {
        "number"
    }

    fn schema(&self, value: Option<&Value>, settings: &Settings) -> bool {
        let value_ok = match value {
            Some(v) => v.is_number(),
            None => bound(settings, "min").is_some(),
        };
        let bounds_ok = ["min", "max", "step"]
            .iter()
            .all(|key| settings.get(*key).is_none_or(Value::is_number));
        let range_ok = match (bound(settings, "min"), bound(settings, "max")) {
            (Some(min), Some(max)) => min <= max,
            _ => true,
        };
        value_ok && bounds_ok && range_ok
    }

    fn normalize(&self, value: Option<&Value>, settings: &Settings) -> Normalized {
        let raw = value
            .and_then(Value::as_f64)
            .or_else(|| bound(settings, "min"))
            .unwrap_or(0.0);

        let mut out = Settings::new();
        for key in ["min", "max", "step"] {
            if let Some(v) = settings.get(key) {
                out.insert(key.to_string(), v.clone());
            }
        }

        // keep the declared representation (int vs float) when in range
        let value = match value {
            Some(v) if clamp(raw, &out) == raw => v.clone(),
            // bounds and values are JSON numbers, so always finite here
            _ => to_value(clamp(raw, &out)).unwrap_or_else(|| Value::from(0)),
        };
        Normalized {
            value,
            settings: out,
        }
    }

    fn sanitize(&self, value: Value, settings: &Settings) -> Result<Value, SanitizeError> {
        let n = match &value {
            Value::Number(n) => n
                .as_f64()
                .ok_or_else(|| SanitizeError::new("number", "not representable as f64"))?,
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| SanitizeError::new("number", format!("'{}' is not a number", s)))?,
            other => {
                return Err(SanitizeError::new(
                    "number",
                    format!("expected a number, got {}", other),
                ));
            }
        };

        if !n.is_finite() {
            return Err(SanitizeError::new("number", format!("{} is not finite", n)));
        }

        let stepped = match bound(settings, "step") {
            Some(step) if step > 0.0 => {
                let base = bound(settings, "min").unwrap_or(0.0);
                base + ((n - base) / step).round() * step
            }
            _ => n,
        };
        let clamped = clamp(stepped, settings);

        if clamped == n && value.is_number() {
            return Ok(value);
        }
        to_value(clamped).ok_or_else(|| SanitizeError::new("number", "result is not finite"))
    }

    fn infers(&self, value: Option<&Value>, _settings: &Settings) -> bool {
        value.is_some_and(Value::is_number)
    }
}

fn clamp(n: f64, settings: &Settings) -> f64 {
    let mut n = n;
    if let Some(min) = bound(settings, "min") {
        n = n.max(min);
    }
    if let Some(max) = bound(settings, "max") {
        n = n.min(max);
    }
    n
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn settings_of(v: Value) -> Settings {
        match v {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_schema() {
        let p = NumberPlugin;
        assert!(p.schema(Some(&json!(1)), &Settings::new()));
        assert!(p.schema(None, &settings_of(json!({ "min": 0 }))));
        assert!(!p.schema(None, &Settings::new()));
        assert!(!p.schema(Some(&json!("1")), &Settings::new()));
        assert!(!p.schema(Some(&json!(1)), &settings_of(json!({ "min": 5, "max": 1 }))));
        assert!(!p.schema(Some(&json!(1)), &settings_of(json!({ "step": "x" }))));
    }

    #[test]
    fn test_normalize_keeps_in_range_value() {
        let n = NumberPlugin.normalize(Some(&json!(3)), &settings_of(json!({ "min": 0, "max": 10 })));
        assert_eq!(n.value, json!(3));
        assert_eq!(n.settings, settings_of(json!({ "min": 0, "max": 10 })));
    }

    #[test]
    fn test_normalize_clamps_and_defaults() {
        let n = NumberPlugin.normalize(Some(&json!(30)), &settings_of(json!({ "max": 10 })));
        assert_eq!(n.value, json!(10));

        let n = NumberPlugin.normalize(None, &settings_of(json!({ "min": 2 })));
        assert_eq!(n.value, json!(2));
    }

    #[test]
    fn test_sanitize_clamps() {
        let s = settings_of(json!({ "min": 0, "max": 1 }));
        assert_eq!(NumberPlugin.sanitize(json!(2.5), &s), Ok(json!(1)));
        assert_eq!(NumberPlugin.sanitize(json!(-1), &s), Ok(json!(0)));
        assert_eq!(NumberPlugin.sanitize(json!(0.5), &s), Ok(json!(0.5)));
    }

    #[test]
    fn test_sanitize_steps_from_min() {
        let s = settings_of(json!({ "min": 1, "step": 2 }));
        assert_eq!(NumberPlugin.sanitize(json!(4), &s), Ok(json!(5)));
        assert_eq!(NumberPlugin.sanitize(json!(2.9), &s), Ok(json!(3)));
    }

    #[test]
    fn test_sanitize_coerces_strings() {
        assert_eq!(NumberPlugin.sanitize(json!(" 7 "), &Settings::new()), Ok(json!(7)));
        assert!(NumberPlugin.sanitize(json!("seven"), &Settings::new()).is_err());
        assert!(NumberPlugin.sanitize(json!(true), &Settings::new()).is_err());
    }

    #[test]
    fn test_sanitize_rejects_non_finite() {
        let unbounded = Settings::new();
        for raw in ["NaN", "inf", "-infinity"] {
            let err = NumberPlugin.sanitize(json!(raw), &unbounded).unwrap_err();
            assert_eq!(err.plugin, "number");
        }
        let bounded = settings_of(json!({ "min": 0, "max": 1 }));
        assert!(NumberPlugin.sanitize(json!("inf"), &bounded).is_err());
    }
}
