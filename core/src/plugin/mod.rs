//! Input plugins
//!
//! A plugin owns everything type-specific about one kind of input: which
//! settings are legal, how shorthand is expanded into canonical settings,
//! how a value is displayed and how proposed values are coerced before
//! they reach the store.
//!
//! Plugins are stateless and keyed by their type tag. Leaves that declare
//! no type are matched against [`Plugin::infers`] in registration order.

mod boolean;
mod number;
mod select;
mod string;

pub use boolean::BooleanPlugin;
pub use number::NumberPlugin;
pub use select::SelectPlugin;
pub use string::StringPlugin;

use std::rc::Rc;

use hashbrown::HashMap;

use crate::types::{Settings, Value};

/// Canonical representation produced by [`Plugin::normalize`]
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    pub value: Value,
    pub settings: Settings,
}

/// A proposed value could not be coerced by the plugin
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{plugin}: {reason}")]
pub struct SanitizeError {
    /// Type tag of the rejecting plugin
    pub plugin: String,
    /// What was wrong with the value
    pub reason: String,
}

impl SanitizeError {
    pub fn new(plugin: &str, reason: impl Into<String>) -> Self {
        Self {
            plugin: plugin.to_string(),
            reason: reason.into(),
        }
    }
}

/// Type-specific input contract
pub trait Plugin {
    /// Tag used in schemas to select this plugin
    fn type_tag(&self) -> &'static str;

    /// Whether the declared value/settings are structurally legal
    fn schema(&self, value: Option<&Value>, settings: &Settings) -> bool;

    /// Expand user shorthand into the canonical value and settings
    ///
    /// Only called after [`Plugin::schema`] accepted the input.
    fn normalize(&self, value: Option<&Value>, settings: &Settings) -> Normalized;

    /// Display value for renderers
    fn format(&self, value: &Value, _settings: &Settings) -> Value {
        value.clone()
    }

    /// Coerce a proposed value before it is committed
    fn sanitize(&self, value: Value, _settings: &Settings) -> Result<Value, SanitizeError> {
        Ok(value)
    }

    /// Whether a leaf without an explicit type belongs to this plugin
    fn infers(&self, _value: Option<&Value>, _settings: &Settings) -> bool {
        false
    }
}

/// Registry of plugins keyed by type tag
#[derive(Clone, Default)]
pub struct PluginRegistry {
    plugins: HashMap<String, Rc<dyn Plugin>>,
    /// Tags in registration order (inference order)
    order: Vec<String>,
}

impl PluginRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the builtin select, number, boolean and string plugins
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(SelectPlugin);
        registry.register(NumberPlugin);
        registry.register(BooleanPlugin);
        registry.register(StringPlugin);
        registry
    }

    /// Register a plugin, replacing any plugin with the same tag
    ///
    /// A replaced plugin keeps its original inference position.
    pub fn register(&mut self, plugin: impl Plugin + 'static) {
        let tag = plugin.type_tag().to_string();
        if self.plugins.insert(tag.clone(), Rc::new(plugin)).is_some() {
            tracing::debug!("plugin '{}' replaced", tag);
        } else {
            self.order.push(tag);
        }
    }

    /// Look up a plugin by tag
    pub fn get(&self, type_tag: &str) -> Option<&Rc<dyn Plugin>> {
        self.plugins.get(type_tag)
    }

    /// Whether a plugin is registered under `type_tag`
    pub fn contains(&self, type_tag: &str) -> bool {
        self.plugins.contains_key(type_tag)
    }

    /// First plugin (in registration order) that claims the leaf
    pub fn infer(&self, value: Option<&Value>, settings: &Settings) -> Option<&Rc<dyn Plugin>> {
        self.order
            .iter()
            .filter_map(|tag| self.plugins.get(tag))
            .find(|plugin| plugin.infers(value, settings))
    }

    /// Registered tags in registration order
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// `String(value)` as a panel would display it: strings verbatim, whole
/// floats without a fraction (`1.0` is `"1"`), everything else in its JSON
/// form.
pub(crate) fn display_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) if n.is_f64() => match n.as_f64() {
            Some(f) if f == 0.0 => "0".to_string(),
            Some(f) if f.fract() == 0.0 && f.abs() < 1e21 => format!("{:.0}", f),
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}
