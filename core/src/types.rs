//! Core type definitions
//!
//! Descriptor types shared by the schema normalizer, the store and the
//! binding layer.

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

/// Live value of an input
pub type Value = serde_json::Value;

/// Plugin-specific settings (options, min/max, step, ...)
pub type Settings = serde_json::Map<String, Value>;

/// Callback invoked with the current value of a controlled path
#[derive(Clone)]
pub struct OnChange(Rc<dyn Fn(&Value)>);

impl OnChange {
    /// Wrap a closure as a change callback
    pub fn new(f: impl Fn(&Value) + 'static) -> Self {
        Self(Rc::new(f))
    }

    /// Invoke the callback
    pub fn call(&self, value: &Value) {
        (self.0)(value)
    }
}

impl fmt::Debug for OnChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OnChange(..)")
    }
}

/// Display settings of a folder node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FolderSettings {
    /// Whether the folder starts collapsed in the panel
    #[serde(default)]
    pub collapsed: bool,
}

impl FolderSettings {
    /// Folder settings with the given collapse state
    pub fn collapsed(collapsed: bool) -> Self {
        Self { collapsed }
    }
}

/// A normalized input as held by the store
#[derive(Debug, Clone, PartialEq)]
pub struct InputDescriptor {
    /// Plugin type tag (e.g. "select", "number")
    pub type_tag: String,
    /// Canonical value (post-normalize, post-sanitize)
    pub value: Value,
    /// Plugin-specific settings
    pub settings: Settings,
    /// Declaration index within the schema it came from
    pub order: usize,
    /// Optional display label (defaults to the key)
    pub label: Option<String>,
    /// Optional hover hint
    pub hint: Option<String>,
    /// Whether the panel should refuse edits
    pub disabled: bool,
    /// Collapse state of the enclosing folder (display grouping only)
    pub collapsed: bool,
}

/// Per-leaf output of the normalizer
#[derive(Debug, Clone)]
pub struct MappedPath {
    /// Fully-qualified store path
    pub path: String,
    /// Present for controlled leaves
    pub on_change: Option<OnChange>,
}

impl MappedPath {
    /// A controlled leaf pushes changes through `on_change` instead of
    /// appearing in the caller's reactive values.
    pub fn is_controlled(&self) -> bool {
        self.on_change.is_some()
    }
}
