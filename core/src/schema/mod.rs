//! Declarative schema of panel inputs
//!
//! A [`Schema`] is an ordered tree: folder nodes group and prefix their
//! children, leaf nodes describe one input. The [`Normalizer`] flattens the
//! tree into path-keyed descriptors the store can hold.
//!
//! # Literal format
//!
//! Schemas can also be read from JSON (see [`Schema::from_json`]):
//!
//! ```json
//! {
//!   "speed": 3.5,
//!   "colors": {
//!     "__isFolder": true,
//!     "schema": { "primary": { "options": ["red", "green", "blue"] } },
//!     "settings": { "collapsed": true }
//!   }
//! }
//! ```

mod normalize;

pub use normalize::{InitialData, MappedPaths, NormalizedSchema, Normalizer};

use crate::types::{FolderSettings, OnChange, Settings, Value};

/// Key marking a folder node in the JSON literal format
pub const FOLDER_MARKER: &str = "__isFolder";

/// Errors raised while reading or normalizing a schema
///
/// Any of these rejects the whole schema; nothing is partially applied.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    /// Settings rejected by the plugin's schema check
    #[error("invalid settings for '{path}' (plugin '{plugin}')")]
    Validation { path: String, plugin: String },

    /// Declared type has no registered plugin
    #[error("unknown input type '{type_tag}' at '{path}'")]
    UnknownType { path: String, type_tag: String },

    /// No type declared and no plugin claims the value
    #[error("cannot infer an input type for '{path}'")]
    UninferableType { path: String },

    /// An entry with an empty name
    #[error("empty key in schema under '{parent}'")]
    EmptyKey { parent: String },

    /// An entry name containing the path separator
    #[error("key '{key}' under '{parent}' contains the path separator '{separator}'")]
    SeparatorInKey {
        key: String,
        parent: String,
        separator: String,
    },

    /// Two leaves resolve to the same fully-qualified path
    #[error("duplicate path '{0}'")]
    DuplicatePath(String),

    /// Two leaves in one schema share a short name
    #[error("key '{key}' at '{path}' already maps to '{existing}'")]
    DuplicateKey {
        key: String,
        path: String,
        existing: String,
    },

    /// JSON literal is not a schema
    #[error("invalid schema literal at '{path}': {reason}")]
    InvalidLiteral { path: String, reason: String },
}

/// Leaf description as written by the caller
#[derive(Debug, Clone, Default)]
pub struct InputSpec {
    /// Declared default value (absent means "let the plugin pick")
    pub value: Option<Value>,
    /// Explicit plugin tag; inferred when absent
    pub type_tag: Option<String>,
    /// Plugin settings (options, min, max, ...)
    pub settings: Settings,
    pub label: Option<String>,
    pub hint: Option<String>,
    pub disabled: bool,
    /// Makes the leaf controlled
    pub on_change: Option<OnChange>,
}

impl InputSpec {
    /// Leaf with a raw default value, type inferred
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::default()
        }
    }

    /// Leaf with an explicit type and no value
    pub fn typed(type_tag: &str) -> Self {
        Self {
            type_tag: Some(type_tag.to_string()),
            ..Self::default()
        }
    }

    /// Select leaf over the given options
    pub fn select(options: impl Into<Value>) -> Self {
        Self::default().setting("options", options)
    }

    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_type(mut self, type_tag: &str) -> Self {
        self.type_tag = Some(type_tag.to_string());
        self
    }

    /// Set one plugin setting
    pub fn setting(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.settings.insert(key.to_string(), value.into());
        self
    }

    pub fn label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn hint(mut self, hint: &str) -> Self {
        self.hint = Some(hint.to_string());
        self
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    /// Make the leaf controlled: changes go to `f` instead of the
    /// caller's reactive values
    pub fn on_change(mut self, f: impl Fn(&Value) + 'static) -> Self {
        self.on_change = Some(OnChange::new(f));
        self
    }

    /// Build from a descriptor object of the literal format
    fn from_json_object(path: &str, map: &Settings) -> Result<Self, SchemaError> {
        let mut spec = InputSpec::default();
        for (key, value) in map {
            match key.as_str() {
                "value" => spec.value = Some(value.clone()),
                "type" => spec.type_tag = Some(literal_str(path, key, value)?),
                "label" => spec.label = Some(literal_str(path, key, value)?),
                "hint" => spec.hint = Some(literal_str(path, key, value)?),
                "disabled" => {
                    spec.disabled = value.as_bool().ok_or_else(|| SchemaError::InvalidLiteral {
                        path: path.to_string(),
                        reason: "'disabled' must be a boolean".to_string(),
                    })?
                }
                _ => {
                    spec.settings.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(spec)
    }
}

fn literal_str(path: &str, key: &str, value: &Value) -> Result<String, SchemaError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| SchemaError::InvalidLiteral {
            path: path.to_string(),
            reason: format!("'{}' must be a string", key),
        })
}

/// A folder node: child schema plus display settings
#[derive(Debug, Clone, Default)]
pub struct FolderNode {
    pub schema: Schema,
    /// `None` uses the store's configured folder defaults
    pub settings: Option<FolderSettings>,
}

/// A schema entry
#[derive(Debug, Clone)]
pub enum SchemaNode {
    Folder(FolderNode),
    Input(InputSpec),
}

impl From<InputSpec> for SchemaNode {
    fn from(spec: InputSpec) -> Self {
        SchemaNode::Input(spec)
    }
}

impl From<FolderNode> for SchemaNode {
    fn from(folder: FolderNode) -> Self {
        SchemaNode::Folder(folder)
    }
}

/// Folder node with default settings
pub fn folder(schema: Schema) -> SchemaNode {
    SchemaNode::Folder(FolderNode {
        schema,
        settings: None,
    })
}

/// Folder node with explicit settings
pub fn folder_with(schema: Schema, settings: FolderSettings) -> SchemaNode {
    SchemaNode::Folder(FolderNode {
        schema,
        settings: Some(settings),
    })
}

/// Ordered map of key to schema node
///
/// Declaration order is kept: it becomes the display order of the inputs.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    entries: Vec<(String, SchemaNode)>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry (builder form)
    pub fn with(mut self, key: &str, node: impl Into<SchemaNode>) -> Self {
        self.insert(key, node);
        self
    }

    /// Append an entry
    pub fn insert(&mut self, key: &str, node: impl Into<SchemaNode>) {
        self.entries.push((key.to_string(), node.into()));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SchemaNode)> {
        self.entries.iter().map(|(k, n)| (k.as_str(), n))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse the JSON literal format
    ///
    /// Objects carrying `"__isFolder": true` are folders; objects with any
    /// of `value`, `type` or `options` are descriptors; any other value is
    /// a raw default whose type is inferred.
    pub fn from_json(value: &Value) -> Result<Self, SchemaError> {
        Self::parse_json(value, "")
    }

    fn parse_json(value: &Value, parent: &str) -> Result<Self, SchemaError> {
        let Value::Object(map) = value else {
            return Err(SchemaError::InvalidLiteral {
                path: parent.to_string(),
                reason: "expected an object".to_string(),
            });
        };

        let mut schema = Schema::new();
        for (key, node) in map {
            let path = if parent.is_empty() {
                key.clone()
            } else {
                format!("{}.{}", parent, key)
            };

            let parsed = match node {
                Value::Object(obj) if obj.get(FOLDER_MARKER) == Some(&Value::Bool(true)) => {
                    let child = obj.get("schema").ok_or_else(|| SchemaError::InvalidLiteral {
                        path: path.clone(),
                        reason: "folder without 'schema'".to_string(),
                    })?;
                    let settings = match obj.get("settings") {
                        Some(s) => Some(serde_json::from_value::<FolderSettings>(s.clone()).map_err(
                            |e| SchemaError::InvalidLiteral {
                                path: path.clone(),
                                reason: e.to_string(),
                            },
                        )?),
                        None => None,
                    };
                    SchemaNode::Folder(FolderNode {
                        schema: Self::parse_json(child, &path)?,
                        settings,
                    })
                }
                Value::Object(obj)
                    if ["value", "type", "options"].iter().any(|k| obj.contains_key(*k)) =>
                {
                    SchemaNode::Input(InputSpec::from_json_object(&path, obj)?)
                }
                raw => SchemaNode::Input(InputSpec::new(raw.clone())),
            };
            schema.entries.push((key.clone(), parsed));
        }
        Ok(schema)
    }
}

impl<K: Into<String>, N: Into<SchemaNode>> FromIterator<(K, N)> for Schema {
    fn from_iter<I: IntoIterator<Item = (K, N)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, n)| (k.into(), n.into()))
                .collect(),
        }
    }
}
