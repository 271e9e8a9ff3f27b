//! Schema flattening
//!
//! Walks a [`Schema`] depth-first and produces one [`InputDescriptor`] per
//! leaf, keyed by its fully-qualified path, plus the caller-facing mapping
//! from short key to path.

use hashbrown::HashSet;

use super::{InputSpec, Schema, SchemaError, SchemaNode};
use crate::plugin::PluginRegistry;
use crate::types::{FolderSettings, InputDescriptor, MappedPath, Value};

/// Live `(type_tag, value)` already held for a path
pub type ExistingLookup<'a> = &'a dyn Fn(&str) -> Option<(String, Value)>;

/// Path-keyed descriptors in declaration order
#[derive(Debug, Clone, Default)]
pub struct InitialData {
    entries: Vec<(String, InputDescriptor)>,
}

impl InitialData {
    pub fn get(&self, path: &str) -> Option<&InputDescriptor> {
        self.entries
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, input)| input)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &InputDescriptor)> {
        self.entries.iter().map(|(p, input)| (p.as_str(), input))
    }

    /// Paths in declaration order
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(p, _)| p.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn push(&mut self, path: String, input: InputDescriptor) {
        self.entries.push((path, input));
    }
}

/// Short key to [`MappedPath`], in declaration order
#[derive(Debug, Clone, Default)]
pub struct MappedPaths {
    entries: Vec<(String, MappedPath)>,
}

impl MappedPaths {
    pub fn get(&self, key: &str) -> Option<&MappedPath> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, m)| m)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MappedPath)> {
        self.entries.iter().map(|(k, m)| (k.as_str(), m))
    }

    /// Every fully-qualified path
    pub fn paths(&self) -> Vec<String> {
        self.entries.iter().map(|(_, m)| m.path.clone()).collect()
    }

    /// `(key, path)` of leaves exposed as reactive values
    pub fn render_paths(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .filter(|(_, m)| !m.is_controlled())
            .map(|(k, m)| (k.as_str(), m.path.as_str()))
    }

    /// Leaves that push through `on_change`
    pub fn controlled(&self) -> impl Iterator<Item = &MappedPath> {
        self.entries
            .iter()
            .map(|(_, m)| m)
            .filter(|m| m.is_controlled())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Output of [`Normalizer::normalize`]
#[derive(Debug, Clone, Default)]
pub struct NormalizedSchema {
    pub initial_data: InitialData,
    pub mapped_paths: MappedPaths,
    /// Folder paths with their resolved settings, outermost first
    pub folders: Vec<(String, FolderSettings)>,
}

/// Flattens schemas against a plugin registry
pub struct Normalizer<'a> {
    plugins: &'a PluginRegistry,
    separator: &'a str,
    folder_defaults: FolderSettings,
    existing: Option<ExistingLookup<'a>>,
}

/// Per-call traversal state
struct Walk {
    out: NormalizedSchema,
    seen: HashSet<String>,
    next_order: usize,
}

impl<'a> Normalizer<'a> {
    pub fn new(plugins: &'a PluginRegistry, separator: &'a str) -> Self {
        Self {
            plugins,
            separator,
            folder_defaults: FolderSettings::default(),
            existing: None,
        }
    }

    /// Settings for folders that declare none
    pub fn folder_defaults(mut self, settings: FolderSettings) -> Self {
        self.folder_defaults = settings;
        self
    }

    /// Live values that win over declared defaults for the same path and type
    pub fn existing(mut self, lookup: ExistingLookup<'a>) -> Self {
        self.existing = Some(lookup);
        self
    }

    /// Flatten `schema`
    ///
    /// Fails on the first invalid leaf; no partial result is returned.
    pub fn normalize(&self, schema: &Schema) -> Result<NormalizedSchema, SchemaError> {
        let mut walk = Walk {
            out: NormalizedSchema::default(),
            seen: HashSet::new(),
            next_order: 0,
        };
        self.walk(schema, "", false, &mut walk)?;
        Ok(walk.out)
    }

    fn join(&self, prefix: &str, key: &str) -> String {
        if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}{}{}", prefix, self.separator, key)
        }
    }

    fn walk(
        &self,
        schema: &Schema,
        prefix: &str,
        collapsed: bool,
        walk: &mut Walk,
    ) -> Result<(), SchemaError> {
        for (key, node) in schema.iter() {
            if key.is_empty() {
                return Err(SchemaError::EmptyKey {
                    parent: prefix.to_string(),
                });
            }
            // "a.b" at the root would alias leaf "b" of folder "a"
            if !self.separator.is_empty() && key.contains(self.separator) {
                return Err(SchemaError::SeparatorInKey {
                    key: key.to_string(),
                    parent: prefix.to_string(),
                    separator: self.separator.to_string(),
                });
            }
            let path = self.join(prefix, key);

            match node {
                SchemaNode::Folder(folder) => {
                    if walk.seen.contains(&path) {
                        return Err(SchemaError::DuplicatePath(path));
                    }
                    let settings = folder.settings.unwrap_or(self.folder_defaults);
                    if !walk.out.folders.iter().any(|(p, _)| *p == path) {
                        walk.out.folders.push((path.clone(), settings));
                    }
                    self.walk(&folder.schema, &path, settings.collapsed, walk)?;
                }
                SchemaNode::Input(spec) => {
                    let is_folder = walk.out.folders.iter().any(|(p, _)| *p == path);
                    if is_folder || !walk.seen.insert(path.clone()) {
                        return Err(SchemaError::DuplicatePath(path));
                    }
                    if let Some(existing) = walk.out.mapped_paths.get(key) {
                        return Err(SchemaError::DuplicateKey {
                            key: key.to_string(),
                            path,
                            existing: existing.path.clone(),
                        });
                    }

                    let order = walk.next_order;
                    walk.next_order += 1;
                    let input = self.normalize_leaf(&path, spec, order, collapsed)?;

                    walk.out.mapped_paths.entries.push((
                        key.to_string(),
                        MappedPath {
                            path: path.clone(),
                            on_change: spec.on_change.clone(),
                        },
                    ));
                    walk.out.initial_data.push(path, input);
                }
            }
        }
        Ok(())
    }

    fn normalize_leaf(
        &self,
        path: &str,
        spec: &InputSpec,
        order: usize,
        collapsed: bool,
    ) -> Result<InputDescriptor, SchemaError> {
        let value = spec.value.as_ref();
        let plugin = match &spec.type_tag {
            Some(tag) => self
                .plugins
                .get(tag)
                .ok_or_else(|| SchemaError::UnknownType {
                    path: path.to_string(),
                    type_tag: tag.clone(),
                })?,
            None => self
                .plugins
                .infer(value, &spec.settings)
                .ok_or_else(|| SchemaError::UninferableType {
                    path: path.to_string(),
                })?,
        };

        if !plugin.schema(value, &spec.settings) {
            return Err(SchemaError::Validation {
                path: path.to_string(),
                plugin: plugin.type_tag().to_string(),
            });
        }

        let normalized = plugin.normalize(value, &spec.settings);
        let type_tag = plugin.type_tag().to_string();

        let value = match self.existing.and_then(|lookup| lookup(path)) {
            Some((live_type, live_value)) if live_type == type_tag => live_value,
            _ => normalized.value,
        };

        Ok(InputDescriptor {
            type_tag,
            value,
            settings: normalized.settings,
            order,
            label: spec.label.clone(),
            hint: spec.hint.clone(),
            disabled: spec.disabled,
            collapsed,
        })
    }
}
