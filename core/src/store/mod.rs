//! Live input store
//!
//! Path-keyed table of [`InputDescriptor`]s with reference counting and
//! per-path value listeners.
//!
//! # Lifecycle
//!
//! A path is created by the first [`Store::add_data`] that names it and
//! removed by the [`Store::dispose_paths`] call that brings its count back
//! to zero. Eviction is immediate and drops the path's listeners.
//!
//! # Re-entrancy
//!
//! The store is single-threaded (`Rc` + `RefCell`). No borrow is held while
//! listeners run, so a listener may call back into the store, including
//! [`Store::set`] and [`Store::dispose_paths`].

mod global;
mod listeners;

pub use global::{default_store, is_default_store, reset_default_store};
pub use listeners::Subscription;

use std::cell::RefCell;
use std::rc::Rc;

use hashbrown::HashMap;

use crate::config::StoreConfig;
use crate::plugin::{PluginRegistry, SanitizeError};
use crate::schema::{InitialData, NormalizedSchema, Normalizer, Schema, SchemaError};
use crate::types::{FolderSettings, InputDescriptor, Settings, Value};
use listeners::Listeners;

/// Errors from store reads and writes
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    /// No live input at this path
    #[error("path not found: '{0}'")]
    PathNotFound(String),

    /// The input's plugin refused the value
    #[error("cannot set '{path}': {source}")]
    Sanitize {
        path: String,
        #[source]
        source: SanitizeError,
    },

    /// More disposals than registrations for a path
    #[error("refcount underflow for '{0}' (already disposed)")]
    RefcountUnderflow(String),
}

/// A stored input with its bookkeeping
#[derive(Debug, Clone)]
struct StoredInput {
    input: InputDescriptor,
    ref_count: u32,
    /// Creation sequence, breaks ties between equal `order`s
    seq: u64,
}

#[derive(Default)]
pub(crate) struct StoreState {
    data: HashMap<String, StoredInput>,
    folders: HashMap<String, FolderSettings>,
    pub(crate) listeners: Listeners,
    next_seq: u64,
}

impl StoreState {
    /// Drop folders with no remaining input below them
    fn prune_folders(&mut self, separator: &str) {
        let data = &self.data;
        self.folders.retain(|folder, _| {
            let prefix = format!("{}{}", folder, separator);
            data.keys().any(|path| path.starts_with(&prefix))
        });
    }
}

pub(crate) struct StoreInner {
    pub(crate) state: RefCell<StoreState>,
    plugins: PluginRegistry,
    config: StoreConfig,
}

/// Shared handle to a store
///
/// Cloning is cheap; all clones see the same table.
#[derive(Clone)]
pub struct Store {
    inner: Rc<StoreInner>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("paths", &self.len())
            .field("separator", &self.inner.config.separator)
            .finish()
    }
}

impl Store {
    /// Store with default configuration and the builtin plugins
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default(), PluginRegistry::with_builtins())
    }

    /// Store with default configuration and a custom plugin set
    pub fn with_plugins(plugins: PluginRegistry) -> Self {
        Self::with_config(StoreConfig::default(), plugins)
    }

    pub fn with_config(config: StoreConfig, plugins: PluginRegistry) -> Self {
        Self {
            inner: Rc::new(StoreInner {
                state: RefCell::new(StoreState::default()),
                plugins,
                config,
            }),
        }
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.inner.plugins
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// Whether two handles point at the same store
    pub fn ptr_eq(&self, other: &Store) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // =========================================================================
    // Schema
    // =========================================================================

    /// Normalize `schema` against this store
    ///
    /// Paths already live with the same type report their live value
    /// instead of the declared default.
    pub fn get_data_from_schema(&self, schema: &Schema) -> Result<NormalizedSchema, SchemaError> {
        let state = self.inner.state.borrow();
        let lookup = |path: &str| {
            state
                .data
                .get(path)
                .map(|s| (s.input.type_tag.clone(), s.input.value.clone()))
        };
        Normalizer::new(&self.inner.plugins, &self.inner.config.separator)
            .folder_defaults(self.inner.config.folder)
            .existing(&lookup)
            .normalize(schema)
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Register inputs, incrementing the count of paths already present
    ///
    /// With `override_settings`, an existing path takes the new type,
    /// settings and order but keeps its live value (run through the new
    /// plugin's `sanitize` when the type changes). Without it, only the
    /// count changes.
    pub fn add_data(&self, data: &InitialData, override_settings: bool) {
        let mut guard = self.inner.state.borrow_mut();
        let state = &mut *guard;

        for (path, input) in data.iter() {
            match state.data.get_mut(path) {
                Some(stored) => {
                    stored.ref_count += 1;
                    let type_changed = stored.input.type_tag != input.type_tag;
                    if override_settings {
                        let live = std::mem::take(&mut stored.input.value);
                        let value = if type_changed {
                            self.convert_live_value(path, live, &stored.input.type_tag, input)
                        } else {
                            live
                        };
                        stored.input = InputDescriptor {
                            value,
                            ..input.clone()
                        };
                    } else if type_changed {
                        tracing::warn!(
                            "'{}' declared as '{}' but already holds a '{}' input; existing settings kept",
                            path,
                            input.type_tag,
                            stored.input.type_tag
                        );
                    }
                }
                None => {
                    let seq = state.next_seq;
                    state.next_seq += 1;
                    state.data.insert(
                        path.to_string(),
                        StoredInput {
                            input: input.clone(),
                            ref_count: 1,
                            seq,
                        },
                    );
                    tracing::debug!("input '{}' created ({})", path, input.type_tag);
                }
            }
        }
    }

    /// Record folder settings
    ///
    /// Folders already known keep their settings unless
    /// `override_settings` is set, mirroring [`Store::add_data`].
    pub fn add_folders(&self, folders: &[(String, FolderSettings)], override_settings: bool) {
        let mut state = self.inner.state.borrow_mut();
        for (path, settings) in folders {
            if override_settings {
                state.folders.insert(path.clone(), *settings);
            } else {
                state.folders.entry(path.clone()).or_insert(*settings);
            }
        }
    }

    /// Carry a live value over to a re-declared type
    ///
    /// The new plugin's `sanitize` decides; a value it rejects is replaced
    /// by the new declaration's value.
    fn convert_live_value(
        &self,
        path: &str,
        live: Value,
        old_type: &str,
        input: &InputDescriptor,
    ) -> Value {
        let converted = match self.inner.plugins.get(&input.type_tag) {
            Some(plugin) => plugin.sanitize(live, &input.settings),
            None => Ok(live),
        };
        match converted {
            Ok(value) => {
                tracing::warn!(
                    "'{}' re-declared as '{}' (was '{}'), keeping its value",
                    path,
                    input.type_tag,
                    old_type
                );
                value
            }
            Err(err) => {
                tracing::warn!(
                    "'{}' re-declared as '{}' (was '{}'), value reset: {}",
                    path,
                    input.type_tag,
                    old_type,
                    err
                );
                input.value.clone()
            }
        }
    }

    /// Decrement counts, evicting paths that reach zero
    ///
    /// Returns the evicted paths. Disposing a path that is not present is
    /// a no-op (logged).
    pub fn dispose_paths<I, S>(&self, paths: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut evicted = Vec::new();
        let mut dropped = Vec::new();
        {
            let mut guard = self.inner.state.borrow_mut();
            let state = &mut *guard;

            for path in paths {
                let path = path.as_ref();
                let Some(stored) = state.data.get_mut(path) else {
                    if self.inner.config.warn_on_underflow {
                        tracing::warn!("{}", StoreError::RefcountUnderflow(path.to_string()));
                    }
                    continue;
                };
                stored.ref_count = stored.ref_count.saturating_sub(1);
                if stored.ref_count == 0 {
                    state.data.remove(path);
                    dropped.push(state.listeners.remove_path(path));
                    evicted.push(path.to_string());
                    tracing::debug!("input '{}' evicted", path);
                }
            }

            if !evicted.is_empty() {
                state.prune_folders(&self.inner.config.separator);
            }
        }
        // listeners may own store handles; release them outside the borrow
        drop(dropped);
        evicted
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Current value at `path`
    pub fn get(&self, path: &str) -> Result<Value, StoreError> {
        self.inner
            .state
            .borrow()
            .data
            .get(path)
            .map(|s| s.input.value.clone())
            .ok_or_else(|| StoreError::PathNotFound(path.to_string()))
    }

    /// Full descriptor at `path`
    pub fn get_input(&self, path: &str) -> Option<InputDescriptor> {
        self.inner
            .state
            .borrow()
            .data
            .get(path)
            .map(|s| s.input.clone())
    }

    /// Display value of the input at `path`, as its plugin formats it
    pub fn format(&self, path: &str) -> Result<Value, StoreError> {
        let input = self
            .get_input(path)
            .ok_or_else(|| StoreError::PathNotFound(path.to_string()))?;
        Ok(match self.inner.plugins.get(&input.type_tag) {
            Some(plugin) => plugin.format(&input.value, &input.settings),
            None => input.value,
        })
    }

    pub fn contains(&self, path: &str) -> bool {
        self.inner.state.borrow().data.contains_key(path)
    }

    /// Current reference count (0 when absent)
    pub fn ref_count(&self, path: &str) -> u32 {
        self.inner
            .state
            .borrow()
            .data
            .get(path)
            .map_or(0, |s| s.ref_count)
    }

    pub fn len(&self) -> usize {
        self.inner.state.borrow().data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.state.borrow().data.is_empty()
    }

    /// Every live path, in display order
    pub fn paths(&self) -> Vec<String> {
        let all: Vec<String> = self.inner.state.borrow().data.keys().cloned().collect();
        self.order_paths(all)
    }

    /// Every live input, in display order
    pub fn inputs(&self) -> Vec<(String, InputDescriptor)> {
        let paths = self.paths();
        let state = self.inner.state.borrow();
        paths
            .into_iter()
            .filter_map(|p| {
                let input = state.data.get(&p)?.input.clone();
                Some((p, input))
            })
            .collect()
    }

    /// Sort paths by declaration order
    ///
    /// Ties on `order` fall back to creation sequence. Paths that are not
    /// live keep their relative order at the end.
    pub fn order_paths<I, S>(&self, paths: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let state = self.inner.state.borrow();
        let mut keyed: Vec<((u8, usize, u64), String)> = paths
            .into_iter()
            .map(Into::into)
            .map(|path| {
                let key = match state.data.get(&path) {
                    Some(s) => (0, s.input.order, s.seq),
                    None => (1, 0, 0),
                };
                (key, path)
            })
            .collect();
        keyed.sort_by_key(|(key, _)| *key);
        keyed.into_iter().map(|(_, path)| path).collect()
    }

    /// Settings of the folder at `path`
    pub fn folder_settings(&self, path: &str) -> Option<FolderSettings> {
        self.inner.state.borrow().folders.get(path).copied()
    }

    /// Folder paths currently known, sorted
    pub fn folders(&self) -> Vec<String> {
        let mut folders: Vec<String> = self.inner.state.borrow().folders.keys().cloned().collect();
        folders.sort();
        folders
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Write a batch of values
    ///
    /// Every path is checked and sanitized before anything is committed; a
    /// missing path or a rejected value fails the whole batch. Values are
    /// then committed in the given order, each followed by its listeners.
    /// All notifications have run when this returns.
    pub fn set<I, K>(&self, values: I) -> Result<(), StoreError>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut batch = Vec::new();
        {
            let state = self.inner.state.borrow();
            for (path, value) in values {
                let path = path.into();
                let Some(stored) = state.data.get(&path) else {
                    return Err(StoreError::PathNotFound(path));
                };
                let value = match self.inner.plugins.get(&stored.input.type_tag) {
                    Some(plugin) => plugin
                        .sanitize(value, &stored.input.settings)
                        .map_err(|source| StoreError::Sanitize {
                            path: path.clone(),
                            source,
                        })?,
                    None => value,
                };
                batch.push((path, value));
            }
        }

        for (path, value) in batch {
            let committed = match self.inner.state.borrow_mut().data.get_mut(&path) {
                Some(stored) => {
                    stored.input.value = value;
                    true
                }
                None => false,
            };
            if committed {
                self.notify(&path);
            } else {
                tracing::debug!("'{}' was disposed during set, write skipped", path);
            }
        }
        Ok(())
    }

    /// Write a single value
    pub fn set_value(&self, path: &str, value: Value) -> Result<(), StoreError> {
        self.set([(path, value)])
    }

    /// Merge `patch` into the settings of the input at `path`
    ///
    /// Listeners are not notified; the value is unchanged.
    pub fn set_settings_at_path(&self, path: &str, patch: Settings) -> Result<(), StoreError> {
        let mut state = self.inner.state.borrow_mut();
        let stored = state
            .data
            .get_mut(path)
            .ok_or_else(|| StoreError::PathNotFound(path.to_string()))?;
        stored.input.settings.extend(patch);
        Ok(())
    }

    /// Enable or disable panel edits of the input at `path`
    pub fn disable_input_at_path(&self, path: &str, disabled: bool) -> Result<(), StoreError> {
        let mut state = self.inner.state.borrow_mut();
        let stored = state
            .data
            .get_mut(path)
            .ok_or_else(|| StoreError::PathNotFound(path.to_string()))?;
        stored.input.disabled = disabled;
        Ok(())
    }

    /// Replace the settings of a known folder
    pub fn set_folder_settings(&self, path: &str, settings: FolderSettings) -> Result<(), StoreError> {
        let mut state = self.inner.state.borrow_mut();
        let folder = state
            .folders
            .get_mut(path)
            .ok_or_else(|| StoreError::PathNotFound(path.to_string()))?;
        *folder = settings;
        Ok(())
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Call `listener` with the new value after every write to `path`
    pub fn subscribe(
        &self,
        path: &str,
        listener: impl Fn(&Value) + 'static,
    ) -> Result<Subscription, StoreError> {
        let mut state = self.inner.state.borrow_mut();
        if !state.data.contains_key(path) {
            return Err(StoreError::PathNotFound(path.to_string()));
        }
        let id = state.listeners.add(path, Rc::new(listener));
        Ok(Subscription::new(
            Rc::downgrade(&self.inner),
            path.to_string(),
            id,
        ))
    }

    /// Number of listeners on `path`
    pub fn listener_count(&self, path: &str) -> usize {
        self.inner.state.borrow().listeners.count(path)
    }

    fn notify(&self, path: &str) {
        let snapshot = self.inner.state.borrow().listeners.snapshot(path);
        for (id, listener) in snapshot {
            // skip listeners removed (or evicted with their path) by an
            // earlier listener, and hand out the latest value
            let current = {
                let state = self.inner.state.borrow();
                if !state.listeners.contains(path, id) {
                    continue;
                }
                match state.data.get(path) {
                    Some(stored) => stored.input.value.clone(),
                    None => break,
                }
            };
            listener(&current);
        }
    }
}
