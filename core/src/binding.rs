//! Consumer bindings
//!
//! A [`Binding`] mounts one caller's schema into a store for as long as the
//! binding lives: it registers the schema's paths on mount, keeps the
//! caller's reactive values current, pushes controlled leaves through their
//! callbacks and releases its paths exactly once on unbind (or drop).
//!
//! # Usage
//!
//! ```ignore
//! let store = Store::new();
//! let binding = Binding::mount(
//!     BindOptions::new(Schema::new().with("primary", InputSpec::select(json!(["red", "blue"]))))
//!         .folder("colors")
//!         .store(store.clone()),
//! )?;
//!
//! assert_eq!(binding.get("primary"), Some(json!("red")));
//! binding.set([("primary", json!("blue"))])?;
//! binding.unbind();
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::schema::{FolderNode, MappedPaths, NormalizedSchema, Schema, SchemaError, SchemaNode};
use crate::store::{Store, StoreError, Subscription, default_store};
use crate::types::{FolderSettings, Value};

/// Errors from mounting, rebinding or writing through a binding
#[derive(Debug, thiserror::Error)]
pub enum BindError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Write to a key the binding does not own
    #[error("'{0}' is not bound by this binding")]
    UnknownKey(String),
}

/// Where a binding's schema comes from
pub enum SchemaSource {
    /// Fixed schema, re-normalized when the deps change
    Static(Schema),
    /// Schema factory, invoked on mount and whenever the deps change
    Factory(Box<dyn Fn() -> Schema>),
}

impl SchemaSource {
    fn build(&self) -> Schema {
        match self {
            SchemaSource::Static(schema) => schema.clone(),
            SchemaSource::Factory(f) => f(),
        }
    }
}

impl From<Schema> for SchemaSource {
    fn from(schema: Schema) -> Self {
        SchemaSource::Static(schema)
    }
}

impl fmt::Debug for SchemaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaSource::Static(schema) => f.debug_tuple("Static").field(schema).finish(),
            SchemaSource::Factory(_) => f.write_str("Factory(..)"),
        }
    }
}

/// Per-binding settings
#[derive(Debug, Clone, Default)]
pub struct BindSettings {
    /// Target store; the default store when `None`
    pub store: Option<Store>,
}

/// Everything a caller can pass when mounting
#[derive(Debug)]
pub struct BindOptions {
    /// Wrap the schema in a folder of this name
    pub folder_name: Option<String>,
    /// Settings for that folder
    pub folder_settings: Option<FolderSettings>,
    pub schema: SchemaSource,
    pub settings: BindSettings,
    /// The schema is recomputed only when these change
    pub deps: Vec<Value>,
}

impl BindOptions {
    /// Options for a fixed schema
    pub fn new(schema: Schema) -> Self {
        Self::with_source(SchemaSource::Static(schema))
    }

    /// Options for a schema factory
    pub fn from_fn(f: impl Fn() -> Schema + 'static) -> Self {
        Self::with_source(SchemaSource::Factory(Box::new(f)))
    }

    pub fn with_source(schema: SchemaSource) -> Self {
        Self {
            folder_name: None,
            folder_settings: None,
            schema,
            settings: BindSettings::default(),
            deps: Vec::new(),
        }
    }

    pub fn folder(mut self, name: &str) -> Self {
        self.folder_name = Some(name.to_string());
        self
    }

    pub fn folder_settings(mut self, settings: FolderSettings) -> Self {
        self.folder_settings = Some(settings);
        self
    }

    pub fn store(mut self, store: Store) -> Self {
        self.settings.store = Some(store);
        self
    }

    pub fn deps(mut self, deps: Vec<Value>) -> Self {
        self.deps = deps;
        self
    }
}

/// Values of render paths keyed by short name, kept current by listeners
#[derive(Default)]
struct ReactiveValues {
    values: RefCell<serde_json::Map<String, Value>>,
    version: Cell<u64>,
}

impl ReactiveValues {
    fn update(&self, key: &str, value: &Value) {
        self.values.borrow_mut().insert(key.to_string(), value.clone());
        self.version.set(self.version.get() + 1);
    }
}

/// Write handle narrowed to one binding's keys
///
/// Follows the binding across rebinds.
#[derive(Clone)]
pub struct BoundSetter {
    store: Store,
    mapped: Rc<RefCell<MappedPaths>>,
}

impl BoundSetter {
    /// Write values by short key
    ///
    /// Keys are translated to full paths and forwarded as one batch to
    /// [`Store::set`]. An unknown key rejects the whole batch.
    pub fn set<I, K>(&self, values: I) -> Result<(), BindError>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        let mapped = self.mapped.borrow();
        let mut batch = Vec::new();
        for (key, value) in values {
            let key = key.as_ref();
            let entry = mapped
                .get(key)
                .ok_or_else(|| BindError::UnknownKey(key.to_string()))?;
            batch.push((entry.path.clone(), value));
        }
        drop(mapped);
        self.store.set(batch)?;
        Ok(())
    }
}

impl fmt::Debug for BoundSetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundSetter")
            .field("keys", &self.mapped.borrow().len())
            .finish()
    }
}

/// A mounted schema fragment
pub struct Binding {
    store: Store,
    source: SchemaSource,
    folder_name: Option<String>,
    folder_settings: Option<FolderSettings>,
    deps: Vec<Value>,
    mapped: Rc<RefCell<MappedPaths>>,
    /// Registered paths in display order
    paths: Vec<String>,
    reactive: Rc<ReactiveValues>,
    subscriptions: Vec<Subscription>,
    mounted: bool,
}

impl Binding {
    /// Normalize and register the schema
    ///
    /// A schema error rejects the mount without touching the store.
    pub fn mount(options: BindOptions) -> Result<Self, BindError> {
        let BindOptions {
            folder_name,
            folder_settings,
            schema,
            settings,
            deps,
        } = options;

        let mut binding = Binding {
            store: settings.store.unwrap_or_else(default_store),
            source: schema,
            folder_name,
            folder_settings,
            deps,
            mapped: Rc::new(RefCell::new(MappedPaths::default())),
            paths: Vec::new(),
            reactive: Rc::new(ReactiveValues::default()),
            subscriptions: Vec::new(),
            mounted: false,
        };

        let normalized = binding.store.get_data_from_schema(&binding.resolve_schema())?;
        binding.store.add_folders(&normalized.folders, false);
        binding.store.add_data(&normalized.initial_data, false);
        binding.mounted = true;
        binding.attach(normalized)?;

        tracing::debug!("binding mounted ({} paths)", binding.paths.len());
        Ok(binding)
    }

    /// Re-run the schema if `deps` changed
    ///
    /// Settings of paths that stay are refreshed and their live values
    /// kept; paths that disappear are released. Returns whether a
    /// recompute happened. On a schema error the previous registration is
    /// left in place and the deps are not recorded.
    pub fn update(&mut self, deps: Vec<Value>) -> Result<bool, BindError> {
        if deps == self.deps {
            return Ok(false);
        }

        let normalized = self.store.get_data_from_schema(&self.resolve_schema())?;
        self.store.add_folders(&normalized.folders, true);
        self.store.add_data(&normalized.initial_data, true);
        self.store.dispose_paths(&self.paths);
        self.deps = deps;
        self.attach(normalized)?;

        tracing::debug!("binding rebound ({} paths)", self.paths.len());
        Ok(true)
    }

    /// Replace the schema source, then [`Binding::update`]
    ///
    /// As with a memoized schema, the new source only takes effect once
    /// the deps change.
    pub fn update_with(&mut self, source: SchemaSource, deps: Vec<Value>) -> Result<bool, BindError> {
        self.source = source;
        self.update(deps)
    }

    /// Current values of the render paths, keyed by short name
    pub fn values(&self) -> serde_json::Map<String, Value> {
        self.reactive.values.borrow().clone()
    }

    /// Current value of one render path
    pub fn get(&self, key: &str) -> Option<Value> {
        self.reactive.values.borrow().get(key).cloned()
    }

    /// Bumped on every change to [`Binding::values`]
    pub fn version(&self) -> u64 {
        self.reactive.version.get()
    }

    /// Write values by short key (see [`BoundSetter::set`])
    pub fn set<I, K>(&self, values: I) -> Result<(), BindError>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        self.setter().set(values)
    }

    /// Detached write handle for this binding's keys
    pub fn setter(&self) -> BoundSetter {
        BoundSetter {
            store: self.store.clone(),
            mapped: self.mapped.clone(),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Registered full paths in display order
    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    /// Full path of a short key
    pub fn path_of(&self, key: &str) -> Option<String> {
        self.mapped.borrow().get(key).map(|m| m.path.clone())
    }

    pub fn deps(&self) -> &[Value] {
        &self.deps
    }

    /// Release every path this binding registered
    pub fn unbind(mut self) {
        self.release();
    }

    fn resolve_schema(&self) -> Schema {
        let schema = self.source.build();
        match &self.folder_name {
            Some(name) => Schema::new().with(
                name,
                SchemaNode::Folder(FolderNode {
                    schema,
                    settings: self.folder_settings,
                }),
            ),
            None => schema,
        }
    }

    /// Take over a freshly registered schema: paths, values, listeners
    fn attach(&mut self, normalized: NormalizedSchema) -> Result<(), BindError> {
        // old listeners go before the new ones are installed
        self.subscriptions.clear();

        let mapped = normalized.mapped_paths;
        self.paths = self.store.order_paths(mapped.paths());

        let mut values = serde_json::Map::new();
        for (key, path) in mapped.render_paths() {
            let value = match self.store.get(path) {
                Ok(v) => v,
                Err(_) => match normalized.initial_data.get(path) {
                    Some(input) => input.value.clone(),
                    None => Value::Null,
                },
            };
            values.insert(key.to_string(), value);
        }
        *self.reactive.values.borrow_mut() = values;
        self.reactive.version.set(self.reactive.version.get() + 1);

        for (key, path) in mapped.render_paths() {
            let reactive = self.reactive.clone();
            let key = key.to_string();
            let sub = self
                .store
                .subscribe(path, move |value| reactive.update(&key, value))?;
            self.subscriptions.push(sub);
        }

        let controlled: Vec<_> = mapped.controlled().cloned().collect();
        *self.mapped.borrow_mut() = mapped;

        for entry in controlled {
            let Some(on_change) = entry.on_change else {
                continue;
            };
            let sub = self.store.subscribe(&entry.path, {
                let on_change = on_change.clone();
                move |value| on_change.call(value)
            })?;
            self.subscriptions.push(sub);
            on_change.call(&self.store.get(&entry.path)?);
        }
        Ok(())
    }

    fn release(&mut self) {
        if !self.mounted {
            return;
        }
        self.mounted = false;
        self.subscriptions.clear();
        let evicted = self.store.dispose_paths(&self.paths);
        tracing::debug!(
            "binding released ({} paths, {} evicted)",
            self.paths.len(),
            evicted.len()
        );
    }
}

impl Drop for Binding {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("paths", &self.paths)
            .field("deps", &self.deps)
            .field("mounted", &self.mounted)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{InputSpec, folder};
    use serde_json::json;

    fn colors() -> Schema {
        Schema::new().with("primary", InputSpec::select(json!(["red", "green", "blue"])))
    }

    #[test]
    fn test_mount_registers_paths() {
        let store = Store::new();
        let binding = Binding::mount(BindOptions::new(colors()).folder("colors").store(store.clone())).unwrap();

        assert_eq!(binding.paths(), ["colors.primary".to_string()]);
        assert_eq!(binding.get("primary"), Some(json!("red")));
        assert_eq!(binding.path_of("primary").as_deref(), Some("colors.primary"));
        assert_eq!(store.ref_count("colors.primary"), 1);
    }

    #[test]
    fn test_unbind_releases_paths() {
        let store = Store::new();
        let binding = Binding::mount(BindOptions::new(colors()).store(store.clone())).unwrap();
        binding.unbind();
        assert!(store.is_empty());
    }

    #[test]
    fn test_drop_releases_once() {
        let store = Store::new();
        let a = Binding::mount(BindOptions::new(colors()).store(store.clone())).unwrap();
        let b = Binding::mount(BindOptions::new(colors()).store(store.clone())).unwrap();
        assert_eq!(store.ref_count("primary"), 2);

        drop(a);
        assert_eq!(store.ref_count("primary"), 1);
        b.unbind();
        assert!(!store.contains("primary"));
    }

    #[test]
    fn test_second_binding_reuses_live_value() {
        let store = Store::new();
        let a = Binding::mount(BindOptions::new(colors()).store(store.clone())).unwrap();
        a.set([("primary", json!("green"))]).unwrap();

        let b = Binding::mount(BindOptions::new(colors()).store(store.clone())).unwrap();
        assert_eq!(b.get("primary"), Some(json!("green")));
    }

    #[test]
    fn test_values_follow_store_writes() {
        let store = Store::new();
        let binding = Binding::mount(BindOptions::new(colors()).store(store.clone())).unwrap();
        let before = binding.version();

        store.set_value("primary", json!("blue")).unwrap();
        assert_eq!(binding.get("primary"), Some(json!("blue")));
        assert!(binding.version() > before);
    }

    #[test]
    fn test_set_rejects_foreign_keys() {
        let store = Store::new();
        let binding = Binding::mount(BindOptions::new(colors()).store(store.clone())).unwrap();
        let err = binding.set([("secondary", json!("red"))]).unwrap_err();
        assert!(matches!(err, BindError::UnknownKey(k) if k == "secondary"));
    }

    #[test]
    fn test_schema_error_leaves_store_untouched() {
        let store = Store::new();
        let _ok = Binding::mount(BindOptions::new(colors()).store(store.clone())).unwrap();

        let bad = Schema::new()
            .with("fine", InputSpec::new(1))
            .with("broken", InputSpec::typed("select"));
        let err = Binding::mount(BindOptions::new(bad).store(store.clone())).unwrap_err();
        assert!(matches!(err, BindError::Schema(SchemaError::Validation { .. })));

        assert!(!store.contains("fine"));
        assert_eq!(store.paths(), vec!["primary"]);
    }

    #[test]
    fn test_controlled_leaf_pushed_not_exposed() {
        let store = Store::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let schema = Schema::new()
            .with("speed", InputSpec::new(1))
            .with("zoom", InputSpec::new(2).on_change(move |v| sink.borrow_mut().push(v.clone())));

        let binding = Binding::mount(BindOptions::new(schema).store(store.clone())).unwrap();
        assert_eq!(*seen.borrow(), vec![json!(2)]);
        assert_eq!(binding.get("zoom"), None);
        assert_eq!(binding.values().len(), 1);

        binding.set([("zoom", json!(5))]).unwrap();
        assert_eq!(*seen.borrow(), vec![json!(2), json!(5)]);

        binding.unbind();
        store.add_data(
            &store
                .get_data_from_schema(&Schema::new().with("zoom", InputSpec::new(0)))
                .unwrap()
                .initial_data,
            false,
        );
        store.set_value("zoom", json!(9)).unwrap();
        // callback released with the binding
        assert_eq!(seen.borrow().len(), 2);
    }

    #[test]
    fn test_update_without_dep_change_is_noop() {
        let store = Store::new();
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let mut binding = Binding::mount(
            BindOptions::from_fn(move || {
                counter.set(counter.get() + 1);
                colors()
            })
            .deps(vec![json!(1)])
            .store(store.clone()),
        )
        .unwrap();
        assert_eq!(calls.get(), 1);

        assert!(!binding.update(vec![json!(1)]).unwrap());
        assert_eq!(calls.get(), 1);
        assert!(binding.update(vec![json!(2)]).unwrap());
        assert_eq!(calls.get(), 2);
        assert_eq!(store.ref_count("primary"), 1);
    }

    #[test]
    fn test_rebind_refreshes_settings_keeps_value() {
        let store = Store::new();
        let max = Rc::new(Cell::new(10));
        let m = max.clone();
        let mut binding = Binding::mount(
            BindOptions::from_fn(move || {
                Schema::new().with("speed", InputSpec::new(1).setting("max", m.get()))
            })
            .deps(vec![json!(10)])
            .store(store.clone()),
        )
        .unwrap();

        binding.set([("speed", json!(8))]).unwrap();
        max.set(100);
        binding.update(vec![json!(100)]).unwrap();

        let input = store.get_input("speed").unwrap();
        assert_eq!(input.value, json!(8));
        assert_eq!(input.settings["max"], json!(100));
        assert_eq!(store.ref_count("speed"), 1);
        assert_eq!(binding.get("speed"), Some(json!(8)));
    }

    #[test]
    fn test_rebind_refreshes_folder_settings() {
        let store = Store::new();
        let collapsed = Rc::new(Cell::new(false));
        let c = collapsed.clone();
        let mut binding = Binding::mount(
            BindOptions::from_fn(move || {
                Schema::new().with(
                    "fx",
                    crate::schema::folder_with(
                        Schema::new().with("bloom", InputSpec::new(0.5)),
                        FolderSettings::collapsed(c.get()),
                    ),
                )
            })
            .store(store.clone()),
        )
        .unwrap();
        assert_eq!(store.folder_settings("fx"), Some(FolderSettings::collapsed(false)));

        collapsed.set(true);
        binding.update(vec![json!(true)]).unwrap();
        assert_eq!(store.folder_settings("fx"), Some(FolderSettings::collapsed(true)));
    }

    #[test]
    fn test_rebind_with_changed_path_set() {
        let store = Store::new();
        let mut binding = Binding::mount(
            BindOptions::new(
                Schema::new()
                    .with("a", InputSpec::new(1))
                    .with("b", InputSpec::new(2)),
            )
            .store(store.clone()),
        )
        .unwrap();
        binding.set([("a", json!(11))]).unwrap();

        let next = Schema::new()
            .with("a", InputSpec::new(1))
            .with("c", InputSpec::new(3));
        binding.update_with(next.into(), vec![json!("v2")]).unwrap();

        assert_eq!(store.paths(), vec!["a", "c"]);
        assert_eq!(store.get("a").unwrap(), json!(11));
        assert_eq!(store.ref_count("a"), 1);
        assert_eq!(store.ref_count("c"), 1);
        assert!(!store.contains("b"));
        assert!(matches!(
            binding.set([("b", json!(0))]),
            Err(BindError::UnknownKey(_))
        ));

        binding.unbind();
        assert!(store.is_empty());
    }

    #[test]
    fn test_failed_rebind_keeps_registration() {
        let store = Store::new();
        let mut binding = Binding::mount(BindOptions::new(colors()).store(store.clone())).unwrap();

        let bad = Schema::new().with("x", InputSpec::typed("nope"));
        let err = binding.update_with(bad.into(), vec![json!(1)]).unwrap_err();
        assert!(matches!(err, BindError::Schema(SchemaError::UnknownType { .. })));
        assert!(binding.deps().is_empty());
        assert_eq!(store.ref_count("primary"), 1);
        assert_eq!(binding.get("primary"), Some(json!("red")));
    }

    #[test]
    fn test_setter_follows_rebind() {
        let store = Store::new();
        let mut binding = Binding::mount(
            BindOptions::new(Schema::new().with("a", InputSpec::new(1))).store(store.clone()),
        )
        .unwrap();
        let setter = binding.setter();

        let moved = Schema::new().with("grp", folder(Schema::new().with("a", InputSpec::new(1))));
        binding.update_with(moved.into(), vec![json!(2)]).unwrap();

        setter.set([("a", json!(4))]).unwrap();
        assert_eq!(store.get("grp.a").unwrap(), json!(4));
    }

    #[test]
    fn test_default_store_used_without_settings() {
        crate::store::reset_default_store();
        let binding = Binding::mount(BindOptions::new(colors())).unwrap();
        assert!(crate::store::is_default_store(binding.store()));
        assert!(default_store().contains("primary"));
        binding.unbind();
        assert!(default_store().is_empty());
        crate::store::reset_default_store();
    }
}
