//! Store invariants exercised through the public API.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::json;
use tweakboard_core::*;

fn register(store: &Store, schema: &Schema) -> Vec<String> {
    let data = store.get_data_from_schema(schema).unwrap();
    store.add_folders(&data.folders, false);
    store.add_data(&data.initial_data, false);
    data.mapped_paths.paths()
}

#[test]
fn test_refcount_tracks_net_registrations() {
    let store = Store::new();
    let schema = Schema::new()
        .with("a", InputSpec::new(1))
        .with("grp", folder(Schema::new().with("b", InputSpec::new(2))));

    // deterministic interleaving of adds and disposes
    let steps = [true, true, false, true, false, false, false, true, false];
    let mut net: i64 = 0;
    for add in steps {
        if add {
            register(&store, &schema);
            net += 1;
        } else {
            store.dispose_paths(["a", "grp.b"]);
            net = (net - 1).max(0);
        }
        assert_eq!(store.contains("a"), net > 0);
        assert_eq!(store.contains("grp.b"), net > 0);
        assert_eq!(i64::from(store.ref_count("a")), net);
    }
    assert!(store.is_empty());
    assert!(store.folders().is_empty());
}

#[test]
fn test_paths_never_collide_across_folders() {
    let store = Store::new();
    let schema = Schema::new()
        .with("left", folder(Schema::new().with("x", InputSpec::new(0))))
        .with("right", folder(Schema::new().with("y", InputSpec::new(0))))
        .with("z", InputSpec::new(0));
    let mut paths = register(&store, &schema);
    let total = paths.len();
    paths.sort();
    paths.dedup();
    assert_eq!(paths.len(), total);
    assert_eq!(store.len(), 3);
}

#[test]
fn test_dotted_key_cannot_alias_folder_leaf() {
    let store = Store::new();
    let nested = Binding::mount(
        BindOptions::new(Schema::new().with("a", folder(Schema::new().with("b", InputSpec::new(2)))))
            .store(store.clone()),
    )
    .unwrap();

    let err = Binding::mount(
        BindOptions::new(Schema::new().with("a.b", InputSpec::new(1))).store(store.clone()),
    )
    .unwrap_err();
    assert!(matches!(
        err,
        BindError::Schema(SchemaError::SeparatorInKey { ref key, .. }) if key == "a.b"
    ));

    assert_eq!(store.paths(), vec!["a.b"]);
    assert_eq!(store.ref_count("a.b"), 1);
    assert_eq!(nested.get("b"), Some(json!(2)));
}

#[test]
fn test_order_paths_ignores_input_order() {
    let store = Store::new();
    register(
        &store,
        &Schema::new()
            .with("first", InputSpec::new(1))
            .with("second", InputSpec::new(2))
            .with("third", InputSpec::new(3)),
    );

    let shuffled = ["third", "first", "second"];
    assert_eq!(store.order_paths(shuffled), vec!["first", "second", "third"]);
    let reversed = ["third", "second", "first"];
    assert_eq!(store.order_paths(reversed), vec!["first", "second", "third"]);
}

#[test]
fn test_batched_set_notifies_in_order() {
    let store = Store::new();
    register(
        &store,
        &Schema::new()
            .with("a", InputSpec::new(0))
            .with("b", InputSpec::new(0)),
    );

    let events = Rc::new(RefCell::new(Vec::new()));
    let subs: Vec<Subscription> = ["a", "b"]
        .into_iter()
        .map(|path| {
            let events = events.clone();
            store
                .subscribe(path, move |v| events.borrow_mut().push(format!("{}={}", path, v)))
                .unwrap()
        })
        .collect();

    store.set([("a", json!(1)), ("b", json!(2))]).unwrap();
    assert_eq!(*events.borrow(), vec!["a=1", "b=2"]);
    drop(subs);

    store.set([("a", json!(3))]).unwrap();
    assert_eq!(events.borrow().len(), 2);
}

#[test]
fn test_custom_plugin_registration() {
    struct Percent;

    impl Plugin for Percent {
        fn type_tag(&self) -> &'static str {
            "percent"
        }

        fn schema(&self, value: Option<&Value>, _settings: &Settings) -> bool {
            value.is_none_or(Value::is_number)
        }

        fn normalize(&self, value: Option<&Value>, _settings: &Settings) -> Normalized {
            Normalized {
                value: value.cloned().unwrap_or(json!(0)),
                settings: Settings::new(),
            }
        }

        fn format(&self, value: &Value, _settings: &Settings) -> Value {
            json!(format!("{}%", value))
        }

        fn sanitize(&self, value: Value, _settings: &Settings) -> Result<Value, SanitizeError> {
            match value.as_f64() {
                Some(n) if (0.0..=100.0).contains(&n) => Ok(value),
                _ => Err(SanitizeError::new("percent", "out of range")),
            }
        }
    }

    let mut plugins = PluginRegistry::with_builtins();
    plugins.register(Percent);
    let store = Store::with_plugins(plugins);
    register(&store, &Schema::new().with("volume", InputSpec::new(40).with_type("percent")));

    assert_eq!(store.format("volume").unwrap(), json!("40%"));
    let err = store.set([("volume", json!(140))]).unwrap_err();
    assert!(matches!(err, StoreError::Sanitize { .. }));
    assert_eq!(store.get("volume").unwrap(), json!(40));
}
