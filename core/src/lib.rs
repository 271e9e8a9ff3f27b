//! Tweakboard Core - Reactive store behind live tweak panels
//!
//! Callers declare nested schemas of typed inputs; the store flattens them
//! into addressable paths, tracks live values and notifies observers when
//! values change. Any number of callers may mount overlapping schema
//! fragments into one store and release them independently.
//!
//! # Architecture
//!
//! - [`Plugin`] - Type-specific validation, normalization, display and coercion
//! - [`Normalizer`] - Nested [`Schema`] to a flat path-keyed table
//! - [`Store`] - Refcounted live inputs with per-path subscriptions
//! - [`Binding`] - One caller's mounted schema, with reactive reads and narrowed writes
//! - [`tree`] / [`export`] - Read-only views for renderers and presets

pub mod binding;
pub mod config;
pub mod export;
pub mod plugin;
pub mod schema;
pub mod store;
pub mod tree;
pub mod types;

pub use binding::{BindError, BindOptions, BindSettings, Binding, BoundSetter, SchemaSource};
pub use config::{ConfigError, StoreConfig};
pub use plugin::{Normalized, Plugin, PluginRegistry, SanitizeError};
pub use schema::{
    InitialData, InputSpec, MappedPaths, NormalizedSchema, Normalizer, Schema, SchemaError,
    SchemaNode, folder, folder_with,
};
pub use store::{Store, StoreError, Subscription, default_store, reset_default_store};
pub use tree::{TreeNode, build_tree};
pub use types::{FolderSettings, InputDescriptor, MappedPath, OnChange, Settings, Value};
