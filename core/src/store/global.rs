//! Process-wide default store
//!
//! Bindings that name no store share this one. It is created lazily on
//! first use (per thread, since stores are single-threaded) and lives until
//! [`reset_default_store`] is called. Handles obtained before a reset keep
//! the old table alive but are no longer the default.

use std::cell::RefCell;

use super::Store;

thread_local! {
    static DEFAULT_STORE: RefCell<Option<Store>> = const { RefCell::new(None) };
}

/// The shared default store, created on first call
pub fn default_store() -> Store {
    DEFAULT_STORE.with(|slot| slot.borrow_mut().get_or_insert_with(Store::new).clone())
}

/// Whether `store` is the current default store
pub fn is_default_store(store: &Store) -> bool {
    DEFAULT_STORE.with(|slot| slot.borrow().as_ref().is_some_and(|s| s.ptr_eq(store)))
}

/// Drop the default store; the next [`default_store`] call creates a new one
pub fn reset_default_store() {
    let old = DEFAULT_STORE.with(|slot| slot.borrow_mut().take());
    if let Some(store) = old {
        tracing::debug!("default store reset ({} live paths)", store.len());
    }
}
