//! Per-path listener table and subscription guards

use std::rc::{Rc, Weak};

use hashbrown::HashMap;
use smallvec::SmallVec;

use super::StoreInner;
use crate::types::Value;

pub(crate) type Listener = Rc<dyn Fn(&Value)>;

/// Listeners registered for one path, in subscription order
pub(crate) type ListenerList = SmallVec<[(u64, Listener); 2]>;

#[derive(Default)]
pub(crate) struct Listeners {
    by_path: HashMap<String, ListenerList>,
    next_id: u64,
}

impl Listeners {
    pub(crate) fn add(&mut self, path: &str, listener: Listener) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.by_path
            .entry(path.to_string())
            .or_default()
            .push((id, listener));
        id
    }

    /// Remove one listener, returning it so the caller can drop it outside
    /// any store borrow
    pub(crate) fn remove(&mut self, path: &str, id: u64) -> Option<Listener> {
        let list = self.by_path.get_mut(path)?;
        let index = list.iter().position(|(i, _)| *i == id)?;
        let (_, listener) = list.remove(index);
        if list.is_empty() {
            self.by_path.remove(path);
        }
        Some(listener)
    }

    /// Remove every listener of an evicted path
    pub(crate) fn remove_path(&mut self, path: &str) -> ListenerList {
        self.by_path.remove(path).unwrap_or_default()
    }

    pub(crate) fn contains(&self, path: &str, id: u64) -> bool {
        self.by_path
            .get(path)
            .is_some_and(|list| list.iter().any(|(i, _)| *i == id))
    }

    /// Copy of the current list, safe to iterate while listeners re-enter
    /// the store
    pub(crate) fn snapshot(&self, path: &str) -> ListenerList {
        self.by_path.get(path).cloned().unwrap_or_default()
    }

    pub(crate) fn count(&self, path: &str) -> usize {
        self.by_path.get(path).map_or(0, |list| list.len())
    }
}

/// Handle to a value listener
///
/// Dropping the handle unsubscribes. Listeners of a path are also dropped
/// when the path is evicted; the handle then does nothing.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    store: Weak<StoreInner>,
    path: String,
    id: u64,
}

impl Subscription {
    pub(crate) fn new(store: Weak<StoreInner>, path: String, id: u64) -> Self {
        Self { store, path, id }
    }

    /// Path this subscription listens to
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether the listener is still registered
    pub fn is_active(&self) -> bool {
        self.store
            .upgrade()
            .is_some_and(|inner| inner.state.borrow().listeners.contains(&self.path, self.id))
    }

    /// Unsubscribe now (same as dropping)
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(inner) = self.store.upgrade() else {
            return;
        };
        let removed = match inner.state.try_borrow_mut() {
            Ok(mut state) => state.listeners.remove(&self.path, self.id),
            Err(_) => {
                tracing::warn!(
                    "subscription to '{}' dropped while the store is busy; listener kept",
                    self.path
                );
                None
            }
        };
        drop(removed);
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("path", &self.path)
            .field("id", &self.id)
            .finish()
    }
}
