// ============================================================================
// cinder-signals - Reactive Store
// A shared key/value map with per-key reactivity
// ============================================================================
//
// The store is the one resource written by two actors: component-local code
// and the server-push merge path. Both funnel through `set`, so dependents
// are always notified through the same edge.
//
// Granularity is per key: `get("a")` inside an effect subscribes that effect
// to "a" only. A write to "b" leaves it untouched.
// ============================================================================

use std::cell::RefCell;
use std::collections::HashMap;
use std::hash::Hash;
use std::rc::Rc;

use crate::core::context::with_context;
use crate::core::types::{AnySource, SourceInner};
use crate::reactivity::tracking::{notify_write, track_read};

/// A reactive key/value store with per-key dependency tracking.
///
/// # Example
///
/// ```
/// use cinder_signals::Store;
///
/// let store: Store<String, i32> = Store::new();
/// store.set("count".to_string(), 1);
/// assert_eq!(store.get(&"count".to_string()), Some(1));
/// ```
pub struct Store<K, V>
where
    K: Eq + Hash + Clone,
{
    data: RefCell<HashMap<K, V>>,

    /// Per-key version cells; bumped on every write to that key.
    key_cells: RefCell<HashMap<K, Rc<SourceInner<u32>>>>,

    /// Structural version; bumped on insert/remove so absent-key reads can
    /// still subscribe to future changes.
    version: Rc<SourceInner<u32>>,
}

impl<K, V> Store<K, V>
where
    K: Eq + Hash + Clone + 'static,
    V: Clone + 'static,
{
    pub fn new() -> Self {
        Self {
            data: RefCell::new(HashMap::new()),
            key_cells: RefCell::new(HashMap::new()),
            version: Rc::new(SourceInner::new(0)),
        }
    }

    fn key_cell(&self, key: &K) -> Rc<SourceInner<u32>> {
        let mut cells = self.key_cells.borrow_mut();
        match cells.get(key) {
            Some(cell) => cell.clone(),
            None => {
                let cell = Rc::new(SourceInner::new(0));
                cells.insert(key.clone(), cell.clone());
                cell
            }
        }
    }

    fn bump(cell: &Rc<SourceInner<u32>>) {
        cell.update(|v| *v += 1);
        with_context(|ctx| {
            let wv = ctx.increment_write_version();
            cell.set_write_version(wv);
        });
        notify_write(cell.clone() as Rc<dyn AnySource>);
    }

    /// Get a value. Inside an effect this subscribes to the key; an absent
    /// key subscribes to the structural version instead, so a later insert
    /// re-runs the reader.
    pub fn get(&self, key: &K) -> Option<V> {
        let present = self.data.borrow().contains_key(key);
        if present {
            let cell = self.key_cell(key);
            track_read(cell as Rc<dyn AnySource>);
        } else {
            track_read(self.version.clone() as Rc<dyn AnySource>);
        }
        self.data.borrow().get(key).cloned()
    }

    /// Check for a key, subscribing the same way `get` does.
    pub fn has(&self, key: &K) -> bool {
        let present = self.data.borrow().contains_key(key);
        if present {
            let cell = self.key_cell(key);
            track_read(cell as Rc<dyn AnySource>);
        } else {
            track_read(self.version.clone() as Rc<dyn AnySource>);
        }
        present
    }

    /// Set a value, notifying only the effects subscribed to this key (plus
    /// structural readers if the key is new).
    pub fn set(&self, key: K, value: V) {
        let is_new = !self.data.borrow().contains_key(&key);
        self.data.borrow_mut().insert(key.clone(), value);

        let cell = self.key_cell(&key);
        Self::bump(&cell);

        if is_new {
            Self::bump(&self.version);
        }
    }

    /// Remove a key, notifying its subscribers and structural readers.
    pub fn delete(&self, key: &K) -> bool {
        let removed = self.data.borrow_mut().remove(key).is_some();
        if removed {
            if let Some(cell) = self.key_cells.borrow().get(key).cloned() {
                Self::bump(&cell);
            }
            Self::bump(&self.version);
        }
        removed
    }

    pub fn len(&self) -> usize {
        track_read(self.version.clone() as Rc<dyn AnySource>);
        self.data.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> Default for Store<K, V>
where
    K: Eq + Hash + Clone + 'static,
    V: Clone + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// TESTS
// =============================================================================
