//! Thread-local cache for fetched resource payloads.
//!
//! The cache persists across component re-renders and subscriptions, storing
//! the last successful payload for every resource key. Entries are replaced
//! whole on every successful fetch and never evicted, so a key that was loaded
//! once is served instantly for the rest of the session.
//!
//! # Cache Key Structure
//! - `ResourceKey`: the resource URL
//!
//! # Cache Value Structure
//! - `serde_json::Value`: the decoded response body

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::debug;
use serde_json::Value;

/// Cache key: the URL (or any stable identifier) of a fetchable resource.
pub type ResourceKey = String;

type Store = Rc<RefCell<HashMap<ResourceKey, Value>>>;

thread_local! {
    /// Global cache that survives component lifetimes.
    /// Thread-local to avoid synchronization overhead in WASM.
    static CACHE_STORE: Store = Rc::new(RefCell::new(HashMap::with_capacity(16)));
}

/// Handle to a resource cache. Clones share the same entries.
///
/// All writes go through [`ResourceCache::replace`], which swaps the whole
/// entry; there is no partial update.
#[derive(Clone, Default)]
pub struct ResourceCache {
    store: Store,
}

impl ResourceCache {
    /// A fresh cache not shared with anything else.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide cache shared by every controller on this thread.
    pub fn shared() -> Self {
        CACHE_STORE.with(|store| Self {
            store: Rc::clone(store),
        })
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.store.borrow().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.store.borrow().contains_key(key)
    }

    /// Replace the entry for `key`, returning the previous payload.
    pub fn replace(&self, key: &str, value: Value) -> Option<Value> {
        debug!("cache: storing entry for {}", key);
        self.store.borrow_mut().insert(key.to_owned(), value)
    }

    pub fn len(&self) -> usize {
        self.store.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.borrow().is_empty()
    }
}
