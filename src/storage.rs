//! Key/value persistence for per-visitor state (UTM attribution, CTA dismissal).
//!
//! The landing pages used to keep this in browser local storage. Here the
//! store is an injected trait object so the service can back it with a
//! bounded in-memory cache and tests can use a plain map.

use moka::sync::Cache;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Minimal string store, last write wins per key.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String);
}

/// Unbounded map for tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        match self.entries.lock() {
            Ok(entries) => entries.get(key).cloned(),
            Err(poisoned) => poisoned.into_inner().get(key).cloned(),
        }
    }

    fn set(&self, key: &str, value: String) {
        match self.entries.lock() {
            Ok(mut entries) => {
                entries.insert(key.to_string(), value);
            }
            Err(poisoned) => {
                poisoned.into_inner().insert(key.to_string(), value);
            }
        }
    }
}

/// Capacity-bounded store backing the HTTP service.
///
/// Entries never expire by age; they are only evicted when the cache is full.
#[derive(Clone)]
pub struct MokaStore {
    cache: Cache<String, String>,
}

impl MokaStore {
    pub fn new(max_capacity: u64) -> Self {
        Self {
            cache: Cache::builder().max_capacity(max_capacity).build(),
        }
    }
}

impl KeyValueStore for MokaStore {
    fn get(&self, key: &str) -> Option<String> {
        self.cache.get(key)
    }

    fn set(&self, key: &str, value: String) {
        self.cache.insert(key.to_string(), value);
    }
}

/// View of a shared store restricted to one visitor.
///
/// Keys are stored as `{scope}:{key}`, so two visitors never see each
/// other's values.
#[derive(Clone)]
pub struct ScopedStore {
    inner: Arc<dyn KeyValueStore>,
    scope: String,
}

impl ScopedStore {
    pub fn new(inner: Arc<dyn KeyValueStore>, scope: impl Into<String>) -> Self {
        Self {
            inner,
            scope: scope.into(),
        }
    }

    fn scoped_key(&self, key: &str) -> String {
        format!("{}:{}", self.scope, key)
    }
}

impl KeyValueStore for ScopedStore {
    fn get(&self, key: &str) -> Option<String> {
        self.inner.get(&self.scoped_key(key))
    }

    fn set(&self, key: &str, value: String) {
        self.inner.set(&self.scoped_key(key), value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_last_write_wins() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k"), None);

        store.set("k", "a".to_string());
        store.set("k", "b".to_string());
        assert_eq!(store.get("k"), Some("b".to_string()));
    }

    #[test]
    fn test_moka_store_roundtrip() {
        let store = MokaStore::new(100);
        store.set("utm_params", "{}".to_string());
        assert_eq!(store.get("utm_params"), Some("{}".to_string()));
    }

    #[test]
    fn test_scoped_stores_are_isolated() {
        let shared: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let alice = ScopedStore::new(shared.clone(), "alice");
        let bob = ScopedStore::new(shared.clone(), "bob");

        alice.set("utm_params", "a".to_string());
        assert_eq!(alice.get("utm_params"), Some("a".to_string()));
        assert_eq!(bob.get("utm_params"), None);
        assert_eq!(shared.get("alice:utm_params"), Some("a".to_string()));
    }
}
