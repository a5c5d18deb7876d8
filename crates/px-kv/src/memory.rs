//! In-memory store
//!
//! One mutex guards the whole map and is held for the full duration of each
//! operation.

use crate::error::Result;
use crate::store::{KvStore, Snapshot};
use crate::types::{KvKey, KvValue};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Map-backed store with a single lock
#[derive(Debug, Default)]
pub struct InMemoryStore {
    data: Mutex<HashMap<String, KvValue>>,
}

impl InMemoryStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for InMemoryStore {
    fn set(&self, key: &KvKey, value: KvValue) -> Result<()> {
        self.data.lock().insert(key.as_str().to_string(), value);
        Ok(())
    }

    fn get(&self, key: &KvKey) -> Option<KvValue> {
        self.data.lock().get(key.as_str()).cloned()
    }

    fn delete(&self, key: &KvKey) -> Result<Option<KvValue>> {
        Ok(self.data.lock().remove(key.as_str()))
    }

    fn all(&self) -> Snapshot {
        self.data.lock().clone()
    }

    fn len(&self) -> usize {
        self.data.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn key(s: &str) -> KvKey {
        KvKey::new(s).unwrap()
    }

    #[test]
    fn test_basic_set_get() {
        let store = InMemoryStore::new();

        store.set(&key("a"), KvValue::from("1")).unwrap();
        assert_eq!(store.get(&key("a")), Some(KvValue::from("1")));

        store.set(&key("a"), KvValue::from("2")).unwrap();
        assert_eq!(store.get(&key("a")), Some(KvValue::from("2")));
    }

    #[test]
    fn test_get_nonexistent() {
        let store = InMemoryStore::new();
        assert_eq!(store.get(&key("missing")), None);
    }

    #[test]
    fn test_delete_returns_removed_value() {
        let store = InMemoryStore::new();
        store.set(&key("x"), KvValue::from("y")).unwrap();

        assert_eq!(store.delete(&key("x")).unwrap(), Some(KvValue::from("y")));
        assert_eq!(store.get(&key("x")), None);

        // Idempotent
        assert_eq!(store.delete(&key("x")).unwrap(), None);
        assert_eq!(store.delete(&key("x")).unwrap(), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_all_is_detached_snapshot() {
        let store = InMemoryStore::new();
        store.set(&key("a"), KvValue::Int(1)).unwrap();

        let snapshot = store.all();
        store.set(&key("b"), KvValue::Int(2)).unwrap();
        store.delete(&key("a")).unwrap();

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get("a"), Some(&KvValue::Int(1)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_concurrent_access() {
        let store = Arc::new(InMemoryStore::new());
        let mut handles = vec![];

        for t in 0..8 {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                for i in 0..100 {
                    let k = key(&format!("t{}_k{}", t, i));
                    store.set(&k, KvValue::Int(i)).unwrap();
                    assert_eq!(store.get(&k), Some(KvValue::Int(i)));
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len(), 800);
    }
}
