//! The store contract shared by every backend
//!
//! Each component holds its inner store(s) behind this trait and delegates
//! to them, so any component can wrap any other.

use crate::error::Result;
use crate::types::{KvKey, KvValue};
use std::collections::HashMap;
use std::sync::Arc;

/// A point-in-time copy of a store's contents, unordered
pub type Snapshot = HashMap<String, KvValue>;

/// Shared handle to a type-erased store
pub type DynStore = Arc<dyn KvStore>;

/// Capability interface every backend implements.
///
/// All methods take `&self` and must be safe to call concurrently; each
/// implementation does its own synchronization. A missing key is reported
/// as `None`, never as an error. Only the write path returns `Result`,
/// because only durable stores can fail to apply a write.
pub trait KvStore: Send + Sync {
    /// Insert or overwrite a value
    fn set(&self, key: &KvKey, value: KvValue) -> Result<()>;

    /// Get the current value, `None` if absent
    fn get(&self, key: &KvKey) -> Option<KvValue>;

    /// Remove a key, returning the removed value (`None` if it did not exist)
    fn delete(&self, key: &KvKey) -> Result<Option<KvValue>>;

    /// Snapshot copy of every entry
    fn all(&self) -> Snapshot;

    /// Number of entries
    fn len(&self) -> usize {
        self.all().len()
    }

    /// Check if the store is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Force any buffered state to durable storage (shutdown hook)
    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

impl<S: KvStore + ?Sized> KvStore for Arc<S> {
    fn set(&self, key: &KvKey, value: KvValue) -> Result<()> {
        (**self).set(key, value)
    }

    fn get(&self, key: &KvKey) -> Option<KvValue> {
        (**self).get(key)
    }

    fn delete(&self, key: &KvKey) -> Result<Option<KvValue>> {
        (**self).delete(key)
    }

    fn all(&self) -> Snapshot {
        (**self).all()
    }

    fn len(&self) -> usize {
        (**self).len()
    }

    fn flush(&self) -> Result<()> {
        (**self).flush()
    }
}

impl<S: KvStore + ?Sized> KvStore for Box<S> {
    fn set(&self, key: &KvKey, value: KvValue) -> Result<()> {
        (**self).set(key, value)
    }

    fn get(&self, key: &KvKey) -> Option<KvValue> {
        (**self).get(key)
    }

    fn delete(&self, key: &KvKey) -> Result<Option<KvValue>> {
        (**self).delete(key)
    }

    fn all(&self) -> Snapshot {
        (**self).all()
    }

    fn len(&self) -> usize {
        (**self).len()
    }

    fn flush(&self) -> Result<()> {
        (**self).flush()
    }
}
