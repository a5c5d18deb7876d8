//! Sharded store
//!
//! Partitions the keyspace across a fixed, ordered list of stores. Each key
//! is routed by `sha256(key)` so the assignment is stable across restarts.
//! The shard count cannot change while data exists: a different count would
//! misroute every pre-existing key.

use crate::error::{KvError, Result};
use crate::store::{DynStore, KvStore, Snapshot};
use crate::types::{KvKey, KvValue};
use sha2::{Digest, Sha256};
use std::collections::hash_map::Entry;
use tracing::warn;

/// Route a key to a shard index in `0..num_shards`.
///
/// The first four bytes of the key's SHA-256 digest, read as a big-endian
/// `u32`, modulo the shard count.
///
/// # Panics
/// Panics if `num_shards` is zero.
#[inline]
pub fn shard_index(key: &str, num_shards: usize) -> usize {
    assert!(num_shards > 0, "shard count must be non-zero");
    let digest = Sha256::digest(key.as_bytes());
    let prefix = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    prefix as usize % num_shards
}

/// Router over N independent stores
pub struct ShardedStore<S = DynStore> {
    shards: Vec<S>,
}

impl<S: KvStore> ShardedStore<S> {
    /// Create a router over `shards` (in routing order, at least one)
    pub fn new(shards: Vec<S>) -> Result<Self> {
        if shards.is_empty() {
            return Err(KvError::InvalidConfig(
                "sharded store needs at least one shard".to_string(),
            ));
        }
        Ok(Self { shards })
    }

    /// Get number of shards
    pub fn num_shards(&self) -> usize {
        self.shards.len()
    }

    /// Index of the shard that owns `key`
    pub fn shard_for(&self, key: &KvKey) -> usize {
        shard_index(key.as_str(), self.shards.len())
    }

    /// Borrow a shard by index
    pub fn shard(&self, idx: usize) -> Option<&S> {
        self.shards.get(idx)
    }

    pub fn shards(&self) -> &[S] {
        &self.shards
    }

    /// Entry count per shard, in shard order
    pub fn shard_sizes(&self) -> Vec<usize> {
        self.shards.iter().map(|s| s.len()).collect()
    }

    #[inline]
    fn route(&self, key: &KvKey) -> &S {
        &self.shards[self.shard_for(key)]
    }
}

impl<S: KvStore> KvStore for ShardedStore<S> {
    fn set(&self, key: &KvKey, value: KvValue) -> Result<()> {
        self.route(key).set(key, value)
    }

    fn get(&self, key: &KvKey) -> Option<KvValue> {
        self.route(key).get(key)
    }

    fn delete(&self, key: &KvKey) -> Result<Option<KvValue>> {
        self.route(key).delete(key)
    }

    /// Union of every shard; a key found in several shards takes the value
    /// from the last one in shard order.
    fn all(&self) -> Snapshot {
        let mut merged = Snapshot::new();
        for (shard_id, shard) in self.shards.iter().enumerate() {
            for (key, value) in shard.all() {
                match merged.entry(key) {
                    Entry::Occupied(mut slot) => {
                        warn!(
                            "Key {:?} found in more than one shard, keeping shard {}",
                            slot.key(),
                            shard_id
                        );
                        slot.insert(value);
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(value);
                    }
                }
            }
        }
        merged
    }

    /// Sum of shard sizes (counts a duplicated key once per shard)
    fn len(&self) -> usize {
        self.shards.iter().map(|s| s.len()).sum()
    }

    /// Flush every shard, returning the first failure
    fn flush(&self) -> Result<()> {
        let mut first_error = None;
        for (shard_id, shard) in self.shards.iter().enumerate() {
            if let Err(e) = shard.flush() {
                warn!("Failed to flush shard {}: {}", shard_id, e);
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
