//! Store composition
//!
//! A `StoreSpec` describes a tree of stores (e.g. sharded over cached over
//! persistent). `StoreBuilder` turns it into one `DynStore`, so callers only
//! ever see the `KvStore` contract.

use crate::cache::{CachingStore, InvalidationPolicy, DEFAULT_CACHE_CAPACITY};
use crate::error::{KvError, Result};
use crate::memory::InMemoryStore;
use crate::persistent::PersistentStore;
use crate::sharded::ShardedStore;
use crate::store::DynStore;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Snapshot file used by the default topology
pub const DEFAULT_SNAPSHOT_FILE: &str = "file_store.json";

fn default_capacity() -> NonZeroUsize {
    DEFAULT_CACHE_CAPACITY
}

/// Declarative description of a store tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreSpec {
    /// Plain in-memory map
    Memory,
    /// JSON snapshot file; relative paths resolve against the builder's base dir
    Persistent { path: PathBuf },
    /// LRU cache in front of `inner`
    Cached {
        #[serde(default = "default_capacity")]
        capacity: NonZeroUsize,
        #[serde(default)]
        invalidation: InvalidationPolicy,
        inner: Box<StoreSpec>,
    },
    /// Hash-routed shards, in routing order
    Sharded { shards: Vec<StoreSpec> },
}

impl StoreSpec {
    /// Sharded over a persistent store and a cached in-memory store
    pub fn default_topology() -> Self {
        StoreSpec::Sharded {
            shards: vec![
                StoreSpec::Persistent {
                    path: PathBuf::from(DEFAULT_SNAPSHOT_FILE),
                },
                StoreSpec::Cached {
                    capacity: DEFAULT_CACHE_CAPACITY,
                    invalidation: InvalidationPolicy::default(),
                    inner: Box::new(StoreSpec::Memory),
                },
            ],
        }
    }
}

impl Default for StoreSpec {
    fn default() -> Self {
        Self::default_topology()
    }
}

impl fmt::Display for StoreSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreSpec::Memory => write!(f, "memory"),
            StoreSpec::Persistent { path } => write!(f, "persistent({})", path.display()),
            StoreSpec::Cached {
                capacity,
                invalidation,
                inner,
            } => write!(f, "cached({}, {:?}, {})", capacity, invalidation, inner),
            StoreSpec::Sharded { shards } => {
                write!(f, "sharded[")?;
                for (i, shard) in shards.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", shard)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Assembles a `StoreSpec` into a live store
#[derive(Debug, Clone)]
pub struct StoreBuilder {
    base_dir: PathBuf,
}

impl Default for StoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreBuilder {
    /// Builder resolving relative paths against the working directory
    pub fn new() -> Self {
        Self {
            base_dir: PathBuf::from("."),
        }
    }

    /// Resolve relative persistent paths against `dir`
    pub fn base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = dir.into();
        self
    }

    /// Build the store tree described by `spec`.
    ///
    /// Fails if two persistent stores share a file, a sharded node has no
    /// shards, or a snapshot cannot be loaded.
    pub fn build(&self, spec: &StoreSpec) -> Result<DynStore> {
        let mut seen_paths = HashSet::new();
        self.build_node(spec, &mut seen_paths)
    }

    fn build_node(&self, spec: &StoreSpec, seen_paths: &mut HashSet<PathBuf>) -> Result<DynStore> {
        match spec {
            StoreSpec::Memory => Ok(Arc::new(InMemoryStore::new())),
            StoreSpec::Persistent { path } => {
                let path = self.resolve(path);
                if !seen_paths.insert(path.clone()) {
                    return Err(KvError::InvalidConfig(format!(
                        "snapshot file {} is used by more than one persistent store",
                        path.display()
                    )));
                }
                debug!("Opening persistent store at {}", path.display());
                Ok(Arc::new(PersistentStore::open(path)?))
            }
            StoreSpec::Cached {
                capacity,
                invalidation,
                inner,
            } => {
                let inner = self.build_node(inner, seen_paths)?;
                Ok(Arc::new(
                    CachingStore::with_capacity(inner, *capacity).with_policy(*invalidation),
                ))
            }
            StoreSpec::Sharded { shards } => {
                let shards = shards
                    .iter()
                    .map(|shard| self.build_node(shard, seen_paths))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Arc::new(ShardedStore::new(shards)?))
            }
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}
