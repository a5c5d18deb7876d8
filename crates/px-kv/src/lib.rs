//! Composable key-value storage for px-kvstore
//!
//! # Features
//! - One `KvStore` contract implemented by every backend
//! - In-memory, JSON-snapshot persistent, LRU-cached and hash-sharded stores
//! - Stores wrap each other by composition (`Arc<dyn KvStore>` all the way down)
//! - Declarative topologies (`StoreSpec`) assembled by `StoreBuilder`
//!
//! # Example
//! ```
//! use px_kv::{CachingStore, InMemoryStore, KvKey, KvStore, KvValue, ShardedStore};
//! use std::sync::Arc;
//!
//! let shards: Vec<px_kv::DynStore> = vec![
//!     Arc::new(InMemoryStore::new()),
//!     Arc::new(CachingStore::new(InMemoryStore::new())),
//! ];
//! let store = ShardedStore::new(shards).unwrap();
//!
//! let key = KvKey::new("a").unwrap();
//! store.set(&key, KvValue::from("1")).unwrap();
//! assert_eq!(store.get(&key), Some(KvValue::from("1")));
//! assert_eq!(store.delete(&key).unwrap(), Some(KvValue::from("1")));
//! assert_eq!(store.get(&key), None);
//! ```

pub mod cache;
pub mod error;
pub mod lru;
pub mod memory;
pub mod persistent;
pub mod sharded;
pub mod store;
pub mod topology;
pub mod types;

pub use cache::{CacheStats, CachingStore, InvalidationPolicy, DEFAULT_CACHE_CAPACITY};
pub use error::{ErrorKind, KvError, Result};
pub use memory::InMemoryStore;
pub use persistent::PersistentStore;
pub use sharded::{shard_index, ShardedStore};
pub use store::{DynStore, KvStore, Snapshot};
pub use topology::{StoreBuilder, StoreSpec};
pub use types::{KvKey, KvValue};
