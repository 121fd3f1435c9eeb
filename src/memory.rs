//! In-memory store implementation.
//!
//! This implementation is NOT durable - data is lost on process exit.
//! Use for testing and development only.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::StoreConfig;
use crate::error::StoreResult;
use crate::locks::RestaurantLocks;
use crate::store::{validate_key, validate_value, Collection, KvStore};

type Collections = BTreeMap<Collection, BTreeMap<String, Vec<u8>>>;

/// In-memory implementation of KvStore.
///
/// Uses a BTreeMap per collection for ordered iteration and RwLock for
/// concurrency.
pub struct MemoryStore {
    data: Arc<RwLock<Collections>>,
    config: StoreConfig,
    locks: RestaurantLocks,
}

impl MemoryStore {
    /// Create a new empty in-memory store with default bounds.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Create a new empty in-memory store with the given bounds.
    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            data: Arc::new(RwLock::new(BTreeMap::new())),
            config,
            locks: RestaurantLocks::new(),
        }
    }

    /// Number of entries in a collection.
    pub fn len(&self, collection: Collection) -> usize {
        self.data.read().get(&collection).map_or(0, BTreeMap::len)
    }

    /// Check if every collection is empty.
    pub fn is_empty(&self) -> bool {
        self.data.read().values().all(BTreeMap::is_empty)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn locks(&self) -> &RestaurantLocks {
        &self.locks
    }

    async fn get(&self, collection: Collection, key: &str) -> StoreResult<Option<Vec<u8>>> {
        validate_key(self.config.collection(collection), key)?;
        Ok(self
            .data
            .read()
            .get(&collection)
            .and_then(|entries| entries.get(key))
            .cloned())
    }

    async fn put(
        &self,
        collection: Collection,
        key: &str,
        value: Vec<u8>,
    ) -> StoreResult<Option<Vec<u8>>> {
        let bounds = self.config.collection(collection);
        validate_key(bounds, key)?;
        validate_value(collection, bounds, &value)?;

        let mut data = self.data.write();
        Ok(data
            .entry(collection)
            .or_default()
            .insert(key.to_string(), value))
    }

    async fn remove(&self, collection: Collection, key: &str) -> StoreResult<Option<Vec<u8>>> {
        validate_key(self.config.collection(collection), key)?;

        let mut data = self.data.write();
        Ok(data
            .get_mut(&collection)
            .and_then(|entries| entries.remove(key)))
    }

    async fn keys(&self, collection: Collection) -> StoreResult<Vec<String>> {
        let data = self.data.read();
        Ok(data
            .get(&collection)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn values(&self, collection: Collection) -> StoreResult<Vec<Vec<u8>>> {
        let data = self.data.read();
        Ok(data
            .get(&collection)
            .map(|entries| entries.values().cloned().collect())
            .unwrap_or_default())
    }
}
