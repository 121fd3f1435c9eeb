//! KvStore trait - the storage abstraction restaurants and reservations
//! are persisted through.
//!
//! A store holds independent ordered collections. Each collection maps a
//! string key (the record id) to an opaque value (the JSON-encoded record)
//! and enforces the key and value bounds from [`StoreConfig`].

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use crate::config::{CollectionConfig, StoreConfig};
use crate::error::{StoreError, StoreResult};
use crate::locks::RestaurantLocks;

/// The collections a store holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Restaurants,
    Reservations,
}

impl Collection {
    pub const ALL: [Collection; 2] = [Collection::Restaurants, Collection::Reservations];

    /// Stable name used in the SQLite catalog and error messages.
    pub fn name(self) -> &'static str {
        match self {
            Collection::Restaurants => "restaurants",
            Collection::Reservations => "reservations",
        }
    }
}

/// Validate that a key fits the collection.
pub fn validate_key(bounds: &CollectionConfig, key: &str) -> StoreResult<()> {
    if key.is_empty() {
        return Err(StoreError::InvalidKey("key cannot be empty".to_string()));
    }
    if key.len() > bounds.max_key_size as usize {
        return Err(StoreError::InvalidKey(format!(
            "key exceeds maximum length of {} bytes",
            bounds.max_key_size
        )));
    }
    Ok(())
}

/// Validate that an encoded value fits the collection.
pub fn validate_value(
    collection: Collection,
    bounds: &CollectionConfig,
    value: &[u8],
) -> StoreResult<()> {
    if value.len() > bounds.max_value_size as usize {
        return Err(StoreError::ValueTooLarge {
            collection: collection.name(),
            size: value.len(),
            max: bounds.max_value_size,
        });
    }
    Ok(())
}

/// The core storage trait.
///
/// Both backends (SQLite, memory) implement this trait; the restaurant
/// repository and reservation engine are generic over it.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Bounds the store was opened with.
    fn config(&self) -> &StoreConfig;

    /// Per-restaurant locks shared by everything built over this store.
    fn locks(&self) -> &RestaurantLocks;

    /// Get a value by key.
    ///
    /// Returns `None` if the key does not exist.
    async fn get(&self, collection: Collection, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Insert or overwrite a value, returning the previous one.
    async fn put(
        &self,
        collection: Collection,
        key: &str,
        value: Vec<u8>,
    ) -> StoreResult<Option<Vec<u8>>>;

    /// Remove a key, returning the value it held.
    async fn remove(&self, collection: Collection, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// All keys of a collection in lexicographic order.
    async fn keys(&self, collection: Collection) -> StoreResult<Vec<String>>;

    /// All values of a collection, ordered by key.
    async fn values(&self, collection: Collection) -> StoreResult<Vec<Vec<u8>>>;

    /// Get a value and deserialize it as JSON.
    async fn get_json<T: DeserializeOwned + Send>(
        &self,
        collection: Collection,
        key: &str,
    ) -> StoreResult<Option<T>> {
        match self.get(collection, key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Store a JSON-encoded value.
    async fn put_json<T: Serialize + Send + Sync>(
        &self,
        collection: Collection,
        key: &str,
        value: &T,
    ) -> StoreResult<()> {
        let bytes = serde_json::to_vec(value)?;
        self.put(collection, key, bytes).await?;
        Ok(())
    }

    /// Remove a key and deserialize the value it held.
    async fn remove_json<T: DeserializeOwned + Send>(
        &self,
        collection: Collection,
        key: &str,
    ) -> StoreResult<Option<T>> {
        match self.remove(collection, key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Deserialize every value of a collection, ordered by key.
    async fn values_json<T: DeserializeOwned + Send>(
        &self,
        collection: Collection,
    ) -> StoreResult<Vec<T>> {
        self.values(collection)
            .await?
            .iter()
            .map(|bytes| serde_json::from_slice(bytes).map_err(StoreError::from))
            .collect()
    }

    /// Check if a key exists.
    async fn contains_key(&self, collection: Collection, key: &str) -> StoreResult<bool> {
        Ok(self.get(collection, key).await?.is_some())
    }
}
