//! SQLite store implementation.
//!
//! Features:
//! - WAL mode for concurrent readers
//! - One table for all collections, keyed by (collection id, key)
//! - A `collections` catalog that pins the bounds a database was created
//!   with; reopening with different bounds fails

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::locks::RestaurantLocks;
use crate::store::{validate_key, validate_value, Collection, KvStore};

/// SQLite implementation of KvStore.
///
/// Uses WAL mode for performance and durability.
///
/// Booking locks live in the store instance, so a process should open one
/// `SqliteStore` per database file and share it.
pub struct SqliteStore {
    pool: SqlitePool,
    config: StoreConfig,
    locks: RestaurantLocks,
}

impl SqliteStore {
    /// Open a store as described by `config`.
    ///
    /// Uses the configured database file, or an in-memory database when no
    /// path is set.
    pub async fn connect(config: StoreConfig) -> StoreResult<Self> {
        match config.database_path.clone() {
            Some(path) => Self::open_with_config(path, config).await,
            None => Self::in_memory_with_config(config).await,
        }
    }

    /// Open or create a SQLite store at the given path with default bounds.
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open_with_config(path, StoreConfig::default()).await
    }

    /// Open or create a SQLite store at the given path.
    pub async fn open_with_config(path: impl AsRef<Path>, config: StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        let path = path.as_ref();
        info!("Opening SQLite store at {:?}", path);

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(|e| StoreError::ConnectionError(e.to_string()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::ConnectionError(e.to_string()))?;

        let store = Self {
            pool,
            config,
            locks: RestaurantLocks::new(),
        };
        store.init_schema().await?;
        Ok(store)
    }

    /// Create an in-memory SQLite store (for testing) with default bounds.
    pub async fn in_memory() -> StoreResult<Self> {
        Self::in_memory_with_config(StoreConfig::default()).await
    }

    /// Create an in-memory SQLite store with the given bounds.
    pub async fn in_memory_with_config(config: StoreConfig) -> StoreResult<Self> {
        config.validate()?;
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StoreError::ConnectionError(e.to_string()))?
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        // Every connection to `:memory:` is a separate database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::ConnectionError(e.to_string()))?;

        let store = Self {
            pool,
            config,
            locks: RestaurantLocks::new(),
        };
        store.init_schema().await?;
        Ok(store)
    }

    /// Close the connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Initialize the database schema and pin the collection bounds.
    async fn init_schema(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS collections (
                name TEXT PRIMARY KEY NOT NULL,
                id INTEGER NOT NULL UNIQUE,
                max_key_size INTEGER NOT NULL,
                max_value_size INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS kv_store (
                collection INTEGER NOT NULL,
                key TEXT NOT NULL,
                value BLOB NOT NULL,
                PRIMARY KEY (collection, key)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        for collection in Collection::ALL {
            self.register_collection(collection).await?;
        }

        debug!("SQLite schema initialized");
        Ok(())
    }

    /// Record the bounds of a collection on first use, or check them against
    /// the recorded ones.
    async fn register_collection(&self, collection: Collection) -> StoreResult<()> {
        let bounds = self.config.collection(collection);

        let row: Option<(i64, i64, i64)> = sqlx::query_as(
            "SELECT id, max_key_size, max_value_size FROM collections WHERE name = ?",
        )
        .bind(collection.name())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            None => {
                sqlx::query(
                    "INSERT INTO collections (name, id, max_key_size, max_value_size) VALUES (?, ?, ?, ?)",
                )
                .bind(collection.name())
                .bind(i64::from(bounds.id))
                .bind(i64::from(bounds.max_key_size))
                .bind(i64::from(bounds.max_value_size))
                .execute(&self.pool)
                .await?;
                debug!(collection = collection.name(), id = bounds.id, "Registered collection");
                Ok(())
            }
            Some((id, max_key_size, max_value_size)) => {
                let recorded = (id, max_key_size, max_value_size);
                let requested = (
                    i64::from(bounds.id),
                    i64::from(bounds.max_key_size),
                    i64::from(bounds.max_value_size),
                );
                if recorded != requested {
                    return Err(StoreError::ConfigMismatch(format!(
                        "collection {} was created with (id, max_key_size, max_value_size) = {:?}, opened with {:?}",
                        collection.name(),
                        recorded,
                        requested
                    )));
                }
                Ok(())
            }
        }
    }

    fn collection_id(&self, collection: Collection) -> i64 {
        i64::from(self.config.collection(collection).id)
    }
}

#[async_trait]
impl KvStore for SqliteStore {
    fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn locks(&self) -> &RestaurantLocks {
        &self.locks
    }

    async fn get(&self, collection: Collection, key: &str) -> StoreResult<Option<Vec<u8>>> {
        validate_key(self.config.collection(collection), key)?;

        let row: Option<(Vec<u8>,)> =
            sqlx::query_as("SELECT value FROM kv_store WHERE collection = ? AND key = ?")
                .bind(self.collection_id(collection))
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(value,)| value))
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

        let id = self.collection_id(collection);
        let mut tx = self.pool.begin().await?;

        let previous: Option<(Vec<u8>,)> =
            sqlx::query_as("SELECT value FROM kv_store WHERE collection = ? AND key = ?")
                .bind(id)
                .bind(key)
                .fetch_optional(&mut *tx)
                .await?;

        sqlx::query(
            r#"
            INSERT INTO kv_store (collection, key, value)
            VALUES (?, ?, ?)
            ON CONFLICT(collection, key) DO UPDATE SET
                value = excluded.value
            "#,
        )
        .bind(id)
        .bind(key)
        .bind(&value)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(previous.map(|(value,)| value))
    }

    async fn remove(&self, collection: Collection, key: &str) -> StoreResult<Option<Vec<u8>>> {
        validate_key(self.config.collection(collection), key)?;

        let id = self.collection_id(collection);
        let mut tx = self.pool.begin().await?;

        let previous: Option<(Vec<u8>,)> =
            sqlx::query_as("SELECT value FROM kv_store WHERE collection = ? AND key = ?")
                .bind(id)
                .bind(key)
                .fetch_optional(&mut *tx)
                .await?;

        if previous.is_some() {
            sqlx::query("DELETE FROM kv_store WHERE collection = ? AND key = ?")
                .bind(id)
                .bind(key)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(previous.map(|(value,)| value))
    }

    async fn keys(&self, collection: Collection) -> StoreResult<Vec<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT key FROM kv_store WHERE collection = ? ORDER BY key")
                .bind(self.collection_id(collection))
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(|(k,)| k).collect())
    }

    async fn values(&self, collection: Collection) -> StoreResult<Vec<Vec<u8>>> {
        let rows: Vec<(Vec<u8>,)> =
            sqlx::query_as("SELECT value FROM kv_store WHERE collection = ? ORDER BY key")
                .bind(self.collection_id(collection))
                .fetch_all(&self.pool)
                .await?;

        Ok(rows.into_iter().map(|(v,)| v).collect())
    }
}
