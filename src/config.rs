//! Store configuration.
//!
//! Each collection has a numeric id and two size bounds. Defaults match the
//! layout reservations have always been stored with: restaurants in
//! collection 0, reservations in collection 1, keys up to 44 bytes and
//! values up to 1024 bytes.
//!
//! Values are layered: serde defaults, then an optional file, then
//! `RESERVATIONS__*` environment variables.

use std::path::{Path, PathBuf};

use ::config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::store::Collection;

/// Bounds for a single collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Numeric collection id; must differ between collections.
    pub id: u8,
    /// Maximum key length in bytes.
    pub max_key_size: u32,
    /// Maximum encoded value length in bytes.
    pub max_value_size: u32,
}

impl CollectionConfig {
    fn with_id(id: u8) -> Self {
        Self {
            id,
            max_key_size: 44,
            max_value_size: 1024,
        }
    }
}

/// Configuration for opening a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database file. `None` opens an in-memory database.
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    #[serde(default = "default_restaurants")]
    pub restaurants: CollectionConfig,

    #[serde(default = "default_reservations")]
    pub reservations: CollectionConfig,
}

fn default_restaurants() -> CollectionConfig {
    CollectionConfig::with_id(0)
}

fn default_reservations() -> CollectionConfig {
    CollectionConfig::with_id(1)
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            restaurants: default_restaurants(),
            reservations: default_reservations(),
        }
    }
}

impl StoreConfig {
    /// Load configuration from an optional file and the environment.
    ///
    /// A missing file is not an error; every field has a default.
    pub fn load(path: impl AsRef<Path>) -> StoreResult<Self> {
        let builder = Config::builder()
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(
                Environment::with_prefix("RESERVATIONS")
                    .separator("__")
                    .try_parsing(true),
            );

        let config: StoreConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        tracing::info!("Store configuration loaded from {:?}", path.as_ref());
        Ok(config)
    }

    /// Bounds for the given collection.
    pub fn collection(&self, collection: Collection) -> &CollectionConfig {
        match collection {
            Collection::Restaurants => &self.restaurants,
            Collection::Reservations => &self.reservations,
        }
    }

    /// Check that the collections can coexist in one store.
    pub fn validate(&self) -> StoreResult<()> {
        if self.restaurants.id == self.reservations.id {
            return Err(StoreError::InvalidConfig(format!(
                "restaurants and reservations share collection id {}",
                self.restaurants.id
            )));
        }
        for collection in Collection::ALL {
            let bounds = self.collection(collection);
            if bounds.max_key_size == 0 || bounds.max_value_size == 0 {
                return Err(StoreError::InvalidConfig(format!(
                    "collection {} has a zero size bound",
                    collection.name()
                )));
            }
        }
        Ok(())
    }
}
