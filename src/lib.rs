//! # tablebook
//!
//! Restaurant table reservations over a pluggable key-value store.
//!
//! - **Restaurants**: CRUD over records carrying a table inventory
//! - **Reservations**: booking with per-slot conflict checks and a
//!   `pending -> confirmed -> cancelled` lifecycle
//! - **Audit stamps**: `created_at` set once, `updated_at` on every change
//!
//! ## Backends
//!
//! - [`SqliteStore`]: Embedded SQLite database (durable)
//! - [`MemoryStore`]: In-memory store (testing and development)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tablebook::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> tablebook::Result<()> {
//!     let store = Arc::new(MemoryStore::new());
//!     let restaurants = RestaurantRepository::new(store);
//!     let reservations = ReservationEngine::new(restaurants.clone(), Arc::new(SystemClock::new()));
//!
//!     let bistro = restaurants
//!         .create(RestaurantPayload {
//!             name: "Bistro".to_string(),
//!             location: "Main St".to_string(),
//!             capacity: 4,
//!             opening_hours: OpeningHours {
//!                 start: "09:00".to_string(),
//!                 end: "22:00".to_string(),
//!             },
//!             tables: vec![Table { id: 1, available: true }],
//!         })
//!         .await?;
//!
//!     let booking = reservations
//!         .create(ReservationPayload {
//!             restaurant_id: bistro.id.clone(),
//!             date: "2024-01-01".to_string(),
//!             time: "19:00".to_string(),
//!             party_size: 2,
//!             contact_info: "a@b.com".to_string(),
//!             table_id: 1,
//!             status: Some(ReservationStatus::Pending),
//!         })
//!         .await?;
//!
//!     reservations.confirm(&booking.id).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Durable Storage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tablebook::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> tablebook::Result<()> {
//!     let config = StoreConfig::load("reservations.toml")?;
//!     let store = Arc::new(SqliteStore::connect(config).await?);
//!     let restaurants = RestaurantRepository::new(store);
//!
//!     for restaurant in restaurants.list().await? {
//!         println!("{} ({} tables)", restaurant.name, restaurant.tables.len());
//!     }
//!     Ok(())
//! }
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod locks;
pub mod memory;
pub mod model;
pub mod reservations;
pub mod restaurants;
pub mod sqlite;
pub mod store;

// Re-export main types
pub use clock::{Clock, ManualClock, SystemClock};
pub use crate::config::{CollectionConfig, StoreConfig};
pub use error::{Error, Result, StoreError, StoreResult};
pub use locks::{RestaurantGuard, RestaurantLocks};
pub use memory::MemoryStore;
pub use model::{
    OpeningHours, Reservation, ReservationDetails, ReservationPayload, ReservationRequest,
    ReservationStatus, Restaurant, RestaurantPayload, Slot, Table,
};
pub use reservations::ReservationEngine;
pub use restaurants::RestaurantRepository;
pub use sqlite::SqliteStore;
pub use store::{Collection, KvStore};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::clock::{Clock, ManualClock, SystemClock};
    pub use crate::config::StoreConfig;
    pub use crate::error::{Error, Result, StoreError};
    pub use crate::memory::MemoryStore;
    pub use crate::model::{
        OpeningHours, Reservation, ReservationDetails, ReservationPayload, ReservationStatus,
        Restaurant, RestaurantPayload, Table,
    };
    pub use crate::reservations::ReservationEngine;
    pub use crate::restaurants::RestaurantRepository;
    pub use crate::sqlite::SqliteStore;
    pub use crate::store::{Collection, KvStore};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_basic() {
        let store = MemoryStore::new();

        store
            .put(Collection::Restaurants, "r1", b"value".to_vec())
            .await
            .unwrap();
        let value = store.get(Collection::Restaurants, "r1").await.unwrap();
        assert_eq!(value, Some(b"value".to_vec()));
    }

    #[tokio::test]
    async fn test_engines_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}

        assert_send_sync::<MemoryStore>();
        assert_send_sync::<SqliteStore>();
        assert_send_sync::<ReservationEngine<MemoryStore>>();
        assert_send_sync::<RestaurantRepository<SqliteStore>>();
    }
}
