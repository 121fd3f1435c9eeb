//! Restaurant repository.
//!
//! Plain CRUD over the restaurants collection. Replacing or deleting a
//! restaurant is refused when it would leave an active reservation pointing
//! at a table that no longer exists, a party that no longer fits, or a
//! restaurant that is gone.

use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::{Reservation, Restaurant, RestaurantPayload};
use crate::store::{validate_key, Collection, KvStore};

/// Restaurant CRUD over a shared store.
///
/// Locks come from the store, so repositories and engines built over the
/// same store exclude each other.
pub struct RestaurantRepository<S> {
    pub(crate) store: Arc<S>,
}

impl<S> Clone for RestaurantRepository<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: KvStore> RestaurantRepository<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// All restaurants, ordered by id.
    pub async fn list(&self) -> Result<Vec<Restaurant>> {
        Ok(self.store.values_json(Collection::Restaurants).await?)
    }

    /// Look up a restaurant without treating absence as an error.
    ///
    /// An id that could never be a key is simply absent.
    pub async fn find(&self, id: &str) -> Result<Option<Restaurant>> {
        let bounds = self.store.config().collection(Collection::Restaurants);
        if validate_key(bounds, id).is_err() {
            return Ok(None);
        }
        Ok(self.store.get_json(Collection::Restaurants, id).await?)
    }

    pub async fn get(&self, id: &str) -> Result<Restaurant> {
        self.find(id)
            .await?
            .ok_or_else(|| Error::restaurant_not_found(id))
    }

    pub async fn create(&self, payload: RestaurantPayload) -> Result<Restaurant> {
        payload.validate()?;

        let restaurant = Restaurant::from_payload(Uuid::new_v4().to_string(), payload);
        self.store
            .put_json(Collection::Restaurants, &restaurant.id, &restaurant)
            .await?;

        info!(restaurant_id = %restaurant.id, name = %restaurant.name, "Restaurant created");
        Ok(restaurant)
    }

    /// Replace every field except the id.
    pub async fn update(&self, id: &str, payload: RestaurantPayload) -> Result<Restaurant> {
        payload.validate()?;

        // Unknown ids never reach the lock registry.
        self.get(id).await?;
        let _guard = self.store.locks().acquire(id).await;
        let existing = self.get(id).await?;

        for reservation in active_reservations(self.store.as_ref(), id).await? {
            if payload.tables.iter().all(|t| t.id != reservation.table_id) {
                warn!(restaurant_id = %id, table_id = reservation.table_id, "Refusing to drop a booked table");
                return Err(Error::conflict(format!(
                    "table {} is held by active reservation {}",
                    reservation.table_id, reservation.id
                )));
            }
            if reservation.party_size > payload.capacity {
                warn!(restaurant_id = %id, capacity = payload.capacity, "Refusing to shrink below a booked party");
                return Err(Error::conflict(format!(
                    "capacity {} is below the party of {} in active reservation {}",
                    payload.capacity, reservation.party_size, reservation.id
                )));
            }
        }

        let restaurant = Restaurant::from_payload(existing.id, payload);
        self.store
            .put_json(Collection::Restaurants, &restaurant.id, &restaurant)
            .await?;

        info!(restaurant_id = %restaurant.id, "Restaurant updated");
        Ok(restaurant)
    }

    /// Remove a restaurant that has no active reservations, returning it.
    pub async fn delete(&self, id: &str) -> Result<Restaurant> {
        self.get(id).await?;
        let _guard = self.store.locks().acquire(id).await;
        self.get(id).await?;

        let active = active_reservations(self.store.as_ref(), id).await?;
        if !active.is_empty() {
            warn!(restaurant_id = %id, active = active.len(), "Refusing to delete a booked restaurant");
            return Err(Error::conflict(format!(
                "restaurant {} has {} active reservation(s)",
                id,
                active.len()
            )));
        }

        let restaurant: Restaurant = self
            .store
            .remove_json(Collection::Restaurants, id)
            .await?
            .ok_or_else(|| Error::restaurant_not_found(id))?;

        info!(restaurant_id = %id, "Restaurant deleted");
        Ok(restaurant)
    }
}

/// Pending and confirmed reservations of a restaurant.
pub(crate) async fn active_reservations<S: KvStore>(
    store: &S,
    restaurant_id: &str,
) -> Result<Vec<Reservation>> {
    let reservations: Vec<Reservation> = store.values_json(Collection::Reservations).await?;
    let active: Vec<Reservation> = reservations
        .into_iter()
        .filter(|r| r.restaurant_id == restaurant_id && r.is_active())
        .collect();
    debug!(restaurant_id, active = active.len(), "Scanned reservations");
    Ok(active)
}
