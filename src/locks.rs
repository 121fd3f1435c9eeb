//! Per-restaurant locks.
//!
//! Booking is check-then-write: read the reservations holding a slot, then
//! write the new one. Everything that reads or changes a restaurant's
//! bookings holds that restaurant's lock across both steps.
//!
//! The registry belongs to the store, so every repository and engine built
//! over the same store instance serializes on the same locks. Entries only
//! live while someone holds or waits for them.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Registry = Mutex<HashMap<String, Arc<AsyncMutex<()>>>>;

/// Registry of async mutexes keyed by restaurant id.
#[derive(Debug, Default)]
pub struct RestaurantLocks {
    locks: Arc<Registry>,
}

/// Guards held for the duration of a check-and-write.
///
/// Dropping the guard releases the locks and forgets every entry nobody
/// else is holding or waiting on.
#[derive(Debug)]
pub struct RestaurantGuard {
    ids: Vec<String>,
    guards: Vec<OwnedMutexGuard<()>>,
    registry: Arc<Registry>,
}

impl RestaurantGuard {
    /// Whether this guard holds the lock for `restaurant_id`.
    pub fn covers(&self, restaurant_id: &str) -> bool {
        self.ids.iter().any(|id| id == restaurant_id)
    }
}

impl Drop for RestaurantGuard {
    fn drop(&mut self) {
        self.guards.clear();

        // Handles are only cloned under the registry lock, so a count of one
        // means the map holds the last reference.
        let mut locks = self.registry.lock();
        for id in &self.ids {
            if locks.get(id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
                locks.remove(id);
            }
        }
    }
}

impl RestaurantLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, restaurant_id: &str) -> Arc<AsyncMutex<()>> {
        self.locks
            .lock()
            .entry(restaurant_id.to_string())
            .or_default()
            .clone()
    }

    /// Number of restaurants currently locked or waited on.
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lock one restaurant.
    pub async fn acquire(&self, restaurant_id: &str) -> RestaurantGuard {
        self.acquire_all(&[restaurant_id]).await
    }

    /// Lock several restaurants. Ids are locked in sorted order so two
    /// callers locking the same pair cannot deadlock.
    pub async fn acquire_all(&self, restaurant_ids: &[&str]) -> RestaurantGuard {
        let mut ids: Vec<String> = restaurant_ids.iter().map(|id| id.to_string()).collect();
        ids.sort();
        ids.dedup();

        let mut guard = RestaurantGuard {
            ids: Vec::with_capacity(ids.len()),
            guards: Vec::with_capacity(ids.len()),
            registry: Arc::clone(&self.locks),
        };
        for id in ids {
            let lock = self.handle(&id).lock_owned().await;
            guard.ids.push(id);
            guard.guards.push(lock);
        }
        guard
    }
}
