//! Reservation engine.
//!
//! Owns the reservation lifecycle: checks a request against the restaurant's
//! table inventory and the reservations already holding that slot, writes
//! the reservation, and moves it through
//! `pending -> confirmed -> cancelled`.
//!
//! At most one active reservation holds a slot. The check and the write run
//! under the restaurant's lock, so no other booking for that restaurant can
//! land in between.

use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::locks::RestaurantLocks;
use crate::model::{
    Reservation, ReservationDetails, ReservationPayload, ReservationRequest, ReservationStatus,
    Restaurant,
};
use crate::restaurants::{active_reservations, RestaurantRepository};
use crate::store::{validate_key, Collection, KvStore};

pub struct ReservationEngine<S> {
    restaurants: RestaurantRepository<S>,
    clock: Arc<dyn Clock>,
}

impl<S: KvStore> ReservationEngine<S> {
    /// Build an engine over the repository's store.
    pub fn new(restaurants: RestaurantRepository<S>, clock: Arc<dyn Clock>) -> Self {
        Self { restaurants, clock }
    }

    pub fn restaurants(&self) -> &RestaurantRepository<S> {
        &self.restaurants
    }

    fn store(&self) -> &S {
        self.restaurants.store.as_ref()
    }

    fn locks(&self) -> &RestaurantLocks {
        self.store().locks()
    }

    /// All reservations, ordered by id.
    pub async fn list(&self) -> Result<Vec<Reservation>> {
        Ok(self.store().values_json(Collection::Reservations).await?)
    }

    /// Every reservation of one restaurant, cancelled ones included.
    pub async fn list_for_restaurant(&self, restaurant_id: &str) -> Result<Vec<Reservation>> {
        let mut reservations = self.list().await?;
        reservations.retain(|r| r.restaurant_id == restaurant_id);
        Ok(reservations)
    }

    pub async fn find(&self, id: &str) -> Result<Option<Reservation>> {
        let bounds = self.store().config().collection(Collection::Reservations);
        if validate_key(bounds, id).is_err() {
            return Ok(None);
        }
        Ok(self.store().get_json(Collection::Reservations, id).await?)
    }

    pub async fn get(&self, id: &str) -> Result<Reservation> {
        self.find(id)
            .await?
            .ok_or_else(|| Error::reservation_not_found(id))
    }

    /// Book a table. New reservations always start out pending.
    pub async fn create(&self, payload: ReservationPayload) -> Result<Reservation> {
        let request = payload.validate()?;
        if request.status != ReservationStatus::Pending {
            return Err(Error::validation(format!(
                "new reservations must be pending, not {}",
                request.status
            )));
        }

        self.resolve_restaurant(&request.restaurant_id).await?;
        let _guard = self.locks().acquire(&request.restaurant_id).await;
        let restaurant = self.resolve_restaurant(&request.restaurant_id).await?;
        self.check_assignment(&restaurant, &request, None).await?;

        let reservation = Reservation {
            id: Uuid::new_v4().to_string(),
            restaurant_id: request.restaurant_id,
            date: request.date,
            time: request.time,
            party_size: request.party_size,
            contact_info: request.contact_info,
            table_id: request.table_id,
            status: ReservationStatus::Pending,
            created_at: self.clock.now(),
            updated_at: None,
        };
        self.store()
            .put_json(Collection::Reservations, &reservation.id, &reservation)
            .await?;

        info!(
            reservation_id = %reservation.id,
            restaurant_id = %reservation.restaurant_id,
            table_id = reservation.table_id,
            "Reservation created"
        );
        Ok(reservation)
    }

    /// Replace every mutable field, status included.
    ///
    /// The status change must be allowed by
    /// [`ReservationStatus::can_transition_to`].
    pub async fn update(&self, id: &str, payload: ReservationPayload) -> Result<Reservation> {
        let request = payload.validate()?;
        self.modify(id, |_| Ok(request.clone())).await
    }

    /// Change date, time, party, contact or table; restaurant and status stay.
    pub async fn edit_details(&self, id: &str, details: ReservationDetails) -> Result<Reservation> {
        self.modify(id, |current| {
            ReservationPayload {
                restaurant_id: current.restaurant_id.clone(),
                date: details.date.clone(),
                time: details.time.clone(),
                party_size: details.party_size,
                contact_info: details.contact_info.clone(),
                table_id: details.table_id,
                status: Some(current.status),
            }
            .validate()
        })
        .await
    }

    /// Move a reservation to another status, keeping its details.
    pub async fn transition(&self, id: &str, status: ReservationStatus) -> Result<Reservation> {
        self.modify(id, |current| {
            let mut payload = ReservationPayload::from(current);
            payload.status = Some(status);
            payload.validate()
        })
        .await
    }

    pub async fn confirm(&self, id: &str) -> Result<Reservation> {
        self.transition(id, ReservationStatus::Confirmed).await
    }

    /// Cancel a reservation whatever its state. Cancelling twice only
    /// refreshes `updated_at`.
    pub async fn cancel(&self, id: &str) -> Result<Reservation> {
        loop {
            let current = self.get(id).await?;
            let guard = self.locks().acquire(&current.restaurant_id).await;

            let mut reservation = self.get(id).await?;
            if !guard.covers(&reservation.restaurant_id) {
                continue;
            }

            reservation.updated_at = Some(self.stamp(&reservation));
            reservation.status = ReservationStatus::Cancelled;
            self.store()
                .put_json(Collection::Reservations, &reservation.id, &reservation)
                .await?;

            info!(reservation_id = %reservation.id, "Reservation cancelled");
            return Ok(reservation);
        }
    }

    /// Ids of tables that can still be booked for `date` at `time`.
    pub async fn available_tables(
        &self,
        restaurant_id: &str,
        date: &str,
        time: &str,
    ) -> Result<Vec<u32>> {
        let restaurant = self.restaurants.get(restaurant_id).await?;
        let held = active_reservations(self.store(), restaurant_id).await?;

        Ok(restaurant
            .tables
            .iter()
            .filter(|table| table.available)
            .filter(|table| {
                !held
                    .iter()
                    .any(|r| r.table_id == table.id && r.date == date && r.time == time)
            })
            .map(|table| table.id)
            .collect())
    }

    /// Read-check-write under the lock of every restaurant involved.
    ///
    /// `build` turns the current record into the requested one. It runs
    /// again after the locks are taken, because the reservation may have
    /// moved to another restaurant in the meantime.
    async fn modify<F>(&self, id: &str, build: F) -> Result<Reservation>
    where
        F: Fn(&Reservation) -> Result<ReservationRequest> + Send + Sync,
    {
        loop {
            let current = self.get(id).await?;
            let request = build(&current)?;
            let guard = self
                .locks()
                .acquire_all(&[
                    current.restaurant_id.as_str(),
                    request.restaurant_id.as_str(),
                ])
                .await;

            let current = self.get(id).await?;
            let request = build(&current)?;
            if !guard.covers(&current.restaurant_id) || !guard.covers(&request.restaurant_id) {
                continue;
            }

            return self.replace(current, request).await;
        }
    }

    async fn replace(&self, current: Reservation, request: ReservationRequest) -> Result<Reservation> {
        if !current.status.can_transition_to(request.status) {
            warn!(
                reservation_id = %current.id,
                from = %current.status,
                to = %request.status,
                "Illegal status transition"
            );
            return Err(Error::conflict(format!(
                "reservation {} cannot move from {} to {}",
                current.id, current.status, request.status
            )));
        }

        let restaurant = self.resolve_restaurant(&request.restaurant_id).await?;
        self.check_assignment(&restaurant, &request, Some(&current.id))
            .await?;

        let reservation = Reservation {
            updated_at: Some(self.stamp(&current)),
            id: current.id,
            restaurant_id: request.restaurant_id,
            date: request.date,
            time: request.time,
            party_size: request.party_size,
            contact_info: request.contact_info,
            table_id: request.table_id,
            status: request.status,
            created_at: current.created_at,
        };
        self.store()
            .put_json(Collection::Reservations, &reservation.id, &reservation)
            .await?;

        info!(
            reservation_id = %reservation.id,
            status = %reservation.status,
            "Reservation updated"
        );
        Ok(reservation)
    }

    async fn resolve_restaurant(&self, restaurant_id: &str) -> Result<Restaurant> {
        self.restaurants
            .find(restaurant_id)
            .await?
            .ok_or_else(|| Error::validation(format!("unknown restaurant {}", restaurant_id)))
    }

    /// Check that `request` fits the restaurant and, if it holds its slot,
    /// that nobody else does. `exclude` is the reservation being replaced.
    async fn check_assignment(
        &self,
        restaurant: &Restaurant,
        request: &ReservationRequest,
        exclude: Option<&str>,
    ) -> Result<()> {
        let table = restaurant.table(request.table_id).ok_or_else(|| {
            Error::validation(format!(
                "unknown table {} at restaurant {}",
                request.table_id, restaurant.id
            ))
        })?;

        if request.party_size > restaurant.capacity {
            return Err(Error::validation(format!(
                "party of {} exceeds capacity {}",
                request.party_size, restaurant.capacity
            )));
        }

        if !request.status.is_active() {
            return Ok(());
        }

        if !table.available {
            return Err(Error::conflict(format!(
                "table {} is not available",
                table.id
            )));
        }

        let slot = request.slot();
        let held = active_reservations(self.store(), &restaurant.id).await?;
        if let Some(holder) = held
            .iter()
            .find(|r| r.slot() == slot && Some(r.id.as_str()) != exclude)
        {
            warn!(
                restaurant_id = %restaurant.id,
                table_id = request.table_id,
                holder = %holder.id,
                "Slot already booked"
            );
            return Err(Error::conflict("table already booked for that slot"));
        }

        Ok(())
    }

    /// Timestamp for a mutation; never earlier than the record's last one.
    fn stamp(&self, current: &Reservation) -> u64 {
        let floor = current.updated_at.unwrap_or(current.created_at);
        self.clock.now().max(floor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::memory::MemoryStore;
    use crate::model::{OpeningHours, RestaurantPayload, Table};

    struct Fixture {
        engine: ReservationEngine<MemoryStore>,
        clock: Arc<ManualClock>,
        restaurant: Restaurant,
    }

    async fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::new(1_000));
        let restaurants = RestaurantRepository::new(Arc::new(MemoryStore::new()));
        let restaurant = restaurants
            .create(RestaurantPayload {
                name: "Bistro".to_string(),
                location: "Main St".to_string(),
                capacity: 4,
                opening_hours: OpeningHours {
                    start: "09:00".to_string(),
                    end: "22:00".to_string(),
                },
                tables: vec![
                    Table {
                        id: 1,
                        available: true,
                    },
                    Table {
                        id: 2,
                        available: true,
                    },
                    Table {
                        id: 3,
                        available: false,
                    },
                ],
            })
            .await
            .unwrap();
        let engine = ReservationEngine::new(restaurants, clock.clone());
        Fixture {
            engine,
            clock,
            restaurant,
        }
    }

    fn booking(restaurant_id: &str) -> ReservationPayload {
        ReservationPayload {
            restaurant_id: restaurant_id.to_string(),
            date: "2024-01-01".to_string(),
            time: "19:00".to_string(),
            party_size: 2,
            contact_info: "a@b.com".to_string(),
            table_id: 1,
            status: Some(ReservationStatus::Pending),
        }
    }

    #[tokio::test]
    async fn test_create_starts_pending() {
        let f = fixture().await;

        let reservation = f.engine.create(booking(&f.restaurant.id)).await.unwrap();
        assert_eq!(reservation.status, ReservationStatus::Pending);
        assert_eq!(reservation.created_at, 1_000);
        assert!(reservation.updated_at.is_none());
        assert_eq!(f.engine.get(&reservation.id).await.unwrap(), reservation);
    }

    #[tokio::test]
    async fn test_create_must_be_pending() {
        let f = fixture().await;

        let result = f
            .engine
            .create(ReservationPayload {
                status: Some(ReservationStatus::Confirmed),
                ..booking(&f.restaurant.id)
            })
            .await;
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_double_booking_conflicts() {
        let f = fixture().await;

        f.engine.create(booking(&f.restaurant.id)).await.unwrap();
        let result = f.engine.create(booking(&f.restaurant.id)).await;
        assert!(matches!(result, Err(Error::Conflict(_))));
        assert_eq!(f.engine.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_other_slots_are_independent() {
        let f = fixture().await;

        f.engine.create(booking(&f.restaurant.id)).await.unwrap();
        f.engine
            .create(ReservationPayload {
                table_id: 2,
                ..booking(&f.restaurant.id)
            })
            .await
            .unwrap();
        f.engine
            .create(ReservationPayload {
                time: "20:00".to_string(),
                ..booking(&f.restaurant.id)
            })
            .await
            .unwrap();
        f.engine
            .create(ReservationPayload {
                date: "2024-01-02".to_string(),
                ..booking(&f.restaurant.id)
            })
            .await
            .unwrap();

        assert_eq!(f.engine.list().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_capacity_exceeded() {
        let f = fixture().await;

        let result = f
            .engine
            .create(ReservationPayload {
                party_size: 5,
                ..booking(&f.restaurant.id)
            })
            .await;
        assert!(matches!(result, Err(Error::Validation(_))));
        assert!(f.engine.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_restaurant_and_table() {
        let f = fixture().await;

        let result = f.engine.create(booking("no-such-restaurant")).await;
        assert!(matches!(result, Err(Error::Validation(_))));

        let result = f
            .engine
            .create(ReservationPayload {
                table_id: 9,
                ..booking(&f.restaurant.id)
            })
            .await;
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_unavailable_table_conflicts() {
        let f = fixture().await;

        let result = f
            .engine
            .create(ReservationPayload {
                table_id: 3,
                ..booking(&f.restaurant.id)
            })
            .await;
        assert!(matches!(result, Err(Error::Conflict(_))));
    }

    #[tokio::test]
    async fn test_missing_fields_rejected_before_store_access() {
        let f = fixture().await;

        let result = f
            .engine
            .create(ReservationPayload {
                contact_info: String::new(),
                ..booking(&f.restaurant.id)
            })
            .await;
        assert!(matches!(result, Err(Error::Validation(_))));

        let result = f
            .engine
            .update("anything", ReservationPayload::default())
            .await;
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_update_preserves_identity_and_stamps() {
        let f = fixture().await;
        let created = f.engine.create(booking(&f.restaurant.id)).await.unwrap();

        f.clock.advance(10);
        let first = f
            .engine
            .update(
                &created.id,
                ReservationPayload {
                    party_size: 3,
                    status: Some(ReservationStatus::Confirmed),
                    ..booking(&f.restaurant.id)
                },
            )
            .await
            .unwrap();
        assert_eq!(first.id, created.id);
        assert_eq!(first.created_at, created.created_at);
        assert_eq!(first.party_size, 3);
        assert_eq!(first.status, ReservationStatus::Confirmed);
        assert_eq!(first.updated_at, Some(1_010));

        f.clock.advance(5);
        let second = f
            .engine
            .update(
                &created.id,
                ReservationPayload {
                    table_id: 2,
                    status: Some(ReservationStatus::Confirmed),
                    ..booking(&f.restaurant.id)
                },
            )
            .await
            .unwrap();
        assert_eq!(second.created_at, created.created_at);
        assert_eq!(second.table_id, 2);
        assert!(second.updated_at >= first.updated_at);
    }

    #[tokio::test]
    async fn test_update_keeping_own_slot_is_not_a_conflict() {
        let f = fixture().await;
        let created = f.engine.create(booking(&f.restaurant.id)).await.unwrap();

        let updated = f
            .engine
            .update(
                &created.id,
                ReservationPayload {
                    contact_info: "new@b.com".to_string(),
                    ..booking(&f.restaurant.id)
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.contact_info, "new@b.com");
    }

    #[tokio::test]
    async fn test_update_into_held_slot_conflicts() {
        let f = fixture().await;
        f.engine.create(booking(&f.restaurant.id)).await.unwrap();
        let other = f
            .engine
            .create(ReservationPayload {
                table_id: 2,
                ..booking(&f.restaurant.id)
            })
            .await
            .unwrap();

        let result = f
            .engine
            .edit_details(
                &other.id,
                ReservationDetails {
                    date: "2024-01-01".to_string(),
                    time: "19:00".to_string(),
                    party_size: 2,
                    contact_info: "a@b.com".to_string(),
                    table_id: 1,
                },
            )
            .await;
        assert!(matches!(result, Err(Error::Conflict(_))));
        assert_eq!(f.engine.get(&other.id).await.unwrap().table_id, 2);
    }

    #[tokio::test]
    async fn test_edit_details_keeps_status() {
        let f = fixture().await;
        let created = f.engine.create(booking(&f.restaurant.id)).await.unwrap();
        f.engine.confirm(&created.id).await.unwrap();

        let edited = f
            .engine
            .edit_details(
                &created.id,
                ReservationDetails {
                    date: "2024-02-01".to_string(),
                    time: "18:30".to_string(),
                    party_size: 4,
                    contact_info: "a@b.com".to_string(),
                    table_id: 2,
                },
            )
            .await
            .unwrap();
        assert_eq!(edited.status, ReservationStatus::Confirmed);
        assert_eq!(edited.restaurant_id, f.restaurant.id);
        assert_eq!(edited.date, "2024-02-01");
    }

    #[tokio::test]
    async fn test_illegal_transitions_conflict() {
        let f = fixture().await;
        let created = f.engine.create(booking(&f.restaurant.id)).await.unwrap();

        f.engine.confirm(&created.id).await.unwrap();
        let result = f
            .engine
            .transition(&created.id, ReservationStatus::Pending)
            .await;
        assert!(matches!(result, Err(Error::Conflict(_))));

        f.engine.cancel(&created.id).await.unwrap();
        for status in [
            ReservationStatus::Pending,
            ReservationStatus::Confirmed,
            ReservationStatus::Cancelled,
        ] {
            let result = f.engine.transition(&created.id, status).await;
            assert!(matches!(result, Err(Error::Conflict(_))));
        }

        let result = f
            .engine
            .update(&created.id, booking(&f.restaurant.id))
            .await;
        assert!(matches!(result, Err(Error::Conflict(_))));
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let f = fixture().await;
        let created = f.engine.create(booking(&f.restaurant.id)).await.unwrap();

        f.clock.advance(1);
        let once = f.engine.cancel(&created.id).await.unwrap();
        f.clock.advance(1);
        let twice = f.engine.cancel(&created.id).await.unwrap();

        assert_eq!(once.status, ReservationStatus::Cancelled);
        assert_eq!(twice.status, ReservationStatus::Cancelled);
        assert_eq!(once.updated_at, Some(1_001));
        assert_eq!(twice.updated_at, Some(1_002));
        assert_eq!(twice.created_at, created.created_at);
    }

    #[tokio::test]
    async fn test_cancel_frees_slot() {
        let f = fixture().await;
        let first = f.engine.create(booking(&f.restaurant.id)).await.unwrap();

        f.engine.cancel(&first.id).await.unwrap();
        let again = f.engine.create(booking(&f.restaurant.id)).await.unwrap();
        assert_ne!(again.id, first.id);
    }

    #[tokio::test]
    async fn test_unknown_reservation_not_found() {
        let f = fixture().await;

        assert!(matches!(
            f.engine.get("missing").await,
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(
            f.engine.cancel("missing").await,
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(
            f.engine
                .update("missing", booking(&f.restaurant.id))
                .await,
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(
            f.engine.confirm("missing").await,
            Err(Error::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_stamp_never_goes_backwards() {
        let f = fixture().await;
        let created = f.engine.create(booking(&f.restaurant.id)).await.unwrap();

        let restaurants = f.engine.restaurants().clone();
        let rewound = ReservationEngine::new(restaurants, Arc::new(ManualClock::new(5)));
        let cancelled = rewound.cancel(&created.id).await.unwrap();
        assert_eq!(cancelled.updated_at, Some(created.created_at));
    }

    #[tokio::test]
    async fn test_available_tables() {
        let f = fixture().await;
        assert_eq!(
            f.engine
                .available_tables(&f.restaurant.id, "2024-01-01", "19:00")
                .await
                .unwrap(),
            vec![1, 2]
        );

        let held = f.engine.create(booking(&f.restaurant.id)).await.unwrap();
        assert_eq!(
            f.engine
                .available_tables(&f.restaurant.id, "2024-01-01", "19:00")
                .await
                .unwrap(),
            vec![2]
        );
        assert_eq!(
            f.engine
                .available_tables(&f.restaurant.id, "2024-01-01", "20:00")
                .await
                .unwrap(),
            vec![1, 2]
        );

        f.engine.cancel(&held.id).await.unwrap();
        assert_eq!(
            f.engine
                .available_tables(&f.restaurant.id, "2024-01-01", "19:00")
                .await
                .unwrap(),
            vec![1, 2]
        );
    }

    #[tokio::test]
    async fn test_restaurant_delete_guarded_by_active_reservations() {
        let f = fixture().await;
        let created = f.engine.create(booking(&f.restaurant.id)).await.unwrap();

        let result = f.engine.restaurants().delete(&f.restaurant.id).await;
        assert!(matches!(result, Err(Error::Conflict(_))));

        f.engine.cancel(&created.id).await.unwrap();
        f.engine
            .restaurants()
            .delete(&f.restaurant.id)
            .await
            .unwrap();

        // Cancelled reservations are kept.
        assert_eq!(
            f.engine
                .list_for_restaurant(&f.restaurant.id)
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_restaurant_update_keeps_booked_tables() {
        let f = fixture().await;
        f.engine.create(booking(&f.restaurant.id)).await.unwrap();

        let mut payload = RestaurantPayload {
            name: f.restaurant.name.clone(),
            location: f.restaurant.location.clone(),
            capacity: f.restaurant.capacity,
            opening_hours: f.restaurant.opening_hours.clone(),
            tables: vec![Table {
                id: 2,
                available: true,
            }],
        };
        let result = f
            .engine
            .restaurants()
            .update(&f.restaurant.id, payload.clone())
            .await;
        assert!(matches!(result, Err(Error::Conflict(_))));

        payload.tables = f.restaurant.tables.clone();
        payload.capacity = 1;
        let result = f
            .engine
            .restaurants()
            .update(&f.restaurant.id, payload.clone())
            .await;
        assert!(matches!(result, Err(Error::Conflict(_))));

        payload.capacity = 8;
        let updated = f
            .engine
            .restaurants()
            .update(&f.restaurant.id, payload)
            .await
            .unwrap();
        assert_eq!(updated.capacity, 8);
    }

    async fn second_restaurant(f: &Fixture) -> Restaurant {
        f.engine
            .restaurants()
            .create(RestaurantPayload {
                name: "Trattoria".to_string(),
                location: "Harbour Rd".to_string(),
                capacity: 6,
                opening_hours: OpeningHours {
                    start: "12:00".to_string(),
                    end: "23:00".to_string(),
                },
                tables: vec![Table {
                    id: 1,
                    available: true,
                }],
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_move_to_another_restaurant() {
        let f = fixture().await;
        let other = second_restaurant(&f).await;
        let created = f.engine.create(booking(&f.restaurant.id)).await.unwrap();

        let moved = f
            .engine
            .update(&created.id, booking(&other.id))
            .await
            .unwrap();
        assert_eq!(moved.restaurant_id, other.id);
        assert_eq!(moved.created_at, created.created_at);
        assert_eq!(f.engine.get(&created.id).await.unwrap(), moved);

        // The old slot is free, the new one is held.
        f.engine.create(booking(&f.restaurant.id)).await.unwrap();
        let result = f.engine.create(booking(&other.id)).await;
        assert!(matches!(result, Err(Error::Conflict(_))));
        assert!(f.engine.store().locks().is_empty());
    }

    #[tokio::test]
    async fn test_move_onto_held_slot_conflicts() {
        let f = fixture().await;
        let other = second_restaurant(&f).await;
        let created = f.engine.create(booking(&f.restaurant.id)).await.unwrap();
        f.engine.create(booking(&other.id)).await.unwrap();

        let result = f.engine.update(&created.id, booking(&other.id)).await;
        assert!(matches!(result, Err(Error::Conflict(_))));
        assert_eq!(f.engine.get(&created.id).await.unwrap(), created);
        assert!(f.engine.store().locks().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_restaurants_leave_no_lock_entries() {
        let f = fixture().await;

        for i in 0..100 {
            let result = f.engine.create(booking(&format!("ghost-{i}"))).await;
            assert!(matches!(result, Err(Error::Validation(_))));

            let result = f.engine.restaurants().delete(&format!("gone-{i}")).await;
            assert!(matches!(result, Err(Error::NotFound { .. })));
        }
        assert!(f.engine.store().locks().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_contact_info_is_validation() {
        let f = fixture().await;

        let result = f
            .engine
            .create(ReservationPayload {
                contact_info: "x".repeat(2_000),
                ..booking(&f.restaurant.id)
            })
            .await;
        assert!(matches!(result, Err(Error::Validation(_))));
        assert!(f.engine.list().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_creates_book_slot_once() {
        let f = fixture().await;
        let engine = Arc::new(f.engine);

        let mut handles = Vec::new();
        for _ in 0..16 {
            let engine = engine.clone();
            let payload = booking(&f.restaurant.id);
            handles.push(tokio::spawn(async move { engine.create(payload).await }));
        }

        let mut booked = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => booked += 1,
                Err(Error::Conflict(_)) => conflicts += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(booked, 1);
        assert_eq!(conflicts, 15);
    }
}
