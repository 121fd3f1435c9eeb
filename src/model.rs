//! Records and input payloads.
//!
//! Stored records serialize with camelCase field names. Payloads default
//! every field so an absent field reaches validation as an empty value and is
//! reported as missing, the same as an explicitly empty one.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::error::{Error, Result};

/// Time-of-day window a restaurant is open.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpeningHours {
    pub start: String,
    pub end: String,
}

/// A bookable table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub id: u32,
    /// Whether the table can be booked at all.
    pub available: bool,
}

/// A stored restaurant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Restaurant {
    pub id: String,
    pub name: String,
    pub location: String,
    pub capacity: u32,
    pub opening_hours: OpeningHours,
    pub tables: Vec<Table>,
}

impl Restaurant {
    pub(crate) fn from_payload(id: String, payload: RestaurantPayload) -> Self {
        Self {
            id,
            name: payload.name,
            location: payload.location,
            capacity: payload.capacity,
            opening_hours: payload.opening_hours,
            tables: payload.tables,
        }
    }

    /// Look up a table by id.
    pub fn table(&self, table_id: u32) -> Option<&Table> {
        self.tables.iter().find(|table| table.id == table_id)
    }
}

/// Input for creating or replacing a restaurant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RestaurantPayload {
    pub name: String,
    pub location: String,
    pub capacity: u32,
    pub opening_hours: OpeningHours,
    pub tables: Vec<Table>,
}

impl RestaurantPayload {
    /// Check that every field is present and table ids are usable.
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if is_blank(&self.name) {
            missing.push("name");
        }
        if is_blank(&self.location) {
            missing.push("location");
        }
        if self.capacity == 0 {
            missing.push("capacity");
        }
        if is_blank(&self.opening_hours.start) || is_blank(&self.opening_hours.end) {
            missing.push("openingHours");
        }
        reject_missing(&missing)?;

        let mut seen = HashSet::with_capacity(self.tables.len());
        for table in &self.tables {
            if table.id == 0 {
                return Err(Error::validation("table ids must be non-zero"));
            }
            if !seen.insert(table.id) {
                return Err(Error::validation(format!(
                    "duplicate table id {}",
                    table.id
                )));
            }
        }
        Ok(())
    }
}

/// Reservation lifecycle state.
///
/// ```text
/// pending ──► confirmed ──► cancelled
///    └──────────────────────────▲
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl ReservationStatus {
    /// Pending and confirmed reservations hold their slot.
    pub fn is_active(self) -> bool {
        !matches!(self, ReservationStatus::Cancelled)
    }

    /// Whether a reservation in `self` may move to `next`.
    ///
    /// Active states may stay where they are so details can be edited.
    /// Nothing leaves `cancelled`.
    pub fn can_transition_to(self, next: ReservationStatus) -> bool {
        use ReservationStatus::*;
        matches!(
            (self, next),
            (Pending, Pending)
                | (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Confirmed, Confirmed)
                | (Confirmed, Cancelled)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One bookable unit of table-time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Slot<'a> {
    pub restaurant_id: &'a str,
    pub table_id: u32,
    pub date: &'a str,
    pub time: &'a str,
}

/// A stored reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub id: String,
    pub restaurant_id: String,
    pub date: String,
    pub time: String,
    pub party_size: u32,
    pub contact_info: String,
    pub table_id: u32,
    pub status: ReservationStatus,
    /// Nanoseconds; set once at creation.
    pub created_at: u64,
    /// Nanoseconds; stamped by every mutation.
    pub updated_at: Option<u64>,
}

impl Reservation {
    pub fn slot(&self) -> Slot<'_> {
        Slot {
            restaurant_id: &self.restaurant_id,
            table_id: self.table_id,
            date: &self.date,
            time: &self.time,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

/// Input for creating or replacing a reservation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReservationPayload {
    pub restaurant_id: String,
    pub date: String,
    pub time: String,
    pub party_size: u32,
    pub contact_info: String,
    pub table_id: u32,
    pub status: Option<ReservationStatus>,
}

impl From<&Reservation> for ReservationPayload {
    fn from(reservation: &Reservation) -> Self {
        Self {
            restaurant_id: reservation.restaurant_id.clone(),
            date: reservation.date.clone(),
            time: reservation.time.clone(),
            party_size: reservation.party_size,
            contact_info: reservation.contact_info.clone(),
            table_id: reservation.table_id,
            status: Some(reservation.status),
        }
    }
}

impl ReservationPayload {
    /// Check that every field is present and produce a typed request.
    pub fn validate(self) -> Result<ReservationRequest> {
        let mut missing = Vec::new();
        if is_blank(&self.restaurant_id) {
            missing.push("restaurantId");
        }
        if is_blank(&self.date) {
            missing.push("date");
        }
        if is_blank(&self.time) {
            missing.push("time");
        }
        if self.party_size == 0 {
            missing.push("partySize");
        }
        if is_blank(&self.contact_info) {
            missing.push("contactInfo");
        }
        if self.table_id == 0 {
            missing.push("tableId");
        }
        if self.status.is_none() {
            missing.push("status");
        }
        reject_missing(&missing)?;

        Ok(ReservationRequest {
            restaurant_id: self.restaurant_id,
            date: self.date,
            time: self.time,
            party_size: self.party_size,
            contact_info: self.contact_info,
            table_id: self.table_id,
            status: self.status.unwrap_or(ReservationStatus::Pending),
        })
    }
}

/// A reservation payload that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationRequest {
    pub restaurant_id: String,
    pub date: String,
    pub time: String,
    pub party_size: u32,
    pub contact_info: String,
    pub table_id: u32,
    pub status: ReservationStatus,
}

impl ReservationRequest {
    pub fn slot(&self) -> Slot<'_> {
        Slot {
            restaurant_id: &self.restaurant_id,
            table_id: self.table_id,
            date: &self.date,
            time: &self.time,
        }
    }
}

/// The customer-editable part of a reservation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReservationDetails {
    pub date: String,
    pub time: String,
    pub party_size: u32,
    pub contact_info: String,
    pub table_id: u32,
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

fn reject_missing(missing: &[&str]) -> Result<()> {
    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::validation(format!(
            "invalid payload: missing {}",
            missing.join(", ")
        )))
    }
}
