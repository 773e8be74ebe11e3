//! Reservation ledger
//!
//! Creates, confirms, cancels, admits, and expires provisional holds against
//! the bed inventory. A hold decrements `available` the moment it is created
//! and gives it back on exactly one of cancel or expiry; confirmation and
//! admission keep the unit held. Lock order is always ledger map first, then
//! inventory, so transitions that touch both stay deadlock-free.

pub mod sweeper;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::events::{Event, EventSink};
use crate::inventory::{BedInventory, InventoryError, RoomType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Provisional,
    Confirmed,
    Admitted,
    Cancelled,
    Expired,
}

impl ReservationStatus {
    /// Terminal states never transition again; admitted beds are released
    /// only through an external discharge process.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ReservationStatus::Admitted | ReservationStatus::Cancelled | ReservationStatus::Expired
        )
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReservationStatus::Provisional => "provisional",
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::Admitted => "admitted",
            ReservationStatus::Cancelled => "cancelled",
            ReservationStatus::Expired => "expired",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientInfo {
    pub name: String,
    pub phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medical_condition: Option<String>,
}

/// A provisional-or-confirmed claim on one unit of a room type. A specific
/// bed is attached only at admission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub id: Uuid,
    pub hospital_id: String,
    pub room_type: RoomType,
    pub patient: PatientInfo,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    /// Only meaningful while the status is `provisional`.
    pub expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bed_id: Option<String>,
}

#[derive(Debug)]
pub enum ReservationError {
    /// No unit left at creation time. User-facing, never retried here.
    NoCapacity(String, RoomType),
    NotFound(Uuid),
    /// Confirm arrived after the hold's TTL elapsed.
    AlreadyExpired(Uuid),
    /// The reservation is not in the state the operation requires.
    InvalidState(Uuid, ReservationStatus),
    BedUnavailable(String),
    Inventory(InventoryError),
}

impl fmt::Display for ReservationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReservationError::NoCapacity(hospital, room) => {
                write!(f, "No {} beds available at {}", room, hospital)
            }
            ReservationError::NotFound(id) => write!(f, "Reservation {} not found", id),
            ReservationError::AlreadyExpired(id) => write!(f, "Reservation {} has expired", id),
            ReservationError::InvalidState(id, status) => {
                write!(f, "Reservation {} is {}", id, status)
            }
            ReservationError::BedUnavailable(bed) => write!(f, "Bed {} is not available", bed),
            ReservationError::Inventory(err) => write!(f, "Inventory error: {}", err),
        }
    }
}

impl std::error::Error for ReservationError {}

impl From<InventoryError> for ReservationError {
    fn from(err: InventoryError) -> Self {
        match err {
            InventoryError::BedUnavailable(bed) => ReservationError::BedUnavailable(bed),
            other => ReservationError::Inventory(other),
        }
    }
}

pub struct ReservationLedger {
    inventory: Arc<BedInventory>,
    reservations: RwLock<HashMap<Uuid, Reservation>>,
    events: Arc<dyn EventSink>,
    hold_ttl: Duration,
}

impl ReservationLedger {
    pub fn new(
        inventory: Arc<BedInventory>,
        events: Arc<dyn EventSink>,
        hold_ttl: Duration,
    ) -> Self {
        ReservationLedger {
            inventory,
            reservations: RwLock::new(HashMap::new()),
            events,
            hold_ttl,
        }
    }

    pub fn inventory(&self) -> &Arc<BedInventory> {
        &self.inventory
    }

    /// Places a provisional hold. The capacity check and decrement are one
    /// atomic `adjust` call; with one unit left, one of two concurrent
    /// callers gets the hold and the other gets `NoCapacity`.
    pub fn create_provisional(
        &self,
        hospital_id: &str,
        room_type: RoomType,
        patient: PatientInfo,
        now: DateTime<Utc>,
    ) -> Result<Reservation, ReservationError> {
        self.inventory
            .adjust(hospital_id, room_type, -1)
            .map_err(|err| match err {
                InventoryError::Capacity { .. } => {
                    ReservationError::NoCapacity(hospital_id.to_string(), room_type)
                }
                other => ReservationError::Inventory(other),
            })?;

        let reservation = Reservation {
            id: Uuid::new_v4(),
            hospital_id: hospital_id.to_string(),
            room_type,
            patient,
            status: ReservationStatus::Provisional,
            created_at: now,
            expires_at: now + self.hold_ttl,
            bed_id: None,
        };

        let mut reservations = self.reservations.write().unwrap();
        reservations.insert(reservation.id, reservation.clone());
        info!(id = %reservation.id, hospital = hospital_id, room = %room_type, "provisional hold created");
        Ok(reservation)
    }

    /// Converts a live hold into a durable booking. The unit stays held, so
    /// `available` does not move.
    pub fn confirm(&self, id: Uuid, now: DateTime<Utc>) -> Result<Reservation, ReservationError> {
        let mut reservations = self.reservations.write().unwrap();
        let reservation = reservations
            .get_mut(&id)
            .ok_or(ReservationError::NotFound(id))?;

        match reservation.status {
            ReservationStatus::Provisional if now <= reservation.expires_at => {
                reservation.status = ReservationStatus::Confirmed;
                info!(%id, "reservation confirmed");
                Ok(reservation.clone())
            }
            ReservationStatus::Provisional => {
                // Left for the sweeper to reclaim; the caller re-books.
                warn!(%id, "confirm rejected, hold already past its TTL");
                Err(ReservationError::AlreadyExpired(id))
            }
            status => Err(ReservationError::InvalidState(id, status)),
        }
    }

    /// Releases a hold or a confirmed booking. Cancelling a reservation
    /// already in a terminal state is a no-op that reports the terminal
    /// status, so double-clicks never error and never release twice.
    pub fn cancel(&self, id: Uuid) -> Result<Reservation, ReservationError> {
        let mut reservations = self.reservations.write().unwrap();
        let reservation = reservations
            .get_mut(&id)
            .ok_or(ReservationError::NotFound(id))?;

        match reservation.status {
            ReservationStatus::Provisional | ReservationStatus::Confirmed => {
                self.inventory
                    .adjust(&reservation.hospital_id, reservation.room_type, 1)?;
                reservation.status = ReservationStatus::Cancelled;
                info!(%id, "reservation cancelled");
                Ok(reservation.clone())
            }
            _ => Ok(reservation.clone()),
        }
    }

    /// Attaches a specific bed to a confirmed booking and marks it occupied.
    /// `available` already went down at hold creation, so it stays put.
    pub fn admit(&self, id: Uuid, bed_id: &str) -> Result<Reservation, ReservationError> {
        let mut reservations = self.reservations.write().unwrap();
        let reservation = reservations
            .get_mut(&id)
            .ok_or(ReservationError::NotFound(id))?;

        if reservation.status != ReservationStatus::Confirmed {
            return Err(ReservationError::InvalidState(id, reservation.status));
        }

        self.inventory.assign_bed(
            &reservation.hospital_id,
            reservation.room_type,
            bed_id,
            &reservation.patient.name,
        )?;
        reservation.status = ReservationStatus::Admitted;
        reservation.bed_id = Some(bed_id.to_string());
        info!(%id, bed = bed_id, "patient admitted");
        Ok(reservation.clone())
    }

    /// One sweeper pass: every hold still `provisional` past its deadline is
    /// flipped to `expired` and its unit released. The status re-check and
    /// the flip happen under the ledger write lock, so a hold confirmed or
    /// cancelled since selection is left untouched. Idempotent across
    /// overlapping sweeps.
    pub fn expire_overdue(&self, now: DateTime<Utc>) -> Vec<Reservation> {
        let mut reservations = self.reservations.write().unwrap();
        let mut expired = Vec::new();

        for reservation in reservations.values_mut() {
            if reservation.status != ReservationStatus::Provisional
                || reservation.expires_at >= now
            {
                continue;
            }
            if let Err(err) =
                self.inventory
                    .adjust(&reservation.hospital_id, reservation.room_type, 1)
            {
                // Inventory already logged the invariant breach; keep the
                // hold provisional so the next sweep retries.
                warn!(id = %reservation.id, %err, "could not release expired hold");
                continue;
            }
            reservation.status = ReservationStatus::Expired;
            self.events.emit(Event::ReservationExpired {
                reservation_id: reservation.id.to_string(),
                hospital_id: reservation.hospital_id.clone(),
                room_type: reservation.room_type,
            });
            info!(id = %reservation.id, "hold expired");
            expired.push(reservation.clone());
        }
        expired
    }

    pub fn get(&self, id: Uuid) -> Option<Reservation> {
        self.reservations.read().unwrap().get(&id).cloned()
    }

    /// Bookings for one patient, newest first. Identity is the phone number
    /// the auth layer hands us.
    pub fn list_by_patient(&self, phone: &str) -> Vec<Reservation> {
        let reservations = self.reservations.read().unwrap();
        let mut rows: Vec<Reservation> = reservations
            .values()
            .filter(|r| r.patient.phone == phone)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows
    }

    /// Bookings for one hospital, optionally filtered by status, newest
    /// first. Backs the admin console.
    pub fn list_by_hospital(
        &self,
        hospital_id: &str,
        status: Option<ReservationStatus>,
    ) -> Vec<Reservation> {
        let reservations = self.reservations.read().unwrap();
        let mut rows: Vec<Reservation> = reservations
            .values()
            .filter(|r| r.hospital_id == hospital_id)
            .filter(|r| status.map_or(true, |s| r.status == s))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows
    }

    #[cfg(test)]
    fn count_with_status(
        &self,
        hospital_id: &str,
        room_type: RoomType,
        status: ReservationStatus,
    ) -> u32 {
        let reservations = self.reservations.read().unwrap();
        reservations
            .values()
            .filter(|r| {
                r.hospital_id == hospital_id && r.room_type == room_type && r.status == status
            })
            .count() as u32
    }
}
