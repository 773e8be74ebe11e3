//! Bed inventory
//!
//! Source of truth for "available beds" per (hospital, room type). The
//! `adjust` gate is the single place capacity moves, and it holds the write
//! lock across check-and-apply so two callers can never both take the last
//! unit. The reservation ledger and the expiry sweeper are its only writers.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::events::{Event, EventSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomType {
    General,
    Icu,
    Private,
}

impl fmt::Display for RoomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoomType::General => write!(f, "general"),
            RoomType::Icu => write!(f, "icu"),
            RoomType::Private => write!(f, "private"),
        }
    }
}

/// A physical bed, the finest-grained unit. The room counter stays the
/// coarse capacity gate; beds only matter at admission time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bed {
    pub id: String,
    pub room_type: RoomType,
    pub occupied: bool,
    pub patient: Option<String>,
}

/// Read-only availability snapshot row, served on `GET /hospitals/:id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomAvailability {
    pub room_type: RoomType,
    pub available: u32,
    pub total: u32,
    pub price: u32,
}

#[derive(Debug)]
struct RoomRecord {
    total: u32,
    available: u32,
    price: u32,
    beds: Vec<Bed>,
}

#[derive(Debug)]
struct HospitalRecord {
    name: String,
    rooms: HashMap<RoomType, RoomRecord>,
}

#[derive(Debug)]
pub enum InventoryError {
    UnknownHospital(String),
    UnknownRoom(String, RoomType),
    /// The adjustment would leave `available` outside `[0, total]`.
    Capacity {
        hospital_id: String,
        room_type: RoomType,
        available: u32,
        total: u32,
        delta: i32,
    },
    BedUnavailable(String),
}

impl fmt::Display for InventoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InventoryError::UnknownHospital(id) => write!(f, "Unknown hospital: {}", id),
            InventoryError::UnknownRoom(id, room) => {
                write!(f, "Hospital {} has no {} rooms", id, room)
            }
            InventoryError::Capacity {
                hospital_id,
                room_type,
                available,
                total,
                delta,
            } => write!(
                f,
                "Adjustment {} would leave {}/{} at {}/{}",
                delta, hospital_id, room_type, available, total
            ),
            InventoryError::BedUnavailable(id) => write!(f, "Bed {} is not available", id),
        }
    }
}

impl std::error::Error for InventoryError {}

pub struct BedInventory {
    hospitals: RwLock<HashMap<String, HospitalRecord>>,
    events: Arc<dyn EventSink>,
}

impl BedInventory {
    pub fn new(events: Arc<dyn EventSink>) -> Self {
        BedInventory {
            hospitals: RwLock::new(HashMap::new()),
            events,
        }
    }

    /// Registers a hospital. Provisioning comes from config seed data;
    /// hospital CRUD itself belongs to an external admin workflow.
    pub fn register_hospital(&self, id: &str, name: &str) {
        let mut hospitals = self.hospitals.write().unwrap();
        hospitals
            .entry(id.to_string())
            .or_insert_with(|| HospitalRecord {
                name: name.to_string(),
                rooms: HashMap::new(),
            });
    }

    /// Registers a room type for a hospital with all beds empty.
    pub fn register_room(
        &self,
        hospital_id: &str,
        room_type: RoomType,
        price: u32,
        bed_ids: &[String],
    ) -> Result<(), InventoryError> {
        let mut hospitals = self.hospitals.write().unwrap();
        let hospital = hospitals
            .get_mut(hospital_id)
            .ok_or_else(|| InventoryError::UnknownHospital(hospital_id.to_string()))?;

        let beds: Vec<Bed> = bed_ids
            .iter()
            .map(|id| Bed {
                id: id.clone(),
                room_type,
                occupied: false,
                patient: None,
            })
            .collect();

        let total = beds.len() as u32;
        hospital.rooms.insert(
            room_type,
            RoomRecord {
                total,
                available: total,
                price,
                beds,
            },
        );
        Ok(())
    }

    pub fn hospital_name(&self, hospital_id: &str) -> Result<String, InventoryError> {
        let hospitals = self.hospitals.read().unwrap();
        hospitals
            .get(hospital_id)
            .map(|h| h.name.clone())
            .ok_or_else(|| InventoryError::UnknownHospital(hospital_id.to_string()))
    }

    /// Availability snapshot for one hospital, every row within `[0, total]`.
    pub fn availability(&self, hospital_id: &str) -> Result<Vec<RoomAvailability>, InventoryError> {
        let hospitals = self.hospitals.read().unwrap();
        let hospital = hospitals
            .get(hospital_id)
            .ok_or_else(|| InventoryError::UnknownHospital(hospital_id.to_string()))?;

        let mut rows: Vec<RoomAvailability> = hospital
            .rooms
            .iter()
            .map(|(&room_type, record)| RoomAvailability {
                room_type,
                available: record.available,
                total: record.total,
                price: record.price,
            })
            .collect();
        rows.sort_by_key(|row| row.room_type.to_string());
        Ok(rows)
    }

    /// Atomic capacity adjustment. The check and the write happen under one
    /// write-lock acquisition; callers never read-then-write around it.
    /// Emits one `AvailabilityChanged` per successful call.
    pub fn adjust(
        &self,
        hospital_id: &str,
        room_type: RoomType,
        delta: i32,
    ) -> Result<u32, InventoryError> {
        let mut hospitals = self.hospitals.write().unwrap();
        let record = room_mut(&mut hospitals, hospital_id, room_type)?;

        let next = record.available as i64 + delta as i64;
        if next < 0 || next > record.total as i64 {
            let err = InventoryError::Capacity {
                hospital_id: hospital_id.to_string(),
                room_type,
                available: record.available,
                total: record.total,
                delta,
            };
            if delta > 0 {
                // Releasing a unit that would overflow total means a double
                // release upstream. That is a bug, not contention.
                error!(%hospital_id, %room_type, delta, "capacity invariant violation");
            }
            return Err(err);
        }

        record.available = next as u32;
        let available = record.available;
        self.events.emit(Event::AvailabilityChanged {
            hospital_id: hospital_id.to_string(),
            room_type,
            available,
        });
        Ok(available)
    }

    /// Marks a specific bed occupied for an admission. The bed must belong
    /// to the given hospital and room type and be free.
    pub fn assign_bed(
        &self,
        hospital_id: &str,
        room_type: RoomType,
        bed_id: &str,
        patient: &str,
    ) -> Result<(), InventoryError> {
        let mut hospitals = self.hospitals.write().unwrap();
        let record = room_mut(&mut hospitals, hospital_id, room_type)?;

        let bed = record
            .beds
            .iter_mut()
            .find(|bed| bed.id == bed_id)
            .ok_or_else(|| InventoryError::BedUnavailable(bed_id.to_string()))?;
        if bed.occupied {
            return Err(InventoryError::BedUnavailable(bed_id.to_string()));
        }
        bed.occupied = true;
        bed.patient = Some(patient.to_string());
        Ok(())
    }

    pub fn occupied_count(&self, hospital_id: &str, room_type: RoomType) -> u32 {
        let hospitals = self.hospitals.read().unwrap();
        hospitals
            .get(hospital_id)
            .and_then(|h| h.rooms.get(&room_type))
            .map(|r| r.beds.iter().filter(|b| b.occupied).count() as u32)
            .unwrap_or(0)
    }
}

fn room_mut<'a>(
    hospitals: &'a mut HashMap<String, HospitalRecord>,
    hospital_id: &str,
    room_type: RoomType,
) -> Result<&'a mut RoomRecord, InventoryError> {
    let hospital = hospitals
        .get_mut(hospital_id)
        .ok_or_else(|| InventoryError::UnknownHospital(hospital_id.to_string()))?;
    hospital
        .rooms
        .get_mut(&room_type)
        .ok_or_else(|| InventoryError::UnknownRoom(hospital_id.to_string(), room_type))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::testing::RecordingSink;
    use pretty_assertions::assert_eq;

    fn seeded(sink: Arc<RecordingSink>) -> BedInventory {
        let inventory = BedInventory::new(sink);
        inventory.register_hospital("h1", "City Hospital");
        inventory
            .register_room(
                "h1",
                RoomType::Icu,
                5000,
                &["icu-1".to_string(), "icu-2".to_string()],
            )
            .unwrap();
        inventory
    }

    #[test]
    fn availability_reflects_registered_beds() {
        let inventory = seeded(Arc::new(RecordingSink::new()));
        let rows = inventory.availability("h1").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].available, 2);
        assert_eq!(rows[0].total, 2);
        assert_eq!(rows[0].price, 5000);
    }

    #[test]
    fn adjust_refuses_to_cross_bounds() {
        let inventory = seeded(Arc::new(RecordingSink::new()));

        assert_eq!(inventory.adjust("h1", RoomType::Icu, -1).unwrap(), 1);
        assert_eq!(inventory.adjust("h1", RoomType::Icu, -1).unwrap(), 0);
        assert!(matches!(
            inventory.adjust("h1", RoomType::Icu, -1),
            Err(InventoryError::Capacity { .. })
        ));

        assert_eq!(inventory.adjust("h1", RoomType::Icu, 2).unwrap(), 2);
        assert!(matches!(
            inventory.adjust("h1", RoomType::Icu, 1),
            Err(InventoryError::Capacity { .. })
        ));
    }

    #[test]
    fn every_successful_adjustment_emits_one_event() {
        let sink = Arc::new(RecordingSink::new());
        let inventory = seeded(Arc::clone(&sink));

        inventory.adjust("h1", RoomType::Icu, -1).unwrap();
        inventory.adjust("h1", RoomType::Icu, 1).unwrap();
        inventory.adjust("h1", RoomType::Icu, -2).unwrap();
        // Refused adjustment must not emit.
        let _ = inventory.adjust("h1", RoomType::Icu, -1);

        let events = sink.take();
        assert_eq!(events.len(), 3);
        match &events[2] {
            Event::AvailabilityChanged {
                hospital_id,
                room_type,
                available,
            } => {
                assert_eq!(hospital_id, "h1");
                assert_eq!(*room_type, RoomType::Icu);
                assert_eq!(*available, 0);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn assign_bed_rejects_occupied_and_unknown_beds() {
        let inventory = seeded(Arc::new(RecordingSink::new()));

        inventory
            .assign_bed("h1", RoomType::Icu, "icu-1", "Asha Rao")
            .unwrap();
        assert!(matches!(
            inventory.assign_bed("h1", RoomType::Icu, "icu-1", "Vik Shah"),
            Err(InventoryError::BedUnavailable(_))
        ));
        assert!(matches!(
            inventory.assign_bed("h1", RoomType::Icu, "icu-9", "Vik Shah"),
            Err(InventoryError::BedUnavailable(_))
        ));
        assert_eq!(inventory.occupied_count("h1", RoomType::Icu), 1);
    }

    #[test]
    fn unknown_hospital_and_room_are_distinct_errors() {
        let inventory = seeded(Arc::new(RecordingSink::new()));
        assert!(matches!(
            inventory.adjust("nope", RoomType::Icu, -1),
            Err(InventoryError::UnknownHospital(_))
        ));
        assert!(matches!(
            inventory.adjust("h1", RoomType::Private, -1),
            Err(InventoryError::UnknownRoom(_, _))
        ));
    }

    #[test]
    fn concurrent_decrements_never_oversell() {
        let sink = Arc::new(RecordingSink::new());
        let inventory = Arc::new(BedInventory::new(sink));
        inventory.register_hospital("h1", "City Hospital");
        let beds: Vec<String> = (0..4).map(|i| format!("gen-{}", i)).collect();
        inventory
            .register_room("h1", RoomType::General, 1500, &beds)
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let inventory = Arc::clone(&inventory);
            handles.push(std::thread::spawn(move || {
                inventory.adjust("h1", RoomType::General, -1).is_ok()
            }));
        }

        let succeeded = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&ok| ok)
            .count();
        assert_eq!(succeeded, 4);
        let rows = inventory.availability("h1").unwrap();
        assert_eq!(rows[0].available, 0);
    }
}
