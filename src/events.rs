//! State-change events for the external push layer
//!
//! The core's only obligation toward the realtime UI is to emit one event
//! per successful state transition. Delivery (sockets, pub/sub) is an
//! external collaborator behind the `EventSink` trait.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::inventory::RoomType;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum Event {
    /// A (hospital, room type) counter moved; carries the new count.
    AvailabilityChanged {
        hospital_id: String,
        room_type: RoomType,
        available: u32,
    },
    /// The OPD queue for a hospital changed (enqueue or advance).
    QueueChanged { hospital_id: String },
    /// The sweeper reclaimed an unconfirmed hold.
    ReservationExpired {
        reservation_id: String,
        hospital_id: String,
        room_type: RoomType,
    },
}

/// Seam to the notification layer. Implementations must not block.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: Event);
}

/// Fans events out to realtime subscribers over a tokio broadcast channel.
pub struct BroadcastSink {
    tx: broadcast::Sender<Event>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        BroadcastSink { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

impl EventSink for BroadcastSink {
    fn emit(&self, event: Event) {
        // No subscribers is fine; the push layer may not be attached yet.
        let _ = self.tx.send(event);
    }
}

/// Sink that drops everything, for contexts with no push layer.
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: Event) {}
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Records every emitted event so tests can assert exactly-once emission.
    #[derive(Default)]
    pub struct RecordingSink {
        events: Mutex<Vec<Event>>,
    }

    impl RecordingSink {
        pub fn new() -> Self {
            RecordingSink::default()
        }

        pub fn take(&self) -> Vec<Event> {
            std::mem::take(&mut *self.events.lock().unwrap())
        }

        pub fn len(&self) -> usize {
            self.events.lock().unwrap().len()
        }
    }

    impl EventSink for RecordingSink {
        fn emit(&self, event: Event) {
            self.events.lock().unwrap().push(event);
        }
    }
}
