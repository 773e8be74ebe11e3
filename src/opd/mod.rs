//! OPD walk-in queue
//!
//! Hospital-scoped token queues for the outpatient department, independent
//! of bed inventory. Tokens are sequential per hospital per UTC calendar
//! day; the counter resets lazily on the first touch after midnight. All of
//! enqueue/advance happens under one write-lock acquisition per queue, so
//! two concurrent advances can never leave two entries in consultation or
//! skip a token.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::events::{Event, EventSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenStatus {
    Waiting,
    InConsultation,
    Done,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    pub token_number: u32,
    pub patient_name: String,
    pub patient_phone: String,
    pub department: String,
    pub status: TokenStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug)]
struct DayQueue {
    day: NaiveDate,
    next_token: u32,
    entries: Vec<QueueEntry>,
}

impl DayQueue {
    fn new(day: NaiveDate) -> Self {
        DayQueue {
            day,
            next_token: 1,
            entries: Vec::new(),
        }
    }
}

pub struct OpdQueue {
    queues: RwLock<HashMap<String, DayQueue>>,
    events: Arc<dyn EventSink>,
}

impl OpdQueue {
    pub fn new(events: Arc<dyn EventSink>) -> Self {
        OpdQueue {
            queues: RwLock::new(HashMap::new()),
            events,
        }
    }

    /// Issues the next token for the hospital's queue of the current day.
    pub fn enqueue(
        &self,
        hospital_id: &str,
        patient_name: &str,
        patient_phone: &str,
        department: &str,
        now: DateTime<Utc>,
    ) -> QueueEntry {
        let today = now.date_naive();
        let mut queues = self.queues.write().unwrap();
        let queue = queues
            .entry(hospital_id.to_string())
            .or_insert_with(|| DayQueue::new(today));
        if queue.day != today {
            *queue = DayQueue::new(today);
        }

        let entry = QueueEntry {
            token_number: queue.next_token,
            patient_name: patient_name.to_string(),
            patient_phone: patient_phone.to_string(),
            department: department.to_string(),
            status: TokenStatus::Waiting,
            created_at: now,
        };
        queue.next_token += 1;
        queue.entries.push(entry.clone());
        info!(
            hospital = hospital_id,
            token = entry.token_number,
            "opd token issued"
        );

        self.events.emit(Event::QueueChanged {
            hospital_id: hospital_id.to_string(),
        });
        entry
    }

    /// Entries in the order they will be served: the current in-consultation
    /// entry first if any, then waiting tokens ascending. Completed entries
    /// are not part of the serving order.
    pub fn status(&self, hospital_id: &str, now: DateTime<Utc>) -> Vec<QueueEntry> {
        let queues = self.queues.read().unwrap();
        let queue = match queues.get(hospital_id) {
            Some(queue) if queue.day == now.date_naive() => queue,
            _ => return Vec::new(),
        };

        let mut rows: Vec<QueueEntry> = queue
            .entries
            .iter()
            .filter(|e| e.status == TokenStatus::InConsultation)
            .cloned()
            .collect();
        let mut waiting: Vec<QueueEntry> = queue
            .entries
            .iter()
            .filter(|e| e.status == TokenStatus::Waiting)
            .cloned()
            .collect();
        waiting.sort_by_key(|e| e.token_number);
        rows.extend(waiting);
        rows
    }

    /// Completes the current consultation and calls the next token. Both
    /// steps happen under the queue's write lock, so concurrent advances
    /// serialize and the queue never holds two in-consultation entries.
    /// Returns `None` when no token is waiting, which is not an error.
    pub fn advance(&self, hospital_id: &str, now: DateTime<Utc>) -> Option<QueueEntry> {
        let today = now.date_naive();
        let mut queues = self.queues.write().unwrap();
        let queue = queues.get_mut(hospital_id)?;
        if queue.day != today {
            *queue = DayQueue::new(today);
            return None;
        }

        let mut moved = false;
        if let Some(current) = queue
            .entries
            .iter_mut()
            .find(|e| e.status == TokenStatus::InConsultation)
        {
            current.status = TokenStatus::Done;
            info!(
                hospital = hospital_id,
                token = current.token_number,
                "consultation done"
            );
            moved = true;
        }

        let promoted = queue
            .entries
            .iter_mut()
            .filter(|e| e.status == TokenStatus::Waiting)
            .min_by_key(|e| e.token_number)
            .map(|next| {
                next.status = TokenStatus::InConsultation;
                info!(
                    hospital = hospital_id,
                    token = next.token_number,
                    "token called in"
                );
                next.clone()
            });

        if moved || promoted.is_some() {
            self.events.emit(Event::QueueChanged {
                hospital_id: hospital_id.to_string(),
            });
        }
        promoted
    }
}
