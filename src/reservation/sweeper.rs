//! Expiry sweeper
//!
//! Periodic reclamation of unconfirmed holds. A sweep, not per-reservation
//! timers: the pending set is unbounded, and a sweep picks everything back
//! up after a restart. Each pass delegates to the ledger's conditional
//! expiry, so overlapping sweeps from several instances stay safe.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::oneshot;
use tokio::time::{self, MissedTickBehavior};
use tracing::info;

use super::ReservationLedger;

pub struct ExpirySweeper {
    ledger: Arc<ReservationLedger>,
    interval: Duration,
}

impl ExpirySweeper {
    pub fn new(ledger: Arc<ReservationLedger>, interval: Duration) -> Self {
        ExpirySweeper { ledger, interval }
    }

    /// One pass at the current wall clock. Returns how many holds were
    /// reclaimed.
    pub fn sweep(&self) -> usize {
        self.ledger.expire_overdue(Utc::now()).len()
    }

    /// Runs sweeps on a fixed interval until the shutdown signal fires.
    pub async fn run(self, mut shutdown: oneshot::Receiver<()>) {
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick fires immediately, which doubles as a catch-up
        // pass for holds that went overdue while the process was down.
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let reclaimed = self.sweep();
                    if reclaimed > 0 {
                        info!(reclaimed, "sweeper released expired holds");
                    }
                }
                _ = &mut shutdown => {
                    info!("sweeper shutting down");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::testing::RecordingSink;
    use crate::inventory::{BedInventory, RoomType};
    use crate::reservation::{PatientInfo, ReservationStatus};
    use pretty_assertions::assert_eq;

    fn ledger_with_one_icu_bed() -> Arc<ReservationLedger> {
        let sink = Arc::new(RecordingSink::new());
        let inventory = Arc::new(BedInventory::new(sink.clone()));
        inventory.register_hospital("h1", "City Hospital");
        inventory
            .register_room("h1", RoomType::Icu, 5000, &["icu-1".to_string()])
            .unwrap();
        Arc::new(ReservationLedger::new(
            inventory,
            sink,
            chrono::Duration::minutes(15),
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn run_loop_reclaims_overdue_holds_and_stops_on_shutdown() {
        let ledger = ledger_with_one_icu_bed();
        let stale_start = Utc::now() - chrono::Duration::minutes(20);
        let hold = ledger
            .create_provisional(
                "h1",
                RoomType::Icu,
                PatientInfo {
                    name: "Asha Rao".to_string(),
                    phone: "555-0101".to_string(),
                    age: None,
                    medical_condition: None,
                },
                stale_start,
            )
            .unwrap();

        let sweeper = ExpirySweeper::new(Arc::clone(&ledger), Duration::from_secs(30));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(sweeper.run(shutdown_rx));

        // First tick is immediate; yield so the task gets to run it.
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(
            ledger.get(hold.id).unwrap().status,
            ReservationStatus::Expired
        );

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }

    #[test]
    fn sweep_returns_reclaimed_count() {
        let ledger = ledger_with_one_icu_bed();
        let stale_start = Utc::now() - chrono::Duration::minutes(20);
        ledger
            .create_provisional(
                "h1",
                RoomType::Icu,
                PatientInfo {
                    name: "Vik Shah".to_string(),
                    phone: "555-0102".to_string(),
                    age: None,
                    medical_condition: None,
                },
                stale_start,
            )
            .unwrap();

        let sweeper = ExpirySweeper::new(Arc::clone(&ledger), Duration::from_secs(30));
        assert_eq!(sweeper.sweep(), 1);
        assert_eq!(sweeper.sweep(), 0);
    }
}
