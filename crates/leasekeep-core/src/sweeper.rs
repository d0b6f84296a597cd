//! Expiry sweeper.
//!
//! Periodically reclaims leases whose window has passed. Each lease is
//! released in its own transaction through the ledger; a failure on one
//! lease is logged and left for the next tick, since release is idempotent.

use crate::config::{RotationSection, SweeperSection};
use crate::errors::LeaseError;
use crate::ledger::{LeaseLedger, ReleaseOutcome};
use chrono::Duration;
use serde::Serialize;
use std::time::Duration as StdDuration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Counts from one sweep pass (observability only).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Lapsed leases found.
    pub scanned: usize,
    /// Leases transitioned to `expired` by this pass.
    pub reclaimed: usize,
    /// Leases whose release failed; retried next tick.
    pub failed: usize,
}

#[derive(Clone)]
pub struct ExpirySweeper {
    ledger: LeaseLedger,
    interval: StdDuration,
    rotation_delay: Duration,
}

impl ExpirySweeper {
    pub fn new(ledger: LeaseLedger, sweeper: &SweeperSection, rotation: &RotationSection) -> Self {
        Self {
            ledger,
            interval: sweeper.interval(),
            rotation_delay: Duration::minutes(i64::from(rotation.delay_minutes)),
        }
    }

    pub fn interval(&self) -> StdDuration {
        self.interval
    }

    /// One reclamation pass.
    ///
    /// Errors only if the lapsed set cannot be read; per-lease failures are
    /// counted in the report.
    pub fn sweep_once(&self) -> Result<SweepReport, LeaseError> {
        let lapsed = self.ledger.lapsed()?;
        let mut report = SweepReport {
            scanned: lapsed.len(),
            ..SweepReport::default()
        };

        for lease in lapsed {
            match self.ledger.release_lapsed(lease.id, self.rotation_delay) {
                Ok(ReleaseOutcome::Released(released)) => {
                    report.reclaimed += 1;
                    debug!(
                        lease_id = released.id,
                        resource_id = released.resource_id,
                        "lapsed lease reclaimed"
                    );
                }
                Ok(ReleaseOutcome::AlreadyTerminal(_)) => {}
                Err(e) => {
                    report.failed += 1;
                    warn!(lease_id = lease.id, error = %e, "failed to reclaim lapsed lease");
                }
            }
        }

        if report.reclaimed > 0 || report.failed > 0 {
            info!(
                scanned = report.scanned,
                reclaimed = report.reclaimed,
                failed = report.failed,
                "sweep finished"
            );
        }
        Ok(report)
    }

    /// Run [`sweep_once`](Self::sweep_once) on a fixed interval in a
    /// background task until the returned handle is stopped.
    ///
    /// A pass that has started always finishes before shutdown is observed.
    pub fn spawn(self) -> SweeperHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run_loop(shutdown_rx));
        SweeperHandle { shutdown_tx, task }
    }

    async fn run_loop(self, mut shutdown_rx: watch::Receiver<bool>) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(interval_secs = self.interval.as_secs_f64(), "expiry sweeper started");

        loop {
            tokio::select! {
                biased;
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    let sweeper = self.clone();
                    match tokio::task::spawn_blocking(move || sweeper.sweep_once()).await {
                        Ok(Ok(_)) => {}
                        Ok(Err(e)) => warn!(error = %e, "sweep pass failed; retrying next tick"),
                        Err(e) => error!(error = %e, "sweep pass panicked"),
                    }
                }
            }
        }

        info!("expiry sweeper stopped");
    }
}

/// Handle to a running sweeper task.
pub struct SweeperHandle {
    shutdown_tx: watch::Sender<bool>,
    task: tokio::task::JoinHandle<()>,
}

impl SweeperHandle {
    /// Signal shutdown and wait for the in-flight pass, if any, to finish.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.task.await;
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditLog;
    use crate::clock::{Clock, ManualClock};
    use crate::config::LeaseSection;
    use crate::inventory::Inventory;
    use crate::ledger::AllocationOutcome;
    use crate::model::{AuditKind, LeaseStatus, NotificationKind};
    use crate::outbox::NotificationOutbox;
    use crate::storage::Store;
    use std::sync::Arc;

    struct Fixture {
        store: Store,
        clock: ManualClock,
        inventory: Inventory,
        ledger: LeaseLedger,
        audit: AuditLog,
        outbox: NotificationOutbox,
        sweeper: ExpirySweeper,
    }

    fn fixture() -> Fixture {
        let store = Store::memory().unwrap();
        let clock = ManualClock::starting_now();
        let shared: Arc<dyn Clock> = Arc::new(clock.clone());
        let ledger = LeaseLedger::new(store.clone(), shared.clone(), &LeaseSection::default());
        Fixture {
            inventory: Inventory::new(store.clone(), shared.clone(), "admin"),
            sweeper: ExpirySweeper::new(
                ledger.clone(),
                &SweeperSection::default(),
                &RotationSection::default(),
            ),
            ledger,
            audit: AuditLog::new(store.clone(), shared.clone()),
            outbox: NotificationOutbox::new(store.clone(), shared),
            store,
            clock,
        }
    }

    fn lease_one(f: &Fixture, requester: &str, hours: u32) -> crate::model::Lease {
        let r = f.inventory.register("dota", requester).unwrap();
        match f.ledger.allocate(r.id, requester, hours, 0).unwrap() {
            AllocationOutcome::Granted(lease) => lease,
            other => panic!("expected grant, got {other:?}"),
        }
    }

    #[test]
    fn test_nothing_to_sweep_before_expiry() {
        let f = fixture();
        lease_one(&f, "u1", 1);
        f.clock.advance(Duration::minutes(59));

        assert_eq!(f.sweeper.sweep_once().unwrap(), SweepReport::default());
    }

    #[test]
    fn test_sweep_reclaims_and_is_idempotent() {
        let f = fixture();
        let lease = lease_one(&f, "u1", 1);
        f.clock.advance(Duration::minutes(61));

        let report = f.sweeper.sweep_once().unwrap();
        assert_eq!(
            report,
            SweepReport {
                scanned: 1,
                reclaimed: 1,
                failed: 0
            }
        );

        let lease = f.ledger.get(lease.id).unwrap();
        assert_eq!(lease.status, LeaseStatus::Expired);
        assert!(f.inventory.get(lease.resource_id).unwrap().available);

        assert_eq!(f.sweeper.sweep_once().unwrap(), SweepReport::default());
        assert_eq!(f.audit.count_kind(AuditKind::LeaseEnd).unwrap(), 1);
        assert_eq!(f.outbox.for_lease(lease.id).unwrap().len(), 1);
    }

    #[test]
    fn test_lapse_notification_schedules_rotation() {
        let f = fixture();
        let lease = lease_one(&f, "u1", 1);
        f.clock.advance(Duration::hours(2));
        f.sweeper.sweep_once().unwrap();

        let notes = f.outbox.unread("u1").unwrap();
        assert_eq!(notes.len(), 1);
        let note = &notes[0];
        assert_eq!(note.kind, NotificationKind::LeaseLapsed);
        assert_eq!(note.lease_id, Some(lease.id));
        assert_eq!(note.resource_id, Some(lease.resource_id));
        assert_eq!(
            note.rotate_after,
            Some(f.clock.now() + Duration::minutes(5))
        );
    }

    #[test]
    fn test_sweep_only_touches_lapsed_leases() {
        let f = fixture();
        let short = lease_one(&f, "u1", 1);
        let long = lease_one(&f, "u2", 3);
        f.clock.advance(Duration::minutes(90));

        let report = f.sweeper.sweep_once().unwrap();
        assert_eq!(report.reclaimed, 1);
        assert_eq!(f.ledger.get(short.id).unwrap().status, LeaseStatus::Expired);
        assert_eq!(f.ledger.get(long.id).unwrap().status, LeaseStatus::Active);
    }

    #[test]
    fn test_sweep_skips_leases_released_in_between() {
        let f = fixture();
        let lease = lease_one(&f, "u1", 1);
        f.clock.advance(Duration::minutes(61));
        f.ledger.release(lease.id, LeaseStatus::Expired).unwrap();

        let report = f.sweeper.sweep_once().unwrap();
        assert_eq!(report.reclaimed, 0);
        assert!(f.outbox.for_lease(lease.id).unwrap().is_empty());
    }

    #[test]
    fn test_failed_lease_does_not_block_others_and_is_retried() {
        let f = fixture();
        let leases: Vec<_> = ["u1", "u2", "u3"]
            .into_iter()
            .map(|requester| lease_one(&f, requester, 1))
            .collect();
        let stuck = leases[1].id;
        f.store
            .immediate(|conn| {
                conn.execute_batch(&format!(
                    "CREATE TRIGGER stuck_lease BEFORE UPDATE ON leases WHEN OLD.id = {stuck}
                     BEGIN SELECT RAISE(ABORT, 'lease row locked'); END;"
                ))?;
                Ok(())
            })
            .unwrap();
        f.clock.advance(Duration::minutes(61));

        assert_eq!(
            f.sweeper.sweep_once().unwrap(),
            SweepReport {
                scanned: 3,
                reclaimed: 2,
                failed: 1
            }
        );
        assert_eq!(f.ledger.get(leases[0].id).unwrap().status, LeaseStatus::Expired);
        assert_eq!(f.ledger.get(stuck).unwrap().status, LeaseStatus::Active);
        assert_eq!(f.ledger.get(leases[2].id).unwrap().status, LeaseStatus::Expired);
        // The failed release rolled back as a whole.
        assert!(!f.inventory.get(leases[1].resource_id).unwrap().available);
        assert!(f.outbox.for_lease(stuck).unwrap().is_empty());

        f.store
            .immediate(|conn| {
                conn.execute_batch("DROP TRIGGER stuck_lease;")?;
                Ok(())
            })
            .unwrap();

        assert_eq!(
            f.sweeper.sweep_once().unwrap(),
            SweepReport {
                scanned: 1,
                reclaimed: 1,
                failed: 0
            }
        );
        for lease in &leases {
            assert_eq!(f.ledger.get(lease.id).unwrap().status, LeaseStatus::Expired);
        }
        assert_eq!(f.audit.count_kind(AuditKind::LeaseEnd).unwrap(), 3);
    }
}
