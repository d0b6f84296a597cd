//! Lease ledger: the only writer of lease records and resource availability.
//!
//! Allocation and release each run as one `BEGIN IMMEDIATE` transaction:
//!
//! 1. Re-read the resource / lease under the write lock
//! 2. Compare-and-swap the availability flag (`... WHERE available = 1`)
//! 3. Insert or transition the lease row
//! 4. Append the audit entry (and outbox entry, for sweeps)
//!
//! A second allocation racing for the same resource observes the committed
//! flag and is denied. The partial unique index on active leases backs the
//! same invariant at the storage layer.

use crate::audit::append_in;
use crate::clock::Clock;
use crate::config::LeaseSection;
use crate::credits::{available_in, consume_in, ConsumeOutcome};
use crate::errors::LeaseError;
use crate::inventory::get_in as get_resource_in;
use crate::model::{AuditKind, Lease, LeaseStatus, NotificationKind};
use crate::outbox::{push_in, NewNotification};
use crate::storage::rows::{lease_from_row, LEASE_COLUMNS};
use crate::storage::{fmt_ts, Store};
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Why an allocation did not happen. These are normal outcomes, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// The resource is held by an active lease (or the race was lost).
    AlreadyLeased,
    /// Not enough unconsumed bonus minutes to apply.
    InsufficientCredit { shortfall: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllocationOutcome {
    Granted(Lease),
    Denied(DenyReason),
}

impl AllocationOutcome {
    pub fn lease(&self) -> Option<&Lease> {
        match self {
            Self::Granted(lease) => Some(lease),
            Self::Denied(_) => None,
        }
    }

    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// This call performed the transition.
    Released(Lease),
    /// The lease was already terminal; nothing changed.
    AlreadyTerminal(Lease),
}

impl ReleaseOutcome {
    pub fn was_released(&self) -> bool {
        matches!(self, Self::Released(_))
    }

    pub fn lease(&self) -> &Lease {
        match self {
            Self::Released(lease) | Self::AlreadyTerminal(lease) => lease,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum BonusSource {
    /// Minutes already settled by the caller.
    Applied,
    /// Draw the minutes from the requester's bonus credits in the same
    /// transaction.
    Credits,
}

fn get_lease_in(conn: &Connection, lease_id: i64) -> Result<Option<Lease>, LeaseError> {
    Ok(conn
        .query_row(
            &format!("SELECT {LEASE_COLUMNS} FROM leases WHERE id = ?1"),
            [lease_id],
            lease_from_row,
        )
        .optional()?)
}

/// Human rendering of a remaining duration, e.g. `2h 05m`.
pub fn format_remaining(remaining: Duration) -> String {
    if remaining <= Duration::zero() {
        return "expired".to_string();
    }
    let minutes = remaining.num_minutes();
    format!("{}h {:02}m", minutes / 60, minutes % 60)
}

#[derive(Clone)]
pub struct LeaseLedger {
    store: Store,
    clock: Arc<dyn Clock>,
    max_duration_hours: u32,
}

impl LeaseLedger {
    pub fn new(store: Store, clock: Arc<dyn Clock>, config: &LeaseSection) -> Self {
        Self {
            store,
            clock,
            max_duration_hours: config.max_duration_hours,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Lease `resource_id` to `requester_id` for `duration_hours` plus
    /// `applied_bonus_minutes` already settled by the caller.
    pub fn allocate(
        &self,
        resource_id: i64,
        requester_id: &str,
        duration_hours: u32,
        applied_bonus_minutes: u32,
    ) -> Result<AllocationOutcome, LeaseError> {
        self.allocate_inner(
            resource_id,
            requester_id,
            duration_hours,
            applied_bonus_minutes,
            BonusSource::Applied,
        )
    }

    /// Like [`allocate`](Self::allocate), but draws `bonus_minutes` from the
    /// requester's credits in the same transaction. Denied with
    /// `InsufficientCredit` (and no effect) if the balance is short.
    pub fn allocate_with_credit(
        &self,
        resource_id: i64,
        requester_id: &str,
        duration_hours: u32,
        bonus_minutes: u32,
    ) -> Result<AllocationOutcome, LeaseError> {
        self.allocate_inner(
            resource_id,
            requester_id,
            duration_hours,
            bonus_minutes,
            BonusSource::Credits,
        )
    }

    fn allocate_inner(
        &self,
        resource_id: i64,
        requester_id: &str,
        duration_hours: u32,
        bonus_minutes: u32,
        source: BonusSource,
    ) -> Result<AllocationOutcome, LeaseError> {
        if requester_id.trim().is_empty() {
            return Err(LeaseError::InvalidArgument(
                "requester id must not be empty".into(),
            ));
        }
        if duration_hours == 0 || duration_hours > self.max_duration_hours {
            return Err(LeaseError::InvalidArgument(format!(
                "duration must be within 1..={} hours, got {duration_hours}",
                self.max_duration_hours
            )));
        }

        let start = self.clock.now();
        let end = start
            + Duration::hours(i64::from(duration_hours))
            + Duration::minutes(i64::from(bonus_minutes));

        let outcome = self.store.immediate(|conn| {
            // Step 1: Re-read under the write lock
            let resource = get_resource_in(conn, resource_id)?
                .ok_or_else(|| LeaseError::resource_not_found(resource_id))?;
            if !resource.available {
                return Ok(AllocationOutcome::Denied(DenyReason::AlreadyLeased));
            }

            // Step 2: Credit check before any write
            if matches!(source, BonusSource::Credits) && bonus_minutes > 0 {
                let available = available_in(conn, requester_id)?;
                if u64::from(bonus_minutes) > available {
                    return Ok(AllocationOutcome::Denied(DenyReason::InsufficientCredit {
                        shortfall: u64::from(bonus_minutes) - available,
                    }));
                }
            }

            // Step 3: Compare-and-swap the availability flag
            let swapped = conn.execute(
                "UPDATE resources
                 SET available = 0, current_requester = ?1, lease_start = ?2, lease_end = ?3
                 WHERE id = ?4 AND available = 1",
                params![requester_id, fmt_ts(start), fmt_ts(end), resource_id],
            )?;
            if swapped == 0 {
                return Ok(AllocationOutcome::Denied(DenyReason::AlreadyLeased));
            }

            // Step 4: Lease row + audit (+ credit draw)
            conn.execute(
                "INSERT INTO leases
                    (resource_id, requester_id, start_at, end_at, duration_hours, bonus_minutes, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    resource_id,
                    requester_id,
                    fmt_ts(start),
                    fmt_ts(end),
                    duration_hours,
                    bonus_minutes,
                    LeaseStatus::Active.as_str(),
                ],
            )?;
            let lease_id = conn.last_insert_rowid();

            let mut description = format!(
                "Started lease of resource #{resource_id} ({}) for {duration_hours}h",
                resource.category
            );
            if bonus_minutes > 0 {
                description.push_str(&format!(" + {bonus_minutes}m bonus"));
            }
            append_in(
                conn,
                requester_id,
                AuditKind::LeaseStart,
                &description,
                Some(lease_id),
                start,
            )?;

            if matches!(source, BonusSource::Credits) {
                if let ConsumeOutcome::InsufficientCredit { shortfall, .. } =
                    consume_in(conn, requester_id, bonus_minutes, Some(lease_id), start)?
                {
                    // Balance was checked above under the same lock.
                    return Err(LeaseError::Storage(format!(
                        "bonus balance changed inside transaction (shortfall {shortfall})"
                    )));
                }
            }

            Ok(AllocationOutcome::Granted(Lease {
                id: lease_id,
                resource_id,
                requester_id: requester_id.to_string(),
                start,
                end,
                duration_hours,
                bonus_minutes,
                status: LeaseStatus::Active,
                ended_at: None,
            }))
        })?;

        match &outcome {
            AllocationOutcome::Granted(lease) => info!(
                lease_id = lease.id,
                resource_id,
                requester = requester_id,
                end = %lease.end,
                "lease granted"
            ),
            AllocationOutcome::Denied(reason) => debug!(
                resource_id,
                requester = requester_id,
                reason = ?reason,
                "lease denied"
            ),
        }

        Ok(outcome)
    }

    pub fn get(&self, lease_id: i64) -> Result<Lease, LeaseError> {
        self.store
            .read(|conn| get_lease_in(conn, lease_id))?
            .ok_or_else(|| LeaseError::lease_not_found(lease_id))
    }

    /// The requester's active lease with the furthest end time.
    ///
    /// `active` lags the real expiry by up to one sweep interval; use
    /// [`remaining_time`](Self::remaining_time) to judge logical validity.
    pub fn find_active_lease(&self, requester_id: &str) -> Result<Option<Lease>, LeaseError> {
        self.store.read(|conn| {
            Ok(conn
                .query_row(
                    &format!(
                        "SELECT {LEASE_COLUMNS} FROM leases
                         WHERE requester_id = ?1 AND status = 'active'
                         ORDER BY end_at DESC, id DESC LIMIT 1"
                    ),
                    [requester_id],
                    lease_from_row,
                )
                .optional()?)
        })
    }

    /// `end - now` of the requester's active lease, `None` without one.
    /// Zero or negative means the lease lapsed and awaits the sweeper.
    pub fn remaining_time(&self, requester_id: &str) -> Result<Option<Duration>, LeaseError> {
        let now = self.clock.now();
        Ok(self
            .find_active_lease(requester_id)?
            .map(|lease| lease.remaining_at(now)))
    }

    /// Move an active lease to a terminal status and free its resource.
    /// Releasing an already-terminal lease is a no-op.
    ///
    /// No `lease_lapsed` notification is queued, so the freed account keeps
    /// its credentials. Rotating them before the next lease is the caller's
    /// responsibility.
    pub fn release(
        &self,
        lease_id: i64,
        new_status: LeaseStatus,
    ) -> Result<ReleaseOutcome, LeaseError> {
        self.release_inner(lease_id, new_status, None)
    }

    /// Sweeper path: expire the lease and queue the `lease_lapsed`
    /// notification in the same transaction.
    pub(crate) fn release_lapsed(
        &self,
        lease_id: i64,
        rotation_delay: Duration,
    ) -> Result<ReleaseOutcome, LeaseError> {
        self.release_inner(lease_id, LeaseStatus::Expired, Some(rotation_delay))
    }

    fn release_inner(
        &self,
        lease_id: i64,
        new_status: LeaseStatus,
        notify_with_rotation_delay: Option<Duration>,
    ) -> Result<ReleaseOutcome, LeaseError> {
        if !new_status.is_terminal() {
            return Err(LeaseError::InvalidArgument(format!(
                "cannot release lease into status '{}'",
                new_status.as_str()
            )));
        }
        let now = self.clock.now();

        let outcome = self.store.immediate(|conn| {
            let lease =
                get_lease_in(conn, lease_id)?.ok_or_else(|| LeaseError::lease_not_found(lease_id))?;
            if lease.status.is_terminal() {
                return Ok(ReleaseOutcome::AlreadyTerminal(lease));
            }

            let changed = conn.execute(
                "UPDATE leases SET status = ?1, ended_at = ?2 WHERE id = ?3 AND status = 'active'",
                params![new_status.as_str(), fmt_ts(now), lease_id],
            )?;
            if changed == 0 {
                return Ok(ReleaseOutcome::AlreadyTerminal(lease));
            }

            conn.execute(
                "UPDATE resources
                 SET available = 1, current_requester = NULL, lease_start = NULL, lease_end = NULL
                 WHERE id = ?1",
                [lease.resource_id],
            )?;

            append_in(
                conn,
                &lease.requester_id,
                AuditKind::LeaseEnd,
                &format!(
                    "Lease of resource #{} ended ({})",
                    lease.resource_id,
                    new_status.as_str()
                ),
                Some(lease.id),
                now,
            )?;

            if let Some(delay) = notify_with_rotation_delay {
                push_in(
                    conn,
                    &NewNotification {
                        requester_id: lease.requester_id.clone(),
                        body: format!(
                            "Your lease of resource #{} has lapsed. Access has ended and the \
                             credentials will be rotated.",
                            lease.resource_id
                        ),
                        kind: NotificationKind::LeaseLapsed,
                        lease_id: Some(lease.id),
                        resource_id: Some(lease.resource_id),
                        rotate_after: Some(now + delay),
                    },
                    now,
                )?;
            }

            Ok(ReleaseOutcome::Released(Lease {
                status: new_status,
                ended_at: Some(now),
                ..lease
            }))
        })?;

        if let ReleaseOutcome::Released(lease) = &outcome {
            info!(
                lease_id = lease.id,
                resource_id = lease.resource_id,
                requester = %lease.requester_id,
                status = new_status.as_str(),
                "lease released"
            );
        }
        Ok(outcome)
    }

    /// Active leases whose window ended at or before `now`, earliest first.
    pub fn lapsed_at(&self, now: DateTime<Utc>) -> Result<Vec<Lease>, LeaseError> {
        self.query(
            &format!(
                "SELECT {LEASE_COLUMNS} FROM leases
                 WHERE status = 'active' AND end_at <= ?1 ORDER BY end_at, id"
            ),
            params![fmt_ts(now)],
        )
    }

    pub fn lapsed(&self) -> Result<Vec<Lease>, LeaseError> {
        self.lapsed_at(self.clock.now())
    }

    pub fn active_leases(&self) -> Result<Vec<Lease>, LeaseError> {
        self.query(
            &format!("SELECT {LEASE_COLUMNS} FROM leases WHERE status = 'active' ORDER BY id"),
            params![],
        )
    }

    /// Most recent leases of a requester, any status.
    pub fn history(&self, requester_id: &str, limit: u32) -> Result<Vec<Lease>, LeaseError> {
        self.query(
            &format!(
                "SELECT {LEASE_COLUMNS} FROM leases WHERE requester_id = ?1
                 ORDER BY id DESC LIMIT ?2"
            ),
            params![requester_id, limit],
        )
    }

    fn query(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<Lease>, LeaseError> {
        self.store.read(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt.query_map(params, lease_from_row)?;
            let mut out = Vec::new();
            for r in rows {
                out.push(r?);
            }
            Ok(out)
        })
    }
}
