//! Bonus credit store.
//!
//! Credits are discrete records so every minute keeps its reason. They are
//! drawn oldest-first (ascending id); a credit can be drawn partially and
//! only flips to `consumed` once all of its minutes are used.

use crate::audit::append_in;
use crate::clock::Clock;
use crate::errors::LeaseError;
use crate::model::{AuditKind, BonusCredit, NotificationKind};
use crate::outbox::{push_in, NewNotification};
use crate::storage::rows::{credit_from_row, CREDIT_COLUMNS};
use crate::storage::{fmt_ts, Store};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Result of drawing bonus minutes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ConsumeOutcome {
    Consumed {
        minutes: u32,
        /// Credits drawn from, in draw order.
        credit_ids: Vec<i64>,
    },
    /// Nothing was consumed.
    InsufficientCredit { requested: u32, available: u64, shortfall: u64 },
}

impl ConsumeOutcome {
    pub fn is_consumed(&self) -> bool {
        matches!(self, Self::Consumed { .. })
    }
}

pub(crate) fn available_in(conn: &Connection, requester_id: &str) -> Result<u64, LeaseError> {
    let total: i64 = conn.query_row(
        "SELECT COALESCE(SUM(granted_minutes - consumed_minutes), 0)
         FROM bonus_credits WHERE requester_id = ?1 AND consumed = 0",
        [requester_id],
        |row| row.get(0),
    )?;
    Ok(total.max(0) as u64)
}

/// Draw `minutes` from the requester's unconsumed credits on `conn`.
/// Must run inside a write transaction.
pub(crate) fn consume_in(
    conn: &Connection,
    requester_id: &str,
    minutes: u32,
    lease_id: Option<i64>,
    at: DateTime<Utc>,
) -> Result<ConsumeOutcome, LeaseError> {
    if minutes == 0 {
        return Ok(ConsumeOutcome::Consumed {
            minutes: 0,
            credit_ids: Vec::new(),
        });
    }

    let credits = {
        let mut stmt = conn.prepare(&format!(
            "SELECT {CREDIT_COLUMNS} FROM bonus_credits
             WHERE requester_id = ?1 AND consumed = 0 ORDER BY id"
        ))?;
        let rows = stmt.query_map([requester_id], credit_from_row)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        out
    };

    let available: u64 = credits.iter().map(|c| u64::from(c.remaining_minutes())).sum();
    if u64::from(minutes) > available {
        return Ok(ConsumeOutcome::InsufficientCredit {
            requested: minutes,
            available,
            shortfall: u64::from(minutes) - available,
        });
    }

    let mut left = minutes;
    let mut credit_ids = Vec::new();
    for credit in &credits {
        if left == 0 {
            break;
        }
        let draw = credit.remaining_minutes().min(left);
        if draw == 0 {
            continue;
        }
        let drawn_total = credit.consumed_minutes + draw;
        conn.execute(
            "UPDATE bonus_credits SET consumed_minutes = ?1, consumed = ?2 WHERE id = ?3",
            params![drawn_total, drawn_total == credit.granted_minutes, credit.id],
        )?;
        credit_ids.push(credit.id);
        left -= draw;
    }

    append_in(
        conn,
        requester_id,
        AuditKind::BonusConsumed,
        &format!("Applied {minutes} bonus minutes"),
        lease_id,
        at,
    )?;

    Ok(ConsumeOutcome::Consumed {
        minutes,
        credit_ids,
    })
}

#[derive(Clone)]
pub struct BonusCredits {
    store: Store,
    clock: Arc<dyn Clock>,
}

impl BonusCredits {
    pub fn new(store: Store, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Record earned minutes for a requester.
    pub fn grant(
        &self,
        requester_id: &str,
        minutes: u32,
        reason: &str,
    ) -> Result<BonusCredit, LeaseError> {
        if minutes == 0 {
            return Err(LeaseError::InvalidArgument(
                "bonus grant must be at least one minute".into(),
            ));
        }
        let now = self.clock.now();

        let id = self.store.immediate(|conn| {
            conn.execute(
                "INSERT INTO bonus_credits (requester_id, granted_minutes, reason, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![requester_id, minutes, reason, fmt_ts(now)],
            )?;
            let id = conn.last_insert_rowid();
            append_in(
                conn,
                requester_id,
                AuditKind::BonusGranted,
                &format!("Granted {minutes} bonus minutes: {reason}"),
                None,
                now,
            )?;
            push_in(
                conn,
                &NewNotification {
                    requester_id: requester_id.to_string(),
                    body: format!("You received {minutes} bonus minutes ({reason})."),
                    kind: NotificationKind::BonusGranted,
                    lease_id: None,
                    resource_id: None,
                    rotate_after: None,
                },
                now,
            )?;
            Ok(id)
        })?;

        info!(requester = requester_id, credit_id = id, minutes, "bonus credit granted");

        Ok(BonusCredit {
            id,
            requester_id: requester_id.to_string(),
            granted_minutes: minutes,
            reason: reason.to_string(),
            consumed: false,
            consumed_minutes: 0,
            created_at: now,
        })
    }

    /// Sum of unconsumed minutes; zero if none.
    pub fn available_minutes(&self, requester_id: &str) -> Result<u64, LeaseError> {
        self.store.read(|conn| available_in(conn, requester_id))
    }

    /// Draw minutes oldest-first. A shortfall is reported and changes nothing.
    pub fn consume(&self, requester_id: &str, minutes: u32) -> Result<ConsumeOutcome, LeaseError> {
        let now = self.clock.now();
        let outcome = self
            .store
            .immediate(|conn| consume_in(conn, requester_id, minutes, None, now))?;
        if let ConsumeOutcome::InsufficientCredit { shortfall, .. } = &outcome {
            debug!(requester = requester_id, minutes, shortfall, "bonus consumption denied");
        }
        Ok(outcome)
    }

    /// Every credit of a requester, newest first.
    pub fn list(&self, requester_id: &str) -> Result<Vec<BonusCredit>, LeaseError> {
        self.store.read(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CREDIT_COLUMNS} FROM bonus_credits WHERE requester_id = ?1 ORDER BY id DESC"
            ))?;
            let rows = stmt.query_map([requester_id], credit_from_row)?;
            let mut out = Vec::new();
            for r in rows {
                out.push(r?);
            }
            Ok(out)
        })
    }
}
