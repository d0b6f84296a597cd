//! Row mapping for the lease tables.
//!
//! Each `*_COLUMNS` constant pairs with the mapper below it; queries select
//! exactly those columns in that order.

use super::parse_ts;
use crate::model::{
    AuditEntry, AuditKind, BonusCredit, Lease, LeaseStatus, Notification, NotificationKind,
    Resource,
};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::Row;

fn ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_ts(idx, &raw)
}

fn opt_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| parse_ts(idx, &s)).transpose()
}

fn unknown_variant(idx: usize, what: &str, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        format!("unknown {what}: {value}").into(),
    )
}

pub(crate) const RESOURCE_COLUMNS: &str =
    "id, category, name, available, current_requester, lease_start, lease_end, created_at";

pub(crate) fn resource_from_row(row: &Row<'_>) -> rusqlite::Result<Resource> {
    Ok(Resource {
        id: row.get(0)?,
        category: row.get(1)?,
        name: row.get(2)?,
        available: row.get(3)?,
        current_requester: row.get(4)?,
        lease_start: opt_ts(row, 5)?,
        lease_end: opt_ts(row, 6)?,
        created_at: ts(row, 7)?,
    })
}

pub(crate) const LEASE_COLUMNS: &str =
    "id, resource_id, requester_id, start_at, end_at, duration_hours, bonus_minutes, status, ended_at";

pub(crate) fn lease_from_row(row: &Row<'_>) -> rusqlite::Result<Lease> {
    let status: String = row.get(7)?;
    Ok(Lease {
        id: row.get(0)?,
        resource_id: row.get(1)?,
        requester_id: row.get(2)?,
        start: ts(row, 3)?,
        end: ts(row, 4)?,
        duration_hours: row.get(5)?,
        bonus_minutes: row.get(6)?,
        status: LeaseStatus::parse(&status)
            .ok_or_else(|| unknown_variant(7, "lease status", &status))?,
        ended_at: opt_ts(row, 8)?,
    })
}

pub(crate) const CREDIT_COLUMNS: &str =
    "id, requester_id, granted_minutes, reason, consumed, consumed_minutes, created_at";

pub(crate) fn credit_from_row(row: &Row<'_>) -> rusqlite::Result<BonusCredit> {
    Ok(BonusCredit {
        id: row.get(0)?,
        requester_id: row.get(1)?,
        granted_minutes: row.get(2)?,
        reason: row.get(3)?,
        consumed: row.get(4)?,
        consumed_minutes: row.get(5)?,
        created_at: ts(row, 6)?,
    })
}

pub(crate) const AUDIT_COLUMNS: &str = "id, requester_id, kind, description, lease_id, created_at";

pub(crate) fn audit_from_row(row: &Row<'_>) -> rusqlite::Result<AuditEntry> {
    let kind: String = row.get(2)?;
    Ok(AuditEntry {
        id: row.get(0)?,
        requester_id: row.get(1)?,
        kind: AuditKind::parse(&kind).ok_or_else(|| unknown_variant(2, "audit kind", &kind))?,
        description: row.get(3)?,
        lease_id: row.get(4)?,
        created_at: ts(row, 5)?,
    })
}

pub(crate) const NOTIFICATION_COLUMNS: &str =
    "id, requester_id, body, kind, is_read, lease_id, resource_id, rotate_after, created_at";

pub(crate) fn notification_from_row(row: &Row<'_>) -> rusqlite::Result<Notification> {
    let kind: String = row.get(3)?;
    Ok(Notification {
        id: row.get(0)?,
        requester_id: row.get(1)?,
        body: row.get(2)?,
        kind: NotificationKind::parse(&kind)
            .ok_or_else(|| unknown_variant(3, "notification kind", &kind))?,
        read: row.get(4)?,
        lease_id: row.get(5)?,
        resource_id: row.get(6)?,
        rotate_after: opt_ts(row, 7)?,
        created_at: ts(row, 8)?,
    })
}
