//! Reporting queries for the administrative surface.

use crate::clock::Clock;
use crate::credits::available_in;
use crate::errors::LeaseError;
use crate::storage::{fmt_ts, parse_ts, Store};
use chrono::{DateTime, NaiveTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemStats {
    pub total_resources: u64,
    pub available_resources: u64,
    pub leased_resources: u64,
    pub active_leases: u64,
    /// Requesters that have ever held a lease.
    pub distinct_requesters: u64,
    /// Up to five categories with the most resources.
    pub top_categories: Vec<CategoryCount>,
    /// Leases that ended since midnight UTC.
    pub ended_today: u64,
    /// Requesters that started a lease since midnight UTC.
    pub requesters_today: u64,
}

/// One row of the requester listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequesterSummary {
    pub requester_id: String,
    pub lease_count: u64,
    pub last_lease_start: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequesterStats {
    pub requester_id: String,
    pub total_leases: u64,
    pub active_leases: u64,
    pub bonus_minutes_available: u64,
    /// Up to three categories this requester leased most.
    pub favorite_categories: Vec<CategoryCount>,
}

fn count(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<u64, LeaseError> {
    let n: i64 = conn.query_row(sql, params, |row| row.get(0))?;
    Ok(n.max(0) as u64)
}

fn category_counts(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<CategoryCount>, LeaseError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, |row| {
        Ok(CategoryCount {
            category: row.get(0)?,
            count: row.get::<_, i64>(1)?.max(0) as u64,
        })
    })?;
    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(NaiveTime::MIN).and_utc()
}

#[derive(Clone)]
pub struct Stats {
    store: Store,
    clock: Arc<dyn Clock>,
}

impl Stats {
    pub fn new(store: Store, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn system(&self) -> Result<SystemStats, LeaseError> {
        let today = fmt_ts(start_of_day(self.clock.now()));
        self.store.read(|conn| {
            let total_resources = count(conn, "SELECT COUNT(*) FROM resources", [])?;
            let available_resources =
                count(conn, "SELECT COUNT(*) FROM resources WHERE available = 1", [])?;
            Ok(SystemStats {
                total_resources,
                available_resources,
                leased_resources: total_resources - available_resources,
                active_leases: count(
                    conn,
                    "SELECT COUNT(*) FROM leases WHERE status = 'active'",
                    [],
                )?,
                distinct_requesters: count(
                    conn,
                    "SELECT COUNT(DISTINCT requester_id) FROM leases",
                    [],
                )?,
                top_categories: category_counts(
                    conn,
                    "SELECT category, COUNT(*) AS n FROM resources
                     GROUP BY category ORDER BY n DESC, category LIMIT 5",
                    [],
                )?,
                ended_today: count(
                    conn,
                    "SELECT COUNT(*) FROM leases WHERE ended_at >= ?1",
                    [&today],
                )?,
                requesters_today: count(
                    conn,
                    "SELECT COUNT(DISTINCT requester_id) FROM leases WHERE start_at >= ?1",
                    [&today],
                )?,
            })
        })
    }

    /// Every requester that ever held a lease, busiest first.
    pub fn requesters(&self) -> Result<Vec<RequesterSummary>, LeaseError> {
        self.store.read(|conn| {
            let mut stmt = conn.prepare(
                "SELECT requester_id, COUNT(*) AS n, MAX(start_at) FROM leases
                 GROUP BY requester_id ORDER BY n DESC, requester_id",
            )?;
            let rows = stmt.query_map([], |row| {
                let last: String = row.get(2)?;
                Ok(RequesterSummary {
                    requester_id: row.get(0)?,
                    lease_count: row.get::<_, i64>(1)?.max(0) as u64,
                    last_lease_start: parse_ts(2, &last)?,
                })
            })?;
            let mut out = Vec::new();
            for r in rows {
                out.push(r?);
            }
            Ok(out)
        })
    }

    pub fn requester(&self, requester_id: &str) -> Result<RequesterStats, LeaseError> {
        self.store.read(|conn| {
            Ok(RequesterStats {
                requester_id: requester_id.to_string(),
                total_leases: count(
                    conn,
                    "SELECT COUNT(*) FROM leases WHERE requester_id = ?1",
                    [requester_id],
                )?,
                active_leases: count(
                    conn,
                    "SELECT COUNT(*) FROM leases WHERE requester_id = ?1 AND status = 'active'",
                    [requester_id],
                )?,
                bonus_minutes_available: available_in(conn, requester_id)?,
                favorite_categories: category_counts(
                    conn,
                    "SELECT r.category, COUNT(*) AS n
                     FROM leases l JOIN resources r ON r.id = l.resource_id
                     WHERE l.requester_id = ?1
                     GROUP BY r.category ORDER BY n DESC, r.category LIMIT 3",
                    [requester_id],
                )?,
            })
        })
    }
}
