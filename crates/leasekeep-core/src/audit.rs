//! Append-only audit log of lifecycle events.
//!
//! Entries caused by a state transition are written through [`append_in`]
//! on the transaction's own connection, so an entry exists iff the
//! transition committed.

use crate::clock::Clock;
use crate::errors::LeaseError;
use crate::model::{AuditEntry, AuditKind};
use crate::storage::rows::{audit_from_row, AUDIT_COLUMNS};
use crate::storage::{fmt_ts, Store};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::sync::Arc;

pub(crate) fn append_in(
    conn: &Connection,
    requester_id: &str,
    kind: AuditKind,
    description: &str,
    lease_id: Option<i64>,
    at: DateTime<Utc>,
) -> Result<i64, LeaseError> {
    conn.execute(
        "INSERT INTO audit_log (requester_id, kind, description, lease_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![requester_id, kind.as_str(), description, lease_id, fmt_ts(at)],
    )?;
    Ok(conn.last_insert_rowid())
}

#[derive(Clone)]
pub struct AuditLog {
    store: Store,
    clock: Arc<dyn Clock>,
}

impl AuditLog {
    pub fn new(store: Store, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Standalone append for events with no accompanying state change.
    pub fn append(
        &self,
        requester_id: &str,
        kind: AuditKind,
        description: &str,
    ) -> Result<AuditEntry, LeaseError> {
        let now = self.clock.now();
        let id = self
            .store
            .immediate(|conn| append_in(conn, requester_id, kind, description, None, now))?;
        Ok(AuditEntry {
            id,
            requester_id: requester_id.to_string(),
            kind,
            description: description.to_string(),
            lease_id: None,
            created_at: now,
        })
    }

    /// Most recent first.
    pub fn for_requester(
        &self,
        requester_id: &str,
        limit: u32,
    ) -> Result<Vec<AuditEntry>, LeaseError> {
        self.query(
            &format!(
                "SELECT {AUDIT_COLUMNS} FROM audit_log WHERE requester_id = ?1
                 ORDER BY id DESC LIMIT ?2"
            ),
            params![requester_id, limit],
        )
    }

    /// System-wide activity, most recent first.
    pub fn recent(&self, limit: u32) -> Result<Vec<AuditEntry>, LeaseError> {
        self.query(
            &format!("SELECT {AUDIT_COLUMNS} FROM audit_log ORDER BY id DESC LIMIT ?1"),
            params![limit],
        )
    }

    /// Entries correlated with a lease, oldest first.
    pub fn for_lease(&self, lease_id: i64) -> Result<Vec<AuditEntry>, LeaseError> {
        self.query(
            &format!("SELECT {AUDIT_COLUMNS} FROM audit_log WHERE lease_id = ?1 ORDER BY id"),
            params![lease_id],
        )
    }

    pub fn count_kind(&self, kind: AuditKind) -> Result<u64, LeaseError> {
        self.store.read(|conn| {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM audit_log WHERE kind = ?1",
                [kind.as_str()],
                |row| row.get(0),
            )?;
            Ok(n as u64)
        })
    }

    fn query(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<AuditEntry>, LeaseError> {
        self.store.read(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt.query_map(params, audit_from_row)?;
            let mut out = Vec::new();
            for r in rows {
                out.push(r?);
            }
            Ok(out)
        })
    }
}
