//! Resource inventory.
//!
//! Catalog of leasable resources. Availability is only changed by the
//! lease ledger.

use crate::audit::append_in;
use crate::clock::Clock;
use crate::errors::LeaseError;
use crate::model::{AuditKind, Resource};
use crate::storage::rows::{resource_from_row, RESOURCE_COLUMNS};
use crate::storage::{fmt_ts, Store};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::Arc;
use tracing::info;

pub(crate) fn get_in(conn: &Connection, id: i64) -> Result<Option<Resource>, LeaseError> {
    Ok(conn
        .query_row(
            &format!("SELECT {RESOURCE_COLUMNS} FROM resources WHERE id = ?1"),
            [id],
            resource_from_row,
        )
        .optional()?)
}

#[derive(Clone)]
pub struct Inventory {
    store: Store,
    clock: Arc<dyn Clock>,
    admin_requester: String,
}

impl Inventory {
    pub fn new(store: Store, clock: Arc<dyn Clock>, admin_requester: impl Into<String>) -> Self {
        Self {
            store,
            clock,
            admin_requester: admin_requester.into(),
        }
    }

    /// Add a new, available resource. The audit entry is attributed to the
    /// configured admin identity.
    pub fn register(&self, category: &str, name: &str) -> Result<Resource, LeaseError> {
        let category = category.trim();
        let name = name.trim();
        if category.is_empty() || name.is_empty() {
            return Err(LeaseError::InvalidArgument(
                "resource category and name must not be empty".into(),
            ));
        }
        let now = self.clock.now();

        let id = self.store.immediate(|conn| {
            conn.execute(
                "INSERT INTO resources (category, name, available, created_at) VALUES (?1, ?2, 1, ?3)",
                params![category, name, fmt_ts(now)],
            )?;
            let id = conn.last_insert_rowid();
            append_in(
                conn,
                &self.admin_requester,
                AuditKind::ResourceAdded,
                &format!("Added resource #{id} ({category}/{name})"),
                None,
                now,
            )?;
            Ok(id)
        })?;

        info!(resource_id = id, category, "resource registered");

        Ok(Resource {
            id,
            category: category.to_string(),
            name: name.to_string(),
            available: true,
            current_requester: None,
            lease_start: None,
            lease_end: None,
            created_at: now,
        })
    }

    /// Available resources in insertion order, optionally for one category.
    pub fn list_available(&self, category: Option<&str>) -> Result<Vec<Resource>, LeaseError> {
        self.query(
            &format!(
                "SELECT {RESOURCE_COLUMNS} FROM resources
                 WHERE available = 1 AND (?1 IS NULL OR category = ?1) ORDER BY id"
            ),
            params![category],
        )
    }

    pub fn get(&self, id: i64) -> Result<Resource, LeaseError> {
        self.store
            .read(|conn| get_in(conn, id))?
            .ok_or_else(|| LeaseError::resource_not_found(id))
    }

    /// Number of available resources, optionally for one category.
    pub fn count(&self, category: Option<&str>) -> Result<u64, LeaseError> {
        self.store.read(|conn| {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM resources WHERE available = 1 AND (?1 IS NULL OR category = ?1)",
                params![category],
                |row| row.get(0),
            )?;
            Ok(n as u64)
        })
    }

    /// Every resource regardless of availability.
    pub fn count_all(&self) -> Result<u64, LeaseError> {
        self.store.read(|conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM resources", [], |row| row.get(0))?;
            Ok(n as u64)
        })
    }

    /// Distinct categories, sorted.
    pub fn categories(&self) -> Result<Vec<String>, LeaseError> {
        self.store.read(|conn| {
            let mut stmt =
                conn.prepare("SELECT DISTINCT category FROM resources ORDER BY category")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            let mut out = Vec::new();
            for r in rows {
                out.push(r?);
            }
            Ok(out)
        })
    }

    /// Available resources whose category contains `query` (case-insensitive).
    pub fn search(&self, query: &str) -> Result<Vec<Resource>, LeaseError> {
        let needle = query.trim().to_lowercase();
        let mut found = self.list_available(None)?;
        found.retain(|r| r.category.to_lowercase().contains(&needle));
        Ok(found)
    }

    fn query(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<Resource>, LeaseError> {
        self.store.read(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt.query_map(params, resource_from_row)?;
            let mut out = Vec::new();
            for r in rows {
                out.push(r?);
            }
            Ok(out)
        })
    }
}
