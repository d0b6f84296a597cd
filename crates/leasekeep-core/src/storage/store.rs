//! SQLite-backed store shared by every component.
//!
//! Mutations go through [`Store::immediate`], which wraps the closure in a
//! `BEGIN IMMEDIATE` transaction: the write lock is taken before the first
//! read, so read-check-write sequences cannot interleave with another
//! writer on this or any other connection to the same file.

use super::schema::LEASE_SCHEMA;
use crate::errors::LeaseError;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open a file-backed store, creating the schema if needed.
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self, LeaseError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        Self::from_connection(conn)
    }

    /// Create an in-memory store (for testing).
    pub fn memory() -> Result<Self, LeaseError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    pub fn from_connection(conn: Connection) -> Result<Self, LeaseError> {
        Self::init_connection(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_connection(conn: &Connection) -> Result<(), LeaseError> {
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        // WAL mode for file-backed DBs (no-op for in-memory)
        let _ = conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()));
        conn.execute_batch(LEASE_SCHEMA)?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, LeaseError> {
        self.conn
            .lock()
            .map_err(|_| LeaseError::Storage("connection lock poisoned".into()))
    }

    /// Run read-only queries.
    pub(crate) fn read<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, LeaseError>,
    ) -> Result<T, LeaseError> {
        let conn = self.lock()?;
        f(&conn)
    }

    /// Run `f` as one unit of work. Commits on `Ok`, rolls back on `Err`.
    pub(crate) fn immediate<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, LeaseError>,
    ) -> Result<T, LeaseError> {
        let conn = self.lock()?;

        conn.execute("BEGIN IMMEDIATE", [])?;

        let result = f(&conn);

        match result {
            Ok(value) => {
                if let Err(e) = conn.execute("COMMIT", []) {
                    let _ = conn.execute("ROLLBACK", []);
                    return Err(e.into());
                }
                Ok(value)
            }
            Err(e) => {
                let _ = conn.execute("ROLLBACK", []);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::params;

    #[test]
    fn test_store_bootstraps_schema() {
        let store = Store::memory().unwrap();
        let tables: Vec<String> = store
            .read(|conn| {
                let mut stmt =
                    conn.prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")?;
                let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
                let names: Vec<String> = rows.filter_map(|r| r.ok()).collect();
                Ok(names)
            })
            .unwrap();

        for t in [
            "audit_log",
            "bonus_credits",
            "leases",
            "notifications",
            "resources",
        ] {
            assert!(tables.contains(&t.to_string()), "missing table {t}");
        }
    }

    #[test]
    fn test_store_sets_foreign_keys() {
        let store = Store::memory().unwrap();
        let fk: i32 = store
            .read(|conn| Ok(conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0))?))
            .unwrap();
        assert_eq!(fk, 1);
    }

    #[test]
    fn test_immediate_rolls_back_on_error() {
        let store = Store::memory().unwrap();

        let result: Result<(), LeaseError> = store.immediate(|conn| {
            conn.execute(
                "INSERT INTO resources (category, name, created_at) VALUES (?1, ?2, ?3)",
                params!["cs2", "acc1", "2026-01-01T00:00:00.000Z"],
            )?;
            Err(LeaseError::InvalidArgument("abort".into()))
        });
        assert!(result.is_err());

        let count: i64 = store
            .read(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM resources", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(count, 0, "insert must not survive the rollback");

        // Connection is usable again after the rollback.
        store
            .immediate(|conn| {
                conn.execute(
                    "INSERT INTO resources (category, name, created_at) VALUES ('cs2', 'acc1', 'x')",
                    [],
                )?;
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_file_backed_store_reopens_existing_data() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        {
            let store = Store::open(tmp.path(), Duration::from_millis(500)).unwrap();
            store
                .immediate(|conn| {
                    conn.execute(
                        "INSERT INTO resources (category, name, created_at) VALUES ('dota', 'a', 'x')",
                        [],
                    )?;
                    Ok(())
                })
                .unwrap();
        }
        let store = Store::open(tmp.path(), Duration::from_millis(500)).unwrap();
        let count: i64 = store
            .read(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM resources", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(count, 1);
    }
}
