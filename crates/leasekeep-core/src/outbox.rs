//! Requester-facing notification outbox.
//!
//! The front-end reads unread entries per requester; the credential-rotation
//! collaborator polls [`NotificationOutbox::lapsed_after`] with its own
//! cursor. Entries are never deleted and only the read flag changes.

use crate::clock::Clock;
use crate::errors::LeaseError;
use crate::model::{Notification, NotificationKind};
use crate::storage::rows::{notification_from_row, NOTIFICATION_COLUMNS};
use crate::storage::{fmt_ts, Store};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::sync::Arc;

/// Upper bound for history listings.
pub const MAX_LISTING: u32 = 50;

#[derive(Debug, Clone)]
pub(crate) struct NewNotification {
    pub requester_id: String,
    pub body: String,
    pub kind: NotificationKind,
    pub lease_id: Option<i64>,
    pub resource_id: Option<i64>,
    pub rotate_after: Option<DateTime<Utc>>,
}

impl NewNotification {
    pub(crate) fn into_record(self, id: i64, created_at: DateTime<Utc>) -> Notification {
        Notification {
            id,
            requester_id: self.requester_id,
            body: self.body,
            kind: self.kind,
            read: false,
            lease_id: self.lease_id,
            resource_id: self.resource_id,
            rotate_after: self.rotate_after,
            created_at,
        }
    }
}

pub(crate) fn push_in(
    conn: &Connection,
    n: &NewNotification,
    at: DateTime<Utc>,
) -> Result<i64, LeaseError> {
    conn.execute(
        "INSERT INTO notifications
            (requester_id, body, kind, lease_id, resource_id, rotate_after, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            n.requester_id,
            n.body,
            n.kind.as_str(),
            n.lease_id,
            n.resource_id,
            n.rotate_after.map(fmt_ts),
            fmt_ts(at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

#[derive(Clone)]
pub struct NotificationOutbox {
    store: Store,
    clock: Arc<dyn Clock>,
}

impl NotificationOutbox {
    pub fn new(store: Store, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Queue a message for a requester.
    pub fn push(
        &self,
        requester_id: &str,
        kind: NotificationKind,
        body: &str,
    ) -> Result<Notification, LeaseError> {
        let now = self.clock.now();
        let new = NewNotification {
            requester_id: requester_id.to_string(),
            body: body.to_string(),
            kind,
            lease_id: None,
            resource_id: None,
            rotate_after: None,
        };
        let id = self.store.immediate(|conn| push_in(conn, &new, now))?;
        Ok(new.into_record(id, now))
    }

    /// Unread entries, newest first.
    pub fn unread(&self, requester_id: &str) -> Result<Vec<Notification>, LeaseError> {
        self.query(
            &format!(
                "SELECT {NOTIFICATION_COLUMNS} FROM notifications
                 WHERE requester_id = ?1 AND is_read = 0 ORDER BY id DESC"
            ),
            params![requester_id],
        )
    }

    /// Read and unread entries, newest first, capped at [`MAX_LISTING`].
    pub fn recent(&self, requester_id: &str, limit: u32) -> Result<Vec<Notification>, LeaseError> {
        self.query(
            &format!(
                "SELECT {NOTIFICATION_COLUMNS} FROM notifications
                 WHERE requester_id = ?1 ORDER BY id DESC LIMIT ?2"
            ),
            params![requester_id, limit.min(MAX_LISTING)],
        )
    }

    /// Flip the read flag. Marking an already-read entry is a no-op.
    pub fn mark_read(&self, id: i64) -> Result<(), LeaseError> {
        self.store.immediate(|conn| {
            let changed = conn.execute("UPDATE notifications SET is_read = 1 WHERE id = ?1", [id])?;
            if changed == 0 {
                return Err(LeaseError::notification_not_found(id));
            }
            Ok(())
        })
    }

    /// `lease_lapsed` entries with `id > cursor`, oldest first. The caller
    /// keeps the highest id it has handled as its next cursor.
    pub fn lapsed_after(&self, cursor: i64, limit: u32) -> Result<Vec<Notification>, LeaseError> {
        self.query(
            &format!(
                "SELECT {NOTIFICATION_COLUMNS} FROM notifications
                 WHERE kind = ?1 AND id > ?2 ORDER BY id LIMIT ?3"
            ),
            params![NotificationKind::LeaseLapsed.as_str(), cursor, limit],
        )
    }

    pub fn for_lease(&self, lease_id: i64) -> Result<Vec<Notification>, LeaseError> {
        self.query(
            &format!(
                "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE lease_id = ?1 ORDER BY id"
            ),
            params![lease_id],
        )
    }

    fn query(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<Notification>, LeaseError> {
        self.store.read(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let rows = stmt.query_map(params, notification_from_row)?;
            let mut out = Vec::new();
            for r in rows {
                out.push(r?);
            }
            Ok(out)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn outbox() -> NotificationOutbox {
        NotificationOutbox::new(
            Store::memory().unwrap(),
            Arc::new(ManualClock::starting_now()),
        )
    }

    #[test]
    fn test_push_then_unread() {
        let outbox = outbox();
        let n = outbox.push("u1", NotificationKind::Info, "hello").unwrap();
        assert!(!n.read);

        let unread = outbox.unread("u1").unwrap();
        assert_eq!(unread, vec![n]);
        assert!(outbox.unread("u2").unwrap().is_empty());
    }

    #[test]
    fn test_mark_read_hides_from_unread_but_not_recent() {
        let outbox = outbox();
        let a = outbox.push("u1", NotificationKind::Info, "a").unwrap();
        let b = outbox.push("u1", NotificationKind::Info, "b").unwrap();

        outbox.mark_read(a.id).unwrap();
        outbox.mark_read(a.id).unwrap();

        let unread = outbox.unread("u1").unwrap();
        assert_eq!(unread.iter().map(|n| n.id).collect::<Vec<_>>(), vec![b.id]);

        let recent = outbox.recent("u1", 10).unwrap();
        assert_eq!(recent.len(), 2);
        assert!(recent.iter().any(|n| n.id == a.id && n.read));
    }

    #[test]
    fn test_mark_read_missing_is_not_found() {
        let outbox = outbox();
        let err = outbox.mark_read(42).unwrap_err();
        assert_eq!(err, LeaseError::notification_not_found(42));
    }

    #[test]
    fn test_recent_is_capped() {
        let outbox = outbox();
        for i in 0..(MAX_LISTING + 5) {
            outbox
                .push("u1", NotificationKind::Info, &format!("n{i}"))
                .unwrap();
        }
        assert_eq!(outbox.recent("u1", 1000).unwrap().len(), MAX_LISTING as usize);
    }

    #[test]
    fn test_lapsed_after_ignores_other_kinds() {
        let outbox = outbox();
        outbox.push("u1", NotificationKind::Info, "info").unwrap();
        assert!(outbox.lapsed_after(0, 10).unwrap().is_empty());
    }
}
