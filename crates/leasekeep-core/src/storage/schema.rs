//! SQLite schema for the lease engine.
//!
//! Tables:
//! - `resources`: Leasable accounts and their availability flag
//! - `leases`: Lease records (active / expired)
//! - `bonus_credits`: Granted bonus minutes per requester
//! - `audit_log`: Append-only lifecycle history
//! - `notifications`: Requester-facing outbox

/// Schema version: 1
pub const LEASE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS resources (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    category          TEXT NOT NULL,
    name              TEXT NOT NULL,
    available         INTEGER NOT NULL DEFAULT 1,
    current_requester TEXT,
    lease_start       TEXT,
    lease_end         TEXT,
    created_at        TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS leases (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    resource_id    INTEGER NOT NULL REFERENCES resources(id),
    requester_id   TEXT NOT NULL,
    start_at       TEXT NOT NULL,
    end_at         TEXT NOT NULL,
    duration_hours INTEGER NOT NULL,
    bonus_minutes  INTEGER NOT NULL DEFAULT 0,
    status         TEXT NOT NULL DEFAULT 'active',
    ended_at       TEXT
);

-- At most one active lease per resource
CREATE UNIQUE INDEX IF NOT EXISTS idx_leases_one_active
    ON leases(resource_id) WHERE status = 'active';
CREATE INDEX IF NOT EXISTS idx_leases_status_end
    ON leases(status, end_at);
CREATE INDEX IF NOT EXISTS idx_leases_requester
    ON leases(requester_id, status);

CREATE TABLE IF NOT EXISTS bonus_credits (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    requester_id     TEXT NOT NULL,
    granted_minutes  INTEGER NOT NULL CHECK (granted_minutes > 0),
    reason           TEXT NOT NULL,
    consumed         INTEGER NOT NULL DEFAULT 0,
    consumed_minutes INTEGER NOT NULL DEFAULT 0,
    created_at       TEXT NOT NULL,
    CHECK (consumed_minutes <= granted_minutes)
);

CREATE INDEX IF NOT EXISTS idx_bonus_credits_requester
    ON bonus_credits(requester_id, consumed);

-- Append-only
CREATE TABLE IF NOT EXISTS audit_log (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    requester_id TEXT NOT NULL,
    kind         TEXT NOT NULL,
    description  TEXT NOT NULL,
    lease_id     INTEGER REFERENCES leases(id),
    created_at   TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_audit_log_requester
    ON audit_log(requester_id);
CREATE INDEX IF NOT EXISTS idx_audit_log_lease
    ON audit_log(lease_id);

CREATE TABLE IF NOT EXISTS notifications (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    requester_id TEXT NOT NULL,
    body         TEXT NOT NULL,
    kind         TEXT NOT NULL,
    is_read      INTEGER NOT NULL DEFAULT 0,
    lease_id     INTEGER REFERENCES leases(id),
    resource_id  INTEGER REFERENCES resources(id),
    rotate_after TEXT,
    created_at   TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_notifications_requester
    ON notifications(requester_id, is_read);
CREATE INDEX IF NOT EXISTS idx_notifications_kind
    ON notifications(kind, id);
"#;
