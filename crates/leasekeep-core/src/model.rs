//! Persisted record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: i64,
    pub category: String,
    pub name: String,
    pub available: bool,
    /// Denormalized from the active lease; `None` while available.
    pub current_requester: Option<String>,
    pub lease_start: Option<DateTime<Utc>>,
    pub lease_end: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaseStatus {
    Active,
    Expired,
}

impl LeaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lease {
    pub id: i64,
    pub resource_id: i64,
    pub requester_id: String,
    pub start: DateTime<Utc>,
    /// `start + duration_hours + bonus_minutes`.
    pub end: DateTime<Utc>,
    pub duration_hours: u32,
    pub bonus_minutes: u32,
    pub status: LeaseStatus,
    /// Set when the lease left `active`.
    pub ended_at: Option<DateTime<Utc>>,
}

impl Lease {
    /// Remaining time as of `now`. Non-positive once the window has passed,
    /// whether or not the sweeper has transitioned the lease yet.
    pub fn remaining_at(&self, now: DateTime<Utc>) -> chrono::Duration {
        self.end - now
    }

    pub fn is_lapsed_at(&self, now: DateTime<Utc>) -> bool {
        self.end <= now
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BonusCredit {
    pub id: i64,
    pub requester_id: String,
    pub granted_minutes: u32,
    pub reason: String,
    pub consumed: bool,
    /// Minutes already drawn from this credit.
    pub consumed_minutes: u32,
    pub created_at: DateTime<Utc>,
}

impl BonusCredit {
    pub fn remaining_minutes(&self) -> u32 {
        if self.consumed {
            0
        } else {
            self.granted_minutes.saturating_sub(self.consumed_minutes)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    LeaseStart,
    LeaseEnd,
    BonusGranted,
    BonusConsumed,
    ResourceAdded,
}

impl AuditKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LeaseStart => "lease_start",
            Self::LeaseEnd => "lease_end",
            Self::BonusGranted => "bonus_granted",
            Self::BonusConsumed => "bonus_consumed",
            Self::ResourceAdded => "resource_added",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "lease_start" => Some(Self::LeaseStart),
            "lease_end" => Some(Self::LeaseEnd),
            "bonus_granted" => Some(Self::BonusGranted),
            "bonus_consumed" => Some(Self::BonusConsumed),
            "resource_added" => Some(Self::ResourceAdded),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub requester_id: String,
    pub kind: AuditKind,
    pub description: String,
    pub lease_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Access lapsed; the resource's credentials must be rotated.
    LeaseLapsed,
    BonusGranted,
    Info,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LeaseLapsed => "lease_lapsed",
            Self::BonusGranted => "bonus_granted",
            Self::Info => "info",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "lease_lapsed" => Some(Self::LeaseLapsed),
            "bonus_granted" => Some(Self::BonusGranted),
            "info" => Some(Self::Info),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub requester_id: String,
    pub body: String,
    pub kind: NotificationKind,
    pub read: bool,
    pub lease_id: Option<i64>,
    pub resource_id: Option<i64>,
    /// Earliest time the credential rotation may run (`lease_lapsed` only).
    pub rotate_after: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
