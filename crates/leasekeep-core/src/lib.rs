//! Lease lifecycle engine for shared credentialed accounts.
//!
//! Resources are leased to requesters for a bounded window, held
//! exclusively while leased, and reclaimed by a periodic sweeper once the
//! window lapses.
//!
//! ```text
//! ┌──────────────┐   allocate/release   ┌──────────────┐
//! │  Inventory   │◀─────────────────────│ LeaseLedger  │◀──── ExpirySweeper
//! │ (resources)  │                      │   (leases)   │        (tick)
//! └──────────────┘                      └──────┬───────┘
//!                                              │ same transaction
//!                           ┌──────────────────┼──────────────────┐
//!                           ▼                  ▼                  ▼
//!                     ┌──────────┐      ┌────────────┐     ┌────────────┐
//!                     │ AuditLog │      │  Outbox    │     │BonusCredits│
//!                     └──────────┘      └────────────┘     └────────────┘
//! ```

pub mod audit;
pub mod clock;
pub mod config;
pub mod credits;
pub mod engine;
pub mod errors;
pub mod inventory;
pub mod ledger;
pub mod model;
pub mod outbox;
pub mod stats;
pub mod storage;
pub mod sweeper;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{load_config, LeaseConfig};
pub use engine::LeaseEngine;
pub use errors::{ConfigError, LeaseError};
