//! Wiring: one store and one clock shared by every component.

use crate::audit::AuditLog;
use crate::clock::{Clock, SystemClock};
use crate::config::LeaseConfig;
use crate::credits::BonusCredits;
use crate::errors::LeaseError;
use crate::inventory::Inventory;
use crate::ledger::LeaseLedger;
use crate::outbox::NotificationOutbox;
use crate::stats::Stats;
use crate::storage::Store;
use crate::sweeper::ExpirySweeper;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct LeaseEngine {
    config: LeaseConfig,
    inventory: Inventory,
    ledger: LeaseLedger,
    credits: BonusCredits,
    audit: AuditLog,
    outbox: NotificationOutbox,
    stats: Stats,
}

impl LeaseEngine {
    /// Open the configured database with the system clock.
    pub fn open(config: &LeaseConfig) -> Result<Self, LeaseError> {
        let store = Store::open(&config.database_path, config.storage.busy_timeout())?;
        info!(path = %config.database_path.display(), "lease store opened");
        Ok(Self::with_store(store, config.clone(), Arc::new(SystemClock)))
    }

    /// Fresh in-memory database, typically with a `ManualClock`.
    pub fn in_memory(config: LeaseConfig, clock: Arc<dyn Clock>) -> Result<Self, LeaseError> {
        Ok(Self::with_store(Store::memory()?, config, clock))
    }

    pub fn with_store(store: Store, config: LeaseConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            inventory: Inventory::new(store.clone(), clock.clone(), config.admin_requester.clone()),
            ledger: LeaseLedger::new(store.clone(), clock.clone(), &config.lease),
            credits: BonusCredits::new(store.clone(), clock.clone()),
            audit: AuditLog::new(store.clone(), clock.clone()),
            outbox: NotificationOutbox::new(store.clone(), clock.clone()),
            stats: Stats::new(store, clock),
            config,
        }
    }

    pub fn config(&self) -> &LeaseConfig {
        &self.config
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn ledger(&self) -> &LeaseLedger {
        &self.ledger
    }

    pub fn credits(&self) -> &BonusCredits {
        &self.credits
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub fn outbox(&self) -> &NotificationOutbox {
        &self.outbox
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// A sweeper over this engine's ledger, configured from `sweeper` and
    /// `rotation`. Call [`ExpirySweeper::spawn`] to run it in the background.
    pub fn sweeper(&self) -> ExpirySweeper {
        ExpirySweeper::new(
            self.ledger.clone(),
            &self.config.sweeper,
            &self.config.rotation,
        )
    }
}
