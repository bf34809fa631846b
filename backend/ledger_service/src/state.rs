//! Shared service state: the ledger behind a single async mutex, plus the
//! bookkeeping that keeps the database log in step with it.

use qf_settlement::{Ledger, SubmitterPolicy};
use sqlx::SqlitePool;
use tokio::sync::{mpsc, Mutex, MutexGuard};
use tracing::{debug, error, warn};

use crate::callback::CallbackEnvelope;
use crate::config::Config;
use crate::db;
use crate::engine::ServiceEngine;
use crate::errors::Result;
use crate::oracle::ChannelOracle;

pub type ServiceLedger = Ledger<ServiceEngine, ChannelOracle, SubmitterPolicy>;

pub struct LedgerHandle {
    pub ledger: ServiceLedger,
    /// Number of log entries already written to the database.
    persisted: usize,
}

impl LedgerHandle {
    pub fn new(ledger: ServiceLedger, persisted: usize) -> Self {
        Self { ledger, persisted }
    }

    /// Advance ledger time to the wall clock. Never moves backwards.
    pub fn tick(&mut self) {
        let now = chrono::Utc::now().timestamp().max(0) as u64;
        let ts = self.ledger.timestamp().max(now);
        self.ledger.set_timestamp(ts);
    }

    /// Write every event the database has not seen yet.
    ///
    /// The write is all-or-nothing. If it fails, the ledger is rewound to the
    /// persisted log so the failed operation never happened and the caller
    /// may safely retry it.
    pub async fn persist(&mut self, pool: &SqlitePool) -> Result<()> {
        let pending = &self.ledger.events()[self.persisted..];
        if pending.is_empty() {
            return Ok(());
        }
        let count = pending.len();
        match db::insert_events(pool, self.persisted, pending).await {
            Ok(inserted) => {
                debug!(from = self.persisted, inserted, "events persisted");
                self.persisted += count;
                Ok(())
            }
            Err(e) => {
                warn!(discarded = count, "Event write failed, rewinding ledger: {e}");
                if let Err(rewind) = self.ledger.rewind(self.persisted) {
                    error!("Ledger rewind failed: {rewind}");
                }
                Err(e)
            }
        }
    }
}

pub struct AppState {
    ledger: Mutex<LedgerHandle>,
    pub pool: SqlitePool,
    pub callbacks: mpsc::Sender<CallbackEnvelope>,
    pub config: Config,
}

impl AppState {
    pub fn new(
        handle: LedgerHandle,
        pool: SqlitePool,
        callbacks: mpsc::Sender<CallbackEnvelope>,
        config: Config,
    ) -> Self {
        Self {
            ledger: Mutex::new(handle),
            pool,
            callbacks,
            config,
        }
    }

    /// Lock the ledger with its clock advanced. Every mutating call and the
    /// persistence of its events happen under this one guard.
    pub async fn ledger(&self) -> MutexGuard<'_, LedgerHandle> {
        let mut guard = self.ledger.lock().await;
        guard.tick();
        guard
    }
}
