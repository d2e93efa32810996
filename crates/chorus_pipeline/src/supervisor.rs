//! Runs account loops side by side.

use crate::{AccountControl, AccountLoop, MetricsSnapshot, PipelineMetrics};
use chorus_core::AccountId;
use std::collections::HashMap;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

struct Running {
    control: AccountControl,
    metrics: PipelineMetrics,
    handle: JoinHandle<()>,
}

/// Owns one task per account loop.
///
/// Accounts never wait on each other: each loop has its own session and
/// only shares the durable stores and the rate limiter. A panicking loop is
/// logged when the supervisor is shut down and does not affect the others.
pub struct Supervisor {
    shutdown: watch::Sender<bool>,
    running: HashMap<AccountId, Running>,
}

impl Supervisor {
    /// Spawn every loop onto the runtime.
    #[instrument(skip_all, fields(accounts = loops.len()))]
    pub fn spawn(loops: Vec<AccountLoop>) -> Self {
        let (shutdown, receiver) = watch::channel(false);
        let mut running = HashMap::new();
        for account_loop in loops {
            let account = account_loop.account().clone();
            let control = account_loop.control().clone();
            let metrics = account_loop.metrics().clone();
            let receiver = receiver.clone();
            let handle = tokio::spawn(async move { account_loop.run(receiver).await });
            info!(%account, "Spawned account loop");
            if let Some(previous) = running.insert(
                account.clone(),
                Running {
                    control,
                    metrics,
                    handle,
                },
            ) {
                warn!(%account, "Account spawned twice, aborting the older loop");
                previous.handle.abort();
            }
        }
        Self { shutdown, running }
    }

    /// Accounts under supervision.
    pub fn accounts(&self) -> Vec<AccountId> {
        let mut accounts: Vec<_> = self.running.keys().cloned().collect();
        accounts.sort();
        accounts
    }

    /// Returns true if `account` is paused, `None` if it is unknown.
    pub fn is_paused(&self, account: &AccountId) -> Option<bool> {
        self.running.get(account).map(|r| r.control.is_paused())
    }

    /// Pause reason of `account`.
    pub fn pause_reason(&self, account: &AccountId) -> Option<String> {
        self.running.get(account)?.control.reason()
    }

    /// Pause `account`. Returns false if it is unknown.
    pub fn pause(&self, account: &AccountId, reason: impl Into<String>) -> bool {
        match self.running.get(account) {
            Some(running) => {
                running.control.pause(reason);
                true
            }
            None => false,
        }
    }

    /// Resume a paused `account`. Returns false if it is unknown.
    #[instrument(skip(self), fields(account = %account))]
    pub fn resume(&self, account: &AccountId) -> bool {
        match self.running.get(account) {
            Some(running) => {
                info!("Resuming account");
                running.control.resume();
                true
            }
            None => false,
        }
    }

    /// Metrics of every account.
    pub fn metrics(&self) -> HashMap<AccountId, MetricsSnapshot> {
        self.running
            .iter()
            .map(|(account, running)| (account.clone(), running.metrics.snapshot()))
            .collect()
    }

    /// Signal every loop to stop and wait for them.
    #[instrument(skip(self))]
    pub async fn shutdown(self) {
        info!("Shutting down account loops");
        if self.shutdown.send(true).is_err() {
            warn!("No account loop was listening for shutdown");
        }
        self.wait().await;
    }

    /// Wait for every loop to end on its own.
    pub async fn wait(self) {
        for (account, running) in self.running {
            if let Err(e) = running.handle.await {
                error!(%account, error = %e, "Account loop ended abnormally");
            }
        }
    }
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("accounts", &self.accounts())
            .finish()
    }
}
