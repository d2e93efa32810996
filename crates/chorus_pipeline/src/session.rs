//! Exclusive, self-healing access to an account's automation session.

use crate::AutomationDriver;
use chorus_core::AccountId;
use chorus_error::{AutomationError, Classify};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, instrument, warn};

/// The automation session of one account.
///
/// At most one [`SessionLease`] exists at a time. A lease that is dropped
/// without [`finish`](SessionLease::finish) (an error path, a panic, a
/// cancelled future) marks the session dirty, and the next
/// [`lease`](Self::lease) resets the driver before handing it out.
#[derive(Clone)]
pub struct AccountSession {
    account: AccountId,
    driver: Arc<dyn AutomationDriver>,
    slot: Arc<Mutex<()>>,
    dirty: Arc<AtomicBool>,
}

impl AccountSession {
    /// Session of `account` backed by `driver`.
    pub fn new(account: AccountId, driver: Arc<dyn AutomationDriver>) -> Self {
        Self {
            account,
            driver,
            slot: Arc::new(Mutex::new(())),
            dirty: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Owning account.
    pub fn account(&self) -> &AccountId {
        &self.account
    }

    /// Returns true if the next lease will reset the driver first.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Wait for exclusive use of the session.
    ///
    /// # Errors
    ///
    /// Returns the driver's error if a pending reset fails; the session stays
    /// dirty and the reset is attempted again on the next lease.
    #[instrument(skip(self), fields(account = %self.account))]
    pub async fn lease(&self) -> Result<SessionLease, AutomationError> {
        let guard = Arc::clone(&self.slot).lock_owned().await;
        if self.dirty.load(Ordering::Acquire) {
            debug!("Resetting session after unclean release");
            self.driver.reset().await?;
            self.dirty.store(false, Ordering::Release);
        }
        Ok(SessionLease {
            account: self.account.clone(),
            driver: Arc::clone(&self.driver),
            dirty: Arc::clone(&self.dirty),
            finished: false,
            _guard: guard,
        })
    }
}

impl std::fmt::Debug for AccountSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountSession")
            .field("account", &self.account)
            .field("platform", &self.driver.platform())
            .field("dirty", &self.is_dirty())
            .finish()
    }
}

/// Exclusive handle on a session.
pub struct SessionLease {
    account: AccountId,
    driver: Arc<dyn AutomationDriver>,
    dirty: Arc<AtomicBool>,
    finished: bool,
    _guard: OwnedMutexGuard<()>,
}

impl SessionLease {
    /// Account the session belongs to.
    pub fn account(&self) -> &AccountId {
        &self.account
    }

    /// The driver, usable while the lease is held.
    pub fn driver(&self) -> &dyn AutomationDriver {
        self.driver.as_ref()
    }

    /// Release the session in a known-good state.
    pub fn finish(mut self) {
        self.finished = true;
    }

    /// Release the session according to how the operation ended.
    ///
    /// Success and policy failures leave the session usable. Anything else
    /// (transient, fatal, internal) schedules a reset.
    pub fn settle<T, E: Classify>(self, outcome: &Result<T, E>) {
        match outcome {
            Ok(_) => self.finish(),
            Err(e) if e.class() == chorus_error::FailureClass::Policy => self.finish(),
            Err(_) => drop(self),
        }
    }
}

impl Drop for SessionLease {
    fn drop(&mut self) {
        if !self.finished {
            warn!(account = %self.account, "Session released uncleanly, will reset");
            self.dirty.store(true, Ordering::Release);
        }
    }
}

impl std::fmt::Debug for SessionLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionLease")
            .field("account", &self.account)
            .field("finished", &self.finished)
            .finish()
    }
}
