//! Per-account, per-action sliding-window budgets.

use crate::ActionBudget;
use chorus_core::{AccountId, ActionKind};
use chorus_error::ChorusResult;
use chorus_storage::JsonDocument;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

/// Result of a budget check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquisition {
    /// The action may proceed; the budget has been debited
    Granted,
    /// The budget is spent until `retry_at`
    Exhausted {
        /// Earliest instant a new action fits in the window
        retry_at: DateTime<Utc>,
    },
}

impl Acquisition {
    /// Returns true if the action may proceed.
    pub fn is_granted(&self) -> bool {
        matches!(self, Acquisition::Granted)
    }
}

/// Persisted action timestamps for one `(account, action)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct LedgerWindow {
    account: AccountId,
    action: ActionKind,
    stamps: VecDeque<DateTime<Utc>>,
}

type Windows = HashMap<(AccountId, ActionKind), VecDeque<DateTime<Utc>>>;
type Budgets = HashMap<AccountId, BTreeMap<ActionKind, ActionBudget>>;

/// Sliding-log rate limiter.
///
/// Each granted action records its timestamp. An action is granted only if
/// fewer than `max` timestamps fall inside the trailing window. Check and
/// debit happen under one lock and the ledger is written before the grant
/// is returned, so concurrent callers never exceed a budget and a restart
/// does not reset it. Debits are never refunded, even if the action later
/// fails.
///
/// # Example
///
/// ```
/// use chorus_core::{AccountId, ActionKind};
/// use chorus_rate_limit::{Acquisition, ActionBudget, RateLimiter};
/// use chrono::Utc;
/// use std::collections::{BTreeMap, HashMap};
///
/// # #[tokio::main]
/// # async fn main() {
/// # let dir = tempfile::TempDir::new().unwrap();
/// let account = AccountId::new("main");
/// let mut budgets = HashMap::new();
/// budgets.insert(
///     account.clone(),
///     BTreeMap::from([(ActionKind::Reply, ActionBudget::new(1, 3600))]),
/// );
/// let limiter = RateLimiter::open(dir.path().join("ledger.json"), budgets)
///     .await
///     .unwrap();
///
/// let now = Utc::now();
/// assert!(limiter.try_acquire_at(&account, ActionKind::Reply, now).await.unwrap().is_granted());
/// assert!(matches!(
///     limiter.try_acquire_at(&account, ActionKind::Reply, now).await.unwrap(),
///     Acquisition::Exhausted { .. }
/// ));
/// # }
/// ```
#[derive(Debug)]
pub struct RateLimiter {
    budgets: Budgets,
    ledger: JsonDocument<Vec<LedgerWindow>>,
    windows: Mutex<Windows>,
}

impl RateLimiter {
    /// Open the ledger at `path` and enforce `budgets`.
    #[instrument(skip_all, fields(accounts = budgets.len()))]
    pub async fn open(path: impl Into<PathBuf>, budgets: Budgets) -> ChorusResult<Self> {
        let ledger: JsonDocument<Vec<LedgerWindow>> = JsonDocument::new(path);
        let windows: Windows = ledger
            .load_or_default()
            .await?
            .into_iter()
            .map(|w| ((w.account, w.action), w.stamps))
            .collect();
        debug!(windows = windows.len(), "Loaded rate ledger");
        Ok(Self {
            budgets,
            ledger,
            windows: Mutex::new(windows),
        })
    }

    /// Budget enforced for `(account, kind)`, if any.
    pub fn budget(&self, account: &AccountId, kind: ActionKind) -> Option<ActionBudget> {
        self.budgets.get(account)?.get(&kind).copied()
    }

    /// Try to debit one action at the current time.
    pub async fn try_acquire(
        &self,
        account: &AccountId,
        kind: ActionKind,
    ) -> ChorusResult<Acquisition> {
        self.try_acquire_at(account, kind, Utc::now()).await
    }

    /// Try to debit one action at `now`.
    ///
    /// Actions without a configured budget are always granted.
    #[instrument(skip(self), fields(account = %account, action = %kind))]
    pub async fn try_acquire_at(
        &self,
        account: &AccountId,
        kind: ActionKind,
        now: DateTime<Utc>,
    ) -> ChorusResult<Acquisition> {
        let Some(budget) = self.budget(account, kind) else {
            return Ok(Acquisition::Granted);
        };

        let mut windows = self.windows.lock().await;
        let stamps = windows.entry((account.clone(), kind)).or_default();
        prune(stamps, now - budget.window());

        if stamps.len() >= budget.max as usize {
            let retry_at = stamps
                .front()
                .map(|oldest| *oldest + budget.window())
                .unwrap_or(now + budget.window());
            debug!(used = stamps.len(), max = budget.max, %retry_at, "Budget exhausted");
            return Ok(Acquisition::Exhausted { retry_at });
        }

        stamps.push_back(now);
        let used = stamps.len();
        self.ledger.save(&snapshot(&windows)).await?;
        debug!(used, max = budget.max, "Budget debited");
        Ok(Acquisition::Granted)
    }

    /// Actions left in the current window, or `None` if unlimited.
    pub async fn remaining_at(
        &self,
        account: &AccountId,
        kind: ActionKind,
        now: DateTime<Utc>,
    ) -> Option<u32> {
        let budget = self.budget(account, kind)?;
        let windows = self.windows.lock().await;
        let cutoff = now - budget.window();
        let used = windows
            .get(&(account.clone(), kind))
            .map(|stamps| stamps.iter().filter(|t| **t > cutoff).count())
            .unwrap_or(0);
        Some(budget.max.saturating_sub(used as u32))
    }
}

fn prune(stamps: &mut VecDeque<DateTime<Utc>>, cutoff: DateTime<Utc>) {
    while stamps.front().is_some_and(|t| *t <= cutoff) {
        stamps.pop_front();
    }
}

fn snapshot(windows: &Windows) -> Vec<LedgerWindow> {
    let mut ledger: Vec<LedgerWindow> = windows
        .iter()
        .filter(|(_, stamps)| !stamps.is_empty())
        .map(|((account, action), stamps)| LedgerWindow {
            account: account.clone(),
            action: *action,
            stamps: stamps.clone(),
        })
        .collect();
    ledger.sort_by(|a, b| (&a.account, a.action).cmp(&(&b.account, b.action)));
    ledger
}
