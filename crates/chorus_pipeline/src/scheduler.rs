//! Time-ordered dispatch of schedule entries.

use chorus_core::{AccountId, DraftId, ScheduleEntry};
use chorus_error::{ChorusResult, ScheduleError, ScheduleErrorKind};
use chorus_rate_limit::RetryPolicy;
use chorus_storage::ScheduleStore;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Timing thresholds of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulePolicy {
    /// Lateness tolerated before an entry is reported as overdue
    pub drift_tolerance: Duration,
    /// Entries whose source item is older than this are discarded
    pub staleness_horizon: Option<Duration>,
    /// Longest sleep of the control loop
    pub poll_interval: std::time::Duration,
    /// Backoff for transient publish failures
    pub retry: RetryPolicy,
}

impl Default for SchedulePolicy {
    fn default() -> Self {
        Self {
            drift_tolerance: Duration::minutes(5),
            staleness_horizon: Some(Duration::hours(48)),
            poll_interval: std::time::Duration::from_secs(60),
            retry: RetryPolicy::default(),
        }
    }
}

/// An entry handed out by [`Scheduler::take_due`].
#[derive(Debug, Clone)]
pub enum DueEntry {
    /// Ready to execute; `late` is set when it is past the drift tolerance
    Runnable {
        /// The entry, marked in flight
        entry: ScheduleEntry,
        /// Overdue beyond the drift tolerance
        late: bool,
    },
    /// Removed because its source item passed the staleness horizon
    Stale {
        /// The removed entry
        entry: ScheduleEntry,
        /// The `StaleSchedule` report
        error: ScheduleError,
    },
}

/// Outcome of [`Scheduler::retry_later`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome {
    /// The entry will fire again at the given time
    Rescheduled(DateTime<Utc>),
    /// The attempt ceiling was reached; the entry was removed
    GaveUp(ScheduleEntry),
}

/// Drives [`ScheduleEntry`] values through their lifetime: enqueue, wait,
/// run or re-enqueue, and removal.
///
/// Nothing leaves the schedule silently: every removal is a completion, a
/// cancellation, a `StaleSchedule` report or an exhausted retry, and each
/// is logged.
#[derive(Debug, Clone)]
pub struct Scheduler {
    store: Arc<ScheduleStore>,
    policy: SchedulePolicy,
}

impl Scheduler {
    /// Scheduler over `store`.
    pub fn new(store: Arc<ScheduleStore>, policy: SchedulePolicy) -> Self {
        Self { store, policy }
    }

    /// Timing thresholds.
    pub fn policy(&self) -> &SchedulePolicy {
        &self.policy
    }

    /// Add an entry.
    pub async fn enqueue(&self, entry: ScheduleEntry) -> ChorusResult<()> {
        self.store.insert(entry).await
    }

    /// Returns true if an entry already publishes `draft`.
    pub async fn has_draft(&self, draft: &DraftId) -> bool {
        self.store.contains_draft(draft).await
    }

    /// How long `account`'s loop may sleep: until its next entry or the
    /// poll interval, whichever is sooner.
    pub async fn next_wake(&self, account: &AccountId, now: DateTime<Utc>) -> std::time::Duration {
        match self.store.next_due_time(account).await {
            Some(target) => (target - now)
                .to_std()
                .unwrap_or(std::time::Duration::ZERO)
                .min(self.policy.poll_interval),
            None => self.policy.poll_interval,
        }
    }

    /// Hand out `account`'s due entries in target-time order.
    ///
    /// Entries whose source item passed the staleness horizon are removed
    /// and returned as [`DueEntry::Stale`]. Overdue entries still run.
    #[instrument(skip(self), fields(account = %account))]
    pub async fn take_due(
        &self,
        account: &AccountId,
        now: DateTime<Utc>,
    ) -> ChorusResult<Vec<DueEntry>> {
        let mut due = Vec::new();
        for entry in self.store.take_due(account, now).await? {
            if let Some(error) = self.staleness(&entry, now) {
                warn!(entry = %entry.id(), error = %error, "Dropping stale schedule entry");
                self.store.complete(*entry.id()).await?;
                due.push(DueEntry::Stale { entry, error });
                continue;
            }
            let lateness = now - *entry.target_time();
            let late = lateness > self.policy.drift_tolerance;
            if late {
                warn!(
                    entry = %entry.id(),
                    late_secs = lateness.num_seconds(),
                    "Entry overdue beyond drift tolerance, running now"
                );
            }
            due.push(DueEntry::Runnable { entry, late });
        }
        Ok(due)
    }

    fn staleness(&self, entry: &ScheduleEntry, now: DateTime<Utc>) -> Option<ScheduleError> {
        let horizon = self.policy.staleness_horizon?;
        let posted_at = (*entry.source_posted_at())?;
        let age = now - posted_at;
        (age > horizon).then(|| {
            ScheduleError::new(ScheduleErrorKind::StaleSchedule {
                entry: entry.id().to_string(),
                age_minutes: age.num_minutes(),
            })
        })
    }

    /// Put an entry back without counting an attempt (budget exhausted,
    /// account paused).
    pub async fn defer_until(&self, id: Uuid, target: DateTime<Utc>) -> ChorusResult<()> {
        self.store.defer(id, target).await?;
        debug!(entry = %id, %target, "Deferred entry");
        Ok(())
    }

    /// Re-enqueue an entry after a transient failure, with backoff.
    ///
    /// Once the retry ceiling is reached the entry is removed and returned
    /// as [`RetryOutcome::GaveUp`].
    #[instrument(skip(self, entry), fields(entry = %entry.id(), attempts = entry.attempts()))]
    pub async fn retry_later(
        &self,
        entry: &ScheduleEntry,
        now: DateTime<Utc>,
    ) -> ChorusResult<RetryOutcome> {
        let attempts = entry.attempts() + 1;
        if self.policy.retry.exhausted(attempts) {
            warn!("Retry ceiling reached, giving up on entry");
            self.store.complete(*entry.id()).await?;
            return Ok(RetryOutcome::GaveUp(entry.clone()));
        }
        let delay = self.policy.retry.delay_for(*entry.attempts());
        let target = now + Duration::from_std(delay).unwrap_or(Duration::seconds(60));
        self.store.reschedule(*entry.id(), target).await?;
        info!(%target, "Re-enqueued entry after transient failure");
        Ok(RetryOutcome::Rescheduled(target))
    }

    /// Remove an entry that fired or was dropped.
    pub async fn complete(&self, id: Uuid) -> ChorusResult<Option<ScheduleEntry>> {
        self.store.complete(id).await
    }

    /// Cancel not-yet-fired entries for `draft`.
    pub async fn cancel_for_draft(&self, draft: &DraftId) -> ChorusResult<usize> {
        self.store.cancel_for_draft(draft).await
    }

    /// Remove entries a previous process left in flight. They are reported,
    /// never fired again.
    pub async fn recover_in_flight(&self) -> ChorusResult<Vec<ScheduleEntry>> {
        self.store.recover_in_flight().await
    }

    /// Entries, optionally for one account.
    pub async fn list(&self, account: Option<&AccountId>) -> Vec<ScheduleEntry> {
        self.store.list(account).await
    }
}
