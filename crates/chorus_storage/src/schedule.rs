//! Time-ordered schedule entries.

use crate::JsonDocument;
use chorus_core::{AccountId, DraftId, ScheduleEntry};
use chorus_error::{ChorusResult, ScheduleError, ScheduleErrorKind};
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Persistent, time-ordered set of [`ScheduleEntry`] values.
///
/// Entries are kept sorted by target time. An entry handed out by
/// [`take_due`](Self::take_due) is marked in flight on disk before it is
/// returned; entries still in flight after a restart are surfaced by
/// [`recover_in_flight`](Self::recover_in_flight) instead of being fired
/// again.
#[derive(Debug)]
pub struct ScheduleStore {
    doc: JsonDocument<Vec<ScheduleEntry>>,
    entries: Mutex<Vec<ScheduleEntry>>,
}

impl ScheduleStore {
    /// Open the schedule stored in `doc`.
    #[tracing::instrument(skip_all, fields(path = %doc.path().display()))]
    pub async fn open(doc: JsonDocument<Vec<ScheduleEntry>>) -> ChorusResult<Self> {
        let mut entries = doc.load_or_default().await?;
        sort(&mut entries);
        tracing::info!(count = entries.len(), "Loaded schedule");
        Ok(Self {
            doc,
            entries: Mutex::new(entries),
        })
    }

    /// Add an entry.
    #[tracing::instrument(skip(self, entry), fields(entry = %entry.id(), account = %entry.account(), target = %entry.target_time()))]
    pub async fn insert(&self, entry: ScheduleEntry) -> ChorusResult<()> {
        let mut entries = self.entries.lock().await;
        entries.push(entry);
        sort(&mut entries);
        self.doc.save(&entries).await?;
        tracing::debug!("Scheduled entry");
        Ok(())
    }

    /// Entries, optionally restricted to one account, in target-time order.
    pub async fn list(&self, account: Option<&AccountId>) -> Vec<ScheduleEntry> {
        self.entries
            .lock()
            .await
            .iter()
            .filter(|e| account.is_none_or(|a| e.account() == a))
            .cloned()
            .collect()
    }

    /// Target time of the earliest idle entry of `account`.
    pub async fn next_due_time(&self, account: &AccountId) -> Option<DateTime<Utc>> {
        self.entries
            .lock()
            .await
            .iter()
            .find(|e| e.account() == account && !*e.in_flight())
            .map(|e| *e.target_time())
    }

    /// Returns true if an entry publishes `draft`.
    pub async fn contains_draft(&self, draft: &DraftId) -> bool {
        self.entries
            .lock()
            .await
            .iter()
            .any(|e| e.draft() == Some(draft))
    }

    /// Mark every due idle entry of `account` in flight and return them in
    /// target-time order.
    #[tracing::instrument(skip(self), fields(account = %account))]
    pub async fn take_due(
        &self,
        account: &AccountId,
        now: DateTime<Utc>,
    ) -> ChorusResult<Vec<ScheduleEntry>> {
        let mut entries = self.entries.lock().await;
        let mut due = Vec::new();
        for entry in entries.iter_mut() {
            if entry.account() == account && !*entry.in_flight() && entry.is_due(now) {
                entry.set_in_flight(true);
                due.push(entry.clone());
            }
        }
        if !due.is_empty() {
            self.doc.save(&entries).await?;
            tracing::debug!(count = due.len(), "Took due entries");
        }
        Ok(due)
    }

    /// Move an entry to `target_time`, counting one more attempt.
    ///
    /// Returns the updated entry.
    #[tracing::instrument(skip(self), fields(entry = %id))]
    pub async fn reschedule(
        &self,
        id: Uuid,
        target_time: DateTime<Utc>,
    ) -> ChorusResult<ScheduleEntry> {
        let mut entries = self.entries.lock().await;
        let entry = entries
            .iter_mut()
            .find(|e| *e.id() == id)
            .ok_or_else(|| ScheduleError::new(ScheduleErrorKind::NotFound(id.to_string())))?;
        entry.push_back(target_time);
        let updated = entry.clone();
        sort(&mut entries);
        self.doc.save(&entries).await?;
        tracing::debug!(target = %target_time, attempts = updated.attempts(), "Rescheduled entry");
        Ok(updated)
    }

    /// Move an entry to `target_time` without counting an attempt.
    ///
    /// Used when the entry could not run for reasons outside its own
    /// control, such as an exhausted budget or a paused account.
    #[tracing::instrument(skip(self), fields(entry = %id))]
    pub async fn defer(&self, id: Uuid, target_time: DateTime<Utc>) -> ChorusResult<ScheduleEntry> {
        let mut entries = self.entries.lock().await;
        let entry = entries
            .iter_mut()
            .find(|e| *e.id() == id)
            .ok_or_else(|| ScheduleError::new(ScheduleErrorKind::NotFound(id.to_string())))?;
        entry.defer(target_time);
        let updated = entry.clone();
        sort(&mut entries);
        self.doc.save(&entries).await?;
        tracing::debug!(target = %target_time, "Deferred entry");
        Ok(updated)
    }

    /// Remove an entry after it fired or was dropped.
    #[tracing::instrument(skip(self), fields(entry = %id))]
    pub async fn complete(&self, id: Uuid) -> ChorusResult<Option<ScheduleEntry>> {
        let mut entries = self.entries.lock().await;
        let Some(pos) = entries.iter().position(|e| *e.id() == id) else {
            return Ok(None);
        };
        let removed = entries.remove(pos);
        self.doc.save(&entries).await?;
        Ok(Some(removed))
    }

    /// Remove entries for `draft` that have not started firing.
    ///
    /// Returns the number of entries cancelled.
    #[tracing::instrument(skip(self), fields(draft = %draft))]
    pub async fn cancel_for_draft(&self, draft: &DraftId) -> ChorusResult<usize> {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|e| *e.in_flight() || e.draft() != Some(draft));
        let cancelled = before - entries.len();
        if cancelled > 0 {
            self.doc.save(&entries).await?;
            tracing::info!(cancelled, "Cancelled schedule entries");
        }
        Ok(cancelled)
    }

    /// Remove and return entries left in flight by a previous process.
    #[tracing::instrument(skip(self))]
    pub async fn recover_in_flight(&self) -> ChorusResult<Vec<ScheduleEntry>> {
        let mut entries = self.entries.lock().await;
        let (stranded, idle): (Vec<_>, Vec<_>) =
            entries.drain(..).partition(|e| *e.in_flight());
        *entries = idle;
        if !stranded.is_empty() {
            self.doc.save(&entries).await?;
            tracing::warn!(count = stranded.len(), "Removed entries left in flight");
        }
        Ok(stranded)
    }
}

fn sort(entries: &mut [ScheduleEntry]) {
    entries.sort_by(|a, b| {
        a.target_time()
            .cmp(b.target_time())
            .then_with(|| a.created_at().cmp(b.created_at()))
    });
}
