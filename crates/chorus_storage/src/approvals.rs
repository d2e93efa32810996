//! Durable approval queue shared with human reviewers.

use crate::{ArchivedDraft, DraftArchive, JsonDocument};
use chorus_core::{AccountId, ApprovalDecision, ApprovalRecord, DraftId, DraftState};
use chorus_error::{ApprovalError, ApprovalErrorKind, ChorusResult};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tokio::sync::Mutex;

type Queue = BTreeMap<DraftId, ApprovalRecord>;

/// Outcome of [`ApprovalStore::insert_if_absent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// The record was queued
    Inserted(ApprovalRecord),
    /// A record for the same draft was already queued; it is returned unchanged
    Existing(ApprovalRecord),
}

impl Submission {
    /// The queued record.
    pub fn record(&self) -> &ApprovalRecord {
        match self {
            Submission::Inserted(r) | Submission::Existing(r) => r,
        }
    }
}

/// Approval records keyed by draft id.
///
/// The queue file is the review surface: reviewers edit it through the CLI
/// while account loops poll it. Every operation re-reads the file under the
/// store lock before mutating, so decisions made by another process are
/// picked up on the next call.
#[derive(Debug)]
pub struct ApprovalStore {
    doc: JsonDocument<Queue>,
    archive: DraftArchive,
    lock: Mutex<()>,
}

impl ApprovalStore {
    /// Queue stored in `doc`, finished records appended to `archive`.
    pub fn new(doc: JsonDocument<Queue>, archive: DraftArchive) -> Self {
        Self {
            doc,
            archive,
            lock: Mutex::new(()),
        }
    }

    /// Queue a record unless one exists for the same draft.
    #[tracing::instrument(skip(self, record), fields(draft = %record.draft_id()))]
    pub async fn insert_if_absent(&self, record: ApprovalRecord) -> ChorusResult<Submission> {
        let _guard = self.lock.lock().await;
        let mut queue = self.doc.load_or_default().await?;
        if let Some(existing) = queue.get(record.draft_id()) {
            tracing::debug!("Draft already queued");
            return Ok(Submission::Existing(existing.clone()));
        }
        queue.insert(record.draft_id().clone(), record.clone());
        self.doc.save(&queue).await?;
        tracing::info!("Queued draft for approval");
        Ok(Submission::Inserted(record))
    }

    /// Look up a record.
    pub async fn get(&self, id: &DraftId) -> ChorusResult<Option<ApprovalRecord>> {
        let _guard = self.lock.lock().await;
        Ok(self.doc.load_or_default().await?.remove(id))
    }

    /// Every live record.
    pub async fn list(&self) -> ChorusResult<Vec<ApprovalRecord>> {
        let _guard = self.lock.lock().await;
        let mut records: Vec<_> = self.doc.load_or_default().await?.into_values().collect();
        records.sort_by_key(|r| *r.created_at());
        Ok(records)
    }

    /// Pending records, optionally restricted to one account.
    pub async fn pending(&self, account: Option<&AccountId>) -> ChorusResult<Vec<ApprovalRecord>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|r| r.is_pending())
            .filter(|r| account.is_none_or(|a| r.draft().account() == a))
            .collect())
    }

    /// Decided records of `account` still in the live queue.
    pub async fn decided(&self, account: &AccountId) -> ChorusResult<Vec<ApprovalRecord>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|r| !r.is_pending() && r.draft().account() == account)
            .collect())
    }

    /// Record an operator decision.
    ///
    /// # Errors
    ///
    /// [`ApprovalErrorKind::NotFound`] if no record exists, or the record's
    /// own error if the decision is not allowed in its current state.
    #[tracing::instrument(skip(self), fields(draft = %id))]
    pub async fn decide(
        &self,
        id: &DraftId,
        decision: ApprovalDecision,
        by: &str,
        now: DateTime<Utc>,
    ) -> ChorusResult<ApprovalRecord> {
        let _guard = self.lock.lock().await;
        let mut queue = self.doc.load_or_default().await?;
        let record = queue
            .get_mut(id)
            .ok_or_else(|| ApprovalError::new(ApprovalErrorKind::NotFound(id.to_string())))?;
        match decision {
            ApprovalDecision::Approved => record.approve(by, now)?,
            ApprovalDecision::Rejected => record.reject(by, now)?,
            ApprovalDecision::Pending => {}
        }
        let record = record.clone();
        self.doc.save(&queue).await?;
        tracing::info!(decision = %decision, by, "Recorded approval decision");
        Ok(record)
    }

    /// Remove a record from the live queue and archive it.
    ///
    /// `final_state` advances the draft first (for example to
    /// [`DraftState::Published`]); `None` archives it as is. Returns the
    /// archived record, or `None` if it was not queued.
    #[tracing::instrument(skip(self), fields(draft = %id))]
    pub async fn archive(
        &self,
        id: &DraftId,
        final_state: Option<DraftState>,
        now: DateTime<Utc>,
    ) -> ChorusResult<Option<ApprovalRecord>> {
        let _guard = self.lock.lock().await;
        let mut queue = self.doc.load_or_default().await?;
        let Some(mut record) = queue.remove(id) else {
            return Ok(None);
        };
        if let Some(state) = final_state
            && *record.draft().state() != state
        {
            record.advance_draft(state)?;
        }
        // Leave the live queue first: a crash before the archive append
        // loses only the archive line, never re-runs the draft.
        self.doc.save(&queue).await?;
        self.archive
            .append(&ArchivedDraft::new(
                record.draft().clone(),
                Some(*record.decision()),
                record.decided_by().clone(),
                now,
            ))
            .await?;
        Ok(Some(record))
    }

    /// Discard pending records past their expiry and archive them.
    #[tracing::instrument(skip(self))]
    pub async fn expire(&self, now: DateTime<Utc>) -> ChorusResult<Vec<ApprovalRecord>> {
        let _guard = self.lock.lock().await;
        let mut queue = self.doc.load_or_default().await?;
        let expired_ids: Vec<DraftId> = queue
            .values()
            .filter(|r| r.is_expired(now))
            .map(|r| r.draft_id().clone())
            .collect();
        if expired_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut expired = Vec::with_capacity(expired_ids.len());
        for id in expired_ids {
            if let Some(mut record) = queue.remove(&id) {
                record.expire()?;
                expired.push(record);
            }
        }
        self.doc.save(&queue).await?;
        for record in &expired {
            self.archive
                .append(&ArchivedDraft::new(record.draft().clone(), None, None, now))
                .await?;
        }
        tracing::info!(count = expired.len(), "Expired pending approvals");
        Ok(expired)
    }
}
