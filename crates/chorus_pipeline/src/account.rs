//! The per-account control loop.

use crate::{
    AccountSession, ApprovalGate, Cadence, Collector, Deduplicator, DueEntry, GateOutcome,
    Generator, PipelineMetrics, Publisher, RetryOutcome, Scheduler, StyleProfile,
};
use chorus_core::{
    AccountId, ActionDescriptor, ActionKind, ApprovalDecision, Draft, DraftState, Item, Mode,
    Platform, ScheduleEntry, Scope,
};
use chorus_error::{ChorusResult, Classify, CollectErrorKind, FailureClass};
use chorus_rate_limit::{Acquisition, RateLimiter};
use chrono::{DateTime, Duration, Utc};
use derive_getters::Getters;
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Notify, watch};
use tracing::{debug, error, info, instrument, warn};

/// What an account does, resolved from its configuration.
#[derive(Debug, Clone, PartialEq, Getters)]
pub struct AccountProfile {
    account: AccountId,
    platform: Platform,
    mode: Mode,
    scopes: Vec<Scope>,
    limit: usize,
    max_age: Option<Duration>,
    cadence: Cadence,
}

impl AccountProfile {
    /// Profile collecting `limit` items per scope. Eternity mode replaces
    /// `scopes` with its targets.
    pub fn new(
        account: AccountId,
        platform: Platform,
        mode: Mode,
        scopes: &[Scope],
        limit: usize,
        cadence: Cadence,
    ) -> Self {
        let scopes = mode.scopes(scopes);
        Self {
            account,
            platform,
            mode,
            scopes,
            limit,
            max_age: None,
            cadence,
        }
    }

    /// Ignore items older than `max_age`.
    pub fn with_max_age(mut self, max_age: Option<Duration>) -> Self {
        self.max_age = max_age;
        self
    }
}

/// Pause switch of one account, shared with the supervisor.
#[derive(Debug, Clone, Default)]
pub struct AccountControl {
    inner: Arc<ControlInner>,
}

#[derive(Debug, Default)]
struct ControlInner {
    paused: AtomicBool,
    reason: parking_lot::Mutex<Option<String>>,
    resumed: Notify,
}

impl AccountControl {
    /// Returns true while the account is paused.
    pub fn is_paused(&self) -> bool {
        self.inner.paused.load(Ordering::Acquire)
    }

    /// Why the account was paused.
    pub fn reason(&self) -> Option<String> {
        self.inner.reason.lock().clone()
    }

    /// Stop collecting and publishing until [`resume`](Self::resume).
    pub fn pause(&self, reason: impl Into<String>) {
        *self.inner.reason.lock() = Some(reason.into());
        self.inner.paused.store(true, Ordering::Release);
    }

    /// Lift a pause and wake the loop.
    pub fn resume(&self) {
        self.inner.paused.store(false, Ordering::Release);
        *self.inner.reason.lock() = None;
        self.inner.resumed.notify_one();
    }

    async fn resumed(&self) {
        self.inner.resumed.notified().await
    }
}

/// Outcome of one collection pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    /// Items read across scopes
    pub collected: usize,
    /// Items not seen before, claimed for this pass
    pub admitted: usize,
    /// Drafts generated
    pub generated: usize,
    /// Drafts queued for review
    pub queued: usize,
    /// Drafts scheduled directly (Action mode)
    pub scheduled: usize,
    /// Scopes skipped for lack of scrape budget
    pub deferred: usize,
    /// Failures reported and skipped
    pub failed: usize,
    /// The pass paused the account
    pub paused: bool,
}

/// Outcome of one dispatch of due entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    /// Actions performed
    pub published: usize,
    /// Entries postponed without an attempt (budget, pause)
    pub deferred: usize,
    /// Entries re-enqueued after a transient failure
    pub retried: usize,
    /// Entries removed without publishing
    pub dropped: usize,
    /// Entries removed as stale
    pub stale: usize,
    /// Entries that ran later than the drift tolerance
    pub late: usize,
}

/// Outcome of applying operator decisions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Approved drafts newly scheduled
    pub scheduled: usize,
    /// Rejected drafts closed, with their entries cancelled
    pub rejected: usize,
    /// Pending records expired
    pub expired: usize,
}

/// Stages and timing an [`AccountLoop`] is built from.
#[derive(Debug, Clone)]
pub struct AccountStages {
    /// Automation session
    pub session: AccountSession,
    /// Collector
    pub collector: Collector,
    /// Deduplicator
    pub dedup: Deduplicator,
    /// Style profile
    pub style: StyleProfile,
    /// Reply generator
    pub generator: Generator,
    /// Approval gate
    pub gate: ApprovalGate,
    /// Shared rate limiter
    pub limiter: Arc<RateLimiter>,
    /// Scheduler
    pub scheduler: Scheduler,
    /// Publisher
    pub publisher: Publisher,
    /// Delay between approval and publication
    pub publish_delay: Duration,
    /// Random extra publication delay, up to this much
    pub publish_jitter: Duration,
}

/// One account's pipeline: collect, generate, gate, schedule and publish.
///
/// Work inside an account is sequential. Every collector or publisher call
/// holds the account's session lease, so at most one of them touches the
/// platform at a time. Failures are classified and reported; only an
/// account-fatal failure stops the loop, by pausing it.
#[derive(Debug, Clone)]
pub struct AccountLoop {
    profile: AccountProfile,
    stages: AccountStages,
    metrics: PipelineMetrics,
    control: AccountControl,
}

impl AccountLoop {
    /// Assemble a loop.
    pub fn new(profile: AccountProfile, stages: AccountStages) -> Self {
        Self {
            profile,
            stages,
            metrics: PipelineMetrics::new(),
            control: AccountControl::default(),
        }
    }

    /// Account driven by this loop.
    pub fn account(&self) -> &AccountId {
        &self.profile.account
    }

    /// Resolved profile.
    pub fn profile(&self) -> &AccountProfile {
        &self.profile
    }

    /// Counters.
    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    /// Pause switch.
    pub fn control(&self) -> &AccountControl {
        &self.control
    }

    /// Returns true while the account is paused.
    pub fn is_paused(&self) -> bool {
        self.control.is_paused()
    }

    /// Pause the account.
    pub fn pause(&self, reason: impl Into<String>) {
        self.control.pause(reason);
    }

    /// Resume a paused account.
    pub fn resume(&self) {
        self.control.resume();
    }

    fn pause_for(&self, reason: String) {
        error!(account = %self.profile.account, %reason, "Pausing account");
        self.control.pause(reason);
    }

    /// Collect every scope, generate drafts for new items and route them
    /// through the approval gate.
    ///
    /// A failing item or scope is reported and skipped. An account-fatal
    /// failure pauses the account and ends the pass.
    #[instrument(skip(self), fields(account = %self.profile.account))]
    pub async fn collection_pass(&self, now: DateTime<Utc>) -> ChorusResult<PassReport> {
        let mut report = PassReport::default();
        let account = &self.profile.account;
        let stages = &self.stages;

        for scope in &self.profile.scopes {
            if self.is_paused() {
                report.paused = true;
                break;
            }
            if let Acquisition::Exhausted { retry_at } = stages
                .limiter
                .try_acquire_at(account, ActionKind::Scrape, now)
                .await?
            {
                debug!(%scope, %retry_at, "Scrape budget spent, skipping scope");
                report.deferred += 1;
                self.metrics.record_deferred(1);
                continue;
            }

            let lease = match stages.session.lease().await {
                Ok(lease) => lease,
                Err(e) if e.is_fatal_for_account() => {
                    self.pause_for(e.to_string());
                    report.paused = true;
                    break;
                }
                Err(e) => {
                    warn!(%scope, error = %e, "Session unavailable, skipping scope");
                    report.failed += 1;
                    self.metrics.record_failed(1);
                    continue;
                }
            };
            let outcome = stages
                .collector
                .collect(&lease, scope, self.profile.limit, now)
                .await;
            lease.settle(&outcome);

            let items = match outcome {
                Ok(items) => items,
                Err(e) if matches!(e.kind, CollectErrorKind::EmptyResult(_)) => {
                    debug!(%scope, "Nothing new in scope");
                    continue;
                }
                Err(e) if e.is_fatal_for_account() => {
                    self.pause_for(e.to_string());
                    report.paused = true;
                    break;
                }
                Err(e) => {
                    warn!(%scope, error = %e, "Collection failed, skipping scope");
                    report.failed += 1;
                    self.metrics.record_failed(1);
                    continue;
                }
            };
            report.collected += items.len();
            self.metrics.record_collected(items.len() as u64);

            let admitted = stages.dedup.claim_batch(items).await;
            report.admitted += admitted.len();
            self.metrics.record_admitted(admitted.len() as u64);
            if admitted.is_empty() {
                continue;
            }

            let fingerprint = stages.style.fingerprint_at(account, now).await;
            for item in &admitted {
                let draft = match stages
                    .generator
                    .generate(account, item, &fingerprint, self.profile.mode.kind())
                    .await
                {
                    Ok(draft) => draft,
                    Err(e) => {
                        warn!(item = %item.id(), class = %e.class(), error = %e, "Generation failed, item left for next pass");
                        stages.dedup.release(item).await;
                        report.failed += 1;
                        self.metrics.record_failed(1);
                        continue;
                    }
                };
                report.generated += 1;
                self.metrics.record_generated(1);

                match self.route_draft(draft, now).await {
                    Ok(Routed::Scheduled) => report.scheduled += 1,
                    Ok(Routed::Queued) => {
                        report.queued += 1;
                        self.metrics.record_queued(1);
                    }
                    Err(e) => {
                        warn!(item = %item.id(), error = %e, "Could not hand draft on, item left for next pass");
                        stages.dedup.release(item).await;
                        report.failed += 1;
                        self.metrics.record_failed(1);
                        continue;
                    }
                }
                if let Err(e) = stages.dedup.commit(item, now).await {
                    warn!(item = %item.id(), error = %e, "Failed to record item as seen");
                    report.failed += 1;
                    self.metrics.record_failed(1);
                }
            }
        }

        info!(
            collected = report.collected,
            admitted = report.admitted,
            generated = report.generated,
            queued = report.queued,
            scheduled = report.scheduled,
            failed = report.failed,
            "Collection pass finished"
        );
        Ok(report)
    }

    async fn route_draft(&self, draft: Draft, now: DateTime<Utc>) -> ChorusResult<Routed> {
        match self
            .stages
            .gate
            .submit_at(draft, &self.profile.mode, now)
            .await?
        {
            GateOutcome::Immediate(draft) => {
                self.schedule_draft(&draft, now).await?;
                Ok(Routed::Scheduled)
            }
            GateOutcome::Queued(record) => {
                debug!(draft = %record.draft_id(), "Queued for review");
                Ok(Routed::Queued)
            }
        }
    }

    async fn schedule_draft(&self, draft: &Draft, now: DateTime<Utc>) -> ChorusResult<()> {
        let jitter_secs = self.stages.publish_jitter.num_seconds().max(0);
        let jitter = if jitter_secs > 0 {
            Duration::seconds(rand::thread_rng().gen_range(0..=jitter_secs))
        } else {
            Duration::zero()
        };
        let target = now + self.stages.publish_delay + jitter;
        let entry = ScheduleEntry::new(
            draft.account().clone(),
            *draft.item().platform(),
            target,
            reply_action(draft.item(), draft),
            Some(*draft.item().posted_at()),
            now,
        );
        debug!(draft = %draft.id(), entry = %entry.id(), %target, "Scheduled draft");
        self.stages.scheduler.enqueue(entry).await?;
        self.metrics.record_scheduled(1);
        Ok(())
    }

    /// Apply operator decisions: schedule approved drafts, cancel and close
    /// rejected ones, and expire unanswered records.
    #[instrument(skip(self), fields(account = %self.profile.account))]
    pub async fn sync_decisions(&self, now: DateTime<Utc>) -> ChorusResult<SyncReport> {
        let mut report = SyncReport::default();
        let stages = &self.stages;

        let expired = stages.gate.expire(now).await?;
        let own_expired = expired
            .iter()
            .filter(|r| r.draft().account() == &self.profile.account)
            .count();
        report.expired = own_expired;
        self.metrics.record_expired(own_expired as u64);

        for record in stages.gate.take_decided(&self.profile.account).await? {
            let id = record.draft_id();
            match record.decision() {
                ApprovalDecision::Rejected => {
                    let cancelled = stages.scheduler.cancel_for_draft(id).await?;
                    stages.gate.close(id, None, now).await?;
                    info!(draft = %id, cancelled, "Closed rejected draft");
                    report.rejected += 1;
                }
                ApprovalDecision::Approved => {
                    if !stages.scheduler.has_draft(id).await {
                        self.schedule_draft(record.draft(), now).await?;
                        report.scheduled += 1;
                    }
                }
                ApprovalDecision::Pending => {}
            }
        }
        Ok(report)
    }

    /// Run the account's due entries in target-time order.
    #[instrument(skip(self), fields(account = %self.profile.account))]
    pub async fn dispatch_due(&self, now: DateTime<Utc>) -> ChorusResult<DispatchReport> {
        let mut report = DispatchReport::default();
        let stages = &self.stages;
        let account = &self.profile.account;
        let mut due = stages.scheduler.take_due(account, now).await?.into_iter();

        while let Some(due_entry) = due.next() {
            let entry = match due_entry {
                DueEntry::Stale { entry, .. } => {
                    report.stale += 1;
                    self.metrics.record_stale(1);
                    if let Some(draft) = entry.draft() {
                        stages.gate.close(draft, Some(DraftState::Discarded), now).await?;
                    }
                    continue;
                }
                DueEntry::Runnable { entry, late } => {
                    if late {
                        report.late += 1;
                        self.metrics.record_drifted(1);
                    }
                    entry
                }
            };

            if self.is_paused() {
                stages
                    .scheduler
                    .defer_until(*entry.id(), self.paused_until(now))
                    .await?;
                report.deferred += 1;
                continue;
            }

            if self.profile.mode.requires_approval() && !self.still_approved(&entry).await? {
                stages.scheduler.complete(*entry.id()).await?;
                report.dropped += 1;
                continue;
            }

            let kind = *entry.action().kind();
            if let Acquisition::Exhausted { retry_at } =
                stages.limiter.try_acquire_at(account, kind, now).await?
            {
                stages.scheduler.defer_until(*entry.id(), retry_at).await?;
                info!(entry = %entry.id(), action = %kind, %retry_at, "Budget spent, deferred to next window");
                report.deferred += 1;
                self.metrics.record_deferred(1);
                continue;
            }

            let lease = match stages.session.lease().await {
                Ok(lease) => lease,
                Err(e) if e.is_fatal_for_account() => {
                    stages
                        .scheduler
                        .defer_until(*entry.id(), self.paused_until(now))
                        .await?;
                    self.pause_for(e.to_string());
                    report.deferred += 1;
                    self.defer_rest(&mut due, now, &mut report).await?;
                    break;
                }
                Err(e) => {
                    warn!(entry = %entry.id(), error = %e, "Session unavailable, will retry");
                    match stages.scheduler.retry_later(&entry, now).await? {
                        RetryOutcome::Rescheduled(_) => report.retried += 1,
                        RetryOutcome::GaveUp(entry) => {
                            self.discard(&entry, now).await?;
                            self.metrics.record_failed(1);
                            report.dropped += 1;
                        }
                    }
                    continue;
                }
            };
            let outcome = stages.publisher.publish(&lease, entry.action()).await;
            lease.settle(&outcome);

            match outcome {
                Ok(receipt) => {
                    stages.scheduler.complete(*entry.id()).await?;
                    if let Some(draft) = receipt.draft() {
                        stages.gate.close(draft, Some(DraftState::Published), now).await?;
                    }
                    if let Err(e) = stages.style.note_published(account).await {
                        warn!(error = %e, "Failed to count publication for style refresh");
                    }
                    self.metrics.record_published();
                    report.published += 1;
                }
                Err(e) => match e.class() {
                    FailureClass::Transient => {
                        warn!(entry = %entry.id(), error = %e, "Publish failed, will retry");
                        match stages.scheduler.retry_later(&entry, now).await? {
                            RetryOutcome::Rescheduled(_) => report.retried += 1,
                            RetryOutcome::GaveUp(entry) => {
                                self.discard(&entry, now).await?;
                                self.metrics.record_failed(1);
                                report.dropped += 1;
                            }
                        }
                    }
                    FailureClass::FatalForAccount => {
                        stages
                            .scheduler
                            .defer_until(*entry.id(), self.paused_until(now))
                            .await?;
                        self.pause_for(e.to_string());
                        report.deferred += 1;
                        self.defer_rest(&mut due, now, &mut report).await?;
                        break;
                    }
                    FailureClass::Policy | FailureClass::Internal => {
                        warn!(entry = %entry.id(), error = %e, "Publish refused, dropping entry");
                        stages.scheduler.complete(*entry.id()).await?;
                        self.discard(&entry, now).await?;
                        self.metrics.record_failed(1);
                        report.dropped += 1;
                    }
                },
            }
        }
        Ok(report)
    }

    async fn still_approved(&self, entry: &ScheduleEntry) -> ChorusResult<bool> {
        let Some(draft) = entry.draft() else {
            return Ok(true);
        };
        let approved = self
            .stages
            .gate
            .record(draft)
            .await?
            .is_some_and(|r| *r.decision() == ApprovalDecision::Approved);
        if !approved {
            warn!(entry = %entry.id(), draft = %draft, "Draft no longer approved, dropping entry");
        }
        Ok(approved)
    }

    async fn discard(&self, entry: &ScheduleEntry, now: DateTime<Utc>) -> ChorusResult<()> {
        if let Some(draft) = entry.draft() {
            self.stages
                .gate
                .close(draft, Some(DraftState::Discarded), now)
                .await?;
        }
        Ok(())
    }

    async fn defer_rest(
        &self,
        rest: impl Iterator<Item = DueEntry>,
        now: DateTime<Utc>,
        report: &mut DispatchReport,
    ) -> ChorusResult<()> {
        let target = self.paused_until(now);
        for due in rest {
            if let DueEntry::Runnable { entry, .. } = due {
                self.stages.scheduler.defer_until(*entry.id(), target).await?;
                report.deferred += 1;
            }
        }
        Ok(())
    }

    /// Where entries of a paused account wait: one poll interval ahead.
    fn paused_until(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let poll = self.stages.scheduler.policy().poll_interval;
        now + Duration::from_std(poll).unwrap_or(Duration::seconds(60))
    }

    /// How long the loop sleeps after an iteration.
    ///
    /// A paused account waits a full poll interval, or until resumed.
    /// Otherwise the loop wakes for the next schedule entry or the next
    /// collection pass, capped by the poll interval.
    pub async fn wake_delay(
        &self,
        next_pass: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> std::time::Duration {
        let scheduler = &self.stages.scheduler;
        if self.is_paused() {
            return scheduler.policy().poll_interval;
        }
        let wake = scheduler.next_wake(&self.profile.account, now).await;
        match next_pass {
            Some(next) => wake.min((next - now).to_std().unwrap_or_default()),
            None => wake,
        }
    }

    /// One full iteration: decisions, an optional collection pass, then
    /// dispatch.
    pub async fn tick(&self, now: DateTime<Utc>, collect: bool) -> ChorusResult<()> {
        self.sync_decisions(now).await?;
        if collect && !self.is_paused() {
            self.collection_pass(now).await?;
        }
        self.dispatch_due(now).await?;
        Ok(())
    }

    /// Run until `shutdown` flips to true.
    ///
    /// Errors from a single iteration are logged and the loop goes on.
    /// Between iterations it sleeps for [`wake_delay`](Self::wake_delay) and
    /// wakes early on resume or shutdown.
    #[instrument(skip_all, fields(account = %self.profile.account))]
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(mode = %self.profile.mode.kind(), scopes = self.profile.scopes.len(), "Account loop started");
        let mut last_pass: Option<DateTime<Utc>> = None;
        let mut next_pass: Option<DateTime<Utc>> = None;

        loop {
            if *shutdown.borrow() {
                break;
            }
            let now = Utc::now();

            if !self.is_paused() {
                let check = self.profile.cadence.check(last_pass, now);
                if check.should_run {
                    last_pass = Some(now);
                }
                next_pass = check.next_run;
                if let Err(e) = self.tick(now, check.should_run).await {
                    error!(error = %e, "Account iteration failed");
                }
                let snapshot = self.metrics.snapshot();
                debug!(?snapshot, "Account metrics");
            }

            let sleep = self.wake_delay(next_pass, Utc::now()).await;

            tokio::select! {
                _ = tokio::time::sleep(sleep) => {}
                _ = self.control.resumed() => {
                    info!("Account resumed");
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        info!("Account loop stopped");
    }
}

/// Where a fresh draft went.
enum Routed {
    Scheduled,
    Queued,
}

fn reply_action(item: &Item, draft: &Draft) -> ActionDescriptor {
    ActionDescriptor::reply(item.id().clone(), draft.text().clone(), draft.id().clone())
}
