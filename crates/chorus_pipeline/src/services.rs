//! Shared stores and collaborators that account loops are built from.

use crate::{
    AccountConfig, AccountLoop, AccountProfile, AccountSession, AccountStages, ApprovalGate,
    AutomationDriver, ChorusConfig, Collector, Deduplicator, Generator, GeneratorSettings,
    Publisher, ReplyBackend, SchedulePolicy, Scheduler, StylePolicy, StyleProfile, StyleSource,
};
use chorus_core::{DraftState, ScheduleEntry};
use chorus_error::ChorusResult;
use chorus_rate_limit::{RateLimiter, RetryPolicy};
use chorus_storage::{
    ApprovalStore, DraftArchive, ScheduleStore, SeenStore, StateLayout, StateStores, StyleCache,
};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Process-wide pipeline parameters.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Scheduler thresholds
    pub schedule: SchedulePolicy,
    /// Style refresh policy
    pub style: StylePolicy,
    /// Generator settings; `custom_prompt` is filled in per account
    pub generator: GeneratorSettings,
    /// Backoff for collection and generation
    pub retry: RetryPolicy,
    /// Pending approval expiry
    pub approval_ttl: Option<Duration>,
    /// Delay between approval and publication
    pub publish_delay: Duration,
    /// Random extra publication delay
    pub publish_jitter: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            schedule: SchedulePolicy::default(),
            style: StylePolicy::default(),
            generator: GeneratorSettings::default(),
            retry: RetryPolicy::default(),
            approval_ttl: None,
            publish_delay: Duration::zero(),
            publish_jitter: Duration::zero(),
        }
    }
}

impl PipelineSettings {
    /// Settings resolved from a profile.
    pub fn from_config(config: &ChorusConfig) -> Self {
        let scheduler = config.scheduler();
        Self {
            schedule: scheduler.policy(config.rate_limits()),
            style: config.style().policy(),
            generator: config.generation().settings(None),
            retry: config.rate_limits().retry,
            approval_ttl: scheduler.approval_ttl(),
            publish_delay: Duration::seconds(*scheduler.publish_delay_secs() as i64),
            publish_jitter: Duration::seconds(*scheduler.publish_jitter_secs() as i64),
        }
    }
}

/// Everything account loops share: the durable stores, the rate limiter,
/// the AI backend and the style source.
///
/// Stores are opened once and shared through `Arc`, so uniqueness (seen
/// items, one approval record per draft) is enforced in one place for all
/// accounts.
#[derive(Clone)]
pub struct PipelineServices {
    seen: Arc<SeenStore>,
    approvals: Arc<ApprovalStore>,
    archive: DraftArchive,
    schedule: Arc<ScheduleStore>,
    styles: Arc<StyleCache>,
    limiter: Arc<RateLimiter>,
    backend: Arc<dyn ReplyBackend>,
    style_source: Arc<dyn StyleSource>,
    settings: PipelineSettings,
}

impl PipelineServices {
    /// Services over already opened stores.
    pub fn new(
        stores: StateStores,
        limiter: RateLimiter,
        backend: Arc<dyn ReplyBackend>,
        style_source: Arc<dyn StyleSource>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            seen: Arc::new(stores.seen),
            approvals: Arc::new(stores.approvals),
            archive: stores.archive,
            schedule: Arc::new(stores.schedule),
            styles: Arc::new(stores.styles),
            limiter: Arc::new(limiter),
            backend,
            style_source,
            settings,
        }
    }

    /// Open the state directory of `config` and build services for its
    /// enabled accounts.
    ///
    /// # Errors
    ///
    /// Returns an error if a store cannot be opened.
    #[instrument(skip_all, fields(state_dir = %config.state_dir().display()))]
    pub async fn open(
        config: &ChorusConfig,
        backend: Arc<dyn ReplyBackend>,
        style_source: Arc<dyn StyleSource>,
    ) -> ChorusResult<Self> {
        let layout = StateLayout::new(config.state_dir().clone());
        let stores = StateStores::open(&layout).await?;
        let budgets: HashMap<_, _> = config
            .enabled_accounts()
            .map(|account| {
                (
                    account.id(),
                    config.rate_limits().resolve(*account.platform(), &account.id()),
                )
            })
            .collect();
        let limiter = RateLimiter::open(layout.rate_ledger(), budgets).await?;
        Ok(Self::new(
            stores,
            limiter,
            backend,
            style_source,
            PipelineSettings::from_config(config),
        ))
    }

    /// Seen-item store.
    pub fn seen(&self) -> &Arc<SeenStore> {
        &self.seen
    }

    /// Approval queue.
    pub fn approvals(&self) -> &Arc<ApprovalStore> {
        &self.approvals
    }

    /// Finished-draft archive.
    pub fn archive(&self) -> &DraftArchive {
        &self.archive
    }

    /// Rate limiter.
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Pipeline parameters.
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Approval gate over the shared queue.
    pub fn gate(&self) -> ApprovalGate {
        ApprovalGate::new(Arc::clone(&self.approvals), self.settings.approval_ttl)
    }

    /// Scheduler over the shared schedule.
    pub fn scheduler(&self) -> Scheduler {
        Scheduler::new(Arc::clone(&self.schedule), self.settings.schedule)
    }

    /// Build the loop of one account.
    pub fn account_loop(
        &self,
        profile: AccountProfile,
        custom_prompt: Option<String>,
        driver: Arc<dyn AutomationDriver>,
    ) -> AccountLoop {
        let settings = &self.settings;
        let generator_settings = GeneratorSettings {
            custom_prompt,
            ..settings.generator.clone()
        };
        let stages = AccountStages {
            session: AccountSession::new(profile.account().clone(), driver),
            collector: Collector::new(*profile.max_age(), settings.retry),
            dedup: Deduplicator::new(Arc::clone(&self.seen)),
            style: StyleProfile::new(
                Arc::clone(&self.style_source),
                Arc::clone(&self.styles),
                settings.style,
            ),
            generator: Generator::new(Arc::clone(&self.backend), generator_settings, settings.retry),
            gate: self.gate(),
            limiter: Arc::clone(&self.limiter),
            scheduler: self.scheduler(),
            publisher: Publisher::new(),
            publish_delay: settings.publish_delay,
            publish_jitter: settings.publish_jitter,
        };
        AccountLoop::new(profile, stages)
    }

    /// Build the loop of a configured account.
    pub fn account_loop_for(
        &self,
        account: &AccountConfig,
        driver: Arc<dyn AutomationDriver>,
    ) -> AccountLoop {
        let profile = AccountProfile::new(
            account.id(),
            *account.platform(),
            account.mode().clone(),
            account.scopes(),
            *account.collect().limit(),
            account.cadence().clone(),
        )
        .with_max_age(account.collect().max_age());
        self.account_loop(profile, account.custom_prompt().clone(), driver)
    }

    /// Remove entries a previous process left in flight and discard their
    /// drafts. Nothing is published twice.
    #[instrument(skip(self))]
    pub async fn recover_in_flight(&self, now: DateTime<Utc>) -> ChorusResult<Vec<ScheduleEntry>> {
        let recovered = self.scheduler().recover_in_flight().await?;
        let gate = self.gate();
        for entry in &recovered {
            warn!(entry = %entry.id(), account = %entry.account(), "Entry was in flight at shutdown, not re-running");
            if let Some(draft) = entry.draft() {
                gate.close(draft, Some(DraftState::Discarded), now).await?;
            }
        }
        if !recovered.is_empty() {
            info!(count = recovered.len(), "Recovered in-flight entries");
        }
        Ok(recovered)
    }
}

impl std::fmt::Debug for PipelineServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineServices")
            .field("backend", &self.backend.name())
            .field("settings", &self.settings)
            .finish()
    }
}
