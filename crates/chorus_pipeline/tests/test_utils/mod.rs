//! Scripted collaborators and a state-directory harness for pipeline tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chorus_core::{
    AccountId, ActionDescriptor, ActionKind, Item, ItemBuilder, Mode, Platform, Scope,
};
use chorus_error::{
    AutomationError, AutomationErrorKind, ChorusResult, GenerationError, GenerationErrorKind,
};
use chorus_pipeline::{
    AccountLoop, AccountProfile, AutomationDriver, Cadence, CompletionRequest, PipelineServices,
    PipelineSettings, ReplyBackend, SchedulePolicy, StyleSource,
};
use chorus_rate_limit::{ActionBudget, RateLimiter, RetryPolicy};
use chorus_storage::{StateLayout, StateStores};
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tempfile::TempDir;

/// Driver serving fixed items per scope and recording performed actions.
#[derive(Debug)]
pub struct ScriptedDriver {
    platform: Platform,
    items: parking_lot::Mutex<HashMap<Scope, Vec<Item>>>,
    auth_expired: AtomicBool,
    publish_failure: parking_lot::Mutex<Option<AutomationErrorKind>>,
    performed: parking_lot::Mutex<Vec<(AccountId, ActionDescriptor)>>,
    reset_failure: parking_lot::Mutex<Option<AutomationErrorKind>>,
    resets: AtomicUsize,
}

impl ScriptedDriver {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            items: parking_lot::Mutex::new(HashMap::new()),
            auth_expired: AtomicBool::new(false),
            publish_failure: parking_lot::Mutex::new(None),
            performed: parking_lot::Mutex::new(Vec::new()),
            reset_failure: parking_lot::Mutex::new(None),
            resets: AtomicUsize::new(0),
        }
    }

    pub fn with_items(self, scope: Scope, items: Vec<Item>) -> Self {
        self.items.lock().insert(scope, items);
        self
    }

    pub fn set_auth_expired(&self, expired: bool) {
        self.auth_expired.store(expired, Ordering::SeqCst);
    }

    pub fn fail_publish_with(&self, kind: Option<AutomationErrorKind>) {
        *self.publish_failure.lock() = kind;
    }

    pub fn fail_reset_with(&self, kind: Option<AutomationErrorKind>) {
        *self.reset_failure.lock() = kind;
    }

    pub fn performed(&self) -> Vec<(AccountId, ActionDescriptor)> {
        self.performed.lock().clone()
    }

    pub fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }

    fn check_auth(&self) -> Result<(), AutomationError> {
        if self.auth_expired.load(Ordering::SeqCst) {
            return Err(AutomationError::new(AutomationErrorKind::AuthExpired(
                "logged out".into(),
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl AutomationDriver for ScriptedDriver {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn navigate(&self, _scope: &Scope) -> Result<(), AutomationError> {
        self.check_auth()
    }

    async fn read_items(&self, scope: &Scope, limit: usize) -> Result<Vec<Item>, AutomationError> {
        self.check_auth()?;
        let items = self.items.lock().get(scope).cloned().unwrap_or_default();
        Ok(items.into_iter().take(limit).collect())
    }

    async fn perform_action(
        &self,
        account: &AccountId,
        action: &ActionDescriptor,
    ) -> Result<Option<String>, AutomationError> {
        self.check_auth()?;
        if let Some(kind) = self.publish_failure.lock().clone() {
            return Err(AutomationError::new(kind));
        }
        let mut performed = self.performed.lock();
        performed.push((account.clone(), action.clone()));
        Ok(Some(format!("ref-{}", performed.len())))
    }

    async fn reset(&self) -> Result<(), AutomationError> {
        self.resets.fetch_add(1, Ordering::SeqCst);
        match self.reset_failure.lock().clone() {
            Some(kind) => Err(AutomationError::new(kind)),
            None => Ok(()),
        }
    }
}

/// Backend replying with a fixed sentence, refusing prompts that contain
/// `refuse_marker` and the first `refuse_first` calls.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    refuse_marker: Option<String>,
    refuse_first: usize,
    calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refusing(marker: impl Into<String>) -> Self {
        Self {
            refuse_marker: Some(marker.into()),
            ..Self::default()
        }
    }

    pub fn refusing_first(calls: usize) -> Self {
        Self {
            refuse_first: calls,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReplyBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, GenerationError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let marked = self
            .refuse_marker
            .as_deref()
            .is_some_and(|marker| request.prompt().contains(marker));
        if marked || call < self.refuse_first {
            return Err(GenerationError::new(GenerationErrorKind::Rejected(
                "content policy".into(),
            )));
        }
        Ok("Reply: \"Great point, thanks for sharing!\"".to_string())
    }
}

/// Style source returning the same samples for every account.
#[derive(Debug, Default)]
pub struct StaticStyleSource {
    samples: Vec<String>,
}

impl StaticStyleSource {
    pub fn new(samples: &[&str]) -> Self {
        Self {
            samples: samples.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[async_trait]
impl StyleSource for StaticStyleSource {
    async fn samples(&self, _account: &AccountId) -> ChorusResult<Vec<String>> {
        Ok(self.samples.clone())
    }
}

/// An X item posted at `posted_at`.
pub fn item(id: &str, scope: &Scope, text: &str, posted_at: DateTime<Utc>) -> Item {
    ItemBuilder::default()
        .id(id)
        .platform(Platform::X)
        .source(scope.clone())
        .author("someone")
        .text(text)
        .posted_at(posted_at)
        .build()
        .unwrap()
}

/// `count` items with ids `<prefix>-0..`, posted an hour before `now`.
pub fn items(prefix: &str, scope: &Scope, count: usize, now: DateTime<Utc>) -> Vec<Item> {
    (0..count)
        .map(|i| {
            item(
                &format!("{}-{}", prefix, i),
                scope,
                &format!("Post number {} about Rust", i),
                now - Duration::hours(1) - Duration::minutes(i as i64),
            )
        })
        .collect()
}

/// Polls `check` for up to five seconds.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(25)).await;
    }
    false
}

/// Retries that finish in milliseconds.
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        initial_backoff_ms: 1,
        factor: 1,
        max_delay_secs: 1,
        max_attempts: 2,
    }
}

pub fn test_settings() -> PipelineSettings {
    PipelineSettings {
        schedule: SchedulePolicy {
            poll_interval: std::time::Duration::from_millis(50),
            retry: fast_retry(),
            ..SchedulePolicy::default()
        },
        retry: fast_retry(),
        ..PipelineSettings::default()
    }
}

pub type Budgets = HashMap<AccountId, BTreeMap<ActionKind, ActionBudget>>;

/// Budget table with one limit.
pub fn budget(account: &str, kind: ActionKind, max: u32, window_secs: u64) -> Budgets {
    HashMap::from([(
        AccountId::new(account),
        BTreeMap::from([(kind, ActionBudget::new(max, window_secs))]),
    )])
}

/// Services over a fresh state directory.
pub struct Harness {
    pub dir: TempDir,
    pub services: PipelineServices,
    pub backend: Arc<ScriptedBackend>,
}

impl Harness {
    pub async fn new(budgets: Budgets, settings: PipelineSettings) -> Self {
        Self::with_backend(budgets, settings, ScriptedBackend::new()).await
    }

    pub async fn with_backend(
        budgets: Budgets,
        settings: PipelineSettings,
        backend: ScriptedBackend,
    ) -> Self {
        let dir = TempDir::new().unwrap();
        let services = open_services(&dir, budgets, settings, Arc::new(backend)).await;
        let backend = services.1;
        Self {
            dir,
            services: services.0,
            backend,
        }
    }

    pub fn account_loop(
        &self,
        account: &str,
        mode: Mode,
        scopes: &[Scope],
        cadence: Cadence,
        driver: Arc<ScriptedDriver>,
    ) -> AccountLoop {
        let profile = AccountProfile::new(
            AccountId::new(account),
            Platform::X,
            mode,
            scopes,
            20,
            cadence,
        );
        self.services.account_loop(profile, None, driver)
    }
}

/// Open services over `dir`, as a restarted process would.
pub async fn open_services(
    dir: &TempDir,
    budgets: Budgets,
    settings: PipelineSettings,
    backend: Arc<ScriptedBackend>,
) -> (PipelineServices, Arc<ScriptedBackend>) {
    let layout = StateLayout::new(dir.path());
    let stores = StateStores::open(&layout).await.unwrap();
    let limiter = RateLimiter::open(layout.rate_ledger(), budgets).await.unwrap();
    let services = PipelineServices::new(
        stores,
        limiter,
        backend.clone(),
        Arc::new(StaticStyleSource::new(&["Love this!", "Ship it."])),
        settings,
    );
    (services, backend)
}
