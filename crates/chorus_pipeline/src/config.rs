//! Profile configuration.
//!
//! A profile is a TOML file describing the state directory, the accounts
//! to run and the pipeline thresholds. It is resolved once at startup into
//! an immutable [`ChorusConfig`]:
//!
//! ```toml
//! state_dir = "state"
//!
//! [scheduler]
//! drift_tolerance_secs = 300
//! approval_ttl_hours = 24
//!
//! [[accounts]]
//! name = "main"
//! platform = "x"
//! mode = { kind = "turbine" }
//! scopes = [{ type = "community", name = "rust" }]
//! feed_dir = "snapshots/main"
//!
//! [accounts.budgets.reply]
//! max = 5
//! window_secs = 3600
//! ```
//!
//! Values can be overridden from the environment with the `CHORUS__`
//! prefix, e.g. `CHORUS__STATE_DIR=/var/lib/chorus`.

use crate::{Cadence, GeneratorSettings, SchedulePolicy, StylePolicy};
use chorus_core::{AccountId, Mode, Platform, Scope};
use chorus_error::{ChorusError, ChorusResult, ConfigError};
use chorus_rate_limit::{BudgetTable, RateLimitConfig};
use config::{Config, Environment, File};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Collection limits of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct CollectConfig {
    /// Items read per scope and pass
    #[serde(default = "default_collect_limit")]
    limit: usize,

    /// Items older than this are ignored
    #[serde(default = "default_max_age_hours")]
    max_age_hours: Option<u64>,
}

fn default_collect_limit() -> usize {
    20
}

fn default_max_age_hours() -> Option<u64> {
    Some(72)
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            limit: default_collect_limit(),
            max_age_hours: default_max_age_hours(),
        }
    }
}

impl CollectConfig {
    /// Collection window.
    pub fn max_age(&self) -> Option<chrono::Duration> {
        self.max_age_hours.map(|h| chrono::Duration::hours(h as i64))
    }
}

/// One account and how it engages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters)]
pub struct AccountConfig {
    /// Account name (unique within the profile)
    name: String,

    /// Platform the account lives on
    platform: Platform,

    /// Operating mode
    mode: Mode,

    /// Scopes to collect from (Eternity uses its targets instead)
    #[serde(default)]
    scopes: Vec<Scope>,

    /// Instructions placed at the top of every generation prompt
    #[serde(default)]
    custom_prompt: Option<String>,

    /// Collection limits
    #[serde(default)]
    collect: CollectConfig,

    /// Collection cadence
    #[serde(default)]
    cadence: Cadence,

    /// Directory of feed snapshots read by the snapshot driver
    #[serde(default)]
    feed_dir: Option<PathBuf>,

    /// JSON-lines file receiving performed actions
    #[serde(default)]
    outbox: Option<PathBuf>,

    /// The account's own sample texts for style fingerprinting
    #[serde(default)]
    style_samples: Option<PathBuf>,

    /// Per-account budget overrides
    #[serde(default)]
    budgets: BudgetTable,

    /// Disabled accounts are not started
    #[serde(default = "default_enabled")]
    enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl AccountConfig {
    /// Account id.
    pub fn id(&self) -> AccountId {
        AccountId::new(&self.name)
    }

    /// Snapshot directory, defaulting to `snapshots/<name>`.
    pub fn feed_dir_or_default(&self) -> PathBuf {
        self.feed_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("snapshots").join(&self.name))
    }

    /// Outbox file, defaulting to `<state_dir>/outbox/<name>.jsonl`.
    pub fn outbox_or_default(&self, state_dir: &Path) -> PathBuf {
        self.outbox.clone().unwrap_or_else(|| {
            state_dir
                .join("outbox")
                .join(format!("{}.jsonl", self.name))
        })
    }
}

/// AI backend settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters)]
pub struct GenerationConfig {
    /// Gemini model name
    #[serde(default = "default_model")]
    model: String,

    /// Environment variable holding comma-separated API keys
    #[serde(default = "default_api_keys_env")]
    api_keys_env: String,

    /// Per-call timeout in seconds
    #[serde(default = "default_timeout_secs")]
    timeout_secs: u64,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    temperature: f32,

    /// Item text beyond this many characters is cut from the prompt
    #[serde(default = "default_max_item_chars")]
    max_item_chars: usize,
}

fn default_model() -> String {
    "gemini-2.5-flash-lite".to_string()
}

fn default_api_keys_env() -> String {
    "GEMINI_API_KEYS".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_temperature() -> f32 {
    0.9
}

fn default_max_item_chars() -> usize {
    1000
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_keys_env: default_api_keys_env(),
            timeout_secs: default_timeout_secs(),
            temperature: default_temperature(),
            max_item_chars: default_max_item_chars(),
        }
    }
}

impl GenerationConfig {
    /// Generator settings for an account with `custom_prompt`.
    pub fn settings(&self, custom_prompt: Option<String>) -> GeneratorSettings {
        GeneratorSettings {
            timeout: std::time::Duration::from_secs(self.timeout_secs),
            temperature: self.temperature,
            max_item_chars: self.max_item_chars,
            custom_prompt,
        }
    }
}

/// Scheduler and approval thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct SchedulerConfig {
    /// Longest sleep of an account loop, in seconds
    #[serde(default = "default_poll_interval_secs")]
    poll_interval_secs: u64,

    /// Lateness tolerated before an entry is reported overdue, in seconds
    #[serde(default = "default_drift_tolerance_secs")]
    drift_tolerance_secs: u64,

    /// Entries whose source item is older than this are dropped, in hours
    #[serde(default = "default_staleness_horizon_hours")]
    staleness_horizon_hours: Option<u64>,

    /// Delay between approval and publication, in seconds
    #[serde(default)]
    publish_delay_secs: u64,

    /// Random extra delay added to each publication, in seconds
    #[serde(default)]
    publish_jitter_secs: u64,

    /// Pending approvals older than this are discarded, in hours
    #[serde(default)]
    approval_ttl_hours: Option<u64>,
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_drift_tolerance_secs() -> u64 {
    300
}

fn default_staleness_horizon_hours() -> Option<u64> {
    Some(48)
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            drift_tolerance_secs: default_drift_tolerance_secs(),
            staleness_horizon_hours: default_staleness_horizon_hours(),
            publish_delay_secs: 0,
            publish_jitter_secs: 0,
            approval_ttl_hours: None,
        }
    }
}

impl SchedulerConfig {
    /// Scheduler policy using `rate_limits`' retry settings.
    pub fn policy(&self, rate_limits: &RateLimitConfig) -> SchedulePolicy {
        SchedulePolicy {
            drift_tolerance: chrono::Duration::seconds(self.drift_tolerance_secs as i64),
            staleness_horizon: self
                .staleness_horizon_hours
                .map(|h| chrono::Duration::hours(h as i64)),
            poll_interval: std::time::Duration::from_secs(self.poll_interval_secs.max(1)),
            retry: rate_limits.retry,
        }
    }

    /// Approval expiry.
    pub fn approval_ttl(&self) -> Option<chrono::Duration> {
        self.approval_ttl_hours
            .map(|h| chrono::Duration::hours(h as i64))
    }
}

/// Style fingerprint refresh policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct StyleConfig {
    /// Recompute after this many publications
    #[serde(default = "default_refresh_after_published")]
    refresh_after_published: u64,

    /// Recompute once the fingerprint is this old, in hours
    #[serde(default = "default_style_max_age_hours")]
    max_age_hours: u64,
}

fn default_refresh_after_published() -> u64 {
    20
}

fn default_style_max_age_hours() -> u64 {
    24
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            refresh_after_published: default_refresh_after_published(),
            max_age_hours: default_style_max_age_hours(),
        }
    }
}

impl StyleConfig {
    /// Refresh policy.
    pub fn policy(&self) -> StylePolicy {
        StylePolicy {
            refresh_after_published: self.refresh_after_published,
            max_age: chrono::Duration::hours(self.max_age_hours as i64),
        }
    }
}

/// Complete, immutable configuration of a Chorus process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters)]
pub struct ChorusConfig {
    /// Directory holding all persistent state
    #[serde(default = "default_state_dir")]
    state_dir: PathBuf,

    /// Accounts to run
    #[serde(default)]
    accounts: Vec<AccountConfig>,

    /// AI backend settings
    #[serde(default)]
    generation: GenerationConfig,

    /// Scheduler and approval thresholds
    #[serde(default)]
    scheduler: SchedulerConfig,

    /// Style refresh policy
    #[serde(default)]
    style: StyleConfig,

    /// Rate limits (bundled defaults, user overrides, then per-account
    /// budgets from the profile)
    #[serde(skip)]
    rate_limits: RateLimitConfig,
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("state")
}

impl ChorusConfig {
    /// Load the profile at `path`, apply `CHORUS__` environment overrides
    /// and resolve rate limits.
    ///
    /// # Errors
    ///
    /// Returns an error if the profile or the rate limit files cannot be
    /// read or parsed.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> ChorusResult<Self> {
        let path = path.as_ref();
        debug!("Loading profile");
        let builder = Config::builder()
            .add_source(File::from(path))
            .add_source(
                Environment::with_prefix("CHORUS")
                    .prefix_separator("__")
                    .separator("__"),
            );
        let config: Self = Self::build(builder)?;
        let config = config.with_rate_limits(RateLimitConfig::load()?);
        info!(
            accounts = config.accounts.len(),
            state_dir = %config.state_dir.display(),
            "Loaded profile"
        );
        Ok(config)
    }

    /// Parse a profile from a TOML string (no environment overrides, no
    /// rate limit resolution).
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed.
    pub fn from_toml_str(raw: &str) -> ChorusResult<Self> {
        Self::build(
            Config::builder().add_source(File::from_str(raw, config::FileFormat::Toml)),
        )
    }

    fn build(builder: config::ConfigBuilder<config::builder::DefaultState>) -> ChorusResult<Self> {
        builder
            .build()
            .map_err(|e| ChorusError::from(ConfigError::new(format!("Failed to read profile: {}", e))))?
            .try_deserialize()
            .map_err(|e| ChorusError::from(ConfigError::new(format!("Failed to parse profile: {}", e))))
    }

    /// Use `rate_limits`, overlaid with every account's budget overrides.
    pub fn with_rate_limits(mut self, rate_limits: RateLimitConfig) -> Self {
        self.rate_limits = self.accounts.iter().fold(rate_limits, |limits, account| {
            limits.with_account_overrides(&account.id(), account.budgets.clone())
        });
        self
    }

    /// Enabled accounts.
    pub fn enabled_accounts(&self) -> impl Iterator<Item = &AccountConfig> {
        self.accounts.iter().filter(|a| a.enabled)
    }

    /// Look up an account by name.
    pub fn account(&self, name: &str) -> Option<&AccountConfig> {
        self.accounts.iter().find(|a| a.name == name)
    }

    /// Check the configuration for likely mistakes.
    ///
    /// Returns human-readable warnings; an empty list means no issues.
    #[instrument(skip(self))]
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.accounts.is_empty() {
            warnings.push("No accounts configured".to_string());
        }

        let mut names = HashSet::new();
        for account in &self.accounts {
            if !names.insert(account.name.as_str()) {
                warnings.push(format!("Account '{}' is configured twice", account.name));
            }
            if account.collect.limit == 0 {
                warnings.push(format!("Account '{}' collects 0 items per pass", account.name));
            }
            if let Mode::Eternity { targets } = &account.mode
                && targets.is_empty()
            {
                warnings.push(format!(
                    "Account '{}' runs Eternity mode without targets",
                    account.name
                ));
            }
            if let Err(e) = account.cadence.validate() {
                warnings.push(format!("Account '{}': {}", account.name, e.kind));
            }
            for (action, budget) in &account.budgets {
                if budget.max == 0 {
                    warnings.push(format!(
                        "Account '{}' allows no '{}' actions",
                        account.name, action
                    ));
                }
            }
        }

        if let Some(horizon) = self.scheduler.staleness_horizon_hours
            && self.scheduler.drift_tolerance_secs > horizon * 3600
        {
            warnings.push(
                "drift_tolerance_secs exceeds the staleness horizon; late entries will be dropped as stale"
                    .to_string(),
            );
        }
        if self.scheduler.approval_ttl_hours == Some(0) {
            warnings.push("approval_ttl_hours is 0; every queued draft expires at once".to_string());
        }

        warnings.extend(self.rate_limits.validate());
        warnings
    }
}
