//! Budget configuration.
//!
//! Budgets are loaded from TOML with a precedence system:
//! - Bundled defaults (include_str! from rate_limits.toml)
//! - User overrides (~/.config/chorus/rate_limits.toml, then ./rate_limits.toml)
//! - Per-account overrides supplied by the profile

use crate::RetryPolicy;
use chorus_core::{AccountId, ActionKind, Platform};
use chorus_error::{ChorusError, ChorusResult, ConfigError};
use config::{Config, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::{debug, instrument};

/// Budget for one action type: at most `max` actions in any `window_secs`.
///
/// ```toml
/// [platforms.x.reply]
/// max = 20
/// window_secs = 3600
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionBudget {
    /// Maximum actions per window
    pub max: u32,
    /// Window length in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

fn default_window_secs() -> u64 {
    3600
}

impl ActionBudget {
    /// Creates a budget.
    pub fn new(max: u32, window_secs: u64) -> Self {
        Self { max, window_secs }
    }

    /// Window length.
    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.window_secs.min(i64::MAX as u64) as i64)
    }
}

/// Quota for the AI backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendQuota {
    /// Requests per minute, per API key
    #[serde(default = "default_backend_rpm")]
    pub requests_per_minute: u32,
}

fn default_backend_rpm() -> u32 {
    60
}

impl Default for BackendQuota {
    fn default() -> Self {
        Self {
            requests_per_minute: default_backend_rpm(),
        }
    }
}

/// Action budgets keyed by action name (`reply`, `like`, ...).
pub type BudgetTable = BTreeMap<String, ActionBudget>;

/// Rate limit configuration.
///
/// # Example
///
/// ```no_run
/// use chorus_core::{AccountId, ActionKind, Platform};
/// use chorus_rate_limit::RateLimitConfig;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = RateLimitConfig::load()?;
/// let budget = config.budget_for(Platform::X, &AccountId::new("main"), ActionKind::Reply);
/// println!("{:?}", budget);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Platform-level budgets (platform name -> action -> budget)
    #[serde(default)]
    pub platforms: BTreeMap<String, BudgetTable>,

    /// Account-level overrides (account name -> action -> budget)
    #[serde(default)]
    pub accounts: BTreeMap<String, BudgetTable>,

    /// AI backend quota
    #[serde(default)]
    pub backend: BackendQuota,

    /// Retry policy for transient failures
    #[serde(default)]
    pub retry: RetryPolicy,
}

impl RateLimitConfig {
    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed.
    pub fn from_toml_str(raw: &str) -> ChorusResult<Self> {
        Self::build(Config::builder().add_source(File::from_str(raw, FileFormat::Toml)))
    }

    /// Load configuration from a specific file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<std::path::Path>) -> ChorusResult<Self> {
        debug!("Loading rate limits from file");
        Self::build(Config::builder().add_source(File::from(path.as_ref())))
    }

    /// Load configuration with precedence: current dir > home dir > bundled defaults.
    ///
    /// User config files are optional and silently skipped if absent.
    #[instrument]
    pub fn load() -> ChorusResult<Self> {
        debug!("Loading rate limits with precedence: current dir > home dir > bundled defaults");

        const DEFAULT_CONFIG: &str = include_str!("../../../rate_limits.toml");

        let mut builder =
            Config::builder().add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml));

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".config/chorus/rate_limits.toml");
            builder = builder.add_source(File::from(home_config).required(false));
        }

        builder = builder.add_source(File::with_name("rate_limits").required(false));

        Self::build(builder)
    }

    fn build(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> ChorusResult<Self> {
        builder
            .build()
            .map_err(|e| {
                ChorusError::from(ConfigError::new(format!(
                    "Failed to build rate limit configuration: {}",
                    e
                )))
            })?
            .try_deserialize()
            .map_err(|e| {
                ChorusError::from(ConfigError::new(format!(
                    "Failed to parse rate limit configuration: {}",
                    e
                )))
            })
    }

    /// Add or replace account-level overrides.
    pub fn with_account_overrides(mut self, account: &AccountId, overrides: BudgetTable) -> Self {
        if !overrides.is_empty() {
            self.accounts
                .entry(account.as_str().to_string())
                .or_default()
                .extend(overrides);
        }
        self
    }

    /// Effective budget for an action: account override, then platform default.
    ///
    /// `None` means the action is not limited.
    pub fn budget_for(
        &self,
        platform: Platform,
        account: &AccountId,
        kind: ActionKind,
    ) -> Option<ActionBudget> {
        let key = kind.to_string();
        self.accounts
            .get(account.as_str())
            .and_then(|table| table.get(&key))
            .or_else(|| {
                self.platforms
                    .get(&platform.to_string())
                    .and_then(|table| table.get(&key))
            })
            .copied()
    }

    /// Resolve every action budget for one account.
    pub fn resolve(&self, platform: Platform, account: &AccountId) -> BTreeMap<ActionKind, ActionBudget> {
        use strum::IntoEnumIterator;
        ActionKind::iter()
            .filter_map(|kind| {
                self.budget_for(platform, account, kind)
                    .map(|budget| (kind, budget))
            })
            .collect()
    }

    /// Check the configuration for likely mistakes.
    ///
    /// Returns human-readable warnings; an empty list means no issues.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        for (platform, table) in &self.platforms {
            if Platform::from_str(platform).is_err() {
                warnings.push(format!("Unknown platform '{}' in rate limits", platform));
            }
            check_table(&format!("platforms.{}", platform), table, &mut warnings);
        }
        for (account, table) in &self.accounts {
            check_table(&format!("accounts.{}", account), table, &mut warnings);
        }
        if self.backend.requests_per_minute == 0 {
            warnings.push("backend.requests_per_minute is 0; generation will never run".into());
        }
        if self.retry.max_attempts == 0 {
            warnings.push("retry.max_attempts is 0; transient failures are never retried".into());
        }
        warnings
    }
}

fn check_table(prefix: &str, table: &BudgetTable, warnings: &mut Vec<String>) {
    for (action, budget) in table {
        if ActionKind::from_str(action).is_err() {
            warnings.push(format!("Unknown action '{}' in {}", action, prefix));
        }
        if budget.max == 0 {
            warnings.push(format!("{}.{} allows no actions", prefix, action));
        }
        if budget.window_secs == 0 {
            warnings.push(format!("{}.{} has a zero-length window", prefix, action));
        }
    }
}
