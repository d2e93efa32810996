//! Engagement pipeline for Chorus.
//!
//! Each configured account runs its own [`AccountLoop`]:
//!
//! ```text
//! Collector -> Deduplicator -> StyleProfile -> Generator -> ApprovalGate
//!                                                              |
//!             Publisher <- RateLimiter <- Scheduler <----------+
//! ```
//!
//! # Architecture
//!
//! - **Session**: [`AccountSession`] hands out one [`SessionLease`] at a
//!   time and resets the [`AutomationDriver`] after an unclean release
//! - **Stages**: [`Collector`], [`Deduplicator`], [`StyleProfile`],
//!   [`Generator`], [`ApprovalGate`], [`Scheduler`], [`Publisher`]
//! - **Loops**: [`AccountLoop`] per account, run side by side by the
//!   [`Supervisor`]
//! - **Operators**: [`ReviewDesk`] reads and decides queued drafts
//!
//! # Example
//!
//! ```no_run
//! use chorus_pipeline::{
//!     ChorusConfig, FileStyleSource, GeminiBackend, PipelineServices, SnapshotDriver, Supervisor,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ChorusConfig::load("chorus.toml")?;
//! let backend = GeminiBackend::from_env("GEMINI_API_KEYS", "gemini-2.5-flash-lite", 60)?;
//! let services =
//!     PipelineServices::open(&config, Arc::new(backend), Arc::new(FileStyleSource::new())).await?;
//!
//! let loops = config
//!     .enabled_accounts()
//!     .map(|account| {
//!         let driver = SnapshotDriver::new(
//!             *account.platform(),
//!             account.feed_dir_or_default(),
//!             account.outbox_or_default(config.state_dir()),
//!         );
//!         services.account_loop_for(account, Arc::new(driver))
//!     })
//!     .collect();
//!
//! let supervisor = Supervisor::spawn(loops);
//! tokio::signal::ctrl_c().await?;
//! supervisor.shutdown().await;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod account;
mod backends;
mod cadence;
mod collector;
mod config;
mod dedup;
mod driver;
mod gate;
mod generator;
mod metrics;
mod platforms;
mod publisher;
mod review;
mod scheduler;
mod services;
mod session;
mod style;
mod supervisor;

pub use account::{
    AccountControl, AccountLoop, AccountProfile, AccountStages, DispatchReport, PassReport,
    SyncReport,
};
pub use backends::{GeminiBackend, KEY_COOLDOWN, KeyPool};
pub use cadence::{Cadence, CadenceCheck};
pub use collector::Collector;
pub use config::{
    AccountConfig, ChorusConfig, CollectConfig, GenerationConfig, SchedulerConfig, StyleConfig,
};
pub use dedup::Deduplicator;
pub use driver::AutomationDriver;
pub use gate::{ApprovalGate, GateOutcome};
pub use generator::{CompletionRequest, Generator, GeneratorSettings, ReplyBackend, clean_reply};
pub use metrics::{MetricsSnapshot, PipelineMetrics};
pub use platforms::{OutboxRecord, SESSION_EXPIRED_MARKER, SnapshotDriver, SnapshotItem};
pub use publisher::{PublishReceipt, Publisher};
pub use review::ReviewDesk;
pub use scheduler::{DueEntry, RetryOutcome, SchedulePolicy, Scheduler};
pub use services::{PipelineServices, PipelineSettings};
pub use session::{AccountSession, SessionLease};
pub use style::{FileStyleSource, StylePolicy, StyleProfile, StyleSource};
pub use supervisor::Supervisor;
