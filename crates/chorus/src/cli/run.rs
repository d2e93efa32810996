//! Pipeline execution command.

use chorus_error::{ChorusResult, ConfigError};
use chorus_pipeline::{
    AccountConfig, AccountLoop, ChorusConfig, FileStyleSource, GeminiBackend, PipelineServices,
    SnapshotDriver, Supervisor,
};
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Run the pipeline for the configured accounts.
///
/// With `once`, every selected account performs one collection pass, one
/// decision sync and one dispatch pass, and the command exits. Otherwise
/// the accounts run side by side until Ctrl-C.
#[instrument(skip_all, fields(config = %config_path.display()))]
pub async fn run_pipeline(config_path: &Path, only: Option<&str>, once: bool) -> ChorusResult<()> {
    let config = ChorusConfig::load(config_path)?;
    for warning in config.validate() {
        warn!(%warning, "Configuration warning");
    }

    let accounts = select_accounts(&config, only)?;
    if accounts.is_empty() {
        warn!("No enabled accounts, nothing to run");
        return Ok(());
    }

    let generation = config.generation();
    let backend = GeminiBackend::from_env(
        generation.api_keys_env(),
        generation.model().clone(),
        config.rate_limits().backend.requests_per_minute,
    )?;
    let style_source = accounts
        .iter()
        .fold(FileStyleSource::new(), |source, account| match account.style_samples() {
            Some(path) => source.with_file(account.id(), path.clone()),
            None => source,
        });

    let services =
        PipelineServices::open(&config, Arc::new(backend), Arc::new(style_source)).await?;
    services.recover_in_flight(Utc::now()).await?;

    let loops: Vec<AccountLoop> = accounts
        .iter()
        .map(|account| {
            let feed_dir = account.feed_dir_or_default();
            info!(
                account = %account.id(),
                mode = %account.mode().kind(),
                feed_dir = %feed_dir.display(),
                "Starting account"
            );
            let driver = SnapshotDriver::new(
                *account.platform(),
                feed_dir,
                account.outbox_or_default(config.state_dir()),
            );
            services.account_loop_for(account, Arc::new(driver))
        })
        .collect();

    if once {
        for account_loop in &loops {
            run_once(account_loop).await;
        }
        return Ok(());
    }

    let supervisor = Supervisor::spawn(loops);
    info!(accounts = supervisor.accounts().len(), "Pipeline running, press Ctrl-C to stop");
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Cannot listen for Ctrl-C, stopping");
    }
    info!("Shutting down");
    for (account, snapshot) in supervisor.metrics() {
        info!(
            account = %account,
            published = snapshot.published,
            queued = snapshot.queued,
            failed = snapshot.failed,
            "Final account metrics"
        );
    }
    supervisor.shutdown().await;
    Ok(())
}

/// Accounts to run: the named one, or every enabled account.
fn select_accounts<'a>(
    config: &'a ChorusConfig,
    only: Option<&str>,
) -> ChorusResult<Vec<&'a AccountConfig>> {
    match only {
        Some(name) => {
            let account = config
                .account(name)
                .ok_or_else(|| ConfigError::new(format!("Unknown account '{}'", name)))?;
            Ok(vec![account])
        }
        None => Ok(config.enabled_accounts().collect()),
    }
}

async fn run_once(account_loop: &AccountLoop) {
    let account = account_loop.account();
    let now = Utc::now();
    match account_loop.collection_pass(now).await {
        Ok(report) => info!(account = %account, ?report, "Collection pass finished"),
        Err(e) => warn!(account = %account, error = %e, "Collection pass failed"),
    }
    match account_loop.sync_decisions(Utc::now()).await {
        Ok(report) => info!(account = %account, ?report, "Decisions synced"),
        Err(e) => warn!(account = %account, error = %e, "Decision sync failed"),
    }
    match account_loop.dispatch_due(Utc::now()).await {
        Ok(report) => info!(account = %account, ?report, "Dispatch pass finished"),
        Err(e) => warn!(account = %account, error = %e, "Dispatch pass failed"),
    }
    if let Some(reason) = account_loop.control().reason() {
        warn!(account = %account, %reason, "Account paused");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROFILE: &str = r#"
state_dir = "state"

[[accounts]]
name = "main"
platform = "x"
mode = { kind = "action" }
scopes = [{ type = "feed" }]

[[accounts]]
name = "spare"
platform = "x"
mode = { kind = "action" }
enabled = false
"#;

    #[test]
    fn test_select_accounts() {
        let config = ChorusConfig::from_toml_str(PROFILE).unwrap();

        let enabled = select_accounts(&config, None).unwrap();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].name(), "main");

        let named = select_accounts(&config, Some("spare")).unwrap();
        assert_eq!(named[0].name(), "spare");

        assert!(select_accounts(&config, Some("ghost")).is_err());
    }
}
