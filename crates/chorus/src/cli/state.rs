//! State directory inspection and maintenance commands.

use super::commands::{OutputFormat, ScheduleCommands, SeenCommands};
use chorus_core::AccountId;
use chorus_error::{ChorusResult, JsonError};
use chorus_pipeline::ChorusConfig;
use chorus_storage::{StateLayout, StateStores};
use chrono::{Duration, Utc};
use tracing::info;

/// Open every store under the profile's state directory.
pub async fn open_state(config: &ChorusConfig) -> ChorusResult<StateStores> {
    StateStores::open(&StateLayout::new(config.state_dir().clone())).await
}

/// Handle schedule commands.
pub async fn handle_schedule_command(cmd: ScheduleCommands, config: &ChorusConfig) -> ChorusResult<()> {
    match cmd {
        ScheduleCommands::List { account, format } => {
            let stores = open_state(config).await?;
            let account = account.map(AccountId::new);
            let entries = stores.schedule.list(account.as_ref()).await;

            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&entries).map_err(JsonError::from)?);
                }
                OutputFormat::Human => {
                    let now = Utc::now();
                    println!("{:<38} {:<12} {:<8} {:<26} {}", "ID", "ACCOUNT", "ACTION", "TARGET", "ATTEMPTS");
                    println!("{:-<96}", "");
                    for entry in &entries {
                        let marker = if entry.is_due(now) { " (due)" } else { "" };
                        println!(
                            "{:<38} {:<12} {:<8} {:<26} {}{}",
                            entry.id(),
                            entry.account(),
                            entry.action().kind(),
                            entry.target_time().to_rfc3339(),
                            entry.attempts(),
                            marker
                        );
                    }
                    println!("Total: {} entries", entries.len());
                }
            }
            Ok(())
        }
    }
}

/// Handle seen-item log commands.
pub async fn handle_seen_command(cmd: SeenCommands, config: &ChorusConfig) -> ChorusResult<()> {
    match cmd {
        SeenCommands::Prune { older_than_days } => {
            let stores = open_state(config).await?;
            let cutoff = Utc::now() - Duration::days(i64::from(older_than_days));
            let removed = stores.seen.prune_older_than(cutoff).await?;
            let remaining = stores.seen.len().await;
            info!(removed, remaining, "Pruned seen-item log");
            println!("Removed {} seen items, {} remain", removed, remaining);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chorus_core::{ItemId, Platform};
    use tempfile::TempDir;

    fn profile(dir: &TempDir) -> ChorusConfig {
        let raw = format!("state_dir = {:?}\n", dir.path().join("state"));
        ChorusConfig::from_toml_str(&raw).unwrap()
    }

    #[tokio::test]
    async fn test_prune_forgets_old_items() {
        let dir = TempDir::new().unwrap();
        let config = profile(&dir);
        {
            let stores = open_state(&config).await.unwrap();
            let now = Utc::now();
            stores
                .seen
                .admit(Platform::X, &ItemId::new("old"), now - Duration::days(40))
                .await
                .unwrap();
            stores
                .seen
                .admit(Platform::X, &ItemId::new("fresh"), now)
                .await
                .unwrap();
        }

        handle_seen_command(SeenCommands::Prune { older_than_days: 30 }, &config)
            .await
            .unwrap();

        let stores = open_state(&config).await.unwrap();
        assert_eq!(stores.seen.len().await, 1);
        assert!(stores.seen.contains(Platform::X, &ItemId::new("fresh")).await);
    }

    #[tokio::test]
    async fn test_schedule_list_on_empty_state() {
        let dir = TempDir::new().unwrap();
        let config = profile(&dir);
        let cmd = ScheduleCommands::List {
            account: None,
            format: OutputFormat::Json,
        };
        handle_schedule_command(cmd, &config).await.unwrap();
    }
}
