//! Approval queue command handlers.

use super::commands::{OutputFormat, ReviewCommands};
use super::state::open_state;
use chorus_core::{AccountId, ApprovalRecord};
use chorus_error::{ChorusResult, JsonError};
use chorus_pipeline::{ApprovalGate, ChorusConfig, ReviewDesk};
use std::sync::Arc;

/// Handle review commands.
pub async fn handle_review_command(cmd: ReviewCommands, config: &ChorusConfig) -> ChorusResult<()> {
    let desk = open_desk(config).await?;
    match cmd {
        ReviewCommands::List { account, format } => {
            let account = account.map(AccountId::new);
            let pending = desk.list(account.as_ref()).await?;
            print_pending(&pending, format)
        }
        ReviewCommands::Approve { id, by } => {
            let record = desk.approve(&id, &by).await?;
            println!("Approved {} for {}", record.draft_id(), record.draft().account());
            Ok(())
        }
        ReviewCommands::Reject { id, by } => {
            let record = desk.reject(&id, &by).await?;
            println!("Rejected {} for {}", record.draft_id(), record.draft().account());
            Ok(())
        }
    }
}

async fn open_desk(config: &ChorusConfig) -> ChorusResult<ReviewDesk> {
    let stores = open_state(config).await?;
    let gate = ApprovalGate::new(Arc::new(stores.approvals), config.scheduler().approval_ttl());
    Ok(ReviewDesk::new(gate))
}

fn print_pending(pending: &[ApprovalRecord], format: OutputFormat) -> ChorusResult<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(pending).map_err(JsonError::from)?);
        }
        OutputFormat::Human => {
            for record in pending {
                let draft = record.draft();
                let item = draft.item();
                println!(
                    "{}  [{}] queued {}",
                    draft.id(),
                    draft.account(),
                    record.created_at().format("%Y-%m-%d %H:%M")
                );
                println!("  @{} ({}): {}", item.author(), item.source(), excerpt(item.text(), 200));
                println!("  -> {}", draft.text());
                if let Some(expires_at) = record.expires_at() {
                    println!("  expires {}", expires_at.format("%Y-%m-%d %H:%M"));
                }
                println!();
            }
            println!("Pending: {}", pending.len());
        }
    }
    Ok(())
}

/// First `max` characters of `text` on one line.
fn excerpt(text: &str, max: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max {
        flat
    } else {
        let mut cut: String = flat.chars().take(max).collect();
        cut.push_str("...");
        cut
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chorus_core::{ApprovalDecision, Draft, DraftId, ItemBuilder, ModeKind, Platform, Scope};
    use chorus_storage::Submission;
    use chrono::Utc;
    use tempfile::TempDir;

    #[test]
    fn test_excerpt_flattens_and_cuts() {
        assert_eq!(excerpt("a\n  b", 10), "a b");
        assert_eq!(excerpt("abcdef", 3), "abc...");
    }

    #[tokio::test]
    async fn test_approve_by_prefix_through_state_dir() {
        let dir = TempDir::new().unwrap();
        let raw = format!("state_dir = {:?}\n", dir.path().join("state"));
        let config = ChorusConfig::from_toml_str(&raw).unwrap();

        let now = Utc::now();
        let item = ItemBuilder::default()
            .id("42")
            .platform(Platform::X)
            .source(Scope::Feed)
            .author("someone")
            .text("Rust 2024 is out")
            .posted_at(now)
            .build()
            .unwrap();
        let draft = Draft::new(AccountId::new("main"), item, "Congrats!", None, ModeKind::Turbine, now);
        let id = draft.id().as_str().to_string();
        let stores = open_state(&config).await.unwrap();
        let submitted = stores
            .approvals
            .insert_if_absent(ApprovalRecord::new(draft, now, None))
            .await
            .unwrap();
        assert!(matches!(submitted, Submission::Inserted(_)));

        let cmd = ReviewCommands::Approve {
            id: id[..8].to_string(),
            by: "alice".into(),
        };
        handle_review_command(cmd, &config).await.unwrap();

        let record = stores.approvals.get(&DraftId::parse(&id)).await.unwrap().unwrap();
        assert_eq!(*record.decision(), ApprovalDecision::Approved);
        assert_eq!(record.decided_by().as_deref(), Some("alice"));
    }
}
