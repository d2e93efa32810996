//! CLI command definitions.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Chorus - multi-account social engagement with human-in-the-loop approval
#[derive(Parser, Debug)]
#[command(name = "chorus")]
#[command(about = "Multi-account social engagement with human-in-the-loop approval", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Profile file describing accounts, generation and scheduling
    #[arg(short, long, global = true, env = "CHORUS_CONFIG", default_value = "chorus.toml")]
    pub config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the pipeline for every enabled account
    Run {
        /// Only run this account
        #[arg(long)]
        account: Option<String>,

        /// Run one collection, sync and dispatch pass per account, then exit
        #[arg(long)]
        once: bool,
    },

    /// Inspect and decide drafts waiting for approval
    #[command(subcommand)]
    Review(ReviewCommands),

    /// Inspect scheduled actions
    #[command(subcommand)]
    Schedule(ScheduleCommands),

    /// Maintain the seen-item log
    #[command(subcommand)]
    Seen(SeenCommands),
}

/// Approval queue subcommands
#[derive(Subcommand, Debug)]
pub enum ReviewCommands {
    /// List pending drafts, oldest first
    List {
        /// Only show drafts of this account
        #[arg(long)]
        account: Option<String>,

        /// Output format
        #[arg(long, default_value = "human")]
        format: OutputFormat,
    },

    /// Approve a draft by id or unique id prefix
    Approve {
        /// Draft id or prefix
        id: String,

        /// Name recorded as the decider
        #[arg(long, env = "USER", default_value = "operator")]
        by: String,
    },

    /// Reject a draft by id or unique id prefix
    Reject {
        /// Draft id or prefix
        id: String,

        /// Name recorded as the decider
        #[arg(long, env = "USER", default_value = "operator")]
        by: String,
    },
}

/// Schedule subcommands
#[derive(Subcommand, Debug)]
pub enum ScheduleCommands {
    /// List scheduled actions by target time
    List {
        /// Only show entries of this account
        #[arg(long)]
        account: Option<String>,

        /// Output format
        #[arg(long, default_value = "human")]
        format: OutputFormat,
    },
}

/// Seen-item log subcommands
#[derive(Subcommand, Debug)]
pub enum SeenCommands {
    /// Forget items first seen more than the given number of days ago
    Prune {
        /// Age threshold in days
        #[arg(long, default_value = "30")]
        older_than_days: u32,
    },
}

/// Output format options
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable format
    Human,
    /// JSON format
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_once_for_one_account() {
        let cli = Cli::try_parse_from(["chorus", "run", "--account", "main", "--once"]).unwrap();
        match cli.command {
            Commands::Run { account, once } => {
                assert_eq!(account.as_deref(), Some("main"));
                assert!(once);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_review_approve_with_global_config() {
        let cli = Cli::try_parse_from([
            "chorus",
            "review",
            "approve",
            "3fa2",
            "--by",
            "alice",
            "--config",
            "profiles/team.toml",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("profiles/team.toml"));
        match cli.command {
            Commands::Review(ReviewCommands::Approve { id, by }) => {
                assert_eq!(id, "3fa2");
                assert_eq!(by, "alice");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
