//! Chorus CLI binary.
//!
//! This binary provides command-line access to the engagement pipeline:
//! - Run account loops, continuously or for a single pass
//! - Review drafts waiting for approval
//! - Inspect the schedule and maintain the seen-item log

use clap::Parser;

mod cli;
mod observability;

use chorus_pipeline::ChorusConfig;
use observability::{ObservabilityConfig, init_observability};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use cli::{
        Cli, Commands, handle_review_command, handle_schedule_command, handle_seen_command,
        run_pipeline,
    };

    // API keys and CHORUS__ overrides may live in .env
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    init_observability(
        &ObservabilityConfig::default()
            .with_log_level(log_level)
            .with_json_logs(cli.json_logs),
    )?;

    match cli.command {
        Commands::Run { account, once } => {
            run_pipeline(&cli.config, account.as_deref(), once).await?;
        }

        Commands::Review(review_cmd) => {
            let config = ChorusConfig::load(&cli.config)?;
            handle_review_command(review_cmd, &config).await?;
        }

        Commands::Schedule(schedule_cmd) => {
            let config = ChorusConfig::load(&cli.config)?;
            handle_schedule_command(schedule_cmd, &config).await?;
        }

        Commands::Seen(seen_cmd) => {
            let config = ChorusConfig::load(&cli.config)?;
            handle_seen_command(seen_cmd, &config).await?;
        }
    }

    Ok(())
}
