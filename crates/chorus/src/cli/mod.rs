//! Command-line interface module.
//!
//! This module provides the CLI structure and command handlers for the chorus binary.

mod commands;
mod review;
mod run;
mod state;

pub use commands::{Cli, Commands};
pub use review::handle_review_command;
pub use run::run_pipeline;
pub use state::{handle_schedule_command, handle_seen_command};
