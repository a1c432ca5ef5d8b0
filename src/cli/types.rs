//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::cli::commands::activity::ActivityArgs;
use crate::cli::commands::init::InitArgs;
use crate::cli::commands::scheduler::SchedulerArgs;
use crate::cli::commands::serve::ServeArgs;

#[derive(Parser, Debug)]
#[command(name = "venue-activities")]
#[command(about = "Venue directory activities: lifecycle scheduler and API", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Load configuration from this file instead of .venue/config.yaml
    #[arg(short, long, global = true, env = "VENUE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the configured log level
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize configuration and database
    Init(InitArgs),

    /// Activity management commands
    Activity(ActivityArgs),

    /// Lifecycle scheduler commands
    Scheduler(SchedulerArgs),

    /// Run the HTTP API with the lifecycle scheduler
    Serve(ServeArgs),
}
