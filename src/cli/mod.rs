//! Command-line interface.

pub mod commands;
pub mod output;
pub mod types;

pub use output::handle_error;
pub use types::{Cli, Commands};

use anyhow::Result;

use crate::domain::models::config::Config;

/// Run a parsed command against the loaded configuration.
pub async fn dispatch(command: Commands, config: &Config, json_mode: bool) -> Result<()> {
    match command {
        Commands::Init(args) => commands::init::execute(args, config, json_mode).await,
        Commands::Activity(args) => commands::activity::execute(args, config, json_mode).await,
        Commands::Scheduler(args) => commands::scheduler::execute(args, config, json_mode).await,
        Commands::Serve(args) => commands::serve::execute(args, config).await,
    }
}
