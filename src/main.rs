//! Venue activities CLI entry point.

use anyhow::Context;
use clap::Parser;

use venue_activities::cli::{self, Cli};
use venue_activities::infrastructure::config::ConfigLoader;
use venue_activities::infrastructure::logging::{LogConfig, LoggerImpl};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json_mode = cli.json;

    let config = match cli.config.as_ref() {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
    .context("Failed to load configuration");
    let config = match config {
        Ok(config) => config,
        Err(err) => cli::handle_error(&err, json_mode),
    };

    let mut log_config = LogConfig::from(&config.logging);
    if let Some(level) = cli.log_level {
        log_config.level = level;
    }
    let _logger = match LoggerImpl::init(&log_config).context("Failed to initialize logging") {
        Ok(logger) => logger,
        Err(err) => cli::handle_error(&err, json_mode),
    };

    if let Err(err) = cli::dispatch(cli.command, &config, json_mode).await {
        cli::handle_error(&err, json_mode);
    }
}
