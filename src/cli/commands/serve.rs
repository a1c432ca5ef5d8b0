//! Implementation of the `serve` command.

use anyhow::{Context, Result};
use clap::Args;

use crate::adapters::http::{ActivitiesHttpConfig, ActivitiesHttpServer};
use crate::cli::commands::AppContext;
use crate::domain::models::config::Config;
use crate::services::ActivityScheduler;

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Bind address override
    #[arg(long)]
    pub host: Option<String>,

    /// Port override
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Serve the API without starting the scheduler
    #[arg(long)]
    pub no_scheduler: bool,
}

pub async fn execute(args: ServeArgs, config: &Config) -> Result<()> {
    let ctx = AppContext::open(config).await?;

    let scheduler = ActivityScheduler::from_config(ctx.engine, &config.scheduler)
        .context("Invalid scheduler configuration")?;
    if config.scheduler.enabled && !args.no_scheduler {
        scheduler.start(None).await;
    } else {
        tracing::info!("lifecycle scheduler disabled; start it via POST /api/v1/scheduler/start");
    }

    let mut http_config = ActivitiesHttpConfig::from(&config.server);
    if let Some(host) = args.host {
        http_config.host = host;
    }
    if let Some(port) = args.port {
        http_config.port = port;
    }

    let server = ActivitiesHttpServer::new(ctx.service, scheduler.clone(), http_config);
    let result = server
        .serve_with_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
            tracing::info!("shutdown requested");
        })
        .await;

    scheduler.stop();
    result.map_err(|e| anyhow::anyhow!(e)).context("HTTP server failed")
}
