//! Lifecycle scheduler CLI commands.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::commands::AppContext;
use crate::cli::output::{format_optional_timestamp, format_timestamp, list_table, output, truncate, CommandOutput};
use crate::domain::models::config::Config;
use crate::services::{ActivityScheduler, Cadence, PassOutcome, PassReport, RuleOutcome, SchedulerStatus};

#[derive(Args, Debug)]
pub struct SchedulerArgs {
    #[command(subcommand)]
    pub command: SchedulerCommands,
}

#[derive(Subcommand, Debug)]
pub enum SchedulerCommands {
    /// Run the scheduler in the foreground until interrupted
    Run {
        /// Cadence override, e.g. 30s, 5m or a cron expression
        #[arg(short, long)]
        cadence: Option<Cadence>,
        /// Skip the immediate pass at startup
        #[arg(long)]
        no_startup_pass: bool,
    },
    /// Run a single evaluation pass now
    Trigger,
    /// Show which activities a pass would move right now
    Due,
}

fn render_report(report: &PassReport) -> Vec<String> {
    let mut lines = vec![format!("Evaluated at {}", format_timestamp(report.evaluated_at))];
    for outcome in &report.outcomes {
        lines.push(format!(
            "  {}: {} matched, {} updated",
            outcome.rule,
            outcome.matched.len(),
            outcome.updated
        ));
    }
    lines
}

impl CommandOutput for PassOutcome {
    fn to_human(&self) -> String {
        match self {
            PassOutcome::Completed { report } => {
                let mut lines = vec![format!("Pass completed: {} activities updated.", report.total())];
                lines.extend(render_report(report));
                lines.join("\n")
            }
            PassOutcome::Skipped => "Pass skipped: another pass is still running.".to_string(),
            PassOutcome::Failed { rule, error, partial } => {
                let mut lines = vec![format!("Pass failed at {rule}: {error}")];
                lines.extend(render_report(partial));
                lines.join("\n")
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DueOutput {
    pub rules: Vec<RuleOutcome>,
}

impl CommandOutput for DueOutput {
    fn to_human(&self) -> String {
        let total: usize = self.rules.iter().map(|r| r.matched.len()).sum();
        if total == 0 {
            return "Nothing is due.".to_string();
        }
        let mut table = list_table(&["rule", "id", "title"]);
        for rule in &self.rules {
            for activity in &rule.matched {
                table.add_row(vec![
                    rule.rule.to_string(),
                    activity.id.to_string(),
                    truncate(&activity.title, 40),
                ]);
            }
        }
        format!("{total} due:\n{table}")
    }
}

impl CommandOutput for SchedulerStatus {
    fn to_human(&self) -> String {
        let s = self;
        let mut lines = vec![
            format!(
                "Scheduler: {}",
                s.cadence
                    .as_ref()
                    .map_or_else(|| "stopped".to_string(), |c| format!("running every {c}"))
            ),
            format!(
                "Passes: {} total, {} skipped, {} failed",
                s.total_passes, s.skipped_passes, s.failed_passes
            ),
            format!("Last pass: {}", format_optional_timestamp(s.last_pass_at)),
        ];
        if let Some(error) = &s.last_error {
            lines.push(format!("Last error: {error}"));
        }
        lines.join("\n")
    }
}

pub async fn execute(args: SchedulerArgs, config: &Config, json_mode: bool) -> Result<()> {
    let ctx = AppContext::open(config).await?;

    match args.command {
        SchedulerCommands::Run {
            cadence,
            no_startup_pass,
        } => {
            let default_cadence: Cadence = config
                .scheduler
                .cadence
                .parse()
                .context("Invalid scheduler cadence in configuration")?;
            let run_on_start = config.scheduler.run_on_start && !no_startup_pass;
            let scheduler = ActivityScheduler::new(ctx.engine, default_cadence, run_on_start);

            scheduler.start(cadence).await;
            tracing::info!("scheduler running; press Ctrl+C to stop");

            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for shutdown signal")?;

            scheduler.stop();
            output(&scheduler.status().await, json_mode);
        }
        SchedulerCommands::Trigger => {
            let outcome = match ctx.engine.run_pass().await {
                Ok(report) => PassOutcome::Completed { report },
                Err(failure) => PassOutcome::Failed {
                    rule: failure.rule,
                    error: failure.source.to_string(),
                    partial: failure.partial,
                },
            };
            let failed = matches!(outcome, PassOutcome::Failed { .. });
            output(&outcome, json_mode);
            if failed {
                anyhow::bail!("Lifecycle pass did not complete");
            }
        }
        SchedulerCommands::Due => {
            let rules = ctx.engine.preview().await.context("Failed to evaluate due activities")?;
            output(&DueOutput { rules }, json_mode);
        }
    }
    Ok(())
}
