//! CLI command implementations.

pub mod activity;
pub mod init;
pub mod scheduler;
pub mod serve;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::adapters::sqlite::{initialize_from_config, SqliteActivityRepository};
use crate::domain::models::config::Config;
use crate::domain::ports::{Clock, SystemClock};
use crate::services::{ActivityService, TransitionEngine};

/// Services wired against the configured SQLite database.
pub struct AppContext {
    pub service: ActivityService<SqliteActivityRepository>,
    pub engine: TransitionEngine<SqliteActivityRepository>,
}

impl AppContext {
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = initialize_from_config(&config.database)
            .await
            .with_context(|| format!("Failed to open database at {}", config.database.path))?;

        let repo = Arc::new(SqliteActivityRepository::new(pool));
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        Ok(Self {
            service: ActivityService::new(Arc::clone(&repo), Arc::clone(&clock)),
            engine: TransitionEngine::new(repo, clock),
        })
    }
}

/// Parse an RFC 3339 timestamp, or an offset from now such as `+90s`, `+5m`, `+2h`, `+1d`.
pub fn parse_when(input: &str) -> Result<DateTime<Utc>, String> {
    parse_when_at(input, Utc::now())
}

fn parse_when_at(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, String> {
    let input = input.trim();
    if let Some(offset) = input.strip_prefix('+') {
        let Some(unit) = offset.chars().last() else {
            return Err(format!("Invalid offset '{input}'; expected e.g. +30m"));
        };
        let amount: i64 = offset[..offset.len() - unit.len_utf8()]
            .parse()
            .map_err(|_| format!("Invalid offset '{input}'; expected e.g. +30m"))?;
        let delta = match unit {
            's' => chrono::TimeDelta::try_seconds(amount),
            'm' => chrono::TimeDelta::try_minutes(amount),
            'h' => chrono::TimeDelta::try_hours(amount),
            'd' => chrono::TimeDelta::try_days(amount),
            _ => return Err(format!("Invalid offset unit in '{input}'; use s, m, h or d")),
        };
        return delta
            .and_then(|delta| now.checked_add_signed(delta))
            .ok_or_else(|| format!("Offset '{input}' is out of range"));
    }

    DateTime::parse_from_rfc3339(input)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("Invalid timestamp '{input}': {e}"))
}
