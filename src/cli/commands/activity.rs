//! Activity CLI commands.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use serde::Serialize;
use uuid::Uuid;

use crate::adapters::sqlite::SqliteActivityRepository;
use crate::cli::commands::{parse_when, AppContext};
use crate::cli::output::{
    format_optional_timestamp, format_timestamp, list_table, output, render_list, truncate, CommandOutput,
};
use crate::domain::models::activity::{Activity, ActivityPatch, ActivityStatus, ActivityType, NewActivity};
use crate::domain::models::config::Config;
use crate::domain::ports::ActivityFilter;
use crate::services::{ActivityService, TransitionOutcome};

#[derive(Args, Debug)]
pub struct ActivityArgs {
    #[command(subcommand)]
    pub command: ActivityCommands,
}

#[derive(Subcommand, Debug)]
pub enum ActivityCommands {
    /// Create an activity
    Create {
        /// Title
        title: String,
        /// Start time (RFC 3339, or an offset like +30m)
        #[arg(short, long, value_parser = parse_when)]
        start: DateTime<Utc>,
        /// End time (RFC 3339, or an offset like +2h)
        #[arg(short, long, value_parser = parse_when)]
        end: Option<DateTime<Utc>>,
        /// Hosting place ID
        #[arg(long)]
        place: Option<Uuid>,
        /// Activity type (sports, music, club, dj, event, festival, workshop, other)
        #[arg(short = 't', long = "type", value_parser = parse_type)]
        activity_type: Option<ActivityType>,
        /// Description
        #[arg(short, long)]
        description: Option<String>,
        /// Free-form location
        #[arg(short, long)]
        location: Option<String>,
        /// Explicit slug (derived from the title otherwise)
        #[arg(long)]
        slug: Option<String>,
        /// Mark as featured
        #[arg(long)]
        featured: bool,
    },
    /// List activities ordered by start time
    List {
        /// Filter by status (upcoming, live, completed, cancelled)
        #[arg(short, long, value_parser = parse_status)]
        status: Option<ActivityStatus>,
        /// Filter by hosting place
        #[arg(long)]
        place: Option<Uuid>,
        /// Filter by activity type
        #[arg(short = 't', long = "type", value_parser = parse_type)]
        activity_type: Option<ActivityType>,
        /// Only featured activities
        #[arg(long)]
        featured: bool,
        /// Include hidden activities
        #[arg(long)]
        all: bool,
        /// Maximum number of activities to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: u32,
    },
    /// Show activity details
    Show {
        /// Activity ID or slug
        id: String,
    },
    /// Edit descriptive fields of an upcoming or live activity
    Update {
        /// Activity ID or slug
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(short, long)]
        location: Option<String>,
        #[arg(short = 't', long = "type", value_parser = parse_type)]
        activity_type: Option<ActivityType>,
        /// New start time
        #[arg(short, long, value_parser = parse_when)]
        start: Option<DateTime<Utc>>,
        /// New end time
        #[arg(short, long, value_parser = parse_when, conflicts_with = "clear_end")]
        end: Option<DateTime<Utc>>,
        /// Remove the end time so the activity only completes manually
        #[arg(long)]
        clear_end: bool,
    },
    /// Cancel an upcoming or live activity
    Cancel {
        /// Activity ID or slug
        id: String,
    },
    /// Force an activity live regardless of its start time
    MakeLive {
        /// Activity ID or slug
        id: String,
    },
    /// Mark an activity completed regardless of its end time
    Complete {
        /// Activity ID or slug
        id: String,
    },
    /// Toggle the featured flag
    ToggleFeatured {
        /// Activity ID or slug
        id: String,
    },
    /// Hide or restore an activity
    ToggleActive {
        /// Activity ID or slug
        id: String,
    },
    /// Delete an activity
    Delete {
        /// Activity ID or slug
        id: String,
    },
    /// Create an activity starting in one minute and ending two minutes later
    QuickTest,
    /// Count activities per status
    Stats,
}

fn parse_status(s: &str) -> Result<ActivityStatus, String> {
    ActivityStatus::from_str(s).ok_or_else(|| format!("Unknown status: {s}"))
}

fn parse_type(s: &str) -> Result<ActivityType, String> {
    ActivityType::from_str(s).ok_or_else(|| format!("Unknown activity type: {s}"))
}

#[derive(Debug, Serialize)]
pub struct ActivityDetailOutput {
    pub activity: Activity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied: Option<bool>,
    #[serde(skip)]
    pub headline: Option<String>,
}

impl From<Activity> for ActivityDetailOutput {
    fn from(activity: Activity) -> Self {
        Self {
            activity,
            applied: None,
            headline: None,
        }
    }
}

impl ActivityDetailOutput {
    fn with_headline(mut self, headline: impl Into<String>) -> Self {
        self.headline = Some(headline.into());
        self
    }

    fn from_transition(outcome: TransitionOutcome, verb: &str) -> Self {
        let headline = if outcome.applied {
            format!("Activity {verb}.")
        } else {
            format!(
                "No change: activity was moved to {} concurrently.",
                outcome.activity.status
            )
        };
        Self {
            activity: outcome.activity,
            applied: Some(outcome.applied),
            headline: Some(headline),
        }
    }
}

impl CommandOutput for ActivityDetailOutput {
    fn to_human(&self) -> String {
        let a = &self.activity;
        let mut lines = Vec::new();
        if let Some(headline) = &self.headline {
            lines.push(headline.clone());
            lines.push(String::new());
        }
        lines.push(format!("{} ({})", a.title, a.slug));
        lines.push(format!("  ID:        {}", a.id));
        lines.push(format!("  Status:    {}", a.status));
        lines.push(format!("  Type:      {}", a.activity_type.as_str()));
        lines.push(format!("  Starts:    {}", format_timestamp(a.start_date)));
        lines.push(format!("  Ends:      {}", format_optional_timestamp(a.end_date)));
        if let Some(place_id) = a.place_id {
            lines.push(format!("  Place:     {place_id}"));
        }
        if let Some(location) = &a.location {
            lines.push(format!("  Location:  {location}"));
        }
        if let Some(description) = &a.description {
            lines.push(format!("  About:     {}", truncate(description, 72)));
        }
        lines.push(format!(
            "  Flags:     {}{}",
            if a.is_featured { "featured " } else { "" },
            if a.is_active { "visible" } else { "hidden" }
        ));
        lines.push(format!("  Views:     {}", a.view_count));
        lines.push(format!("  Updated:   {}", format_timestamp(a.updated_at)));
        lines.join("\n")
    }
}

#[derive(Debug, Serialize)]
pub struct ActivityListOutput {
    pub activities: Vec<Activity>,
    pub total: usize,
}

impl CommandOutput for ActivityListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["id", "title", "status", "type", "starts", "ends"]);
        for a in &self.activities {
            table.add_row(vec![
                a.id.to_string()[..8].to_string(),
                truncate(&a.title, 32),
                a.status.to_string(),
                a.activity_type.as_str().to_string(),
                format_timestamp(a.start_date),
                format_optional_timestamp(a.end_date),
            ]);
        }
        render_list(("activity", "activities"), &table, self.total)
    }
}

#[derive(Debug, Serialize)]
pub struct StatsOutput {
    pub counts: Vec<StatusCount>,
    pub total: u64,
}

#[derive(Debug, Serialize)]
pub struct StatusCount {
    pub status: ActivityStatus,
    pub count: u64,
}

impl CommandOutput for StatsOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["status", "count"]);
        for c in &self.counts {
            table.add_row(vec![c.status.to_string(), c.count.to_string()]);
        }
        format!("{table}\n\nTotal: {}", self.total)
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteOutput {
    pub id: Uuid,
    pub deleted: bool,
}

impl CommandOutput for DeleteOutput {
    fn to_human(&self) -> String {
        format!("Activity {} deleted.", self.id)
    }
}

/// Accept either a UUID or a slug.
async fn resolve_id(service: &ActivityService<SqliteActivityRepository>, key: &str) -> Result<Uuid> {
    if let Ok(id) = Uuid::parse_str(key) {
        return Ok(id);
    }
    let activity = service
        .get_by_slug(key)
        .await
        .with_context(|| format!("No activity with ID or slug '{key}'"))?;
    Ok(activity.id)
}

pub async fn execute(args: ActivityArgs, config: &Config, json_mode: bool) -> Result<()> {
    let ctx = AppContext::open(config).await?;
    run(args.command, &ctx.service, json_mode).await
}

async fn run(
    command: ActivityCommands,
    service: &ActivityService<SqliteActivityRepository>,
    json_mode: bool,
) -> Result<()> {
    match command {
        ActivityCommands::Create {
            title,
            start,
            end,
            place,
            activity_type,
            description,
            location,
            slug,
            featured,
        } => {
            let mut new = NewActivity::new(title, start).with_type(activity_type.unwrap_or_default());
            new.end_date = end;
            new.place_id = place;
            new.description = description;
            new.location = location;
            new.slug = slug;
            new.is_featured = featured;

            let activity = service.create(new).await.context("Failed to create activity")?;
            output(
                &ActivityDetailOutput::from(activity).with_headline("Activity created."),
                json_mode,
            );
        }
        ActivityCommands::List {
            status,
            place,
            activity_type,
            featured,
            all,
            limit,
        } => {
            let filter = ActivityFilter {
                status,
                place_id: place,
                activity_type,
                is_featured: featured.then_some(true),
                include_inactive: all,
                limit: Some(limit),
                ..Default::default()
            };
            let activities = service.list(&filter).await.context("Failed to list activities")?;
            let total = activities.len();
            output(&ActivityListOutput { activities, total }, json_mode);
        }
        ActivityCommands::Show { id } => {
            let id = resolve_id(service, &id).await?;
            let activity = service.get(id).await?;
            output(&ActivityDetailOutput::from(activity), json_mode);
        }
        ActivityCommands::Update {
            id,
            title,
            description,
            location,
            activity_type,
            start,
            end,
            clear_end,
        } => {
            let id = resolve_id(service, &id).await?;
            let patch = ActivityPatch {
                title,
                description,
                location,
                activity_type,
                start_date: start,
                end_date: end,
                clear_end_date: clear_end,
                ..Default::default()
            };
            let activity = service.update(id, patch).await.context("Failed to update activity")?;
            output(
                &ActivityDetailOutput::from(activity).with_headline("Activity updated."),
                json_mode,
            );
        }
        ActivityCommands::Cancel { id } => {
            let id = resolve_id(service, &id).await?;
            let outcome = service.cancel(id).await?;
            output(&ActivityDetailOutput::from_transition(outcome, "cancelled"), json_mode);
        }
        ActivityCommands::MakeLive { id } => {
            let id = resolve_id(service, &id).await?;
            let outcome = service.make_live(id).await?;
            output(&ActivityDetailOutput::from_transition(outcome, "is now live"), json_mode);
        }
        ActivityCommands::Complete { id } => {
            let id = resolve_id(service, &id).await?;
            let outcome = service.complete(id).await?;
            output(&ActivityDetailOutput::from_transition(outcome, "completed"), json_mode);
        }
        ActivityCommands::ToggleFeatured { id } => {
            let id = resolve_id(service, &id).await?;
            let activity = service.toggle_featured(id).await?;
            let headline = if activity.is_featured {
                "Activity featured."
            } else {
                "Activity no longer featured."
            };
            output(&ActivityDetailOutput::from(activity).with_headline(headline), json_mode);
        }
        ActivityCommands::ToggleActive { id } => {
            let id = resolve_id(service, &id).await?;
            let activity = service.toggle_active(id).await?;
            let headline = if activity.is_active {
                "Activity restored."
            } else {
                "Activity hidden."
            };
            output(&ActivityDetailOutput::from(activity).with_headline(headline), json_mode);
        }
        ActivityCommands::Delete { id } => {
            let id = resolve_id(service, &id).await?;
            service.delete(id).await?;
            output(&DeleteOutput { id, deleted: true }, json_mode);
        }
        ActivityCommands::QuickTest => {
            let activity = service
                .create_quick_test()
                .await
                .context("Failed to create quick test activity")?;
            output(
                &ActivityDetailOutput::from(activity)
                    .with_headline("Quick test activity created; watch it go live in a minute."),
                json_mode,
            );
        }
        ActivityCommands::Stats => {
            let counts = service.status_counts().await?;
            let total = counts.iter().map(|(_, n)| n).sum();
            let counts = counts
                .into_iter()
                .map(|(status, count)| StatusCount { status, count })
                .collect();
            output(&StatsOutput { counts, total }, json_mode);
        }
    }
    Ok(())
}
