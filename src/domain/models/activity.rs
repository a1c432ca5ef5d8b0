//! Activity domain model.
//!
//! Activities are time-bound events, optionally held at a place. Their
//! status moves through `upcoming -> live -> completed`, or ends early in
//! `cancelled`.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};

/// Maximum length of an activity title.
pub const MAX_TITLE_LEN: usize = 200;

/// Years a start or end date may fall in. Stored timestamps only keep their
/// chronological sort order within four-digit years.
pub const DATE_YEARS: std::ops::RangeInclusive<i32> = 0..=9999;

/// Lifecycle status of an activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityStatus {
    /// Scheduled, start time not yet reached
    Upcoming,
    /// Currently happening
    Live,
    /// Finished
    Completed,
    /// Called off before finishing
    Cancelled,
}

impl Default for ActivityStatus {
    fn default() -> Self {
        Self::Upcoming
    }
}

impl ActivityStatus {
    /// All statuses in lifecycle order.
    pub const ALL: [Self; 4] = [Self::Upcoming, Self::Live, Self::Completed, Self::Cancelled];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upcoming => "upcoming",
            Self::Live => "live",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "upcoming" => Some(Self::Upcoming),
            "live" => Some(Self::Live),
            "completed" | "complete" => Some(Self::Completed),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Statuses reachable from this one by any actor.
    ///
    /// `cancelled -> completed` is a manual override only; the scheduler
    /// never leaves a terminal state.
    pub fn valid_transitions(&self) -> Vec<ActivityStatus> {
        match self {
            Self::Upcoming => vec![Self::Live, Self::Completed, Self::Cancelled],
            Self::Live => vec![Self::Completed, Self::Cancelled],
            Self::Completed => vec![],
            Self::Cancelled => vec![Self::Completed],
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }
}

impl fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Sports,
    Music,
    Club,
    Dj,
    Event,
    Festival,
    Workshop,
    Other,
}

impl Default for ActivityType {
    fn default() -> Self {
        Self::Event
    }
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sports => "sports",
            Self::Music => "music",
            Self::Club => "club",
            Self::Dj => "dj",
            Self::Event => "event",
            Self::Festival => "festival",
            Self::Workshop => "workshop",
            Self::Other => "other",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "sports" => Some(Self::Sports),
            "music" => Some(Self::Music),
            "club" => Some(Self::Club),
            "dj" => Some(Self::Dj),
            "event" => Some(Self::Event),
            "festival" => Some(Self::Festival),
            "workshop" => Some(Self::Workshop),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

/// A time-bound activity record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub id: Uuid,
    /// Place hosting the activity, if any.
    pub place_id: Option<Uuid>,
    pub title: String,
    /// Unique, URL-friendly identifier derived from the title.
    pub slug: String,
    pub description: Option<String>,
    pub activity_type: ActivityType,
    pub status: ActivityStatus,
    /// Free-form location when it differs from the place (or there is none).
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// When the activity should go live.
    pub start_date: DateTime<Utc>,
    /// When the activity should complete. Without one, only a manual
    /// action completes the activity.
    pub end_date: Option<DateTime<Utc>>,
    pub image_path: Option<String>,
    /// Entry fee in minor currency units.
    pub entry_fee_cents: i64,
    pub is_free: bool,
    pub max_participants: Option<u32>,
    pub current_participants: u32,
    pub contact_phone: Option<String>,
    pub contact_email: Option<String>,
    pub organizer_name: Option<String>,
    pub tags: Vec<String>,
    pub is_featured: bool,
    /// Visibility flag. The scheduler ignores inactive activities.
    pub is_active: bool,
    pub view_count: u64,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Activity {
    /// Build a fresh `upcoming` activity from a validated creation request.
    pub fn from_new(new: NewActivity, now: DateTime<Utc>) -> DomainResult<Self> {
        new.validate()?;

        let id = Uuid::new_v4();
        let slug = match new.slug {
            Some(slug) if !slug.trim().is_empty() => slugify(&slug),
            _ => slugify(&new.title),
        };
        let slug = if slug.is_empty() {
            format!("activity-{}", &id.simple().to_string()[..8])
        } else {
            slug
        };

        Ok(Self {
            id,
            place_id: new.place_id,
            title: new.title.trim().to_string(),
            slug,
            description: new.description,
            activity_type: new.activity_type,
            status: ActivityStatus::Upcoming,
            location: new.location,
            latitude: new.latitude,
            longitude: new.longitude,
            start_date: new.start_date,
            end_date: new.end_date,
            image_path: new.image_path,
            entry_fee_cents: new.entry_fee_cents,
            is_free: new.is_free,
            max_participants: new.max_participants,
            current_participants: 0,
            contact_phone: new.contact_phone,
            contact_email: new.contact_email,
            organizer_name: new.organizer_name,
            tags: new.tags,
            is_featured: new.is_featured,
            is_active: true,
            view_count: 0,
            created_by: new.created_by,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Apply a partial update. Status is never touched here.
    pub fn apply_patch(&mut self, patch: ActivityPatch, now: DateTime<Utc>) -> DomainResult<()> {
        if let Some(title) = patch.title {
            validate_title(&title)?;
            self.title = title.trim().to_string();
            let derived = slugify(&self.title);
            if patch.slug.is_none() && !derived.is_empty() {
                self.slug = derived;
            }
        }
        if let Some(slug) = patch.slug {
            self.slug = slugify(&slug);
        }
        if let Some(place_id) = patch.place_id {
            self.place_id = Some(place_id);
        }
        if let Some(description) = patch.description {
            self.description = Some(description);
        }
        if let Some(activity_type) = patch.activity_type {
            self.activity_type = activity_type;
        }
        if let Some(location) = patch.location {
            self.location = Some(location);
        }
        if let Some(latitude) = patch.latitude {
            self.latitude = Some(latitude);
        }
        if let Some(longitude) = patch.longitude {
            self.longitude = Some(longitude);
        }
        if let Some(start_date) = patch.start_date {
            self.start_date = start_date;
        }
        if let Some(end_date) = patch.end_date {
            self.end_date = Some(end_date);
        }
        if patch.clear_end_date {
            self.end_date = None;
        }
        if let Some(image_path) = patch.image_path {
            self.image_path = Some(image_path);
        }
        if let Some(fee) = patch.entry_fee_cents {
            self.entry_fee_cents = fee;
        }
        if let Some(is_free) = patch.is_free {
            self.is_free = is_free;
        }
        if let Some(max) = patch.max_participants {
            self.max_participants = Some(max);
        }
        if let Some(phone) = patch.contact_phone {
            self.contact_phone = Some(phone);
        }
        if let Some(email) = patch.contact_email {
            self.contact_email = Some(email);
        }
        if let Some(organizer) = patch.organizer_name {
            self.organizer_name = Some(organizer);
        }
        if let Some(tags) = patch.tags {
            self.tags = tags;
        }

        validate_coordinates(self.latitude, self.longitude)?;
        validate_window(self.start_date, self.end_date)?;
        validate_fee(self.entry_fee_cents)?;

        self.updated_at = now;
        Ok(())
    }
}

/// Request to create an activity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewActivity {
    pub title: String,
    pub start_date: DateTime<Utc>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub place_id: Option<Uuid>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub activity_type: ActivityType,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub image_path: Option<String>,
    #[serde(default)]
    pub entry_fee_cents: i64,
    #[serde(default = "default_is_free")]
    pub is_free: bool,
    #[serde(default)]
    pub max_participants: Option<u32>,
    #[serde(default)]
    pub contact_phone: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub organizer_name: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_featured: bool,
    #[serde(default)]
    pub created_by: Option<Uuid>,
}

const fn default_is_free() -> bool {
    true
}

impl NewActivity {
    pub fn new(title: impl Into<String>, start_date: DateTime<Utc>) -> Self {
        Self {
            title: title.into(),
            start_date,
            end_date: None,
            slug: None,
            place_id: None,
            description: None,
            activity_type: ActivityType::default(),
            location: None,
            latitude: None,
            longitude: None,
            image_path: None,
            entry_fee_cents: 0,
            is_free: true,
            max_participants: None,
            contact_phone: None,
            contact_email: None,
            organizer_name: None,
            tags: Vec::new(),
            is_featured: false,
            created_by: None,
        }
    }

    // Builder methods
    pub fn with_end_date(mut self, end_date: DateTime<Utc>) -> Self {
        self.end_date = Some(end_date);
        self
    }

    pub fn with_place(mut self, place_id: Uuid) -> Self {
        self.place_id = Some(place_id);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_type(mut self, activity_type: ActivityType) -> Self {
        self.activity_type = activity_type;
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    pub fn featured(mut self) -> Self {
        self.is_featured = true;
        self
    }

    /// Validate the request independently of any stored state.
    pub fn validate(&self) -> DomainResult<()> {
        validate_title(&self.title)?;
        validate_coordinates(self.latitude, self.longitude)?;
        validate_window(self.start_date, self.end_date)?;
        validate_fee(self.entry_fee_cents)?;
        if let Some(email) = &self.contact_email {
            if !email.contains('@') {
                return Err(DomainError::ValidationFailed(
                    "Must be a valid email address".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Partial update of an activity's descriptive fields.
///
/// `status` is deliberately absent: status only changes through lifecycle
/// transitions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub place_id: Option<Uuid>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub activity_type: Option<ActivityType>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    /// Remove the end date so the activity is never auto-completed.
    #[serde(default)]
    pub clear_end_date: bool,
    #[serde(default)]
    pub image_path: Option<String>,
    #[serde(default)]
    pub entry_fee_cents: Option<i64>,
    #[serde(default)]
    pub is_free: Option<bool>,
    #[serde(default)]
    pub max_participants: Option<u32>,
    #[serde(default)]
    pub contact_phone: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub organizer_name: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

/// Derive a URL slug: lowercase, non-alphanumeric runs collapsed to `-`,
/// leading and trailing dashes trimmed.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;

    for c in input.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }

    slug
}

fn validate_title(title: &str) -> DomainResult<()> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(DomainError::ValidationFailed(
            "Activity title cannot be empty".to_string(),
        ));
    }
    if trimmed.chars().count() > MAX_TITLE_LEN {
        return Err(DomainError::ValidationFailed(format!(
            "Activity title cannot exceed {} characters",
            MAX_TITLE_LEN
        )));
    }
    Ok(())
}

fn validate_coordinates(latitude: Option<f64>, longitude: Option<f64>) -> DomainResult<()> {
    if let Some(lat) = latitude {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(DomainError::ValidationFailed(format!(
                "Latitude {} out of range [-90, 90]",
                lat
            )));
        }
    }
    if let Some(lng) = longitude {
        if !(-180.0..=180.0).contains(&lng) {
            return Err(DomainError::ValidationFailed(format!(
                "Longitude {} out of range [-180, 180]",
                lng
            )));
        }
    }
    Ok(())
}

fn validate_window(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> DomainResult<()> {
    for (label, date) in [("Start", Some(start)), ("End", end)] {
        if let Some(date) = date {
            if !DATE_YEARS.contains(&date.year()) {
                return Err(DomainError::ValidationFailed(format!(
                    "{} date year {} out of range [{}, {}]",
                    label,
                    date.year(),
                    DATE_YEARS.start(),
                    DATE_YEARS.end()
                )));
            }
        }
    }
    match end {
        Some(end) if end < start => Err(DomainError::ValidationFailed(
            "End date cannot be before start date".to_string(),
        )),
        _ => Ok(()),
    }
}

fn validate_fee(fee_cents: i64) -> DomainResult<()> {
    if fee_cents < 0 {
        return Err(DomainError::ValidationFailed(
            "Entry fee cannot be negative".to_string(),
        ));
    }
    Ok(())
}
