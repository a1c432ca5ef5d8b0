//! Activity lifecycle rules.
//!
//! Two kinds of transitions exist:
//! - time-driven [`TransitionRule`]s, applied in bulk by the scheduler through
//!   a [`DuePredicate`] that doubles as the WHERE clause of the update;
//! - request-driven [`ManualTransition`]s, legality-checked against the
//!   activity's current status before being applied.
//!
//! Everything here is pure: "now" is always passed in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::activity::{Activity, ActivityStatus};

/// A time-driven status promotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionRule {
    /// `upcoming -> live` once `start_date <= now`.
    PromoteToLive,
    /// `live -> completed` once `end_date <= now`; never fires without an end date.
    PromoteToCompleted,
}

impl TransitionRule {
    /// Rules in evaluation order. Promotion to live runs first so that an
    /// activity whose whole window already elapsed completes in one pass.
    pub const ORDERED: [Self; 2] = [Self::PromoteToLive, Self::PromoteToCompleted];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PromoteToLive => "promote_to_live",
            Self::PromoteToCompleted => "promote_to_completed",
        }
    }

    /// Status an activity must hold for the rule to apply.
    pub fn source(&self) -> ActivityStatus {
        match self {
            Self::PromoteToLive => ActivityStatus::Upcoming,
            Self::PromoteToCompleted => ActivityStatus::Live,
        }
    }

    /// Status the rule moves an activity into.
    pub fn target(&self) -> ActivityStatus {
        match self {
            Self::PromoteToLive => ActivityStatus::Live,
            Self::PromoteToCompleted => ActivityStatus::Completed,
        }
    }

    /// Selection predicate for this rule at `now`.
    pub fn predicate(&self, now: DateTime<Utc>) -> DuePredicate {
        match self {
            Self::PromoteToLive => DuePredicate {
                status: ActivityStatus::Upcoming,
                start_due_by: Some(now),
                end_due_by: None,
            },
            Self::PromoteToCompleted => DuePredicate {
                status: ActivityStatus::Live,
                start_due_by: None,
                end_due_by: Some(now),
            },
        }
    }

    /// Whether the rule is due for `activity` at `now`.
    pub fn is_due(&self, activity: &Activity, now: DateTime<Utc>) -> bool {
        self.predicate(now).matches(activity)
    }
}

impl fmt::Display for TransitionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filter selecting activities for which a time-driven transition is due.
///
/// Always restricted to active activities. Stores must evaluate it
/// atomically inside the update itself, so a row that left `status` in the
/// meantime is excluded instead of overwritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuePredicate {
    /// Required current status.
    pub status: ActivityStatus,
    /// When set, `start_date <= start_due_by` is required.
    pub start_due_by: Option<DateTime<Utc>>,
    /// When set, `end_date IS NOT NULL AND end_date <= end_due_by` is required.
    pub end_due_by: Option<DateTime<Utc>>,
}

impl DuePredicate {
    /// Evaluate the predicate against an in-memory record.
    pub fn matches(&self, activity: &Activity) -> bool {
        if !activity.is_active || activity.status != self.status {
            return false;
        }
        if let Some(cutoff) = self.start_due_by {
            if activity.start_date > cutoff {
                return false;
            }
        }
        if let Some(cutoff) = self.end_due_by {
            match activity.end_date {
                Some(end) if end <= cutoff => {}
                _ => return false,
            }
        }
        true
    }
}

/// A request-driven status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManualTransition {
    Cancel,
    MakeLive,
    Complete,
}

impl ManualTransition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cancel => "cancel",
            Self::MakeLive => "make_live",
            Self::Complete => "complete",
        }
    }

    pub fn target(&self) -> ActivityStatus {
        match self {
            Self::Cancel => ActivityStatus::Cancelled,
            Self::MakeLive => ActivityStatus::Live,
            Self::Complete => ActivityStatus::Completed,
        }
    }

    /// Check whether the transition is legal from `status`.
    ///
    /// Manual overrides are gated on status only, never on the activity's
    /// start or end dates.
    pub fn check(&self, status: ActivityStatus) -> Result<(), TransitionRejection> {
        match (self, status) {
            (Self::Cancel, ActivityStatus::Upcoming | ActivityStatus::Live) => Ok(()),
            (Self::Cancel, ActivityStatus::Cancelled) => Err(TransitionRejection::AlreadyCancelled),
            (Self::Cancel, ActivityStatus::Completed) => {
                Err(TransitionRejection::CannotCancelCompleted)
            }
            (Self::MakeLive, ActivityStatus::Upcoming) => Ok(()),
            (Self::MakeLive, ActivityStatus::Live) => Err(TransitionRejection::AlreadyLive),
            (Self::MakeLive, other) => Err(TransitionRejection::CannotMakeLive(other)),
            (Self::Complete, ActivityStatus::Completed) => {
                Err(TransitionRejection::AlreadyCompleted)
            }
            (Self::Complete, _) => Ok(()),
        }
    }
}

impl fmt::Display for ManualTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a manual transition was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionRejection {
    #[error("Activity is already cancelled")]
    AlreadyCancelled,

    #[error("Cannot cancel a completed activity")]
    CannotCancelCompleted,

    #[error("Activity is already live")]
    AlreadyLive,

    #[error("Cannot make a {0} activity live")]
    CannotMakeLive(ActivityStatus),

    #[error("Activity is already completed")]
    AlreadyCompleted,

    #[error("Cannot update a {0} activity")]
    NotEditable(ActivityStatus),
}

/// Whether `activity` may be cancelled.
pub fn can_cancel(activity: &Activity) -> Result<(), TransitionRejection> {
    ManualTransition::Cancel.check(activity.status)
}

/// Whether `activity` may be manually made live.
pub fn can_make_live(activity: &Activity) -> Result<(), TransitionRejection> {
    ManualTransition::MakeLive.check(activity.status)
}

/// Whether `activity` may be manually completed.
pub fn can_complete(activity: &Activity) -> Result<(), TransitionRejection> {
    ManualTransition::Complete.check(activity.status)
}

/// Whether `activity`'s descriptive fields may still be edited.
pub fn can_edit(activity: &Activity) -> Result<(), TransitionRejection> {
    if activity.is_terminal() {
        Err(TransitionRejection::NotEditable(activity.status))
    } else {
        Ok(())
    }
}
