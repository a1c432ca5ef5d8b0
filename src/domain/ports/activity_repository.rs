//! Repository port for activity persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::activity::{Activity, ActivityStatus, ActivityType};
use crate::domain::models::lifecycle::DuePredicate;

/// Filter for listing activities. Results are ordered by `start_date` ascending.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityFilter {
    pub status: Option<ActivityStatus>,
    pub place_id: Option<Uuid>,
    pub activity_type: Option<ActivityType>,
    pub is_featured: Option<bool>,
    /// Inactive activities are hidden unless this is set.
    #[serde(default)]
    pub include_inactive: bool,
    pub starts_after: Option<DateTime<Utc>>,
    pub starts_before: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
}

impl ActivityFilter {
    pub fn with_status(status: ActivityStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// In-memory evaluation, shared by stores that cannot push the filter down.
    pub fn matches(&self, activity: &Activity) -> bool {
        if !self.include_inactive && !activity.is_active {
            return false;
        }
        if self.status.is_some_and(|s| s != activity.status) {
            return false;
        }
        if self.place_id.is_some() && self.place_id != activity.place_id {
            return false;
        }
        if self.activity_type.is_some_and(|t| t != activity.activity_type) {
            return false;
        }
        if self.is_featured.is_some_and(|f| f != activity.is_featured) {
            return false;
        }
        if self.starts_after.is_some_and(|t| activity.start_date < t) {
            return false;
        }
        if self.starts_before.is_some_and(|t| activity.start_date > t) {
            return false;
        }
        true
    }
}

#[async_trait]
pub trait ActivityRepository: Send + Sync {
    /// Insert a new activity.
    async fn create(&self, activity: &Activity) -> DomainResult<()>;

    /// Get an activity by ID.
    async fn get(&self, id: Uuid) -> DomainResult<Option<Activity>>;

    /// Get an activity by slug.
    async fn get_by_slug(&self, slug: &str) -> DomainResult<Option<Activity>>;

    /// Persist the descriptive fields of `activity`, only if its stored status
    /// is still `expected`. Returns the number of rows changed (0 or 1).
    ///
    /// `status` only moves through [`ActivityRepository::transition`] and
    /// [`ActivityRepository::update_where`]; the featured and active flags only
    /// through their toggles.
    async fn update(&self, activity: &Activity, expected: ActivityStatus) -> DomainResult<u64>;

    /// Flip `is_featured` in place. Returns the updated activity, or `None`
    /// when it does not exist.
    async fn toggle_featured(&self, id: Uuid, updated_at: DateTime<Utc>) -> DomainResult<Option<Activity>>;

    /// Flip `is_active` in place. Returns the updated activity, or `None`
    /// when it does not exist.
    async fn toggle_active(&self, id: Uuid, updated_at: DateTime<Utc>) -> DomainResult<Option<Activity>>;

    /// Delete an activity. Returns whether a row was removed.
    async fn delete(&self, id: Uuid) -> DomainResult<bool>;

    /// List activities matching a filter.
    async fn list(&self, filter: &ActivityFilter) -> DomainResult<Vec<Activity>>;

    /// Activities currently selected by a due predicate.
    async fn find_due(&self, predicate: &DuePredicate) -> DomainResult<Vec<Activity>>;

    /// Set `status = new_status` on every row the predicate selects, evaluating
    /// the predicate and the write as one atomic statement.
    ///
    /// Returns the number of rows changed.
    async fn update_where(
        &self,
        predicate: &DuePredicate,
        new_status: ActivityStatus,
        updated_at: DateTime<Utc>,
    ) -> DomainResult<u64>;

    /// Move a single activity from `from` to `to`, only if it still holds
    /// `from`. Returns the number of rows changed (0 or 1).
    async fn transition(
        &self,
        id: Uuid,
        from: ActivityStatus,
        to: ActivityStatus,
        updated_at: DateTime<Utc>,
    ) -> DomainResult<u64>;

    /// Bump the view counter.
    async fn increment_views(&self, id: Uuid) -> DomainResult<()>;

    /// Count activities per status, active and inactive alike.
    async fn count_by_status(&self) -> DomainResult<Vec<(ActivityStatus, u64)>>;
}
