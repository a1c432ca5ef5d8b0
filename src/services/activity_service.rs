//! Activity mutation and query service.
//!
//! Manual status changes are legality-checked against the observed status,
//! then written as a conditional update keyed by id and that same status.
//! Losing a race to the scheduler or another request is not an error: the
//! caller gets the fresh record back with `applied = false`.

use chrono::Duration;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::activity::{Activity, ActivityPatch, ActivityStatus, NewActivity};
use crate::domain::models::lifecycle::{can_edit, ManualTransition};
use crate::domain::ports::activity_repository::{ActivityFilter, ActivityRepository};
use crate::domain::ports::Clock;

/// Result of a manual status change.
#[derive(Debug, Clone, Serialize)]
pub struct TransitionOutcome {
    /// Current state of the activity after the attempt.
    pub activity: Activity,
    /// Whether this request changed the status. `false` means another actor
    /// moved the activity first.
    pub applied: bool,
}

pub struct ActivityService<R: ActivityRepository> {
    repo: Arc<R>,
    clock: Arc<dyn Clock>,
}

impl<R: ActivityRepository> Clone for ActivityService<R> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<R: ActivityRepository> ActivityService<R> {
    pub fn new(repo: Arc<R>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    /// Create an activity. It always starts `upcoming`, even when its start
    /// date has already passed; the next scheduler pass promotes it.
    pub async fn create(&self, new: NewActivity) -> DomainResult<Activity> {
        let mut activity = Activity::from_new(new, self.clock.now())?;
        activity.slug = self.unique_slug(&activity.slug, None).await?;

        self.repo.create(&activity).await?;
        info!(activity_id = %activity.id, slug = %activity.slug, "activity created");
        Ok(activity)
    }

    pub async fn get(&self, id: Uuid) -> DomainResult<Activity> {
        self.repo.get(id).await?.ok_or(DomainError::ActivityNotFound(id))
    }

    pub async fn get_by_slug(&self, slug: &str) -> DomainResult<Activity> {
        self.repo
            .get_by_slug(slug)
            .await?
            .ok_or_else(|| DomainError::ActivitySlugNotFound(slug.to_string()))
    }

    /// Public read of an active activity; counts as a view.
    pub async fn view(&self, id: Uuid) -> DomainResult<Activity> {
        let mut activity = self.get(id).await?;
        if !activity.is_active {
            return Err(DomainError::ActivityNotFound(id));
        }
        self.repo.increment_views(id).await?;
        activity.view_count += 1;
        Ok(activity)
    }

    pub async fn list(&self, filter: &ActivityFilter) -> DomainResult<Vec<Activity>> {
        self.repo.list(filter).await
    }

    pub async fn upcoming(&self, limit: Option<u32>) -> DomainResult<Vec<Activity>> {
        self.repo
            .list(&ActivityFilter {
                status: Some(ActivityStatus::Upcoming),
                limit,
                ..Default::default()
            })
            .await
    }

    pub async fn live(&self) -> DomainResult<Vec<Activity>> {
        self.repo.list(&ActivityFilter::with_status(ActivityStatus::Live)).await
    }

    /// Featured activities that have not finished.
    pub async fn featured(&self, limit: Option<u32>) -> DomainResult<Vec<Activity>> {
        let featured = self
            .repo
            .list(&ActivityFilter {
                is_featured: Some(true),
                ..Default::default()
            })
            .await?;

        let mut open: Vec<Activity> = featured.into_iter().filter(|a| !a.is_terminal()).collect();
        if let Some(limit) = limit {
            open.truncate(limit as usize);
        }
        Ok(open)
    }

    pub async fn by_place(&self, place_id: Uuid) -> DomainResult<Vec<Activity>> {
        self.repo
            .list(&ActivityFilter {
                place_id: Some(place_id),
                ..Default::default()
            })
            .await
    }

    /// Edit descriptive fields. Completed and cancelled activities are frozen.
    ///
    /// The write is conditional on the status the edit was checked against.
    /// When the status moved in between, the edit is re-checked against the
    /// fresh record; statuses only move forward, so this settles quickly.
    pub async fn update(&self, id: Uuid, patch: ActivityPatch) -> DomainResult<Activity> {
        loop {
            let mut activity = self.get(id).await?;
            can_edit(&activity)?;
            let observed = activity.status;

            activity.apply_patch(patch.clone(), self.clock.now())?;
            activity.slug = self.unique_slug(&activity.slug, Some(id)).await?;

            if self.repo.update(&activity, observed).await? > 0 {
                info!(activity_id = %id, "activity updated");
                return self.get(id).await;
            }
            debug!(
                activity_id = %id,
                expected = %observed,
                "0 updated, activity status changed concurrently"
            );
        }
    }

    pub async fn cancel(&self, id: Uuid) -> DomainResult<TransitionOutcome> {
        self.transition(id, ManualTransition::Cancel).await
    }

    /// Force an upcoming activity live, whatever its start date.
    pub async fn make_live(&self, id: Uuid) -> DomainResult<TransitionOutcome> {
        self.transition(id, ManualTransition::MakeLive).await
    }

    /// Force an activity to completed, whatever its end date.
    pub async fn complete(&self, id: Uuid) -> DomainResult<TransitionOutcome> {
        self.transition(id, ManualTransition::Complete).await
    }

    pub async fn transition(&self, id: Uuid, transition: ManualTransition) -> DomainResult<TransitionOutcome> {
        let observed = self.get(id).await?;
        self.apply_transition(&observed, transition).await
    }

    /// Apply `transition` to an activity whose status was observed as
    /// `observed.status`. The write only lands if the status is unchanged.
    pub async fn apply_transition(
        &self,
        observed: &Activity,
        transition: ManualTransition,
    ) -> DomainResult<TransitionOutcome> {
        transition.check(observed.status)?;

        let target = transition.target();
        let changed = self
            .repo
            .transition(observed.id, observed.status, target, self.clock.now())
            .await?;

        let activity = self.get(observed.id).await?;
        if changed == 0 {
            info!(
                activity_id = %observed.id,
                transition = %transition,
                expected = %observed.status,
                actual = %activity.status,
                "0 updated, activity status changed concurrently"
            );
            return Ok(TransitionOutcome {
                activity,
                applied: false,
            });
        }

        info!(
            activity_id = %observed.id,
            transition = %transition,
            from = %observed.status,
            to = %target,
            "manual transition applied"
        );
        Ok(TransitionOutcome {
            activity,
            applied: true,
        })
    }

    pub async fn toggle_featured(&self, id: Uuid) -> DomainResult<Activity> {
        let activity = self
            .repo
            .toggle_featured(id, self.clock.now())
            .await?
            .ok_or(DomainError::ActivityNotFound(id))?;
        info!(activity_id = %id, is_featured = activity.is_featured, "activity featured flag toggled");
        Ok(activity)
    }

    /// Hide or restore an activity. Hidden activities are skipped by the scheduler.
    pub async fn toggle_active(&self, id: Uuid) -> DomainResult<Activity> {
        let activity = self
            .repo
            .toggle_active(id, self.clock.now())
            .await?
            .ok_or(DomainError::ActivityNotFound(id))?;
        info!(activity_id = %id, is_active = activity.is_active, "activity visibility toggled");
        Ok(activity)
    }

    pub async fn delete(&self, id: Uuid) -> DomainResult<()> {
        if !self.repo.delete(id).await? {
            return Err(DomainError::ActivityNotFound(id));
        }
        info!(activity_id = %id, "activity deleted");
        Ok(())
    }

    /// Create a throwaway activity going live in one minute and completing
    /// two minutes later, for watching the scheduler at work.
    pub async fn create_quick_test(&self) -> DomainResult<Activity> {
        let now = self.clock.now();
        let start = now + Duration::minutes(1);
        let new = NewActivity::new(format!("Quick Test Activity {}", now.format("%H:%M:%S")), start)
            .with_end_date(start + Duration::minutes(2))
            .with_description("Created to observe automatic status transitions");
        self.create(new).await
    }

    /// Number of activities per status.
    pub async fn status_counts(&self) -> DomainResult<Vec<(ActivityStatus, u64)>> {
        self.repo.count_by_status().await
    }

    /// `base`, or `base-2`, `base-3`, ... for the first slug not held by
    /// another activity.
    async fn unique_slug(&self, base: &str, owner: Option<Uuid>) -> DomainResult<String> {
        let mut candidate = base.to_string();
        let mut suffix = 2u32;
        loop {
            match self.repo.get_by_slug(&candidate).await? {
                Some(existing) if Some(existing.id) != owner => {
                    debug!(slug = %candidate, "slug taken");
                    candidate = format!("{base}-{suffix}");
                    suffix += 1;
                }
                _ => return Ok(candidate),
            }
        }
    }
}
