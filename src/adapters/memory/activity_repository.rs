//! In-memory ActivityRepository.
//!
//! Every operation runs under one write lock, so conditional updates are
//! atomic exactly like their SQL counterparts. Useful for tests and for
//! running the service without a database file.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::activity::{Activity, ActivityStatus};
use crate::domain::models::lifecycle::DuePredicate;
use crate::domain::ports::activity_repository::{ActivityFilter, ActivityRepository};

#[derive(Clone)]
pub struct InMemoryActivityRepository {
    activities: Arc<RwLock<HashMap<Uuid, Activity>>>,
    /// Status writes left before the store starts failing; negative is unlimited.
    write_budget: Arc<AtomicI64>,
}

impl Default for InMemoryActivityRepository {
    fn default() -> Self {
        Self {
            activities: Arc::default(),
            write_budget: Arc::new(AtomicI64::new(-1)),
        }
    }
}

impl InMemoryActivityRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every status write fail with a database error until reset.
    pub fn set_fail_writes(&self, fail: bool) {
        self.write_budget.store(if fail { 0 } else { -1 }, Ordering::SeqCst);
    }

    /// Let the next `writes` status writes succeed, then fail every one after.
    pub fn fail_after_writes(&self, writes: u32) {
        self.write_budget.store(i64::from(writes), Ordering::SeqCst);
    }

    /// Overwrite a stored record as-is, status included.
    pub async fn put(&self, activity: Activity) {
        self.activities.write().await.insert(activity.id, activity);
    }

    fn check_writable(&self) -> DomainResult<()> {
        let spent = self
            .write_budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| (left > 0).then(|| left - 1));
        match spent {
            Err(0) => Err(DomainError::DatabaseError("store unavailable".to_string())),
            _ => Ok(()),
        }
    }

    async fn toggle(
        &self,
        id: Uuid,
        updated_at: DateTime<Utc>,
        flag: fn(&mut Activity) -> &mut bool,
    ) -> DomainResult<Option<Activity>> {
        let mut store = self.activities.write().await;
        Ok(store.get_mut(&id).map(|activity| {
            let value = flag(activity);
            *value = !*value;
            activity.updated_at = updated_at;
            activity.clone()
        }))
    }
}

fn sorted(mut activities: Vec<Activity>) -> Vec<Activity> {
    activities.sort_by(|a, b| a.start_date.cmp(&b.start_date).then(a.created_at.cmp(&b.created_at)));
    activities
}

#[async_trait]
impl ActivityRepository for InMemoryActivityRepository {
    async fn create(&self, activity: &Activity) -> DomainResult<()> {
        let mut store = self.activities.write().await;
        if store.values().any(|a| a.slug == activity.slug) {
            return Err(DomainError::DatabaseError(format!(
                "UNIQUE constraint failed: activities.slug ({})",
                activity.slug
            )));
        }
        store.insert(activity.id, activity.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Activity>> {
        Ok(self.activities.read().await.get(&id).cloned())
    }

    async fn get_by_slug(&self, slug: &str) -> DomainResult<Option<Activity>> {
        Ok(self.activities.read().await.values().find(|a| a.slug == slug).cloned())
    }

    async fn update(&self, activity: &Activity, expected: ActivityStatus) -> DomainResult<u64> {
        let mut store = self.activities.write().await;
        let Some(stored) = store.get_mut(&activity.id).filter(|a| a.status == expected) else {
            return Ok(0);
        };

        let kept = stored.clone();
        *stored = activity.clone();
        stored.status = kept.status;
        stored.is_featured = kept.is_featured;
        stored.is_active = kept.is_active;
        stored.view_count = kept.view_count;
        stored.created_at = kept.created_at;
        stored.created_by = kept.created_by;
        Ok(1)
    }

    async fn toggle_featured(&self, id: Uuid, updated_at: DateTime<Utc>) -> DomainResult<Option<Activity>> {
        self.toggle(id, updated_at, |a| &mut a.is_featured).await
    }

    async fn toggle_active(&self, id: Uuid, updated_at: DateTime<Utc>) -> DomainResult<Option<Activity>> {
        self.toggle(id, updated_at, |a| &mut a.is_active).await
    }

    async fn delete(&self, id: Uuid) -> DomainResult<bool> {
        Ok(self.activities.write().await.remove(&id).is_some())
    }

    async fn list(&self, filter: &ActivityFilter) -> DomainResult<Vec<Activity>> {
        let store = self.activities.read().await;
        let mut matched = sorted(store.values().filter(|a| filter.matches(a)).cloned().collect());
        if let Some(limit) = filter.limit {
            matched.truncate(limit as usize);
        }
        Ok(matched)
    }

    async fn find_due(&self, predicate: &DuePredicate) -> DomainResult<Vec<Activity>> {
        let store = self.activities.read().await;
        Ok(sorted(store.values().filter(|a| predicate.matches(a)).cloned().collect()))
    }

    async fn update_where(
        &self,
        predicate: &DuePredicate,
        new_status: ActivityStatus,
        updated_at: DateTime<Utc>,
    ) -> DomainResult<u64> {
        self.check_writable()?;
        let mut store = self.activities.write().await;
        let mut changed = 0;
        for activity in store.values_mut().filter(|a| predicate.matches(a)) {
            activity.status = new_status;
            activity.updated_at = updated_at;
            changed += 1;
        }
        Ok(changed)
    }

    async fn transition(
        &self,
        id: Uuid,
        from: ActivityStatus,
        to: ActivityStatus,
        updated_at: DateTime<Utc>,
    ) -> DomainResult<u64> {
        self.check_writable()?;
        let mut store = self.activities.write().await;
        match store.get_mut(&id) {
            Some(activity) if activity.status == from => {
                activity.status = to;
                activity.updated_at = updated_at;
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn increment_views(&self, id: Uuid) -> DomainResult<()> {
        if let Some(activity) = self.activities.write().await.get_mut(&id) {
            activity.view_count += 1;
        }
        Ok(())
    }

    async fn count_by_status(&self) -> DomainResult<Vec<(ActivityStatus, u64)>> {
        let store = self.activities.read().await;
        Ok(ActivityStatus::ALL
            .iter()
            .map(|status| {
                let count = store.values().filter(|a| a.status == *status).count() as u64;
                (*status, count)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::activity::NewActivity;
    use chrono::Duration;

    #[tokio::test]
    async fn test_duplicate_slug_is_rejected() {
        let repo = InMemoryActivityRepository::new();
        let now = Utc::now();
        let first = Activity::from_new(NewActivity::new("Open Mic", now), now).unwrap();
        let second = Activity::from_new(NewActivity::new("Open Mic", now), now).unwrap();

        repo.create(&first).await.unwrap();
        assert!(repo.create(&second).await.is_err());
    }

    #[tokio::test]
    async fn test_update_where_matches_predicate_only() {
        let repo = InMemoryActivityRepository::new();
        let now = Utc::now();
        let ended = Activity::from_new(
            NewActivity::new("Ended", now - Duration::hours(2)).with_end_date(now - Duration::hours(1)),
            now,
        )
        .unwrap();
        let open_ended = Activity::from_new(NewActivity::new("Open", now - Duration::hours(2)), now).unwrap();
        for mut a in [ended.clone(), open_ended.clone()] {
            a.status = ActivityStatus::Live;
            repo.put(a).await;
        }

        let changed = repo
            .update_where(
                &DuePredicate {
                    status: ActivityStatus::Live,
                    start_due_by: None,
                    end_due_by: Some(now),
                },
                ActivityStatus::Completed,
                now,
            )
            .await
            .unwrap();

        assert_eq!(changed, 1);
        assert_eq!(repo.get(ended.id).await.unwrap().unwrap().status, ActivityStatus::Completed);
        assert_eq!(repo.get(open_ended.id).await.unwrap().unwrap().status, ActivityStatus::Live);
    }

    #[tokio::test]
    async fn test_fail_writes_surfaces_database_error() {
        let repo = InMemoryActivityRepository::new();
        let now = Utc::now();
        let activity = Activity::from_new(NewActivity::new("Broken", now), now).unwrap();
        repo.create(&activity).await.unwrap();

        repo.set_fail_writes(true);
        let err = repo
            .transition(activity.id, ActivityStatus::Upcoming, ActivityStatus::Live, now)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::DatabaseError(_)));
    }

    #[tokio::test]
    async fn test_fail_after_writes_allows_a_budget() {
        let repo = InMemoryActivityRepository::new();
        let now = Utc::now();
        let activity = Activity::from_new(NewActivity::new("Budget", now), now).unwrap();
        repo.create(&activity).await.unwrap();

        repo.fail_after_writes(1);
        repo.transition(activity.id, ActivityStatus::Upcoming, ActivityStatus::Live, now)
            .await
            .unwrap();
        assert!(repo
            .transition(activity.id, ActivityStatus::Live, ActivityStatus::Completed, now)
            .await
            .is_err());

        repo.set_fail_writes(false);
        assert_eq!(
            repo.transition(activity.id, ActivityStatus::Live, ActivityStatus::Completed, now)
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_update_keeps_flags_and_requires_expected_status() {
        let repo = InMemoryActivityRepository::new();
        let now = Utc::now();
        let mut activity = Activity::from_new(NewActivity::new("Flags", now), now).unwrap();
        repo.create(&activity).await.unwrap();
        repo.toggle_active(activity.id, now).await.unwrap();

        activity.title = "Edited".to_string();
        assert_eq!(repo.update(&activity, ActivityStatus::Live).await.unwrap(), 0);
        assert_eq!(repo.update(&activity, ActivityStatus::Upcoming).await.unwrap(), 1);

        let stored = repo.get(activity.id).await.unwrap().unwrap();
        assert_eq!(stored.title, "Edited");
        assert!(!stored.is_active, "a stale copy must not restore a hidden activity");
    }
}
