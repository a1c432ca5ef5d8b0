//! Common test utilities for integration tests
//!
//! Provides shared fixtures, helpers, and test utilities used across
//! multiple integration test files.

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;

use venue_activities::adapters::sqlite::{create_migrated_test_pool, SqliteActivityRepository};
use venue_activities::domain::ports::{ActivityRepository, Clock, ManualClock};
use venue_activities::services::{ActivityService, TransitionEngine};
use venue_activities::{Activity, NewActivity};

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
/// Call this at the beginning of tests that need logging.
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Fixed reference instant so assertions never depend on the wall clock.
pub fn reference_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 18, 0, 0).unwrap()
}

/// Repository, clock and both services sharing them.
pub struct Harness<R: ActivityRepository> {
    pub repo: Arc<R>,
    pub clock: ManualClock,
    pub service: ActivityService<R>,
    pub engine: TransitionEngine<R>,
}

impl<R: ActivityRepository> Harness<R> {
    pub fn new(repo: R, now: DateTime<Utc>) -> Self {
        let repo = Arc::new(repo);
        let clock = ManualClock::new(now);
        let shared: Arc<dyn Clock> = Arc::new(clock.clone());
        Self {
            service: ActivityService::new(Arc::clone(&repo), Arc::clone(&shared)),
            engine: TransitionEngine::new(Arc::clone(&repo), shared),
            repo,
            clock,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Create an activity whose window is given relative to the clock.
    pub async fn create(&self, title: &str, start: Duration, end: Option<Duration>) -> Activity {
        let now = self.now();
        let mut new = NewActivity::new(title, now + start);
        new.end_date = end.map(|end| now + end);
        self.service.create(new).await.expect("create activity")
    }

    pub async fn status_of(&self, activity: &Activity) -> venue_activities::ActivityStatus {
        self.repo
            .get(activity.id)
            .await
            .expect("read activity")
            .expect("activity exists")
            .status
    }
}

/// Harness over a migrated in-memory SQLite database.
pub async fn sqlite_harness() -> Harness<SqliteActivityRepository> {
    let pool = create_migrated_test_pool().await.expect("create test pool");
    Harness::new(SqliteActivityRepository::new(pool), reference_now())
}
