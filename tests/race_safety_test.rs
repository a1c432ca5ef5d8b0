//! Concurrent manual cancels racing scheduler passes on a file-backed
//! database with several pooled connections.

mod common;

use chrono::Duration;
use std::sync::Arc;

use common::{reference_now, Harness};
use venue_activities::adapters::sqlite::{database_url, initialize_database, PoolConfig, SqliteActivityRepository};
use venue_activities::adapters::memory::InMemoryActivityRepository;
use venue_activities::services::ActivityScheduler;
use venue_activities::{ActivityPatch, ActivityStatus, Cadence, DomainError, PassOutcome};

async fn file_harness(dir: &tempfile::TempDir) -> Harness<SqliteActivityRepository> {
    let path = dir.path().join("race.db");
    let pool = initialize_database(
        &database_url(&path.to_string_lossy()),
        Some(PoolConfig {
            max_connections: 4,
            ..PoolConfig::default()
        }),
    )
    .await
    .expect("open file database");
    Harness::new(SqliteActivityRepository::new(pool), reference_now())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancel_racing_a_pass_settles_consistently() {
    let dir = tempfile::tempdir().unwrap();
    let h = Arc::new(file_harness(&dir).await);

    for round in 0..25 {
        let a = h.create(&format!("Race {round}"), Duration::seconds(-1), None).await;

        let canceller = {
            let h = Arc::clone(&h);
            tokio::spawn(async move { h.service.cancel(a.id).await })
        };
        let passer = {
            let h = Arc::clone(&h);
            tokio::spawn(async move { h.engine.run_pass().await })
        };

        let cancel = canceller.await.unwrap().expect("cancel is legal from upcoming or live");
        let pass = passer.await.unwrap().expect("pass succeeds");
        let promoted = pass
            .outcomes
            .iter()
            .any(|o| o.updated > 0 && o.matched.iter().any(|m| m.id == a.id));
        let final_status = h.status_of(&a).await;

        assert!(
            matches!(final_status, ActivityStatus::Cancelled | ActivityStatus::Live),
            "round {round}: unexpected final status {final_status}"
        );
        assert!(cancel.applied || promoted, "round {round}: nobody changed the activity");
        if final_status == ActivityStatus::Live {
            assert!(!cancel.applied, "round {round}: cancel claimed success but activity is live");
            assert!(promoted);
        }
        if !promoted {
            assert!(cancel.applied);
            assert_eq!(final_status, ActivityStatus::Cancelled);
        }
        assert_eq!(cancel.activity.status, final_status);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_manual_overrides_apply_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let h = Arc::new(file_harness(&dir).await);
    let a = h.create("Contested", Duration::hours(1), None).await;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let h = Arc::clone(&h);
            tokio::spawn(async move { h.service.make_live(a.id).await })
        })
        .collect();

    let mut applied = 0;
    for handle in handles {
        // Losers either observed `live` (rejected) or lost the conditional write.
        if let Ok(outcome) = handle.await.unwrap() {
            if outcome.applied {
                applied += 1;
            }
        }
    }

    assert_eq!(applied, 1);
    assert_eq!(h.status_of(&a).await, ActivityStatus::Live);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_overlapping_triggers_never_run_concurrently() {
    let h = Harness::new(InMemoryActivityRepository::new(), reference_now());
    for i in 0..50 {
        h.create(&format!("Bulk {i}"), Duration::minutes(-1), None).await;
    }
    let scheduler = ActivityScheduler::new(h.engine.clone(), Cadence::default(), false);

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.trigger_manually().await })
        })
        .collect();

    let mut promoted = 0;
    let mut skipped = 0;
    for handle in handles {
        match handle.await.unwrap() {
            PassOutcome::Completed { report } => promoted += report.promoted_to_live(),
            PassOutcome::Skipped => skipped += 1,
            PassOutcome::Failed { error, .. } => panic!("pass failed: {error}"),
        }
    }

    assert_eq!(promoted, 50, "every activity is promoted exactly once");
    let status = scheduler.status().await;
    assert_eq!(status.skipped_passes, skipped);
    assert_eq!(status.total_passes + status.skipped_passes, 6);
    assert!(!status.pass_in_flight);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_edits_racing_completion_never_touch_a_finished_activity() {
    let dir = tempfile::tempdir().unwrap();
    let h = Arc::new(file_harness(&dir).await);

    for round in 0..25 {
        let a = h.create(&format!("Edit Race {round}"), Duration::hours(-1), None).await;
        h.service.make_live(a.id).await.unwrap();

        let editor = {
            let h = Arc::clone(&h);
            tokio::spawn(async move {
                h.service
                    .update(
                        a.id,
                        ActivityPatch {
                            description: Some("edited".to_string()),
                            ..Default::default()
                        },
                    )
                    .await
            })
        };
        let completer = {
            let h = Arc::clone(&h);
            tokio::spawn(async move { h.service.complete(a.id).await })
        };

        let edit = editor.await.unwrap();
        completer.await.unwrap().expect("complete is legal from live");

        let stored = h.service.get(a.id).await.unwrap();
        assert_eq!(stored.status, ActivityStatus::Completed);
        match edit {
            Ok(_) => assert_eq!(stored.description.as_deref(), Some("edited")),
            Err(DomainError::TransitionRejected(_)) => {
                assert!(stored.description.is_none(), "round {round}: edit landed on a completed activity");
            }
            Err(other) => panic!("round {round}: unexpected error {other}"),
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_visibility_toggles_are_atomic() {
    let dir = tempfile::tempdir().unwrap();
    let h = Arc::new(file_harness(&dir).await);
    let a = h.create("Flicker", Duration::hours(1), None).await;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let h = Arc::clone(&h);
            tokio::spawn(async move { h.service.toggle_active(a.id).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert!(h.service.get(a.id).await.unwrap().is_active, "an even number of flips restores visibility");
}
