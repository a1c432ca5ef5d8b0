//! Property tests for status monotonicity under random interleavings of
//! clock advances, scheduler passes and manual operations.

mod common;

use chrono::Duration;
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;

use common::{reference_now, Harness};
use venue_activities::adapters::memory::InMemoryActivityRepository;
use venue_activities::{Activity, ActivityStatus};

#[derive(Debug, Clone)]
enum Op {
    Advance(i64),
    Pass,
    Cancel(usize),
    MakeLive(usize),
    Complete(usize),
    ToggleActive(usize),
}

fn op_strategy(activities: usize) -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (1i64..240).prop_map(Op::Advance),
        4 => Just(Op::Pass),
        1 => (0..activities).prop_map(Op::Cancel),
        1 => (0..activities).prop_map(Op::MakeLive),
        1 => (0..activities).prop_map(Op::Complete),
        1 => (0..activities).prop_map(Op::ToggleActive),
    ]
}

/// Window as (start offset, optional end offset) in minutes from now.
fn window_strategy() -> impl Strategy<Value = (i64, Option<i64>)> {
    (-180i64..360, prop::option::of(0i64..240))
        .prop_map(|(start, length)| (start, length.map(|len| start + len)))
}

const fn rank(status: ActivityStatus) -> u8 {
    match status {
        ActivityStatus::Upcoming => 0,
        ActivityStatus::Live => 1,
        ActivityStatus::Completed => 2,
        ActivityStatus::Cancelled => 3,
    }
}

/// Whether `before -> after` is a step along upcoming → live → completed,
/// or into cancelled from a non-terminal status.
fn is_monotonic(before: ActivityStatus, after: ActivityStatus) -> bool {
    match (before, after) {
        (b, a) if b == a => true,
        (ActivityStatus::Upcoming | ActivityStatus::Live, ActivityStatus::Cancelled) => true,
        (ActivityStatus::Cancelled, _) => false,
        (b, a) => rank(a) > rank(b) && a != ActivityStatus::Cancelled,
    }
}

async fn snapshot(h: &Harness<InMemoryActivityRepository>, activities: &[Activity]) -> Vec<ActivityStatus> {
    let mut statuses = Vec::with_capacity(activities.len());
    for a in activities {
        statuses.push(h.status_of(a).await);
    }
    statuses
}

async fn run_case(windows: Vec<(i64, Option<i64>)>, ops: Vec<Op>) -> Result<(), TestCaseError> {
    let h = Harness::new(InMemoryActivityRepository::new(), reference_now());
    let mut activities = Vec::new();
    for (i, (start, end)) in windows.iter().enumerate() {
        activities.push(
            h.create(
                &format!("Prop {i}"),
                Duration::minutes(*start),
                end.map(Duration::minutes),
            )
            .await,
        );
    }

    let mut before = snapshot(&h, &activities).await;
    for op in &ops {
        let mut manual_complete = None;
        match op {
            Op::Advance(minutes) => h.clock.advance(Duration::minutes(*minutes)),
            Op::Pass => {
                h.engine.run_pass().await.map_err(|e| TestCaseError::fail(e.to_string()))?;
                let again = h.engine.run_pass().await.map_err(|e| TestCaseError::fail(e.to_string()))?;
                prop_assert_eq!(again.total(), 0, "a repeated pass must be a no-op");
            }
            // Rejections are expected outcomes here; only the statuses matter.
            Op::Cancel(i) => {
                let _ = h.service.cancel(activities[*i].id).await;
            }
            Op::MakeLive(i) => {
                let _ = h.service.make_live(activities[*i].id).await;
            }
            Op::Complete(i) => {
                manual_complete = Some(*i);
                let _ = h.service.complete(activities[*i].id).await;
            }
            Op::ToggleActive(i) => {
                h.service
                    .toggle_active(activities[*i].id)
                    .await
                    .map_err(|e| TestCaseError::fail(e.to_string()))?;
            }
        }

        let after = snapshot(&h, &activities).await;
        for (i, (b, a)) in before.iter().zip(&after).enumerate() {
            let override_complete = manual_complete == Some(i)
                && *b == ActivityStatus::Cancelled
                && *a == ActivityStatus::Completed;
            prop_assert!(
                is_monotonic(*b, *a) || override_complete,
                "activity {} went {} -> {} on {:?}",
                i,
                b,
                a,
                op
            );
        }
        before = after;
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: statuses only move forward, and cancelled is terminal
    /// except for an explicit manual completion.
    #[test]
    fn prop_statuses_are_monotonic(
        windows in prop::collection::vec(window_strategy(), 1..6),
        ops in prop::collection::vec(op_strategy(5), 1..40),
    ) {
        let ops: Vec<Op> = ops
            .into_iter()
            .map(|op| match op {
                Op::Cancel(i) => Op::Cancel(i % windows.len()),
                Op::MakeLive(i) => Op::MakeLive(i % windows.len()),
                Op::Complete(i) => Op::Complete(i % windows.len()),
                Op::ToggleActive(i) => Op::ToggleActive(i % windows.len()),
                other => other,
            })
            .collect();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(run_case(windows, ops))?;
    }

    /// Property: after one pass, every active activity whose window has
    /// fully elapsed is completed, and one without an end date never is.
    #[test]
    fn prop_single_pass_settles_elapsed_windows(
        windows in prop::collection::vec(window_strategy(), 1..8),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            let h = Harness::new(InMemoryActivityRepository::new(), reference_now());
            let mut created = Vec::new();
            for (i, (start, end)) in windows.iter().enumerate() {
                let a = h
                    .create(&format!("Settle {i}"), Duration::minutes(*start), end.map(Duration::minutes))
                    .await;
                created.push((a, *start, *end));
            }

            h.engine.run_pass().await.map_err(|e| TestCaseError::fail(e.to_string()))?;

            for (a, start, end) in &created {
                let status = h.status_of(a).await;
                let expected = match (start <= &0, end.map(|e| e <= 0)) {
                    (false, _) => ActivityStatus::Upcoming,
                    (true, Some(true)) => ActivityStatus::Completed,
                    (true, _) => ActivityStatus::Live,
                };
                prop_assert_eq!(status, expected, "window ({}, {:?})", start, end);
            }
            Ok::<(), TestCaseError>(())
        })?;
    }
}
