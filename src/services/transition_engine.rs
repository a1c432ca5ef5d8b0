//! Time-driven lifecycle evaluation.
//!
//! One pass reads "now" once, then applies every [`TransitionRule`] in
//! order as a single conditional bulk update. A record that another actor
//! moved between selection and update simply fails the WHERE clause.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::models::lifecycle::TransitionRule;
use crate::domain::ports::{ActivityRepository, Clock};

/// Identity of an activity a rule selected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityRef {
    pub id: Uuid,
    pub title: String,
}

/// Result of one rule within a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleOutcome {
    pub rule: TransitionRule,
    /// Activities selected before the update ran.
    pub matched: Vec<ActivityRef>,
    /// Rows the conditional update actually changed.
    pub updated: u64,
}

/// Result of a full evaluation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassReport {
    pub evaluated_at: DateTime<Utc>,
    pub outcomes: Vec<RuleOutcome>,
}

impl PassReport {
    fn new(evaluated_at: DateTime<Utc>) -> Self {
        Self {
            evaluated_at,
            outcomes: Vec::new(),
        }
    }

    pub fn updated_by(&self, rule: TransitionRule) -> u64 {
        self.outcomes
            .iter()
            .filter(|o| o.rule == rule)
            .map(|o| o.updated)
            .sum()
    }

    pub fn promoted_to_live(&self) -> u64 {
        self.updated_by(TransitionRule::PromoteToLive)
    }

    pub fn promoted_to_completed(&self) -> u64 {
        self.updated_by(TransitionRule::PromoteToCompleted)
    }

    pub fn total(&self) -> u64 {
        self.outcomes.iter().map(|o| o.updated).sum()
    }
}

/// A pass aborted at `rule`. Rules before it were applied and are kept in
/// `partial`; rules after it did not run.
#[derive(Debug, Error)]
#[error("Transition rule {rule} failed: {source}")]
pub struct PassFailure {
    pub rule: TransitionRule,
    pub partial: PassReport,
    #[source]
    pub source: DomainError,
}

pub struct TransitionEngine<R: ActivityRepository> {
    repo: Arc<R>,
    clock: Arc<dyn Clock>,
}

impl<R: ActivityRepository> Clone for TransitionEngine<R> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<R: ActivityRepository> TransitionEngine<R> {
    pub fn new(repo: Arc<R>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Evaluate every rule once against the current time.
    pub async fn run_pass(&self) -> Result<PassReport, PassFailure> {
        let now = self.clock.now();
        let mut report = PassReport::new(now);

        for rule in TransitionRule::ORDERED {
            match self.apply_rule(rule, now).await {
                Ok(outcome) => report.outcomes.push(outcome),
                Err(source) => {
                    return Err(PassFailure {
                        rule,
                        partial: report,
                        source,
                    })
                }
            }
        }

        Ok(report)
    }

    /// Activities each rule would select right now, without changing anything.
    pub async fn preview(&self) -> Result<Vec<RuleOutcome>, DomainError> {
        let now = self.clock.now();
        let mut outcomes = Vec::with_capacity(TransitionRule::ORDERED.len());
        for rule in TransitionRule::ORDERED {
            let due = self.repo.find_due(&rule.predicate(now)).await?;
            outcomes.push(RuleOutcome {
                rule,
                matched: due
                    .into_iter()
                    .map(|a| ActivityRef { id: a.id, title: a.title })
                    .collect(),
                updated: 0,
            });
        }
        Ok(outcomes)
    }

    async fn apply_rule(&self, rule: TransitionRule, now: DateTime<Utc>) -> Result<RuleOutcome, DomainError> {
        let predicate = rule.predicate(now);

        let due = self.repo.find_due(&predicate).await?;
        if due.is_empty() {
            debug!(rule = %rule, "no activities due");
            return Ok(RuleOutcome {
                rule,
                matched: Vec::new(),
                updated: 0,
            });
        }

        let updated = self.repo.update_where(&predicate, rule.target(), now).await?;

        info!(
            rule = %rule,
            from = %rule.source(),
            to = %rule.target(),
            matched = due.len(),
            updated,
            "applied transition rule"
        );
        for activity in &due {
            info!(
                rule = %rule,
                activity_id = %activity.id,
                title = %activity.title,
                "activity {} -> {}",
                rule.source(),
                rule.target()
            );
        }

        Ok(RuleOutcome {
            rule,
            matched: due
                .into_iter()
                .map(|a| ActivityRef { id: a.id, title: a.title })
                .collect(),
            updated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryActivityRepository;
    use crate::domain::models::activity::{Activity, ActivityStatus, NewActivity};
    use crate::domain::ports::ManualClock;
    use chrono::Duration;

    fn engine(repo: &InMemoryActivityRepository, clock: &ManualClock) -> TransitionEngine<InMemoryActivityRepository> {
        TransitionEngine::new(Arc::new(repo.clone()), Arc::new(clock.clone()))
    }

    #[tokio::test]
    async fn test_elapsed_window_completes_in_one_pass() {
        let now = Utc::now();
        let clock = ManualClock::new(now);
        let repo = InMemoryActivityRepository::new();
        let activity = Activity::from_new(
            NewActivity::new("Brunch", now - Duration::hours(3)).with_end_date(now - Duration::hours(1)),
            now - Duration::days(1),
        )
        .unwrap();
        repo.create(&activity).await.unwrap();

        let report = engine(&repo, &clock).run_pass().await.unwrap();

        assert_eq!(report.promoted_to_live(), 1);
        assert_eq!(report.promoted_to_completed(), 1);
        let stored = repo.get(activity.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ActivityStatus::Completed);
        assert_eq!(stored.updated_at, now);
    }

    #[tokio::test]
    async fn test_pass_with_nothing_due_changes_nothing() {
        let now = Utc::now();
        let clock = ManualClock::new(now);
        let repo = InMemoryActivityRepository::new();
        let activity = Activity::from_new(NewActivity::new("Later", now + Duration::hours(1)), now).unwrap();
        repo.create(&activity).await.unwrap();

        let report = engine(&repo, &clock).run_pass().await.unwrap();

        assert_eq!(report.total(), 0);
        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(repo.get(activity.id).await.unwrap().unwrap().updated_at, now);
    }

    #[tokio::test]
    async fn test_failure_reports_rule() {
        let now = Utc::now();
        let clock = ManualClock::new(now);
        let repo = InMemoryActivityRepository::new();
        let activity = Activity::from_new(NewActivity::new("Stuck", now - Duration::minutes(1)), now).unwrap();
        repo.create(&activity).await.unwrap();
        repo.set_fail_writes(true);

        let failure = engine(&repo, &clock).run_pass().await.unwrap_err();

        assert_eq!(failure.rule, TransitionRule::PromoteToLive);
        assert!(failure.partial.outcomes.is_empty());
        assert_eq!(repo.get(activity.id).await.unwrap().unwrap().status, ActivityStatus::Upcoming);
    }

    #[tokio::test]
    async fn test_failure_in_second_rule_keeps_first() {
        let now = Utc::now();
        let clock = ManualClock::new(now);
        let repo = InMemoryActivityRepository::new();
        let activity = Activity::from_new(
            NewActivity::new("Half Done", now - Duration::hours(2)).with_end_date(now - Duration::hours(1)),
            now - Duration::days(1),
        )
        .unwrap();
        repo.create(&activity).await.unwrap();
        repo.fail_after_writes(1);

        let engine = engine(&repo, &clock);
        let failure = engine.run_pass().await.unwrap_err();

        assert_eq!(failure.rule, TransitionRule::PromoteToCompleted);
        assert_eq!(failure.partial.promoted_to_live(), 1);
        assert_eq!(failure.partial.outcomes.len(), 1);
        assert_eq!(repo.get(activity.id).await.unwrap().unwrap().status, ActivityStatus::Live);

        repo.set_fail_writes(false);
        let report = engine.run_pass().await.unwrap();
        assert_eq!(report.promoted_to_live(), 0);
        assert_eq!(report.promoted_to_completed(), 1);
        assert_eq!(repo.get(activity.id).await.unwrap().unwrap().status, ActivityStatus::Completed);
    }

    #[tokio::test]
    async fn test_preview_does_not_write() {
        let now = Utc::now();
        let clock = ManualClock::new(now);
        let repo = InMemoryActivityRepository::new();
        let activity = Activity::from_new(NewActivity::new("Soon", now - Duration::seconds(1)), now).unwrap();
        repo.create(&activity).await.unwrap();

        let preview = engine(&repo, &clock).preview().await.unwrap();

        assert_eq!(preview[0].matched.len(), 1);
        assert_eq!(preview[0].matched[0].id, activity.id);
        assert_eq!(repo.get(activity.id).await.unwrap().unwrap().status, ActivityStatus::Upcoming);
    }
}
