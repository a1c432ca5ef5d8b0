//! Lifecycle scheduler driver.
//!
//! Arms a [`Ticker`] that runs [`TransitionEngine`] passes on a cadence, and
//! exposes start/stop, a manual trigger and a status snapshot. Passes never
//! overlap: a pass requested while another is in flight, whether from the
//! timer or a manual trigger, is skipped and counted.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::domain::models::config::SchedulerConfig;
use crate::domain::models::lifecycle::TransitionRule;
use crate::domain::ports::ActivityRepository;
use crate::services::ticker::{Cadence, CadenceError, Ticker, TickerHandle};
use crate::services::transition_engine::{PassReport, TransitionEngine};

/// What caused a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassTrigger {
    Startup,
    Timer,
    Manual,
}

impl fmt::Display for PassTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Startup => "startup",
            Self::Timer => "timer",
            Self::Manual => "manual",
        })
    }
}

/// Result of asking the scheduler to run a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PassOutcome {
    Completed { report: PassReport },
    /// Another pass was still in flight.
    Skipped,
    /// The pass aborted; rules before `rule` were applied.
    Failed {
        rule: TransitionRule,
        error: String,
        partial: PassReport,
    },
}

/// Snapshot of the scheduler's state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerStatus {
    pub is_running: bool,
    /// Cadence of the armed timer, if any.
    pub cadence: Option<String>,
    pub pass_in_flight: bool,
    pub total_passes: u64,
    pub skipped_passes: u64,
    pub failed_passes: u64,
    pub last_pass_at: Option<DateTime<Utc>>,
    pub last_report: Option<PassReport>,
    pub last_error: Option<String>,
}

#[derive(Debug, Default)]
struct PassStats {
    total_passes: u64,
    skipped_passes: u64,
    failed_passes: u64,
    last_pass_at: Option<DateTime<Utc>>,
    last_report: Option<PassReport>,
    last_error: Option<String>,
}

struct ArmedTimer {
    cadence: Cadence,
    _handle: TickerHandle,
}

struct Inner<R: ActivityRepository> {
    engine: TransitionEngine<R>,
    default_cadence: Cadence,
    run_on_start: bool,
    timer: Mutex<Option<ArmedTimer>>,
    in_flight: AtomicBool,
    stats: RwLock<PassStats>,
}

/// Clears the in-flight flag when a pass ends, however it ends.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<R: ActivityRepository + 'static> Inner<R> {
    async fn run_pass(&self, trigger: PassTrigger) -> PassOutcome {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.stats.write().await.skipped_passes += 1;
            warn!(trigger = %trigger, "previous lifecycle pass still in flight, skipping");
            return PassOutcome::Skipped;
        }
        let _guard = InFlightGuard(&self.in_flight);

        debug!(trigger = %trigger, "lifecycle pass started");
        let result = self.engine.run_pass().await;

        let mut stats = self.stats.write().await;
        stats.total_passes += 1;
        match result {
            Ok(report) => {
                stats.last_pass_at = Some(report.evaluated_at);
                stats.last_report = Some(report.clone());
                stats.last_error = None;
                if report.total() > 0 {
                    info!(
                        trigger = %trigger,
                        promoted_to_live = report.promoted_to_live(),
                        promoted_to_completed = report.promoted_to_completed(),
                        "lifecycle pass completed"
                    );
                } else {
                    debug!(trigger = %trigger, "lifecycle pass completed with no changes");
                }
                PassOutcome::Completed { report }
            }
            Err(failure) => {
                stats.failed_passes += 1;
                stats.last_pass_at = Some(failure.partial.evaluated_at);
                stats.last_error = Some(failure.to_string());
                error!(
                    trigger = %trigger,
                    rule = %failure.rule,
                    error = %failure.source,
                    "lifecycle pass aborted"
                );
                PassOutcome::Failed {
                    rule: failure.rule,
                    error: failure.source.to_string(),
                    partial: failure.partial,
                }
            }
        }
    }

    fn lock_timer(&self) -> std::sync::MutexGuard<'_, Option<ArmedTimer>> {
        self.timer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct ActivityScheduler<R: ActivityRepository> {
    inner: Arc<Inner<R>>,
}

impl<R: ActivityRepository> Clone for ActivityScheduler<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: ActivityRepository + 'static> ActivityScheduler<R> {
    pub fn new(engine: TransitionEngine<R>, default_cadence: Cadence, run_on_start: bool) -> Self {
        Self {
            inner: Arc::new(Inner {
                engine,
                default_cadence,
                run_on_start,
                timer: Mutex::new(None),
                in_flight: AtomicBool::new(false),
                stats: RwLock::new(PassStats::default()),
            }),
        }
    }

    pub fn from_config(engine: TransitionEngine<R>, config: &SchedulerConfig) -> Result<Self, CadenceError> {
        let cadence: Cadence = config.cadence.parse()?;
        Ok(Self::new(engine, cadence, config.run_on_start))
    }

    /// Arm the timer at `cadence`, or the configured default.
    ///
    /// Returns `false` without changing anything when already running.
    /// When configured to, one pass runs before this returns.
    pub async fn start(&self, cadence: Option<Cadence>) -> bool {
        let cadence = cadence.unwrap_or_else(|| self.inner.default_cadence.clone());
        {
            let mut timer = self.inner.lock_timer();
            if let Some(armed) = timer.as_ref() {
                warn!(cadence = %armed.cadence, "lifecycle scheduler already running");
                return false;
            }

            let weak: Weak<Inner<R>> = Arc::downgrade(&self.inner);
            let handle = Ticker::spawn(cadence.clone(), move || {
                let weak = weak.clone();
                async move {
                    if let Some(inner) = weak.upgrade() {
                        inner.run_pass(PassTrigger::Timer).await;
                    }
                }
            });
            *timer = Some(ArmedTimer {
                cadence: cadence.clone(),
                _handle: handle,
            });
        }

        info!(cadence = %cadence, run_on_start = self.inner.run_on_start, "lifecycle scheduler started");

        if self.inner.run_on_start {
            self.inner.run_pass(PassTrigger::Startup).await;
        }
        true
    }

    /// Disarm the timer. A pass already in flight is left to finish.
    ///
    /// Returns whether a timer was armed.
    pub fn stop(&self) -> bool {
        let armed = self.inner.lock_timer().take();
        match armed {
            Some(armed) => {
                info!(cadence = %armed.cadence, "lifecycle scheduler stopped");
                true
            }
            None => {
                debug!("lifecycle scheduler not running, nothing to stop");
                false
            }
        }
    }

    /// Run one pass now, independent of the timer.
    pub async fn trigger_manually(&self) -> PassOutcome {
        info!("manual lifecycle pass requested");
        self.inner.run_pass(PassTrigger::Manual).await
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock_timer().is_some()
    }

    pub async fn status(&self) -> SchedulerStatus {
        let cadence = self.inner.lock_timer().as_ref().map(|armed| armed.cadence.to_string());
        let stats = self.inner.stats.read().await;
        SchedulerStatus {
            is_running: cadence.is_some(),
            cadence,
            pass_in_flight: self.inner.in_flight.load(Ordering::Acquire),
            total_passes: stats.total_passes,
            skipped_passes: stats.skipped_passes,
            failed_passes: stats.failed_passes,
            last_pass_at: stats.last_pass_at,
            last_report: stats.last_report.clone(),
            last_error: stats.last_error.clone(),
        }
    }
}
