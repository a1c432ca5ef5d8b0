//! Repeating timer with a disposable handle.
//!
//! A [`Ticker`] calls back on a [`Cadence`] until its [`TickerHandle`] is
//! cancelled or dropped. Each callback future is spawned on its own task, so
//! a slow or hung callback never delays later ticks or cancellation; callers
//! that need mutual exclusion between callbacks must guard it themselves.

use chrono::{DateTime, Utc};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CadenceError {
    #[error("Cadence cannot be empty")]
    Empty,

    #[error("Interval must be at least one second: {0}")]
    TooShort(String),

    #[error("Invalid cadence '{input}': {reason}")]
    Invalid { input: String, reason: String },
}

/// How often a ticker fires.
#[derive(Clone)]
pub enum Cadence {
    /// Fixed period, first tick one period after start.
    Every(Duration),
    /// Cron expression, evaluated in UTC.
    Cron {
        expression: String,
        schedule: Box<cron::Schedule>,
    },
}

impl Cadence {
    pub fn every(period: Duration) -> Result<Self, CadenceError> {
        if period < Duration::from_secs(1) {
            return Err(CadenceError::TooShort(format!("{}ms", period.as_millis())));
        }
        Ok(Self::Every(period))
    }

    /// Time to wait from `now` until the next tick, if there is one.
    pub fn next_delay(&self, now: DateTime<Utc>) -> Option<Duration> {
        match self {
            Self::Every(period) => Some(*period),
            Self::Cron { schedule, .. } => schedule
                .after(&now)
                .next()
                .map(|next| (next - now).to_std().unwrap_or(Duration::ZERO)),
        }
    }
}

impl Default for Cadence {
    fn default() -> Self {
        Self::Every(Duration::from_secs(60))
    }
}

impl PartialEq for Cadence {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Every(a), Self::Every(b)) => a == b,
            (Self::Cron { expression: a, .. }, Self::Cron { expression: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Every(period) => f.debug_tuple("Every").field(period).finish(),
            Self::Cron { expression, .. } => f.debug_tuple("Cron").field(expression).finish(),
        }
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Every(period) => {
                let secs = period.as_secs();
                if secs % 3600 == 0 {
                    write!(f, "{}h", secs / 3600)
                } else if secs % 60 == 0 {
                    write!(f, "{}m", secs / 60)
                } else {
                    write!(f, "{secs}s")
                }
            }
            Self::Cron { expression, .. } => f.write_str(expression),
        }
    }
}

impl FromStr for Cadence {
    type Err = CadenceError;

    /// Accepts `30s`, `5m`, `1h`, bare seconds, or a cron expression.
    /// Five-field cron expressions get a leading seconds field of `0`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();
        if input.is_empty() {
            return Err(CadenceError::Empty);
        }

        if let Some(period) = parse_interval(input)? {
            return Self::every(period).map_err(|_| CadenceError::TooShort(input.to_string()));
        }

        let fields = input.split_whitespace().count();
        let expression = match fields {
            5 => format!("0 {input}"),
            6 | 7 => input.to_string(),
            _ => {
                return Err(CadenceError::Invalid {
                    input: input.to_string(),
                    reason: "expected an interval like 30s/5m/1h or a cron expression".to_string(),
                })
            }
        };

        let schedule = cron::Schedule::from_str(&expression).map_err(|e| CadenceError::Invalid {
            input: input.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self::Cron {
            expression: input.to_string(),
            schedule: Box::new(schedule),
        })
    }
}

/// `Ok(None)` when the input is not interval-shaped at all.
fn parse_interval(input: &str) -> Result<Option<Duration>, CadenceError> {
    if input.contains(char::is_whitespace) {
        return Ok(None);
    }
    let split = input.find(|c: char| !c.is_ascii_digit()).unwrap_or(input.len());
    let (digits, unit) = input.split_at(split);
    if digits.is_empty() {
        return Ok(None);
    }

    let multiplier = match unit {
        "" | "s" => 1,
        "m" => 60,
        "h" => 3600,
        _ => return Ok(None),
    };
    let value: u64 = digits.parse().map_err(|_| CadenceError::Invalid {
        input: input.to_string(),
        reason: "interval out of range".to_string(),
    })?;

    value
        .checked_mul(multiplier)
        .map(|secs| Some(Duration::from_secs(secs)))
        .ok_or_else(|| CadenceError::Invalid {
            input: input.to_string(),
            reason: "interval out of range".to_string(),
        })
}

/// First fire time strictly after `last`, so a timer that wakes early never
/// fires the same slot twice.
fn next_fire(schedule: &cron::Schedule, last: DateTime<Utc>) -> Option<DateTime<Utc>> {
    schedule.after(&last).next()
}

/// Disposable handle to a running ticker. Dropping it stops the ticker.
pub struct TickerHandle {
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl TickerHandle {
    /// Stop future ticks. Callbacks already spawned keep running.
    pub fn cancel(mut self) {
        self.dispose();
    }

    fn dispose(&mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for TickerHandle {
    fn drop(&mut self) {
        self.dispose();
    }
}

pub struct Ticker;

impl Ticker {
    /// Call `tick` on `cadence` until the returned handle is cancelled.
    pub fn spawn<F, Fut>(cadence: Cadence, mut tick: F) -> TickerHandle
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (shutdown, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            match cadence {
                Cadence::Every(period) => {
                    let mut timer = interval_at(Instant::now() + period, period);
                    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
                    loop {
                        tokio::select! {
                            _ = timer.tick() => {
                                tokio::spawn(tick());
                            }
                            _ = shutdown_rx.changed() => break,
                        }
                    }
                }
                Cadence::Cron { schedule, expression } => {
                    let mut last = Utc::now();
                    loop {
                        let Some(next) = next_fire(&schedule, last) else {
                            tracing::warn!(cadence = %expression, "cron schedule has no further fire times");
                            break;
                        };
                        let delay = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
                        tokio::select! {
                            () = tokio::time::sleep(delay) => {
                                last = next;
                                tokio::spawn(tick());
                            }
                            _ = shutdown_rx.changed() => break,
                        }
                    }
                }
            }
        });

        TickerHandle {
            shutdown,
            task: Some(task),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_parse_intervals() {
        assert_eq!("30s".parse::<Cadence>().unwrap(), Cadence::Every(Duration::from_secs(30)));
        assert_eq!("5m".parse::<Cadence>().unwrap(), Cadence::Every(Duration::from_secs(300)));
        assert_eq!("1h".parse::<Cadence>().unwrap(), Cadence::Every(Duration::from_secs(3600)));
        assert_eq!("90".parse::<Cadence>().unwrap(), Cadence::Every(Duration::from_secs(90)));
    }

    #[test]
    fn test_parse_rejects_zero_and_garbage() {
        assert_eq!("0s".parse::<Cadence>().unwrap_err(), CadenceError::TooShort("0s".to_string()));
        assert_eq!("".parse::<Cadence>().unwrap_err(), CadenceError::Empty);
        assert!("every minute".parse::<Cadence>().is_err());
        assert!("5x".parse::<Cadence>().is_err());
    }

    #[test]
    fn test_parse_cron_forms() {
        let five = "*/5 * * * *".parse::<Cadence>().unwrap();
        assert!(matches!(five, Cadence::Cron { .. }));
        assert_eq!(five.to_string(), "*/5 * * * *");

        let six = "0 * * * * *".parse::<Cadence>().unwrap();
        let now = Utc::now();
        let delay = six.next_delay(now).unwrap();
        assert!(delay <= Duration::from_secs(60));
    }

    #[test]
    fn test_cron_fire_times_advance_past_the_last_one() {
        use chrono::TimeZone;

        let schedule: cron::Schedule = "0 * * * * *".parse().unwrap();
        let fired = Utc.with_ymd_and_hms(2026, 6, 1, 12, 1, 0).unwrap();

        let early_wake = fired - chrono::Duration::milliseconds(1);
        assert_eq!(next_fire(&schedule, early_wake), Some(fired));
        assert_eq!(
            next_fire(&schedule, fired),
            Some(Utc.with_ymd_and_hms(2026, 6, 1, 12, 2, 0).unwrap())
        );
    }

    #[test]
    fn test_display_round_trips_intervals() {
        for input in ["45s", "1m", "2h"] {
            assert_eq!(input.parse::<Cadence>().unwrap().to_string(), input);
        }
        assert_eq!(Cadence::default().to_string(), "1m");
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_fires_on_period_and_stops_on_cancel() {
        let count = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&count);
        let handle = Ticker::spawn(Cadence::Every(Duration::from_secs(60)), move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(62)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);

        handle.cancel();
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_disposes_ticker() {
        let count = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&count);
        let handle = Ticker::spawn(Cadence::Every(Duration::from_secs(1)), move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        drop(handle);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
