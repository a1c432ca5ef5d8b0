//! Application services.

pub mod activity_scheduler;
pub mod activity_service;
pub mod ticker;
pub mod transition_engine;

pub use activity_scheduler::{ActivityScheduler, PassOutcome, PassTrigger, SchedulerStatus};
pub use activity_service::{ActivityService, TransitionOutcome};
pub use ticker::{Cadence, CadenceError, Ticker, TickerHandle};
pub use transition_engine::{ActivityRef, PassFailure, PassReport, RuleOutcome, TransitionEngine};
