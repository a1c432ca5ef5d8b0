//! Venue Activities - activity lifecycle scheduler and API
//!
//! Time-bound activities move through `upcoming → live → completed` as a
//! function of wall-clock time, while operators may cancel or override them
//! concurrently. A background scheduler applies the time rules as
//! conditional bulk updates; manual changes are conditional on the status
//! they observed, so whichever actor writes first wins and the other is a
//! no-op.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): models, lifecycle rules, and ports
//! - **Service Layer** (`services`): transition engine, scheduler, mutation API
//! - **Adapters** (`adapters`): SQLite and in-memory repositories, HTTP API
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use venue_activities::adapters::memory::InMemoryActivityRepository;
//! use venue_activities::domain::ports::SystemClock;
//! use venue_activities::services::{ActivityScheduler, Cadence, TransitionEngine};
//!
//! #[tokio::main]
//! async fn main() {
//!     let engine = TransitionEngine::new(Arc::new(InMemoryActivityRepository::new()), Arc::new(SystemClock));
//!     let scheduler = ActivityScheduler::new(engine, Cadence::default(), true);
//!     scheduler.start(None).await;
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::models::{
    Activity, ActivityPatch, ActivityStatus, ActivityType, Config, DatabaseConfig, LoggingConfig,
    ManualTransition, NewActivity, SchedulerConfig, ServerConfig, TransitionRejection, TransitionRule,
};
pub use domain::ports::{ActivityFilter, ActivityRepository, Clock, ManualClock, SystemClock};
pub use domain::{DomainError, DomainResult};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    ActivityScheduler, ActivityService, Cadence, PassOutcome, PassReport, SchedulerStatus, TransitionEngine,
    TransitionOutcome,
};
