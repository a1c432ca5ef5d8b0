pub mod activity;
pub mod config;
pub mod lifecycle;

pub use activity::{Activity, ActivityPatch, ActivityStatus, ActivityType, NewActivity};
pub use config::{Config, DatabaseConfig, LoggingConfig, SchedulerConfig, ServerConfig};
pub use lifecycle::{DuePredicate, ManualTransition, TransitionRejection, TransitionRule};
