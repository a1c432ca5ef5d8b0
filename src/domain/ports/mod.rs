//! Port trait definitions (Hexagonal Architecture)
//!
//! - ActivityRepository: activity persistence, including the atomic
//!   conditional status updates the scheduler relies on
//! - Clock: the time source lifecycle evaluation reads "now" from

pub mod activity_repository;
pub mod clock;

pub use activity_repository::{ActivityFilter, ActivityRepository};
pub use clock::{Clock, ManualClock, SystemClock};
