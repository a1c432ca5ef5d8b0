//! Domain layer for the venue activities service
//!
//! This module contains the activity model, its lifecycle rules and the
//! ports that adapters implement.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
