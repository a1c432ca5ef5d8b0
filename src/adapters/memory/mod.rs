//! In-process adapters.

pub mod activity_repository;

pub use activity_repository::InMemoryActivityRepository;
