//! Adapters for storage and transport.

pub mod http;
pub mod memory;
pub mod sqlite;
