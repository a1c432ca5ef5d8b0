//! HTTP adapters.

pub mod activities_http;

pub use activities_http::{ActivitiesHttpConfig, ActivitiesHttpServer, ApiResponse, ErrorResponse};
