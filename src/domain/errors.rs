//! Domain errors for the venue activities system.

use thiserror::Error;
use uuid::Uuid;

use crate::domain::models::lifecycle::TransitionRejection;

/// Domain-level errors that can occur in the activities system.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Activity not found: {0}")]
    ActivityNotFound(Uuid),

    #[error("Activity not found: {0}")]
    ActivitySlugNotFound(String),

    #[error("Transition rejected: {0}")]
    TransitionRejected(#[from] TransitionRejection),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
    /// Whether the error stems from the caller (bad input, illegal transition)
    /// rather than from infrastructure.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::ActivityNotFound(_)
                | Self::ActivitySlugNotFound(_)
                | Self::TransitionRejected(_)
                | Self::ValidationFailed(_)
        )
    }
}

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}
