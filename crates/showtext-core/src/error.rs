//! Domain-specific error types following panic-free policy.

use thiserror::Error;

/// Errors that can occur in domain operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Display text was empty after trimming the frame terminator
    #[error("Display text must not be empty")]
    EmptyText,

    /// Hold value could not be interpreted as a second count
    #[error("Invalid hold {value:?}: {reason}")]
    InvalidHold { value: String, reason: String },
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
