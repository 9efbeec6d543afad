//! Domain error types
//!
//! Error types for domain-level validation failures. Errors crossing an
//! adapter boundary (gateway, store, queue) have their own enums in the
//! corresponding port module.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid drive identifier
    #[error("Invalid drive id: {0}")]
    InvalidDriveId(String),

    /// Invalid provider item identifier
    #[error("Invalid remote id: {0}")]
    InvalidRemoteId(String),

    /// Invalid delta token
    #[error("Invalid delta token: {0}")]
    InvalidDeltaToken(String),

    /// Item observed without a usable name
    #[error("Invalid item name: {0}")]
    InvalidName(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}
