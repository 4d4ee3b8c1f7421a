//! # AppError
//!
//! Centralized error handling for the Firefly core.
//! Maps domain-specific failures to actionable error types.

use std::fmt::Display;

use thiserror::Error;

/// The message every rejected token produces, whatever the cause.
pub const INVALID_TOKEN: &str = "invalid token";

/// The primary error type for all ff-core operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// Resource not found (e.g., User, Post, Comment)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// Missing or empty required field (e.g., empty post body)
    #[error("validation error: {0}")]
    ValidationError(String),

    /// The actor lacks the role or ownership a mutation requires
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Token invalid, expired or issued for another purpose
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Unique constraint violation on an identity field (email, username)
    #[error("conflict: {0}")]
    Conflict(String),

    /// Infrastructure failure (e.g., DB down, queue closed)
    #[error("internal service error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn not_found(kind: &str, id: impl Display) -> Self {
        AppError::NotFound(kind.to_string(), id.to_string())
    }

    /// Uniform rejection for anything token related.
    pub fn invalid_token() -> Self {
        AppError::Unauthorized(INVALID_TOKEN.to_string())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::ValidationError(msg.into())
    }

    pub fn denied(msg: impl Into<String>) -> Self {
        AppError::PermissionDenied(msg.into())
    }

    pub fn internal(err: impl Display) -> Self {
        AppError::Internal(err.to_string())
    }

    /// Whether a caller may retry the failed operation unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Internal(_))
    }
}

/// A specialized Result type for Firefly logic.
pub type Result<T> = std::result::Result<T, AppError>;
