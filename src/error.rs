//! Error types for the Burnnote service.

use std::fmt;

use thiserror::Error;

use crate::ratelimit::Action;

/// Main error type for Burnnote operations.
#[derive(Error, Debug)]
pub enum BurnnoteError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Note creation input was rejected; nothing was stored
    #[error("Validation error: {0}")]
    Validation(ValidationErrors),

    /// No live note exists for the requested key
    #[error("Note not found")]
    NotFound,

    /// The client exceeded the request budget for an action
    #[error("Rate limit exceeded for {action}")]
    RateLimited { action: Action },

    /// The deployment requires an authenticated user to create notes
    #[error("Authentication required")]
    Unauthenticated,

    /// Store I/O failed; the caller decides whether to retry
    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by a [`NoteStore`](crate::store::NoteStore) backend.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Underlying database failure
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A note with the same public key already exists
    #[error("duplicate public key")]
    DuplicateKey,

    /// The stored row changed between read and write
    #[error("concurrent modification: {0}")]
    Conflict(String),

    /// A stored row could not be mapped back into a note
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// A single rejected creation field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    EmptyContent,
    MaxViewsTooLow,
    TtlOutOfRange(u32),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyContent => write!(f, "content must not be empty"),
            ValidationError::MaxViewsTooLow => write!(f, "max_views must be at least 1"),
            ValidationError::TtlOutOfRange(hours) => {
                write!(f, "ttl_hours must be between 1 and 72, got {}", hours)
            }
        }
    }
}

/// Every rule a creation request broke, in field order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    pub fn contains(&self, error: &ValidationError) -> bool {
        self.0.contains(error)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.0.iter().map(|e| e.to_string()).collect();
        write!(f, "{}", messages.join("; "))
    }
}

/// Result type alias for Burnnote operations.
pub type Result<T> = std::result::Result<T, BurnnoteError>;
