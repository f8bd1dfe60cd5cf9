//! # Error Types
//!
//! Domain-specific error types for inkwell-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  inkwell-core errors (this file)                                       │
//! │  ├── CoreError        - General domain errors                          │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  inkwell-db errors (separate crate)                                    │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  inkwell-sync errors (separate crate)                                  │
//! │  └── SyncError        - Remote replay / outbox failures                │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError/SyncError → Facade        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors: domain rule violations unrelated to storage
/// or network transport.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("memo not found: {0}")]
    MemoNotFound(String),

    #[error("shelf entry not found: {0}")]
    ShelfEntryNotFound(String),

    #[error("outbox item {0} is not claimable from status {1:?}")]
    NotClaimable(String, crate::types::OutboxStatus),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors, raised before a write reaches the store or the
/// outbox.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::MemoNotFound("abc".to_string());
        assert_eq!(err.to_string(), "memo not found: abc");
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "content".to_string(),
        };
        assert_eq!(err.to_string(), "content is required");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "content".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
