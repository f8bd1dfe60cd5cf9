//! # Validation Module
//!
//! Input validation utilities shared by the facade and the repositories.
//!
//! ## Validation Strategy
//! Defense in depth: the facade validates before a write reaches the store,
//! and the SQLite schema enforces NOT NULL/CHECK constraints as a backstop.
//! This module is the facade-side layer.

use crate::error::ValidationError;

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validates memo content.
///
/// - Must not be empty
/// - Must be at most 4000 characters
pub fn validate_memo_content(content: &str) -> ValidationResult<()> {
    let content = content.trim();

    if content.is_empty() {
        return Err(ValidationError::Required {
            field: "content".to_string(),
        });
    }

    if content.len() > 4000 {
        return Err(ValidationError::TooLong {
            field: "content".to_string(),
            max: 4000,
        });
    }

    Ok(())
}

/// Validates a page number, when supplied.
///
/// - Must be non-negative
/// - Must be at most 100,000 (implausible for any physical book, but keeps
///   the bound generous rather than guessing a real ceiling)
pub fn validate_page_number(page: Option<i32>) -> ValidationResult<()> {
    if let Some(page) = page {
        if page < 0 {
            return Err(ValidationError::OutOfRange {
                field: "page_number".to_string(),
                min: 0,
                max: 100_000,
            });
        }
        if page as i64 > 100_000 {
            return Err(ValidationError::OutOfRange {
                field: "page_number".to_string(),
                min: 0,
                max: 100_000,
            });
        }
    }
    Ok(())
}

/// Validates a book title.
pub fn validate_title(title: &str) -> ValidationResult<()> {
    let title = title.trim();

    if title.is_empty() {
        return Err(ValidationError::Required {
            field: "title".to_string(),
        });
    }

    if title.len() > 500 {
        return Err(ValidationError::TooLong {
            field: "title".to_string(),
            max: 500,
        });
    }

    Ok(())
}

/// Validates a book author.
pub fn validate_author(author: &str) -> ValidationResult<()> {
    let author = author.trim();

    if author.is_empty() {
        return Err(ValidationError::Required {
            field: "author".to_string(),
        });
    }

    if author.len() > 300 {
        return Err(ValidationError::TooLong {
            field: "author".to_string(),
            max: 300,
        });
    }

    Ok(())
}
