//! # Error Handling Module
//!
//! This module defines the error types used throughout Cask ORM.
//!
//! ## Error Taxonomy
//!
//! Cask ORM separates three kinds of failure, and only one of them is ever
//! returned as an `Err` from a `Builder` terminal method:
//!
//! - **Programmer errors** (`InvalidArgument`): calling `upsert` without
//!   unique columns, or with data that misses one of them. These abort the call.
//! - **Validation failures** (`Validation`, `InvalidOperator`, `InvalidData`):
//!   recorded as the Builder's sticky invalid state. Terminal methods degrade to
//!   empty/zero/`None` results and the reason is available via
//!   `Builder::invalid_reason()`.
//! - **Driver failures** (`DatabaseError`, `Conversion`): logged and stored in
//!   `Builder::last_error()`; the terminal still returns its "no result" value.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use cask_orm::Error;
//!
//! match db.model::<Occurrence>().upsert(&[], None).await {
//!     Err(Error::InvalidArgument(msg)) => eprintln!("programmer error: {}", msg),
//!     Ok(Some(outcome)) => println!("upsert: {:?}", outcome),
//!     Ok(None) => println!("upsert rejected or failed"),
//!     Err(e) => eprintln!("other error: {}", e),
//! }
//! ```

// ============================================================================
// External Crate Imports
// ============================================================================

use std::fmt;

use thiserror::Error;

// ============================================================================
// Validation Error Types
// ============================================================================

/// A single column-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The column that failed validation.
    pub column: String,

    /// Human readable reason.
    pub message: String,
}

impl ValidationError {
    /// Creates a new validation error for `column`.
    pub fn new(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self { column: column.into(), message: message.into() }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.column, self.message)
    }
}

/// The full list of validation failures for one row.
///
/// Displayed as the individual messages joined by `" : "`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    /// Returns `true` if no error was recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Appends an error.
    pub fn push(&mut self, error: ValidationError) {
        self.0.push(error);
    }

    /// Iterates over the recorded errors.
    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }

    /// The messages, one per failing column.
    pub fn messages(&self) -> Vec<String> {
        self.0.iter().map(ToString::to_string).collect()
    }
}

impl From<ValidationError> for ValidationErrors {
    fn from(error: ValidationError) -> Self {
        Self(vec![error])
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.messages().join(" : "))
    }
}

// ============================================================================
// Error Enum Definition
// ============================================================================

/// The main error type for Cask ORM operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid data error.
    ///
    /// Used when a value cannot be turned into a model field, or when the
    /// Builder has no data to work with (e.g. the primary key fallback of a
    /// WHERE clause could not be built).
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// One or more columns failed validation against the model schema.
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// A comparison operator outside of `= < > <= >= != <>` was used.
    #[error("Unsupported operator `{0}`")]
    InvalidOperator(String),

    /// Type conversion error.
    ///
    /// Raised when converting between `Value`s and Rust or driver types fails,
    /// typically while binding arguments or decoding rows.
    #[error("Type conversion error: {0}")]
    Conversion(String),

    /// Database operation error.
    ///
    /// This variant wraps errors from the underlying sqlx library and is
    /// created automatically by the `?` operator.
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    /// Invalid argument error.
    ///
    /// Indicates programmer error (e.g. `upsert` without unique columns)
    /// rather than a runtime data issue.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

// ============================================================================
// Helper Functions
// ============================================================================

impl Error {
    /// Creates an `InvalidData` error from a string slice.
    pub fn invalid_data(msg: &str) -> Self {
        Error::InvalidData(msg.to_string())
    }

    /// Creates an `InvalidArgument` error from a string slice.
    ///
    /// ```rust,ignore
    /// if unique_by.is_empty() {
    ///     return Err(Error::invalid_argument("A series of unique columns needs to be specified."));
    /// }
    /// ```
    pub fn invalid_argument(msg: &str) -> Self {
        Error::InvalidArgument(msg.to_string())
    }

    /// Creates a `Conversion` error from a string slice.
    pub fn conversion(msg: &str) -> Self {
        Error::Conversion(msg.to_string())
    }

    /// Prefixes a conversion or data error with the column it happened on.
    pub fn in_column(self, column: &str) -> Self {
        match self {
            Error::Conversion(msg) => Error::Conversion(format!("column `{}`: {}", column, msg)),
            Error::InvalidData(msg) => Error::InvalidData(format!("column `{}`: {}", column, msg)),
            other => other,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_join_messages() {
        let mut errors = ValidationErrors::default();
        errors.push(ValidationError::new("status", "not an allowed value"));
        errors.push(ValidationError::new("post_id", "is required"));

        assert_eq!(errors.to_string(), "status: not an allowed value : post_id: is required");
        assert_eq!(errors.messages().len(), 2);
    }

    #[test]
    fn test_in_column_only_touches_data_errors() {
        let err = Error::conversion("not an integer").in_column("event_id");
        assert_eq!(err.to_string(), "Type conversion error: column `event_id`: not an integer");

        let err = Error::invalid_argument("boom").in_column("event_id");
        assert!(matches!(err, Error::InvalidArgument(_)));
    }
}
