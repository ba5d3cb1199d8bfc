// precedent-store/src/error.rs
// ============================================================================
// Module: Store Errors
// Description: Error taxonomy for the storage layer.
// Purpose: Wrap Postgres failures with operation and tenant context.
// Dependencies: thiserror, postgres
// ============================================================================

//! ## Overview
//! Storage failures carry enough context to identify the operation and the
//! tenant. Unique-constraint violations surface as [`StoreError::Conflict`]
//! so services can map them to replay or duplicate semantics.

// ============================================================================
// SECTION: Imports
// ============================================================================

use postgres::error::SqlState;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Storage layer errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database I/O failure.
    #[error("store io failure during {operation}: {message}")]
    Io {
        /// Operation that failed.
        operation: &'static str,
        /// Underlying error message.
        message: String,
    },
    /// A unique constraint or business conflict.
    #[error("store conflict during {operation}: {message}")]
    Conflict {
        /// Operation that failed.
        operation: &'static str,
        /// Underlying error message.
        message: String,
    },
    /// Stored data failed to decode.
    #[error("store data invalid during {operation}: {message}")]
    Invalid {
        /// Operation that failed.
        operation: &'static str,
        /// Underlying error message.
        message: String,
    },
    /// A referenced record does not exist.
    #[error("{what} not found")]
    NotFound {
        /// Record kind that was missing.
        what: &'static str,
    },
}

impl StoreError {
    /// Wraps a Postgres error with operation context, classifying
    /// unique-constraint violations as conflicts.
    #[must_use]
    pub fn from_pg(operation: &'static str, err: &postgres::Error) -> Self {
        if err.code() == Some(&SqlState::UNIQUE_VIOLATION) {
            Self::Conflict {
                operation,
                message: err.to_string(),
            }
        } else {
            Self::Io {
                operation,
                message: err.to_string(),
            }
        }
    }

    /// Wraps a pool checkout failure with operation context.
    #[must_use]
    pub fn from_pool(operation: &'static str, err: &r2d2::Error) -> Self {
        Self::Io {
            operation,
            message: err.to_string(),
        }
    }

    /// Builds an invalid-data error with operation context.
    #[must_use]
    pub fn invalid(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            operation,
            message: message.into(),
        }
    }

    /// Returns true when the error is a uniqueness or business conflict.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}
