// precedent-service/src/error.rs
// ============================================================================
// Module: Service Errors
// Description: Boundary error taxonomy for the decision service.
// Purpose: Map storage and validation failures onto surfaced error kinds.
// Dependencies: thiserror, precedent-core, precedent-store
// ============================================================================

//! ## Overview
//! The service error enum is the taxonomy both surfaces map onto status
//! codes. Validation and authorization errors return immediately;
//! dependency degradation never appears here because the fallback paths
//! absorb it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use precedent_core::ValidationError;
use precedent_store::StoreError;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Decision service errors.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Malformed input.
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),
    /// Missing or invalid credentials.
    #[error("unauthorized: {0}")]
    Auth(String),
    /// Authenticated caller lacks the privilege.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Referenced record does not exist (or is invisible to the caller).
    #[error("{0} not found")]
    NotFound(&'static str),
    /// Write refused by the plan quota.
    #[error("decision quota exceeded for this billing period")]
    QuotaExceeded,
    /// Idempotency key replayed with a different payload.
    #[error("idempotency key was used with a different payload")]
    IdempotencyMismatch,
    /// Idempotency key is held by an in-flight request.
    #[error("a request with this idempotency key is still in progress")]
    IdempotencyInProgress,
    /// Business conflict, e.g. duplicate slug.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Unexpected failure; the id correlates with a log entry.
    #[error("internal error {error_id}")]
    Internal {
        /// Stable error id matching a log entry.
        error_id: String,
    },
}

impl ServiceError {
    /// Wraps an unexpected failure, logging it under a fresh error id.
    #[must_use]
    pub fn internal(context: &'static str, message: impl std::fmt::Display) -> Self {
        let error_id = uuid::Uuid::new_v4().to_string();
        tracing::error!(error_id = %error_id, context, error = %message, "internal error");
        Self::Internal {
            error_id,
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound {
                what,
            } => Self::NotFound(what),
            StoreError::Conflict {
                ref message, ..
            } => Self::Conflict(message.clone()),
            other => Self::internal("store", other),
        }
    }
}
