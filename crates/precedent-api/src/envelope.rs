// precedent-api/src/envelope.rs
// ============================================================================
// Module: JSON Envelope
// Description: Standard response envelope and the API error mapping.
// Purpose: Keep every response shape and status-code mapping in one place.
// Dependencies: axum, serde, precedent-service
// ============================================================================

//! ## Overview
//! Successful responses are `{ "data": ..., "meta": { request_id,
//! timestamp } }`; failures are `{ "error": { code, message, details },
//! "meta": ... }`. The error codes map the service taxonomy exactly:
//! validation 400, auth 401, forbidden 403, not-found 404, conflict and
//! idempotency collisions 409, quota 429, everything else 500 with a
//! stable error id that matches a log entry.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use precedent_service::ServiceError;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Envelope
// ============================================================================

/// Response metadata attached to every envelope.
#[derive(Debug, Clone, Serialize)]
pub struct Meta {
    /// Request identifier echoed in logs.
    pub request_id: String,
    /// Response timestamp (RFC 3339).
    pub timestamp: String,
}

impl Meta {
    /// Builds fresh metadata.
    #[must_use]
    pub fn now() -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            timestamp: OffsetDateTime::now_utc()
                .format(&Rfc3339)
                .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z")),
        }
    }
}

/// Wraps a payload in the success envelope.
#[must_use]
pub fn data<T: Serialize>(payload: T) -> Response {
    let body = json!({ "data": payload, "meta": Meta::now() });
    (StatusCode::OK, Json(body)).into_response()
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// HTTP-facing API error.
#[derive(Debug)]
pub struct ApiError {
    /// HTTP status.
    pub status: StatusCode,
    /// Stable application error code.
    pub code: &'static str,
    /// Human-readable message.
    pub message: String,
    /// Optional structured details.
    pub details: Option<Value>,
}

impl ApiError {
    /// Builds an error with no details.
    #[must_use]
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Shorthand for a 400 validation error.
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "INVALID_INPUT", message)
    }

    /// Shorthand for a 401 auth error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    /// Shorthand for a 404 error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }
}

impl From<ServiceError> for ApiError {
    fn from(error: ServiceError) -> Self {
        match &error {
            ServiceError::Validation(_) => Self::invalid(error.to_string()),
            ServiceError::Auth(_) => Self::unauthorized(error.to_string()),
            ServiceError::Forbidden(_) => {
                Self::new(StatusCode::FORBIDDEN, "FORBIDDEN", error.to_string())
            }
            ServiceError::NotFound(_) => Self::not_found(error.to_string()),
            ServiceError::QuotaExceeded => {
                Self::new(StatusCode::TOO_MANY_REQUESTS, "QUOTA_EXCEEDED", error.to_string())
            }
            ServiceError::IdempotencyMismatch | ServiceError::IdempotencyInProgress => {
                Self::new(StatusCode::CONFLICT, "CONFLICT", error.to_string())
            }
            ServiceError::Conflict(_) => {
                Self::new(StatusCode::CONFLICT, "CONFLICT", error.to_string())
            }
            ServiceError::Internal {
                ..
            } => Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", error.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": {
                "code": self.code,
                "message": self.message,
                "details": self.details,
            },
            "meta": Meta::now(),
        });
        (self.status, Json(body)).into_response()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use precedent_service::ServiceError;

    use super::ApiError;

    #[test]
    fn service_errors_map_to_the_documented_codes() {
        let quota = ApiError::from(ServiceError::QuotaExceeded);
        assert_eq!(quota.status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(quota.code, "QUOTA_EXCEEDED");

        let mismatch = ApiError::from(ServiceError::IdempotencyMismatch);
        assert_eq!(mismatch.status, StatusCode::CONFLICT);

        let auth = ApiError::from(ServiceError::Auth("bad token".to_string()));
        assert_eq!(auth.status, StatusCode::UNAUTHORIZED);
        assert_eq!(auth.code, "UNAUTHORIZED");

        let missing = ApiError::from(ServiceError::NotFound("decision"));
        assert_eq!(missing.status, StatusCode::NOT_FOUND);
    }
}
