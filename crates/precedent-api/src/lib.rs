// precedent-api/src/lib.rs
// ============================================================================
// Module: Precedent API Library
// Description: HTTP JSON API over the decision trace engine.
// Purpose: Serve programmatic clients with the same capabilities as MCP.
// Dependencies: precedent-service, axum, tokio
// ============================================================================

//! ## Overview
//! The HTTP API wraps the decision service in a standard JSON envelope
//! with bearer-token auth, exposes signup and verification, the trace and
//! query surfaces, conflicts, grants, usage, an SSE subscription fed by
//! the notification broker, the billing seam, and health.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod envelope;
pub mod routes;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use envelope::ApiError;
pub use routes::ApiState;
pub use routes::router;
pub use routes::serve;
