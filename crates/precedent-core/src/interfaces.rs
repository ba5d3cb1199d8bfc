// precedent-core/src/interfaces.rs
// ============================================================================
// Module: Precedent Interfaces
// Description: Seams between the core engine and external collaborators.
// Purpose: Keep embedding, vector search, mail, billing, and audit pluggable.
// Dependencies: serde, thiserror, time
// ============================================================================

//! ## Overview
//! The engine depends on external collaborators only through the traits in
//! this module: an embedding provider, the secondary vector index, the
//! verification mailer, the billing gateway, and the audit/metrics sinks.
//! Failures of the embedding provider and vector index are always
//! recoverable; callers fall back rather than surface them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;

use crate::ids::AgentKey;
use crate::ids::DecisionId;
use crate::ids::OrgId;

// ============================================================================
// SECTION: Embedding Provider
// ============================================================================

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbedError {
    /// The provider endpoint failed or timed out.
    #[error("embedding provider unavailable: {0}")]
    Unavailable(String),
    /// The provider returned a malformed response.
    #[error("embedding provider returned invalid data: {0}")]
    Invalid(String),
}

/// Text-to-vector capability.
///
/// Implementations must be safe to call concurrently. A failure is never
/// fatal to the caller: decisions are recorded without an embedding and the
/// semantic search path is skipped for them.
pub trait EmbeddingProvider: Send + Sync {
    /// Embeds the text into a fixed-dimension vector.
    ///
    /// # Errors
    ///
    /// Returns [`EmbedError`] when the provider cannot produce a vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;

    /// Returns the vector dimension this provider produces.
    fn dimension(&self) -> usize;
}

// ============================================================================
// SECTION: Vector Searcher
// ============================================================================

/// Errors raised by the secondary vector index.
#[derive(Debug, Error)]
pub enum VectorIndexError {
    /// Transport failure or timeout.
    #[error("vector index unavailable: {0}")]
    Unavailable(String),
    /// The index returned a malformed response.
    #[error("vector index returned invalid data: {0}")]
    Invalid(String),
}

/// Filterable semantic query against the vector index.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorQuery {
    /// Mandatory tenant filter.
    pub org_id: OrgId,
    /// Query vector.
    pub vector: Vec<f32>,
    /// Optional decision type filter.
    pub decision_type: Option<String>,
    /// Optional agent filter.
    pub agent_key: Option<AgentKey>,
    /// Optional minimum confidence filter.
    pub confidence_min: Option<f64>,
    /// Optional lower bound on `valid_from`.
    pub since: Option<OffsetDateTime>,
    /// Maximum hits to return.
    pub limit: usize,
}

/// A single hit returned by the vector index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VectorHit {
    /// Matched decision.
    pub decision_id: DecisionId,
    /// Cosine similarity in `[0, 1]`.
    pub similarity: f64,
}

/// Semantic search capability with a health probe.
///
/// The service composes this with the in-database fallback explicitly; no
/// implementation should hide degradation behind retries.
pub trait VectorSearcher: Send + Sync {
    /// Searches the index with the mandatory tenant filter applied.
    ///
    /// # Errors
    ///
    /// Returns [`VectorIndexError`] when the index cannot serve the query.
    fn search(&self, query: &VectorQuery) -> Result<Vec<VectorHit>, VectorIndexError>;

    /// Returns true when the index answered a recent health probe.
    fn healthy(&self) -> bool;
}

// ============================================================================
// SECTION: Verification Mailer
// ============================================================================

/// Errors raised by the verification mailer.
#[derive(Debug, Error)]
pub enum MailError {
    /// The mail transport failed.
    #[error("verification mail failed: {0}")]
    Transport(String),
}

/// Outbound verification email seam.
///
/// The concrete SMTP transport lives outside the core; the in-tree
/// implementation logs the verification link for development.
pub trait VerificationMailer: Send + Sync {
    /// Sends a verification link to the given address.
    ///
    /// # Errors
    ///
    /// Returns [`MailError`] when the message cannot be handed off.
    fn send_verification(&self, email: &str, verify_url: &str) -> Result<(), MailError>;
}

// ============================================================================
// SECTION: Billing Gateway
// ============================================================================

/// Errors raised by the billing gateway.
#[derive(Debug, Error)]
pub enum BillingError {
    /// Billing is not configured for this deployment.
    #[error("billing is not configured")]
    Disabled,
    /// The processor rejected the request.
    #[error("billing gateway error: {0}")]
    Gateway(String),
    /// A webhook signature failed verification.
    #[error("billing webhook signature invalid")]
    BadSignature,
}

/// Billing processor seam: checkout, portal, and webhook verification.
pub trait BillingGateway: Send + Sync {
    /// Creates a checkout session URL for a plan change.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError`] when the session cannot be created.
    fn checkout_url(&self, org_id: OrgId, plan: &str) -> Result<String, BillingError>;

    /// Creates a billing portal URL for the organization.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError`] when the portal session cannot be created.
    fn portal_url(&self, org_id: OrgId) -> Result<String, BillingError>;

    /// Verifies a webhook signature and returns the parsed event payload.
    ///
    /// # Errors
    ///
    /// Returns [`BillingError`] when the signature or payload is invalid.
    fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<serde_json::Value, BillingError>;
}

/// Billing gateway used when no processor is configured.
pub struct DisabledBillingGateway;

impl BillingGateway for DisabledBillingGateway {
    fn checkout_url(&self, _org_id: OrgId, _plan: &str) -> Result<String, BillingError> {
        Err(BillingError::Disabled)
    }

    fn portal_url(&self, _org_id: OrgId) -> Result<String, BillingError> {
        Err(BillingError::Disabled)
    }

    fn verify_webhook(
        &self,
        _payload: &[u8],
        _signature: &str,
    ) -> Result<serde_json::Value, BillingError> {
        Err(BillingError::Disabled)
    }
}

// ============================================================================
// SECTION: Audit and Metrics
// ============================================================================

/// Structured audit event emitted on security-relevant actions.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    /// Stable event label, e.g. `trace_recorded` or `agent_auto_registered`.
    pub event: &'static str,
    /// Organization the event belongs to.
    pub org_id: OrgId,
    /// Acting agent, when known.
    pub agent: Option<AgentKey>,
    /// Affected decision, when any.
    pub decision_id: Option<DecisionId>,
    /// Free-form detail payload.
    pub detail: serde_json::Value,
}

/// Sink for audit events (JSON lines in production).
pub trait AuditSink: Send + Sync {
    /// Records an audit event.
    fn record(&self, event: &AuditEvent);
}

/// Audit sink that discards events (tests and development).
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _event: &AuditEvent) {}
}

/// Counter surface for operational metrics.
pub trait Metrics: Send + Sync {
    /// Increments a named counter.
    fn incr(&self, name: &'static str, value: u64);
}

/// Metrics sink that discards counters.
pub struct NoopMetrics;

impl Metrics for NoopMetrics {
    fn incr(&self, _name: &'static str, _value: u64) {}
}
