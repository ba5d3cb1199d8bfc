// precedent-core/src/lib.rs
// ============================================================================
// Module: Precedent Core Library
// Description: Public API surface for the Precedent core.
// Purpose: Expose the decision trace data model, validation, and seams.
// Dependencies: crate::{ids, model, hashing, validate, interfaces}
// ============================================================================

//! ## Overview
//! Precedent core defines the decision trace data model shared by every
//! crate in the workspace: typed identifiers, entities, enumerations,
//! content hashing, field validation, and the interfaces through which the
//! engine talks to external collaborators (embedding providers, the vector
//! index, mail and billing seams). It is transport- and storage-agnostic.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod hashing;
pub mod ids;
pub mod interfaces;
pub mod model;
pub mod validate;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use ids::AgentId;
pub use ids::AgentKey;
pub use ids::AssessmentId;
pub use ids::ConflictId;
pub use ids::DecisionId;
pub use ids::GrantId;
pub use ids::IdParseError;
pub use ids::OrgId;
pub use ids::RunId;
pub use interfaces::AuditEvent;
pub use interfaces::AuditSink;
pub use interfaces::BillingError;
pub use interfaces::BillingGateway;
pub use interfaces::DisabledBillingGateway;
pub use interfaces::EmbedError;
pub use interfaces::EmbeddingProvider;
pub use interfaces::MailError;
pub use interfaces::Metrics;
pub use interfaces::NoopAuditSink;
pub use interfaces::NoopMetrics;
pub use interfaces::VectorHit;
pub use interfaces::VectorIndexError;
pub use interfaces::VectorQuery;
pub use interfaces::VectorSearcher;
pub use interfaces::VerificationMailer;
pub use model::AccessGrant;
pub use model::Agent;
pub use model::AgentEvent;
pub use model::AgentRun;
pub use model::Alternative;
pub use model::Assessment;
pub use model::AssessmentOutcome;
pub use model::AssessmentSummary;
pub use model::ConflictCategory;
pub use model::ConflictFate;
pub use model::ConflictSeverity;
pub use model::ConflictStatus;
pub use model::Decision;
pub use model::DecisionConflict;
pub use model::Evidence;
pub use model::GrantPermission;
pub use model::Grantee;
pub use model::IdempotencyRecord;
pub use model::IdempotencyStatus;
pub use model::IsolationTier;
pub use model::Organization;
pub use model::OutboxEntry;
pub use model::OutboxOperation;
pub use model::OutcomeSignals;
pub use model::Plan;
pub use model::Role;
pub use model::RunStatus;
pub use validate::ValidationError;
