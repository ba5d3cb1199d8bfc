// precedent-core/src/model/mod.rs
// ============================================================================
// Module: Precedent Data Model
// Description: Entities and enumerations for the decision trace store.
// Purpose: Define the shared vocabulary used by storage, services, and surfaces.
// Dependencies: crate::ids, serde, time
// ============================================================================

//! ## Overview
//! The model module groups the persistent entities of the store: tenants,
//! agents, runs, bi-temporal decisions with their alternatives and evidence,
//! materialized conflicts, grants, assessments, and the idempotency and
//! outbox ledgers. All structs serialize with snake_case field names and
//! RFC 3339 timestamps.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod agent;
mod conflict;
mod decision;
mod grant;
mod ledger;
mod org;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use agent::Agent;
pub use agent::AgentEvent;
pub use agent::AgentRun;
pub use agent::Role;
pub use agent::RunStatus;
pub use conflict::ConflictCategory;
pub use conflict::ConflictSeverity;
pub use conflict::ConflictStatus;
pub use conflict::DecisionConflict;
pub use decision::Alternative;
pub use decision::Assessment;
pub use decision::AssessmentOutcome;
pub use decision::AssessmentSummary;
pub use decision::ConflictFate;
pub use decision::Decision;
pub use decision::Evidence;
pub use decision::OutcomeSignals;
pub use grant::AccessGrant;
pub use grant::GrantPermission;
pub use grant::Grantee;
pub use ledger::IdempotencyRecord;
pub use ledger::IdempotencyStatus;
pub use ledger::OutboxEntry;
pub use ledger::OutboxOperation;
pub use org::IsolationTier;
pub use org::Organization;
pub use org::Plan;
