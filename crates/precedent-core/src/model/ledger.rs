// precedent-core/src/model/ledger.rs
// ============================================================================
// Module: Ledger Model
// Description: Idempotency ledger entries and search outbox rows.
// Purpose: Describe the durable records behind safe retries and index sync.
// Dependencies: crate::ids, serde, time
// ============================================================================

//! ## Overview
//! Two small ledgers keep writes safe and the vector index consistent: the
//! idempotency ledger replays completed responses for retried traces, and
//! the search outbox drives eventual consistency between the decisions
//! table and the secondary vector index.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::ids::AgentKey;
use crate::ids::DecisionId;
use crate::ids::OrgId;

// ============================================================================
// SECTION: Idempotency Ledger
// ============================================================================

/// State of an idempotency ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdempotencyStatus {
    /// A request holding the key is currently executing.
    InProgress,
    /// The request completed and its response is stored.
    Completed,
}

impl IdempotencyStatus {
    /// Returns the stable string label for the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }

    /// Parses an idempotency status from its stable label.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// Stored idempotency ledger entry.
///
/// # Invariants
/// - Keyed by `(org_id, agent, endpoint, key)`.
/// - A completed entry replays `response_body` verbatim while it matches
///   the stored `payload_hash`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    /// Owning organization.
    pub org_id: OrgId,
    /// Calling agent.
    pub agent: AgentKey,
    /// Endpoint label, e.g. `trace`.
    pub endpoint: String,
    /// Caller-chosen idempotency key.
    pub key: String,
    /// SHA-256 hash of the canonical request payload.
    pub payload_hash: String,
    /// Entry state.
    pub status: IdempotencyStatus,
    /// Serialized response for completed entries.
    pub response_body: Option<String>,
    /// Reservation deadline for in-progress entries.
    #[serde(with = "time::serde::rfc3339::option")]
    pub in_progress_until: Option<OffsetDateTime>,
}

// ============================================================================
// SECTION: Search Outbox
// ============================================================================

/// Operation carried by an outbox row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxOperation {
    /// Upsert the decision's point into the vector index.
    Upsert,
    /// Delete the decision's point from the vector index.
    Delete,
}

impl OutboxOperation {
    /// Returns the stable string label for the operation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Upsert => "upsert",
            Self::Delete => "delete",
        }
    }

    /// Parses an outbox operation from its stable label.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "upsert" => Some(Self::Upsert),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }
}

/// Durable outbox row consumed by the vector-index worker.
///
/// # Invariants
/// - Unique on `(decision_id, operation)`.
/// - Rows with `attempts` at the configured maximum are dead-lettered and
///   only surfaced through stats, never retried automatically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEntry {
    /// Decision the operation applies to.
    pub decision_id: DecisionId,
    /// Owning organization.
    pub org_id: OrgId,
    /// Operation to perform.
    pub operation: OutboxOperation,
    /// Enqueue instant.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Delivery attempts so far.
    pub attempts: i32,
    /// Last delivery error, when any attempt failed.
    pub last_error: Option<String>,
    /// Claim deadline while a worker owns the row.
    #[serde(with = "time::serde::rfc3339::option")]
    pub locked_until: Option<OffsetDateTime>,
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::IdempotencyStatus;
    use super::OutboxOperation;

    #[test]
    fn idempotency_status_labels_round_trip() {
        for status in [IdempotencyStatus::InProgress, IdempotencyStatus::Completed] {
            assert_eq!(IdempotencyStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn outbox_operation_labels_round_trip() {
        for operation in [OutboxOperation::Upsert, OutboxOperation::Delete] {
            assert_eq!(OutboxOperation::parse(operation.as_str()), Some(operation));
        }
        assert_eq!(OutboxOperation::parse("replace"), None);
    }
}
