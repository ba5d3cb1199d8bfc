// precedent-core/src/model/agent.rs
// ============================================================================
// Module: Agent Model
// Description: Agent identities, roles, runs, and append-only events.
// Purpose: Describe the acting principals and their invocation records.
// Dependencies: crate::ids, serde, time
// ============================================================================

//! ## Overview
//! Agents are identities within an organization with a strict role
//! hierarchy. Every invocation is an agent run; runs accumulate append-only
//! events with a per-run monotonic sequence number.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;

use crate::ids::AgentId;
use crate::ids::AgentKey;
use crate::ids::OrgId;
use crate::ids::RunId;

// ============================================================================
// SECTION: Roles
// ============================================================================

/// Agent role with strict rank ordering.
///
/// # Invariants
/// - Rank order is `reader < agent < admin < org_owner < platform_admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Read-only access.
    Reader,
    /// Standard agent: may trace with its own identity.
    Agent,
    /// Org administrator: may manage agents and grants.
    Admin,
    /// Organization owner: may manage billing and plan.
    OrgOwner,
    /// Platform operator across organizations.
    PlatformAdmin,
}

impl Role {
    /// Returns the stable string label for the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reader => "reader",
            Self::Agent => "agent",
            Self::Admin => "admin",
            Self::OrgOwner => "org_owner",
            Self::PlatformAdmin => "platform_admin",
        }
    }

    /// Parses a role from its stable label.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "reader" => Some(Self::Reader),
            "agent" => Some(Self::Agent),
            "admin" => Some(Self::Admin),
            "org_owner" => Some(Self::OrgOwner),
            "platform_admin" => Some(Self::PlatformAdmin),
            _ => None,
        }
    }

    /// Returns the numeric rank used for privilege comparison.
    #[must_use]
    const fn rank(self) -> u8 {
        match self {
            Self::Reader => 0,
            Self::Agent => 1,
            Self::Admin => 2,
            Self::OrgOwner => 3,
            Self::PlatformAdmin => 4,
        }
    }

    /// Returns true when `self` carries at least the privilege of `other`.
    #[must_use]
    pub const fn at_least(self, other: Self) -> bool {
        self.rank() >= other.rank()
    }
}

// ============================================================================
// SECTION: Agents
// ============================================================================

/// Agent identity within an organization.
///
/// # Invariants
/// - `(org_id, key)` is unique.
/// - `api_key_hash` stores a SHA-256 fingerprint, never the raw key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    /// Agent record identifier.
    pub id: AgentId,
    /// Human-readable agent name, unique within the org.
    pub key: AgentKey,
    /// Owning organization.
    pub org_id: OrgId,
    /// Display name.
    pub name: String,
    /// Role within the organization.
    pub role: Role,
    /// SHA-256 fingerprint of the agent's API key.
    #[serde(skip_serializing)]
    pub api_key_hash: Option<String>,
    /// Tags carried by the agent, used for tag-based grants.
    pub tags: Vec<String>,
    /// Open-ended metadata.
    pub metadata: Value,
    /// Creation instant.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

// ============================================================================
// SECTION: Runs
// ============================================================================

/// Lifecycle state of an agent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Run is in progress.
    Running,
    /// Run finished successfully.
    Completed,
    /// Run finished with an error.
    Failed,
}

impl RunStatus {
    /// Returns the stable string label for the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parses a run status from its stable label.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// A single agent invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRun {
    /// Run identifier.
    pub id: RunId,
    /// Acting agent.
    pub agent_key: AgentKey,
    /// Owning organization.
    pub org_id: OrgId,
    /// External correlation identifier, when supplied by the caller.
    pub trace_id: Option<String>,
    /// Parent run for nested invocations.
    pub parent_run_id: Option<RunId>,
    /// Lifecycle status.
    pub status: RunStatus,
    /// Start instant.
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    /// Completion instant, when finished.
    #[serde(with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
    /// Open-ended metadata.
    pub metadata: Value,
}

// ============================================================================
// SECTION: Events
// ============================================================================

/// Append-only event within a run.
///
/// # Invariants
/// - `sequence_num` is monotonic within the run and allocated at insert time.
/// - The run reference is enforced by the write path, not a foreign key
///   (the events table is range-partitioned).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentEvent {
    /// Event identifier.
    pub id: uuid::Uuid,
    /// Run the event belongs to.
    pub run_id: RunId,
    /// Owning organization.
    pub org_id: OrgId,
    /// Event type label.
    pub event_type: String,
    /// Monotonic sequence number within the run.
    pub sequence_num: i64,
    /// Occurrence instant.
    #[serde(with = "time::serde::rfc3339")]
    pub occurred_at: OffsetDateTime,
    /// Acting agent.
    pub agent_key: AgentKey,
    /// Open-ended event payload.
    pub payload: Value,
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::Role;
    use super::RunStatus;

    #[test]
    fn role_rank_is_reflexive() {
        for role in [Role::Reader, Role::Agent, Role::Admin, Role::OrgOwner, Role::PlatformAdmin] {
            assert!(role.at_least(role));
        }
    }

    #[test]
    fn role_rank_orders_privilege() {
        assert!(Role::Admin.at_least(Role::Agent));
        assert!(Role::PlatformAdmin.at_least(Role::OrgOwner));
        assert!(!Role::Reader.at_least(Role::Admin));
        assert!(!Role::Agent.at_least(Role::Admin));
    }

    #[test]
    fn run_status_labels_round_trip() {
        for status in [RunStatus::Running, RunStatus::Completed, RunStatus::Failed] {
            assert_eq!(RunStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(RunStatus::parse("paused"), None);
    }
}
