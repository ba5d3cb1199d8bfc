// precedent-core/src/model/conflict.rs
// ============================================================================
// Module: Conflict Model
// Description: Materialized cross-agent disagreement records.
// Purpose: Describe detected conflicts and their triage lifecycle.
// Dependencies: crate::ids, serde, time
// ============================================================================

//! ## Overview
//! Conflicts are pairs of currently-valid decisions by different agents of
//! the same decision type with differing outcomes, detected within a
//! one-hour window. They are populated by a materialized view and triaged
//! through a small status lifecycle.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::ids::AgentKey;
use crate::ids::ConflictId;
use crate::ids::DecisionId;
use crate::ids::OrgId;

// ============================================================================
// SECTION: Enumerations
// ============================================================================

/// Triage status of a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStatus {
    /// Newly detected.
    Open,
    /// Seen by a human or agent but not yet resolved.
    Acknowledged,
    /// Resolved with a winning decision.
    Resolved,
    /// Closed without resolution.
    WontFix,
}

impl ConflictStatus {
    /// Returns the stable string label for the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Acknowledged => "acknowledged",
            Self::Resolved => "resolved",
            Self::WontFix => "wont_fix",
        }
    }

    /// Parses a conflict status from its stable label.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "open" => Some(Self::Open),
            "acknowledged" => Some(Self::Acknowledged),
            "resolved" => Some(Self::Resolved),
            "wont_fix" => Some(Self::WontFix),
            _ => None,
        }
    }
}

/// Classification of what kind of disagreement a conflict represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictCategory {
    /// Disagreement about facts.
    Factual,
    /// Disagreement about judgment or quality.
    Assessment,
    /// Disagreement about direction.
    Strategic,
    /// Decisions valid at different times that merely overlap.
    Temporal,
}

impl ConflictCategory {
    /// Returns the stable string label for the category.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Factual => "factual",
            Self::Assessment => "assessment",
            Self::Strategic => "strategic",
            Self::Temporal => "temporal",
        }
    }

    /// Parses a conflict category from its stable label.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "factual" => Some(Self::Factual),
            "assessment" => Some(Self::Assessment),
            "strategic" => Some(Self::Strategic),
            "temporal" => Some(Self::Temporal),
            _ => None,
        }
    }
}

/// Severity of a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictSeverity {
    /// Cosmetic disagreement.
    Low,
    /// Worth a look.
    Medium,
    /// Likely to cause rework.
    High,
    /// Blocking contradiction.
    Critical,
}

impl ConflictSeverity {
    /// Returns the stable string label for the severity.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Parses a conflict severity from its stable label.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }

    /// Returns true when the severity demands action.
    #[must_use]
    pub const fn demands_action(self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }
}

// ============================================================================
// SECTION: Conflict Record
// ============================================================================

/// Materialized cross-agent disagreement.
///
/// # Invariants
/// - `decision_a_id < decision_b_id` (ordered-pair deduplication).
/// - Both decisions are currently valid and within one hour of each other
///   at detection time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionConflict {
    /// Conflict identifier derived from the ordered pair.
    pub id: ConflictId,
    /// First decision of the ordered pair.
    pub decision_a_id: DecisionId,
    /// Second decision of the ordered pair.
    pub decision_b_id: DecisionId,
    /// Owning organization.
    pub org_id: OrgId,
    /// Kind label describing how the conflict was detected.
    pub conflict_kind: String,
    /// Agent behind decision A.
    pub agent_a: AgentKey,
    /// Agent behind decision B.
    pub agent_b: AgentKey,
    /// Outcome of decision A.
    pub outcome_a: String,
    /// Outcome of decision B.
    pub outcome_b: String,
    /// Shared decision type of the pair.
    pub decision_type: String,
    /// Optional semantic similarity score between the outcomes.
    pub similarity: Option<f64>,
    /// Classification, when triaged.
    pub category: Option<ConflictCategory>,
    /// Severity, when triaged.
    pub severity: Option<ConflictSeverity>,
    /// Human-readable explanation, when triaged.
    pub explanation: Option<String>,
    /// Triage status.
    pub status: ConflictStatus,
    /// Winning decision for resolved conflicts.
    pub winning_decision_id: Option<DecisionId>,
    /// Detection instant.
    #[serde(with = "time::serde::rfc3339")]
    pub detected_at: OffsetDateTime,
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::ConflictSeverity;
    use super::ConflictStatus;

    #[test]
    fn status_labels_round_trip() {
        for status in [
            ConflictStatus::Open,
            ConflictStatus::Acknowledged,
            ConflictStatus::Resolved,
            ConflictStatus::WontFix,
        ] {
            assert_eq!(ConflictStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn only_high_and_critical_demand_action() {
        assert!(ConflictSeverity::Critical.demands_action());
        assert!(ConflictSeverity::High.demands_action());
        assert!(!ConflictSeverity::Medium.demands_action());
        assert!(!ConflictSeverity::Low.demands_action());
    }

    #[test]
    fn severity_orders_by_urgency() {
        assert!(ConflictSeverity::Critical > ConflictSeverity::High);
        assert!(ConflictSeverity::High > ConflictSeverity::Medium);
        assert!(ConflictSeverity::Medium > ConflictSeverity::Low);
    }
}
