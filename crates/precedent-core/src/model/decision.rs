// precedent-core/src/model/decision.rs
// ============================================================================
// Module: Decision Model
// Description: Bi-temporal decisions, alternatives, evidence, and assessments.
// Purpose: Describe the first-class trace records and their enrichment views.
// Dependencies: crate::ids, serde, time
// ============================================================================

//! ## Overview
//! A decision is the first-class record of the store: what an agent decided,
//! with what confidence, which alternatives it rejected, and which evidence
//! supported it. Decisions are bi-temporal; revisions append new rows and
//! close the prior row's validity interval. Enrichment values (consensus
//! counts, outcome signals, assessment summaries) are computed per read and
//! attached to the returned records.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::ids::AgentKey;
use crate::ids::AssessmentId;
use crate::ids::DecisionId;
use crate::ids::OrgId;
use crate::ids::RunId;

// ============================================================================
// SECTION: Decision
// ============================================================================

/// Bi-temporal decision record.
///
/// # Invariants
/// - Exactly one row per lineage has `valid_to IS NULL` (the current row).
/// - `precedent_ref` resolves within the same organization and always points
///   to a strictly older decision.
/// - `org_id` is immutable after insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Decision identifier.
    pub id: DecisionId,
    /// Run that produced the decision.
    pub run_id: RunId,
    /// Acting agent.
    pub agent_key: AgentKey,
    /// Owning organization.
    pub org_id: OrgId,
    /// Short category string, e.g. `architecture`.
    pub decision_type: String,
    /// Fact statement of the decision outcome.
    pub outcome: String,
    /// Caller confidence in `[0, 1]`.
    pub confidence: f64,
    /// Free-form reasoning.
    pub reasoning: Option<String>,
    /// Derived quality score in `[0, 1]`.
    pub quality_score: f64,
    /// SHA-256 content hash over type, outcome, and reasoning.
    pub content_hash: String,
    /// Embedding vector, when the provider produced one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// Namespaced context: `server.*` verified, `client.*` caller-reported.
    pub agent_context: Value,
    /// Session correlation identifier.
    pub session_id: Option<String>,
    /// Antecedent decision this one builds on.
    pub precedent_ref: Option<DecisionId>,
    /// Business-time validity start.
    #[serde(with = "time::serde::rfc3339")]
    pub valid_from: OffsetDateTime,
    /// Business-time validity end; `None` marks the current row.
    #[serde(with = "time::serde::rfc3339::option")]
    pub valid_to: Option<OffsetDateTime>,
    /// System transaction time.
    #[serde(with = "time::serde::rfc3339")]
    pub transaction_time: OffsetDateTime,
    /// Insert instant.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Count of corroborating current decisions (enrichment).
    #[serde(default)]
    pub agreement_count: i64,
    /// Count of open conflicts involving this decision (enrichment).
    #[serde(default)]
    pub conflict_count: i64,
    /// Outcome signals computed from history (enrichment).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signals: Option<OutcomeSignals>,
    /// Latest assessment verdict and counts (enrichment).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assessment: Option<AssessmentSummary>,
}

impl Decision {
    /// Returns true when this row is the current version of its lineage.
    #[must_use]
    pub const fn is_current(&self) -> bool {
        self.valid_to.is_none()
    }
}

// ============================================================================
// SECTION: Alternatives and Evidence
// ============================================================================

/// An option considered and (usually) rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alternative {
    /// Alternative identifier.
    pub id: Uuid,
    /// Owning decision.
    pub decision_id: DecisionId,
    /// Option label.
    pub label: String,
    /// Optional comparative score.
    pub score: Option<f64>,
    /// Whether this option was the one selected.
    pub selected: bool,
    /// Why the option was rejected.
    pub rejection_reason: Option<String>,
}

/// Supporting fact for a decision.
///
/// # Invariants
/// - `org_id` duplicates the decision's organization; it is the tenant
///   filter column for vector search over evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    /// Evidence identifier.
    pub id: Uuid,
    /// Owning decision.
    pub decision_id: DecisionId,
    /// Owning organization (redundant, for defense in depth).
    pub org_id: OrgId,
    /// Source type in lowercase underscore format, e.g. `file_read`.
    pub source_type: String,
    /// Source URI with a validated scheme.
    pub source_uri: Option<String>,
    /// Evidence content.
    pub content: String,
    /// Relevance score assigned by the caller.
    pub relevance_score: Option<f64>,
    /// Embedding vector, when the provider produced one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// Open-ended metadata.
    pub metadata: Value,
    /// Insert instant.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

// ============================================================================
// SECTION: Outcome Signals
// ============================================================================

/// How a decision fared when it collided with another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictFate {
    /// The decision was chosen as the winner of a resolved conflict.
    Won,
    /// The decision lost a resolved conflict.
    Lost,
}

/// Historical signals about a decision's durability.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutcomeSignals {
    /// Hours from creation to first revision; `None` if never superseded.
    pub supersession_velocity_hours: Option<f64>,
    /// How many later decisions cite this one as precedent.
    pub precedent_citation_count: i64,
    /// Resolved conflicts this decision won.
    pub conflicts_won: i64,
    /// Resolved conflicts this decision lost.
    pub conflicts_lost: i64,
}

impl OutcomeSignals {
    /// Returns the net conflict fate, when any conflict was resolved.
    #[must_use]
    pub const fn fate(&self) -> Option<ConflictFate> {
        if self.conflicts_won > 0 {
            Some(ConflictFate::Won)
        } else if self.conflicts_lost > 0 {
            Some(ConflictFate::Lost)
        } else {
            None
        }
    }
}

// ============================================================================
// SECTION: Assessments
// ============================================================================

/// Correctness verdict recorded against a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentOutcome {
    /// Decision held up.
    Correct,
    /// Decision was wrong.
    Incorrect,
    /// Decision was partially right.
    PartiallyCorrect,
}

impl AssessmentOutcome {
    /// Returns the stable string label for the outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Correct => "correct",
            Self::Incorrect => "incorrect",
            Self::PartiallyCorrect => "partially_correct",
        }
    }

    /// Parses an assessment outcome from its stable label.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "correct" => Some(Self::Correct),
            "incorrect" => Some(Self::Incorrect),
            "partially_correct" => Some(Self::PartiallyCorrect),
            _ => None,
        }
    }
}

/// Append-only assessment record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    /// Assessment identifier.
    pub id: AssessmentId,
    /// Assessed decision.
    pub decision_id: DecisionId,
    /// Owning organization.
    pub org_id: OrgId,
    /// Agent recording the verdict.
    pub assessor: AgentKey,
    /// Verdict.
    pub outcome: AssessmentOutcome,
    /// Free-form notes.
    pub notes: Option<String>,
    /// Insert instant.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Latest verdict plus a count vector over all assessments of a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentSummary {
    /// Most recent verdict.
    pub latest: AssessmentOutcome,
    /// Count of `correct` verdicts.
    pub correct: i64,
    /// Count of `incorrect` verdicts.
    pub incorrect: i64,
    /// Count of `partially_correct` verdicts.
    pub partially_correct: i64,
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::AssessmentOutcome;
    use super::ConflictFate;
    use super::OutcomeSignals;

    #[test]
    fn assessment_outcome_labels_round_trip() {
        for outcome in [
            AssessmentOutcome::Correct,
            AssessmentOutcome::Incorrect,
            AssessmentOutcome::PartiallyCorrect,
        ] {
            assert_eq!(AssessmentOutcome::parse(outcome.as_str()), Some(outcome));
        }
        assert_eq!(AssessmentOutcome::parse("maybe"), None);
    }

    #[test]
    fn fate_prefers_wins_over_losses() {
        let signals = OutcomeSignals {
            supersession_velocity_hours: None,
            precedent_citation_count: 0,
            conflicts_won: 1,
            conflicts_lost: 2,
        };
        assert_eq!(signals.fate(), Some(ConflictFate::Won));
    }

    #[test]
    fn fate_is_empty_without_resolutions() {
        let signals = OutcomeSignals {
            supersession_velocity_hours: Some(3.0),
            precedent_citation_count: 4,
            conflicts_won: 0,
            conflicts_lost: 0,
        };
        assert_eq!(signals.fate(), None);
    }
}
