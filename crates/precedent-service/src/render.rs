// precedent-service/src/render.rs
// ============================================================================
// Module: Compact Renderers
// Description: Agent-facing compact forms, context notes, and summaries.
// Purpose: Keep tool responses small and deterministic.
// Dependencies: precedent-core, serde
// ============================================================================

//! ## Overview
//! The MCP tools default to a concise format tuned for agent context
//! windows: truncated text, a consensus weight in `[0.5, 1.0]`, a
//! priority-ordered context note, and template-based one-to-three sentence
//! summaries. All truncation is rune-aware. Every template here is
//! deterministic; no timestamps or randomness enter the rendering.

// ============================================================================
// SECTION: Imports
// ============================================================================

use precedent_core::AssessmentSummary;
use precedent_core::ConflictSeverity;
use precedent_core::Decision;
use precedent_core::DecisionConflict;
use precedent_core::DecisionId;
use precedent_core::OutcomeSignals;
use serde::Serialize;
use time::OffsetDateTime;

/// Rune cap applied to reasoning in the compact form.
const REASONING_RUNES: usize = 200;
/// Rune cap applied to outcomes quoted inside notes and summaries.
const OUTCOME_RUNES: usize = 80;

// ============================================================================
// SECTION: Truncation
// ============================================================================

/// Truncates to a rune count, appending an ellipsis when shortened.
#[must_use]
pub fn truncate_runes(text: &str, max_runes: usize) -> String {
    if text.chars().count() <= max_runes {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_runes).collect();
    out.push_str("...");
    out
}

// ============================================================================
// SECTION: Consensus Weight
// ============================================================================

/// Computes the consensus weight in `[0.5, 1.0]`, rounded to three decimals.
#[must_use]
pub fn consensus_weight(agreement_count: i64, conflict_count: i64) -> f64 {
    let agreement = agreement_count.max(0) as f64;
    let conflict = conflict_count.max(0) as f64;
    let weight = 0.5 + 0.5 * agreement / (agreement + conflict).max(1.0);
    (weight * 1000.0).round() / 1000.0
}

// ============================================================================
// SECTION: Context Notes
// ============================================================================

/// Builds the context note for a decision from its outcome signals.
///
/// Rules apply first-match in priority order; a decision matching none
/// gets no note.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    reason = "Velocity values are bounded well below i64 range before rounding."
)]
pub fn context_note(signals: &OutcomeSignals) -> Option<String> {
    let citations = signals.precedent_citation_count;
    match signals.supersession_velocity_hours {
        Some(velocity) if velocity < 48.0 && citations == 0 => {
            let hours = velocity.ceil().max(1.0) as i64;
            Some(format!(
                "Revised within {hours}h and never cited as precedent — treat with caution."
            ))
        }
        None if citations >= 2 => {
            Some(format!("Never superseded. Cited as precedent {citations} times."))
        }
        None if signals.conflicts_won >= 1 => {
            Some(format!("Never superseded. Won {} conflict resolution(s).", signals.conflicts_won))
        }
        Some(velocity) if velocity > 720.0 => {
            let days = (velocity / 24.0).round() as i64;
            Some(format!("Stood for {days} days before revision."))
        }
        _ if signals.conflicts_lost >= 1 && signals.conflicts_won == 0 => {
            Some(format!(
                "Overridden in {} conflict resolution(s).",
                signals.conflicts_lost
            ))
        }
        _ => None,
    }
}

// ============================================================================
// SECTION: Compact Decision
// ============================================================================

/// Compact decision form returned by the agent-facing tools.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompactDecision {
    /// Decision identifier.
    pub id: DecisionId,
    /// Acting agent.
    pub agent_id: String,
    /// Decision category.
    pub decision_type: String,
    /// Outcome statement.
    pub outcome: String,
    /// Caller confidence.
    pub confidence: f64,
    /// Creation instant.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Corroborating decision count.
    pub agreement_count: i64,
    /// Open conflict count.
    pub conflict_count: i64,
    /// Truncated reasoning, when any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    /// Session correlation identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Tool reported by the caller.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    /// Model reported by the caller.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Consensus weight in `[0.5, 1.0]`.
    pub consensus_weight: f64,
    /// Outcome-signal note, when any rule matched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_note: Option<String>,
    /// Latest assessment verdict, when any assessment exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assessment: Option<AssessmentSummary>,
}

/// Renders the compact form of a decision.
#[must_use]
pub fn compact_decision(decision: &Decision) -> CompactDecision {
    let tool = decision
        .agent_context
        .get("client.tool")
        .and_then(|value| value.as_str())
        .map(ToString::to_string);
    let model = decision
        .agent_context
        .get("client.model")
        .and_then(|value| value.as_str())
        .map(ToString::to_string);
    CompactDecision {
        id: decision.id,
        agent_id: decision.agent_key.to_string(),
        decision_type: decision.decision_type.clone(),
        outcome: decision.outcome.clone(),
        confidence: decision.confidence,
        created_at: decision.created_at,
        agreement_count: decision.agreement_count,
        conflict_count: decision.conflict_count,
        reasoning: decision
            .reasoning
            .as_deref()
            .filter(|text| !text.is_empty())
            .map(|text| truncate_runes(text, REASONING_RUNES)),
        session_id: decision.session_id.clone(),
        tool,
        model,
        consensus_weight: consensus_weight(decision.agreement_count, decision.conflict_count),
        context_note: decision.signals.as_ref().and_then(context_note),
        assessment: decision.assessment,
    }
}

// ============================================================================
// SECTION: Compact Conflict
// ============================================================================

/// Compact conflict form returned by the agent-facing tools.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompactConflict {
    /// Conflict identifier.
    pub id: precedent_core::ConflictId,
    /// Agent behind decision A.
    pub agent_a: String,
    /// Agent behind decision B.
    pub agent_b: String,
    /// Triage status.
    pub status: precedent_core::ConflictStatus,
    /// Detection instant.
    #[serde(with = "time::serde::rfc3339")]
    pub detected_at: OffsetDateTime,
    /// Classification, when triaged.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<precedent_core::ConflictCategory>,
    /// Severity, when triaged.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<ConflictSeverity>,
    /// Explanation, when triaged.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    /// Truncated outcome of decision A.
    pub outcome_a: String,
    /// Truncated outcome of decision B.
    pub outcome_b: String,
    /// Winning decision for resolved conflicts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winning_decision_id: Option<DecisionId>,
    /// Asymmetry note, when one side clearly outweighs the other.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consensus_note: Option<String>,
}

/// Renders the compact form of a conflict, attaching the consensus note
/// when one side has at least two more corroborating decisions.
///
/// `corroboration_a`/`corroboration_b` count decisions sharing each side's
/// outcome, including the side itself.
#[must_use]
pub fn compact_conflict(
    conflict: &DecisionConflict,
    corroboration_a: i64,
    corroboration_b: i64,
) -> CompactConflict {
    let consensus_note = consensus_note(conflict, corroboration_a, corroboration_b);
    CompactConflict {
        id: conflict.id,
        agent_a: conflict.agent_a.to_string(),
        agent_b: conflict.agent_b.to_string(),
        status: conflict.status,
        detected_at: conflict.detected_at,
        category: conflict.category,
        severity: conflict.severity,
        explanation: conflict.explanation.clone(),
        outcome_a: truncate_runes(&conflict.outcome_a, OUTCOME_RUNES),
        outcome_b: truncate_runes(&conflict.outcome_b, OUTCOME_RUNES),
        winning_decision_id: conflict.winning_decision_id,
        consensus_note,
    }
}

/// Builds the asymmetry note, stronger side first.
fn consensus_note(
    conflict: &DecisionConflict,
    corroboration_a: i64,
    corroboration_b: i64,
) -> Option<String> {
    if (corroboration_a - corroboration_b).abs() < 2 {
        return None;
    }
    let (outcome_strong, n_strong, outcome_weak, n_weak) = if corroboration_a >= corroboration_b {
        (&conflict.outcome_a, corroboration_a, &conflict.outcome_b, corroboration_b)
    } else {
        (&conflict.outcome_b, corroboration_b, &conflict.outcome_a, corroboration_a)
    };
    Some(format!(
        "Decision A ('{}') has {n_strong} corroborating decision(s). Decision B ('{}') has \
         {n_weak}.",
        truncate_runes(outcome_strong, OUTCOME_RUNES),
        truncate_runes(outcome_weak, OUTCOME_RUNES)
    ))
}

// ============================================================================
// SECTION: Check Summary
// ============================================================================

/// Inputs for the deterministic check summary.
#[derive(Debug, Clone)]
pub struct SummaryInputs<'a> {
    /// Decision type being checked.
    pub decision_type: &'a str,
    /// Decisions returned, most recent first.
    pub decisions: &'a [Decision],
    /// Conflicts in scope for the decision type.
    pub conflicts: &'a [DecisionConflict],
    /// Corroboration counts aligned with `conflicts` (side A, side B).
    pub corroborations: &'a [(i64, i64)],
}

/// Builds the one-to-three sentence check summary.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    reason = "Confidence is validated into [0, 1] before the percentage cast."
)]
pub fn check_summary(inputs: &SummaryInputs<'_>) -> String {
    if inputs.decisions.is_empty() {
        return format!("No prior decisions recorded for '{}'.", inputs.decision_type);
    }
    let mut sentences = vec![format!(
        "Found {} prior decision(s) for '{}'.",
        inputs.decisions.len(),
        inputs.decision_type
    )];
    if let Some(latest) = inputs.decisions.first() {
        let confidence_pct = (latest.confidence * 100.0).round() as i64;
        let mut sentence = format!(
            "Most recent: '{}' at {confidence_pct}% confidence",
            truncate_runes(&latest.outcome, OUTCOME_RUNES)
        );
        if let Some(signals) = &latest.signals {
            if signals.supersession_velocity_hours.is_none() {
                sentence.push_str(", never superseded");
            }
            if signals.precedent_citation_count > 0 {
                sentence.push_str(&format!(
                    ", cited {} time(s)",
                    signals.precedent_citation_count
                ));
            }
        }
        sentence.push('.');
        sentences.push(sentence);
    }
    if !inputs.conflicts.is_empty() {
        sentences.push(conflict_sentence(inputs));
    }
    sentences.join(" ")
}

/// Builds the conflict sentence with asymmetry framing where applicable.
fn conflict_sentence(inputs: &SummaryInputs<'_>) -> String {
    let asymmetric = inputs
        .conflicts
        .iter()
        .zip(inputs.corroborations)
        .find(|(_, (a, b))| (a - b).abs() >= 2);
    if let Some((conflict, (a, b))) = asymmetric {
        let (n, m, outcome) = if a >= b {
            (a, b, &conflict.outcome_a)
        } else {
            (b, a, &conflict.outcome_b)
        };
        return format!(
            "{} conflict(s) on record, {n}-to-{m} in favor of '{}'.",
            inputs.conflicts.len(),
            truncate_runes(outcome, OUTCOME_RUNES)
        );
    }
    let highest = inputs.conflicts.iter().filter_map(|conflict| conflict.severity).max();
    highest.map_or_else(
        || format!("{} conflict(s) on record.", inputs.conflicts.len()),
        |severity| {
            format!(
                "{} conflict(s) on record, highest severity {}.",
                inputs.conflicts.len(),
                severity.as_str()
            )
        },
    )
}

/// Returns true when any open conflict demands action.
#[must_use]
pub fn action_needed(conflicts: &[DecisionConflict]) -> bool {
    conflicts.iter().any(|conflict| {
        matches!(
            conflict.status,
            precedent_core::ConflictStatus::Open | precedent_core::ConflictStatus::Acknowledged
        ) && conflict.severity.is_some_and(ConflictSeverity::demands_action)
    })
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use precedent_core::OutcomeSignals;

    use super::consensus_weight;
    use super::context_note;
    use super::truncate_runes;

    fn signals(
        velocity: Option<f64>,
        citations: i64,
        won: i64,
        lost: i64,
    ) -> OutcomeSignals {
        OutcomeSignals {
            supersession_velocity_hours: velocity,
            precedent_citation_count: citations,
            conflicts_won: won,
            conflicts_lost: lost,
        }
    }

    #[test]
    fn truncation_counts_runes_not_bytes() {
        let text = "déjà vu".repeat(40);
        let truncated = truncate_runes(&text, 200);
        assert_eq!(truncated.chars().count(), 203);
        assert!(truncated.ends_with("..."));
    }

    #[test]
    fn truncation_leaves_exact_fit_untouched() {
        let text = "x".repeat(200);
        assert_eq!(truncate_runes(&text, 200), text);
        let over = "x".repeat(201);
        let truncated = truncate_runes(&over, 200);
        assert_eq!(truncated.chars().count(), 203);
    }

    #[test]
    fn consensus_weight_stays_in_range() {
        assert!((consensus_weight(0, 0) - 0.5).abs() < 1e-9);
        assert!((consensus_weight(3, 0) - 1.0).abs() < 1e-9);
        assert!((consensus_weight(1, 1) - 0.75).abs() < 1e-9);
        assert!((consensus_weight(1, 2) - 0.667).abs() < 1e-9);
    }

    #[test]
    fn fast_revision_without_citations_trips_the_caution_note() {
        let note = context_note(&signals(Some(1.0), 0, 0, 0));
        assert!(note.is_some_and(|note| {
            note.starts_with("Revised within 1h and never cited as precedent")
        }));
    }

    #[test]
    fn durable_cited_decisions_get_the_precedent_note() {
        let note = context_note(&signals(None, 3, 0, 0));
        assert_eq!(note.as_deref(), Some("Never superseded. Cited as precedent 3 times."));
    }

    #[test]
    fn conflict_wins_rank_below_citations() {
        let note = context_note(&signals(None, 0, 2, 0));
        assert_eq!(note.as_deref(), Some("Never superseded. Won 2 conflict resolution(s)."));
    }

    #[test]
    fn long_standing_revisions_report_days() {
        let note = context_note(&signals(Some(960.0), 5, 0, 0));
        assert_eq!(note.as_deref(), Some("Stood for 40 days before revision."));
    }

    #[test]
    fn pure_losses_report_overrides() {
        let note = context_note(&signals(Some(100.0), 1, 0, 2));
        assert_eq!(note.as_deref(), Some("Overridden in 2 conflict resolution(s)."));
    }

    #[test]
    fn quiet_history_yields_no_note() {
        assert_eq!(context_note(&signals(Some(100.0), 1, 0, 0)), None);
        assert_eq!(context_note(&signals(None, 1, 0, 0)), None);
    }
}
