// precedent-service/tests/render_scenarios.rs
// ============================================================================
// Module: Renderer Scenario Tests
// Description: End-to-end rendering checks for consensus and summaries.
// Purpose: Pin the agent-facing templates to their exact wording.
// ============================================================================

//! Scenario tests for the compact renderers.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use precedent_core::AgentKey;
use precedent_core::ConflictId;
use precedent_core::ConflictSeverity;
use precedent_core::ConflictStatus;
use precedent_core::Decision;
use precedent_core::DecisionConflict;
use precedent_core::DecisionId;
use precedent_core::OrgId;
use precedent_core::OutcomeSignals;
use precedent_core::RunId;
use precedent_service::render::SummaryInputs;
use precedent_service::render::action_needed;
use precedent_service::render::check_summary;
use precedent_service::render::compact_conflict;
use precedent_service::render::compact_decision;
use precedent_service::render::consensus_weight;
use proptest::prelude::*;
use time::OffsetDateTime;

fn decision(outcome: &str, confidence: f64) -> Decision {
    Decision {
        id: DecisionId::generate(),
        run_id: RunId::generate(),
        agent_key: AgentKey::new("planner"),
        org_id: OrgId::generate(),
        decision_type: "architecture".to_string(),
        outcome: outcome.to_string(),
        confidence,
        reasoning: None,
        quality_score: 0.5,
        content_hash: String::new(),
        embedding: None,
        agent_context: serde_json::json!({}),
        session_id: None,
        precedent_ref: None,
        valid_from: OffsetDateTime::UNIX_EPOCH,
        valid_to: None,
        transaction_time: OffsetDateTime::UNIX_EPOCH,
        created_at: OffsetDateTime::UNIX_EPOCH,
        agreement_count: 0,
        conflict_count: 0,
        signals: None,
        assessment: None,
    }
}

fn conflict(outcome_a: &str, outcome_b: &str) -> DecisionConflict {
    DecisionConflict {
        id: ConflictId::generate(),
        decision_a_id: DecisionId::generate(),
        decision_b_id: DecisionId::generate(),
        org_id: OrgId::generate(),
        conflict_kind: "outcome_divergence".to_string(),
        agent_a: AgentKey::new("planner"),
        agent_b: AgentKey::new("coder"),
        outcome_a: outcome_a.to_string(),
        outcome_b: outcome_b.to_string(),
        decision_type: "architecture".to_string(),
        similarity: None,
        category: None,
        severity: None,
        explanation: None,
        status: ConflictStatus::Open,
        winning_decision_id: None,
        detected_at: OffsetDateTime::UNIX_EPOCH,
    }
}

#[test]
fn two_agent_disagreement_produces_the_asymmetry_note() {
    let pair = conflict("chose Redis", "chose in-memory cache");
    let compact = compact_conflict(&pair, 4, 1);
    assert_eq!(
        compact.consensus_note.as_deref(),
        Some(
            "Decision A ('chose Redis') has 4 corroborating decision(s). Decision B ('chose \
             in-memory cache') has 1."
        )
    );
}

#[test]
fn near_even_pairs_carry_no_consensus_note() {
    let pair = conflict("chose Redis", "chose in-memory cache");
    assert!(compact_conflict(&pair, 2, 1).consensus_note.is_none());
    assert!(compact_conflict(&pair, 1, 1).consensus_note.is_none());
}

#[test]
fn the_stronger_side_is_listed_first_regardless_of_pair_order() {
    let pair = conflict("chose in-memory cache", "chose Redis");
    let compact = compact_conflict(&pair, 1, 4);
    let note = compact.consensus_note.unwrap_or_default();
    assert!(note.starts_with("Decision A ('chose Redis') has 4"));
}

#[test]
fn summary_reports_count_latest_and_asymmetry() {
    let mut latest = decision("chose Redis", 0.85);
    latest.signals = Some(OutcomeSignals {
        supersession_velocity_hours: None,
        precedent_citation_count: 2,
        conflicts_won: 0,
        conflicts_lost: 0,
    });
    let decisions = vec![latest, decision("chose Redis", 0.8)];
    let conflicts = vec![conflict("chose Redis", "chose in-memory cache")];
    let corroborations = vec![(4, 1)];
    let summary = check_summary(&SummaryInputs {
        decision_type: "architecture",
        decisions: &decisions,
        conflicts: &conflicts,
        corroborations: &corroborations,
    });
    assert!(summary.starts_with("Found 2 prior decision(s) for 'architecture'."));
    assert!(summary.contains("'chose Redis' at 85% confidence"));
    assert!(summary.contains("never superseded"));
    assert!(summary.contains("4-to-1 in favor of 'chose Redis'"));
}

#[test]
fn empty_history_summary_is_a_single_sentence() {
    let summary = check_summary(&SummaryInputs {
        decision_type: "security",
        decisions: &[],
        conflicts: &[],
        corroborations: &[],
    });
    assert_eq!(summary, "No prior decisions recorded for 'security'.");
}

#[test]
fn action_is_needed_only_for_open_high_or_critical() {
    let mut severe = conflict("a", "b");
    severe.severity = Some(ConflictSeverity::Critical);
    assert!(action_needed(&[severe.clone()]));

    severe.status = ConflictStatus::Resolved;
    assert!(!action_needed(&[severe]));

    let mut mild = conflict("a", "b");
    mild.severity = Some(ConflictSeverity::Low);
    assert!(!action_needed(&[mild]));

    let untriaged = conflict("a", "b");
    assert!(!action_needed(&[untriaged]));
}

#[test]
fn compact_decision_pulls_tool_and_model_from_context() {
    let mut traced = decision("chose Redis", 0.85);
    traced.agent_context = serde_json::json!({
        "client.tool": "cargo",
        "client.model": "gpt-5",
        "server.repo": "precedent",
    });
    traced.reasoning = Some("x".repeat(201));
    let compact = compact_decision(&traced);
    assert_eq!(compact.tool.as_deref(), Some("cargo"));
    assert_eq!(compact.model.as_deref(), Some("gpt-5"));
    let reasoning = compact.reasoning.unwrap_or_default();
    assert_eq!(reasoning.chars().count(), 203);
    assert!(reasoning.ends_with("..."));
}

proptest! {
    #[test]
    fn consensus_weight_always_lands_in_range(agreement in 0_i64..10_000, conflicts in 0_i64..10_000) {
        let weight = consensus_weight(agreement, conflicts);
        prop_assert!(weight >= 0.5);
        prop_assert!(weight <= 1.0);
    }

    #[test]
    fn consensus_weight_is_one_iff_agreed_and_unconflicted(
        agreement in 0_i64..1_000,
        conflicts in 0_i64..1_000,
    ) {
        let weight = consensus_weight(agreement, conflicts);
        let is_one = (weight - 1.0).abs() < 1e-9;
        prop_assert_eq!(is_one, conflicts == 0 && agreement >= 1);
    }
}
