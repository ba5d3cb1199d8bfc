// precedent-store/src/assessments.rs
// ============================================================================
// Module: Assessment Storage
// Description: Append-only correctness verdicts and their summaries.
// Purpose: Persist assessments and compute latest-plus-counts summaries.
// Dependencies: postgres, precedent-core
// ============================================================================

//! ## Overview
//! Assessments are append-only; re-assessment inserts a new row. The
//! summary for a decision is the most recent verdict plus a count vector,
//! recomputed per read.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;

use postgres::Transaction;
use precedent_core::Assessment;
use precedent_core::AssessmentId;
use precedent_core::AssessmentOutcome;
use precedent_core::AssessmentSummary;
use precedent_core::AgentKey;
use precedent_core::DecisionId;
use precedent_core::OrgId;
use uuid::Uuid;

use crate::error::StoreError;

// ============================================================================
// SECTION: Operations
// ============================================================================

/// Appends an assessment row.
///
/// # Errors
///
/// Returns [`StoreError`] when the insert fails.
pub fn insert_assessment(
    tx: &mut Transaction<'_>,
    assessment: &Assessment,
) -> Result<(), StoreError> {
    tx.execute(
        "INSERT INTO assessments (id, decision_id, org_id, assessor_agent_id, outcome, notes, \
         created_at) VALUES ($1, $2, $3, $4, $5, $6, $7)",
        &[
            &assessment.id.as_uuid(),
            &assessment.decision_id.as_uuid(),
            &assessment.org_id.as_uuid(),
            &assessment.assessor.as_str(),
            &assessment.outcome.as_str(),
            &assessment.notes,
            &assessment.created_at,
        ],
    )
    .map_err(|err| StoreError::from_pg("insert_assessment", &err))?;
    Ok(())
}

/// Loads assessment summaries for a batch of decisions.
///
/// # Errors
///
/// Returns [`StoreError`] when the query fails.
pub fn summaries(
    tx: &mut Transaction<'_>,
    org_id: OrgId,
    ids: &[DecisionId],
) -> Result<HashMap<DecisionId, AssessmentSummary>, StoreError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let uuids: Vec<Uuid> = ids.iter().map(DecisionId::as_uuid).collect();
    let rows = tx
        .query(
            "SELECT decision_id, outcome, created_at FROM assessments WHERE org_id = $1 AND \
             decision_id = ANY($2) ORDER BY created_at",
            &[&org_id.as_uuid(), &uuids],
        )
        .map_err(|err| StoreError::from_pg("assessment_summaries", &err))?;
    let mut out: HashMap<DecisionId, AssessmentSummary> = HashMap::new();
    for row in rows {
        let decision_id = DecisionId::from_uuid(row.get(0));
        let label: String = row.get(1);
        let Some(outcome) = AssessmentOutcome::parse(&label) else {
            return Err(StoreError::invalid(
                "assessment_summaries",
                format!("unknown outcome {label}"),
            ));
        };
        let summary = out.entry(decision_id).or_insert(AssessmentSummary {
            latest: outcome,
            correct: 0,
            incorrect: 0,
            partially_correct: 0,
        });
        // Rows arrive in chronological order, so the last write wins.
        summary.latest = outcome;
        match outcome {
            AssessmentOutcome::Correct => summary.correct += 1,
            AssessmentOutcome::Incorrect => summary.incorrect += 1,
            AssessmentOutcome::PartiallyCorrect => summary.partially_correct += 1,
        }
    }
    Ok(out)
}

/// Lists assessments for one decision, newest first.
///
/// # Errors
///
/// Returns [`StoreError`] when the query fails.
pub fn list_for_decision(
    tx: &mut Transaction<'_>,
    org_id: OrgId,
    decision_id: DecisionId,
    limit: i64,
) -> Result<Vec<Assessment>, StoreError> {
    let rows = tx
        .query(
            "SELECT id, decision_id, org_id, assessor_agent_id, outcome, notes, created_at FROM \
             assessments WHERE org_id = $1 AND decision_id = $2 ORDER BY created_at DESC LIMIT $3",
            &[&org_id.as_uuid(), &decision_id.as_uuid(), &limit],
        )
        .map_err(|err| StoreError::from_pg("list_assessments", &err))?;
    rows.into_iter()
        .map(|row| {
            let label: String = row.get(4);
            let outcome = AssessmentOutcome::parse(&label).ok_or_else(|| {
                StoreError::invalid("list_assessments", format!("unknown outcome {label}"))
            })?;
            Ok(Assessment {
                id: AssessmentId::from_uuid(row.get(0)),
                decision_id: DecisionId::from_uuid(row.get(1)),
                org_id: OrgId::from_uuid(row.get(2)),
                assessor: AgentKey::new(row.get::<_, String>(3)),
                outcome,
                notes: row.get(5),
                created_at: row.get(6),
            })
        })
        .collect()
}
