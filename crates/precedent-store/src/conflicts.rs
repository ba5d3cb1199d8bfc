// precedent-store/src/conflicts.rs
// ============================================================================
// Module: Conflict Storage
// Description: Materialized conflict view refresh, listing, and triage.
// Purpose: Surface cross-agent disagreements with their review state.
// Dependencies: postgres, precedent-core
// ============================================================================

//! ## Overview
//! Detection lives in the `decision_conflicts` materialized view; triage
//! state (status, severity, category, winner) lives in `conflict_reviews`
//! and is joined at read time. Refreshes run concurrently against the
//! view's unique pair index so readers never block.

// ============================================================================
// SECTION: Imports
// ============================================================================

use postgres::Row;
use postgres::Transaction;
use precedent_core::AgentKey;
use precedent_core::ConflictCategory;
use precedent_core::ConflictId;
use precedent_core::ConflictSeverity;
use precedent_core::ConflictStatus;
use precedent_core::DecisionConflict;
use precedent_core::DecisionId;
use precedent_core::OrgId;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::StoreError;

/// Conflict columns selected by every read, in decode order.
const CONFLICT_COLUMNS: &str = "c.id, c.decision_a_id, c.decision_b_id, c.org_id, \
                                c.conflict_kind, c.agent_a, c.agent_b, c.outcome_a, c.outcome_b, \
                                c.decision_type, r.category, r.severity, r.explanation, \
                                COALESCE(r.status, 'open'), r.winning_decision_id, c.detected_at";

// ============================================================================
// SECTION: Refresh
// ============================================================================

/// Refreshes the conflict materialized view for one tenant schema.
///
/// Runs `REFRESH MATERIALIZED VIEW CONCURRENTLY`, which requires the unique
/// index on the ordered decision pair and never blocks readers. Concurrent
/// refresh cannot run inside a transaction block, so this takes a plain
/// connection and qualifies the view by schema.
///
/// # Errors
///
/// Returns [`StoreError`] when the refresh fails.
pub fn refresh(conn: &mut postgres::Client, schema: &str) -> Result<(), StoreError> {
    let sql = format!(
        "REFRESH MATERIALIZED VIEW CONCURRENTLY {}.decision_conflicts",
        crate::migrations::quote_ident(schema)
    );
    conn.batch_execute(&sql).map_err(|err| StoreError::from_pg("refresh_conflicts", &err))?;
    Ok(())
}

// ============================================================================
// SECTION: Listing
// ============================================================================

/// Filters accepted by the conflict listing.
#[derive(Debug, Clone, Default)]
pub struct ConflictFilter {
    /// Filter by decision type.
    pub decision_type: Option<String>,
    /// Filter by either agent of the pair.
    pub agent_key: Option<String>,
    /// Explicit status filter; `None` shows open and acknowledged.
    pub status: Option<ConflictStatus>,
    /// Filter by severity.
    pub severity: Option<ConflictSeverity>,
    /// Filter by category.
    pub category: Option<ConflictCategory>,
    /// Page size.
    pub limit: i64,
    /// Page offset.
    pub offset: i64,
}

/// Lists conflicts with their review state joined in.
///
/// # Errors
///
/// Returns [`StoreError`] when the query fails.
pub fn list_conflicts(
    tx: &mut Transaction<'_>,
    org_id: OrgId,
    filter: &ConflictFilter,
) -> Result<Vec<DecisionConflict>, StoreError> {
    let mut clauses = vec!["c.org_id = $1".to_string()];
    let mut params: Vec<Box<dyn postgres::types::ToSql + Sync>> =
        vec![Box::new(org_id.as_uuid())];
    if let Some(decision_type) = &filter.decision_type {
        params.push(Box::new(decision_type.clone()));
        clauses.push(format!("c.decision_type = ${}", params.len()));
    }
    if let Some(agent) = &filter.agent_key {
        params.push(Box::new(agent.clone()));
        let n = params.len();
        clauses.push(format!("(c.agent_a = ${n} OR c.agent_b = ${n})"));
    }
    if let Some(status) = filter.status {
        params.push(Box::new(status.as_str().to_string()));
        clauses.push(format!("COALESCE(r.status, 'open') = ${}", params.len()));
    } else {
        clauses.push("COALESCE(r.status, 'open') IN ('open', 'acknowledged')".to_string());
    }
    if let Some(severity) = filter.severity {
        params.push(Box::new(severity.as_str().to_string()));
        clauses.push(format!("r.severity = ${}", params.len()));
    }
    if let Some(category) = filter.category {
        params.push(Box::new(category.as_str().to_string()));
        clauses.push(format!("r.category = ${}", params.len()));
    }
    let where_clause = clauses.join(" AND ");
    let sql = format!(
        "SELECT {CONFLICT_COLUMNS} FROM decision_conflicts c LEFT JOIN conflict_reviews r ON \
         r.conflict_id = c.id WHERE {where_clause} ORDER BY c.detected_at DESC LIMIT {} OFFSET {}",
        filter.limit.max(1),
        filter.offset.max(0)
    );
    let param_refs: Vec<&(dyn postgres::types::ToSql + Sync)> =
        params.iter().map(AsRef::as_ref).collect();
    let rows = tx
        .query(&sql, &param_refs)
        .map_err(|err| StoreError::from_pg("list_conflicts", &err))?;
    rows.iter().map(conflict_from_row).collect()
}

/// Counts open conflicts at or above a severity for the action flag.
///
/// # Errors
///
/// Returns [`StoreError`] when the query fails.
pub fn open_conflict_count(
    tx: &mut Transaction<'_>,
    org_id: OrgId,
    decision_type: Option<&str>,
) -> Result<i64, StoreError> {
    let row = match decision_type {
        Some(decision_type) => tx
            .query_one(
                "SELECT COUNT(*) FROM decision_conflicts c LEFT JOIN conflict_reviews r ON \
                 r.conflict_id = c.id WHERE c.org_id = $1 AND c.decision_type = $2 AND \
                 COALESCE(r.status, 'open') IN ('open', 'acknowledged')",
                &[&org_id.as_uuid(), &decision_type],
            )
            .map_err(|err| StoreError::from_pg("open_conflict_count", &err))?,
        None => tx
            .query_one(
                "SELECT COUNT(*) FROM decision_conflicts c LEFT JOIN conflict_reviews r ON \
                 r.conflict_id = c.id WHERE c.org_id = $1 AND COALESCE(r.status, 'open') IN \
                 ('open', 'acknowledged')",
                &[&org_id.as_uuid()],
            )
            .map_err(|err| StoreError::from_pg("open_conflict_count", &err))?,
    };
    Ok(row.get(0))
}

// ============================================================================
// SECTION: Triage
// ============================================================================

/// Upserts the review state for a conflict.
///
/// # Errors
///
/// Returns [`StoreError`] when the upsert fails.
pub fn upsert_review(
    tx: &mut Transaction<'_>,
    org_id: OrgId,
    conflict_id: ConflictId,
    status: ConflictStatus,
    category: Option<ConflictCategory>,
    severity: Option<ConflictSeverity>,
    explanation: Option<&str>,
    winning_decision_id: Option<DecisionId>,
    now: OffsetDateTime,
) -> Result<(), StoreError> {
    tx.execute(
        "INSERT INTO conflict_reviews (conflict_id, org_id, category, severity, explanation, \
         status, winning_decision_id, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) ON \
         CONFLICT (conflict_id) DO UPDATE SET category = EXCLUDED.category, severity = \
         EXCLUDED.severity, explanation = EXCLUDED.explanation, status = EXCLUDED.status, \
         winning_decision_id = EXCLUDED.winning_decision_id, updated_at = EXCLUDED.updated_at",
        &[
            &conflict_id.as_uuid(),
            &org_id.as_uuid(),
            &category.map(ConflictCategory::as_str),
            &severity.map(ConflictSeverity::as_str),
            &explanation,
            &status.as_str(),
            &winning_decision_id.map(|id| id.as_uuid()),
            &now,
        ],
    )
    .map_err(|err| StoreError::from_pg("upsert_review", &err))?;
    Ok(())
}

// ============================================================================
// SECTION: Row Decoding
// ============================================================================

/// Decodes a conflict row with its joined review state.
fn conflict_from_row(row: &Row) -> Result<DecisionConflict, StoreError> {
    let category = row
        .get::<_, Option<String>>(10)
        .map(|label| {
            ConflictCategory::parse(&label).ok_or_else(|| {
                StoreError::invalid("conflict_from_row", format!("unknown category {label}"))
            })
        })
        .transpose()?;
    let severity = row
        .get::<_, Option<String>>(11)
        .map(|label| {
            ConflictSeverity::parse(&label).ok_or_else(|| {
                StoreError::invalid("conflict_from_row", format!("unknown severity {label}"))
            })
        })
        .transpose()?;
    let status_label: String = row.get(13);
    let status = ConflictStatus::parse(&status_label).ok_or_else(|| {
        StoreError::invalid("conflict_from_row", format!("unknown status {status_label}"))
    })?;
    Ok(DecisionConflict {
        id: ConflictId::from_uuid(row.get(0)),
        decision_a_id: DecisionId::from_uuid(row.get(1)),
        decision_b_id: DecisionId::from_uuid(row.get(2)),
        org_id: OrgId::from_uuid(row.get(3)),
        conflict_kind: row.get(4),
        agent_a: AgentKey::new(row.get::<_, String>(5)),
        agent_b: AgentKey::new(row.get::<_, String>(6)),
        outcome_a: row.get(7),
        outcome_b: row.get(8),
        decision_type: row.get(9),
        similarity: None,
        category,
        severity,
        explanation: row.get(12),
        status,
        winning_decision_id: row.get::<_, Option<Uuid>>(14).map(DecisionId::from_uuid),
        detected_at: row.get(15),
    })
}
