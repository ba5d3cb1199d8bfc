// precedent-store/src/decisions.rs
// ============================================================================
// Module: Decision Storage
// Description: Bi-temporal decision writes, queries, and enrichment batches.
// Purpose: Own the authoritative decision trace SQL.
// Dependencies: postgres, pgvector, precedent-core
// ============================================================================

//! ## Overview
//! The decision table is bi-temporal: every row carries a business-time
//! validity interval and a transaction time, and revisions close the prior
//! row instead of overwriting it. The trace write is a single transaction
//! covering run, decision, alternatives, evidence, the audit entry, and the
//! search outbox row. Queries are assembled by a WHERE-clause builder whose
//! first predicate is always the tenant filter.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;

use pgvector::Vector;
use postgres::Row;
use postgres::Transaction;
use postgres::types::ToSql;
use precedent_core::AgentKey;
use precedent_core::AgentRun;
use precedent_core::Decision;
use precedent_core::DecisionId;
use precedent_core::OrgId;
use precedent_core::OutboxOperation;
use precedent_core::OutcomeSignals;
use precedent_core::RunId;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::StoreError;
use crate::outbox;
use crate::runs;

/// Decision columns selected by every read, in decode order.
const DECISION_COLUMNS: &str = "id, run_id, agent_id, org_id, decision_type, outcome, confidence, \
                                reasoning, quality_score, content_hash, agent_context, session_id, \
                                precedent_ref, valid_from, valid_to, transaction_time, created_at";

// ============================================================================
// SECTION: Write Parameters
// ============================================================================

/// Alternative supplied with a new trace.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAlternative {
    /// Option label.
    pub label: String,
    /// Optional comparative score.
    pub score: Option<f64>,
    /// Whether this option was the one selected.
    pub selected: bool,
    /// Why the option was rejected.
    pub rejection_reason: Option<String>,
}

/// Evidence supplied with a new trace.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvidence {
    /// Source type in lowercase underscore format.
    pub source_type: String,
    /// Validated source URI.
    pub source_uri: Option<String>,
    /// Evidence content.
    pub content: String,
    /// Caller-assigned relevance score.
    pub relevance_score: Option<f64>,
    /// Open-ended metadata.
    pub metadata: serde_json::Value,
}

/// Parameters for the atomic trace write.
#[derive(Debug, Clone)]
pub struct TraceParams {
    /// Owning organization.
    pub org_id: OrgId,
    /// Acting agent.
    pub agent: AgentKey,
    /// External correlation identifier.
    pub trace_id: Option<String>,
    /// Parent run, when the caller nests invocations.
    pub parent_run_id: Option<RunId>,
    /// Decision category.
    pub decision_type: String,
    /// Decision outcome statement.
    pub outcome: String,
    /// Caller confidence.
    pub confidence: f64,
    /// Free-form reasoning.
    pub reasoning: Option<String>,
    /// Derived quality score.
    pub quality_score: f64,
    /// Content hash over the semantic fields.
    pub content_hash: String,
    /// Embedding vector, when the provider produced one.
    pub embedding: Option<Vec<f32>>,
    /// Namespaced agent context.
    pub agent_context: serde_json::Value,
    /// Session correlation identifier.
    pub session_id: Option<String>,
    /// Antecedent decision.
    pub precedent_ref: Option<DecisionId>,
    /// Alternatives considered.
    pub alternatives: Vec<NewAlternative>,
    /// Supporting evidence.
    pub evidence: Vec<NewEvidence>,
    /// Clock instant for every timestamp in the transaction.
    pub now: OffsetDateTime,
}

// ============================================================================
// SECTION: Trace Write
// ============================================================================

/// Writes a run and its decision atomically inside the given transaction.
///
/// Alternatives and evidence are batch-inserted, the audit entry is
/// recorded, and an outbox upsert row is enqueued when an embedding is
/// present. Either everything becomes visible at commit or nothing does.
///
/// # Errors
///
/// Returns [`StoreError`] when any statement fails.
pub fn create_trace(
    tx: &mut Transaction<'_>,
    params: &TraceParams,
) -> Result<(AgentRun, Decision), StoreError> {
    let run = AgentRun {
        id: RunId::generate(),
        agent_key: params.agent.clone(),
        org_id: params.org_id,
        trace_id: params.trace_id.clone(),
        parent_run_id: params.parent_run_id,
        status: precedent_core::RunStatus::Completed,
        started_at: params.now,
        completed_at: Some(params.now),
        metadata: serde_json::json!({}),
    };
    runs::insert_run(tx, &run)?;

    let decision_id = DecisionId::generate();
    let embedding = params.embedding.clone().map(Vector::from);
    tx.execute(
        "INSERT INTO decisions (id, run_id, agent_id, org_id, decision_type, outcome, confidence, \
         reasoning, quality_score, content_hash, embedding, agent_context, session_id, \
         precedent_ref, valid_from, valid_to, transaction_time, created_at) VALUES ($1, $2, $3, \
         $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, NULL, $16, $17)",
        &[
            &decision_id.as_uuid(),
            &run.id.as_uuid(),
            &params.agent.as_str(),
            &params.org_id.as_uuid(),
            &params.decision_type,
            &params.outcome,
            &params.confidence,
            &params.reasoning,
            &params.quality_score,
            &params.content_hash,
            &embedding,
            &params.agent_context,
            &params.session_id,
            &params.precedent_ref.map(|id| id.as_uuid()),
            &params.now,
            &params.now,
            &params.now,
        ],
    )
    .map_err(|err| StoreError::from_pg("create_trace", &err))?;

    for alternative in &params.alternatives {
        tx.execute(
            "INSERT INTO decision_alternatives (id, decision_id, label, score, selected, \
             rejection_reason) VALUES ($1, $2, $3, $4, $5, $6)",
            &[
                &Uuid::new_v4(),
                &decision_id.as_uuid(),
                &alternative.label,
                &alternative.score,
                &alternative.selected,
                &alternative.rejection_reason,
            ],
        )
        .map_err(|err| StoreError::from_pg("create_trace", &err))?;
    }
    for evidence in &params.evidence {
        tx.execute(
            "INSERT INTO decision_evidence (id, decision_id, org_id, source_type, source_uri, \
             content, relevance_score, metadata, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, \
             $8, $9)",
            &[
                &Uuid::new_v4(),
                &decision_id.as_uuid(),
                &params.org_id.as_uuid(),
                &evidence.source_type,
                &evidence.source_uri,
                &evidence.content,
                &evidence.relevance_score,
                &evidence.metadata,
                &params.now,
            ],
        )
        .map_err(|err| StoreError::from_pg("create_trace", &err))?;
    }

    record_audit(
        tx,
        params.org_id,
        "trace_recorded",
        Some(&params.agent),
        Some(decision_id),
        &serde_json::json!({ "decision_type": params.decision_type }),
        params.now,
    )?;
    if params.embedding.is_some() {
        outbox::enqueue(tx, params.org_id, decision_id, OutboxOperation::Upsert, params.now)?;
    }

    let decision = Decision {
        id: decision_id,
        run_id: run.id,
        agent_key: params.agent.clone(),
        org_id: params.org_id,
        decision_type: params.decision_type.clone(),
        outcome: params.outcome.clone(),
        confidence: params.confidence,
        reasoning: params.reasoning.clone(),
        quality_score: params.quality_score,
        content_hash: params.content_hash.clone(),
        embedding: params.embedding.clone(),
        agent_context: params.agent_context.clone(),
        session_id: params.session_id.clone(),
        precedent_ref: params.precedent_ref,
        valid_from: params.now,
        valid_to: None,
        transaction_time: params.now,
        created_at: params.now,
        agreement_count: 0,
        conflict_count: 0,
        signals: None,
        assessment: None,
    };
    Ok((run, decision))
}

/// Revises a decision: closes the prior row and inserts the successor.
///
/// The successor carries a fresh id linked through `precedent_ref`, an
/// outbox delete is enqueued for the prior row, and an upsert for the new
/// one when an embedding is present.
///
/// # Errors
///
/// Returns [`StoreError::NotFound`] when the prior row is missing or no
/// longer current, and [`StoreError::Invalid`] on self-reference.
pub fn revise_decision(
    tx: &mut Transaction<'_>,
    prior_id: DecisionId,
    params: &TraceParams,
) -> Result<(AgentRun, Decision), StoreError> {
    if params.precedent_ref.is_some_and(|referenced| referenced == prior_id) {
        // The revision link is implicit; an explicit self-reference would
        // create a cycle.
        return Err(StoreError::invalid("revise_decision", "precedent_ref must not be the prior id"));
    }
    let closed = tx
        .execute(
            "UPDATE decisions SET valid_to = $3 WHERE org_id = $1 AND id = $2 AND valid_to IS NULL",
            &[&params.org_id.as_uuid(), &prior_id.as_uuid(), &params.now],
        )
        .map_err(|err| StoreError::from_pg("revise_decision", &err))?;
    if closed == 0 {
        return Err(StoreError::NotFound {
            what: "decision",
        });
    }
    let mut successor = params.clone();
    successor.precedent_ref = Some(prior_id);
    let (run, decision) = create_trace(tx, &successor)?;
    outbox::enqueue(tx, params.org_id, prior_id, OutboxOperation::Delete, params.now)?;
    record_audit(
        tx,
        params.org_id,
        "decision_revised",
        Some(&params.agent),
        Some(decision.id),
        &serde_json::json!({ "prior": prior_id }),
        params.now,
    )?;
    Ok((run, decision))
}

/// Deletes every decision in the organization, enqueueing index deletes.
///
/// Alternatives and evidence cascade from the decision rows. Used by the
/// data-removal path; the outbox rows drain the vector index afterwards.
///
/// # Errors
///
/// Returns [`StoreError`] when a statement fails.
pub fn delete_all_decisions(
    tx: &mut Transaction<'_>,
    org_id: OrgId,
    now: OffsetDateTime,
) -> Result<i64, StoreError> {
    let rows = tx
        .query("SELECT id FROM decisions WHERE org_id = $1", &[&org_id.as_uuid()])
        .map_err(|err| StoreError::from_pg("delete_all_decisions", &err))?;
    for row in &rows {
        let id = DecisionId::from_uuid(row.get(0));
        outbox::enqueue(tx, org_id, id, OutboxOperation::Delete, now)?;
    }
    let deleted = tx
        .execute("DELETE FROM decisions WHERE org_id = $1", &[&org_id.as_uuid()])
        .map_err(|err| StoreError::from_pg("delete_all_decisions", &err))?;
    Ok(i64::try_from(deleted).unwrap_or(i64::MAX))
}

// ============================================================================
// SECTION: Query Builder
// ============================================================================

/// Structured decision query filters.
#[derive(Debug, Clone, Default)]
pub struct DecisionQuery {
    /// Filter by decision type.
    pub decision_type: Option<String>,
    /// Filter by acting agents.
    pub agent_keys: Vec<String>,
    /// Exact outcome match.
    pub outcome: Option<String>,
    /// Minimum confidence.
    pub confidence_min: Option<f64>,
    /// Session correlation filter.
    pub session_id: Option<String>,
    /// Tool filter against the caller-reported context.
    pub tool: Option<String>,
    /// Model filter against the caller-reported context.
    pub model: Option<String>,
    /// Repository filter against the namespaced context.
    pub repo: Option<String>,
    /// Lower bound on `valid_from`.
    pub since: Option<OffsetDateTime>,
    /// Upper bound on `valid_from`.
    pub until: Option<OffsetDateTime>,
    /// Include superseded rows instead of only current ones.
    pub include_superseded: bool,
    /// Page size.
    pub limit: i64,
    /// Page offset.
    pub offset: i64,
}

/// Incrementally assembled WHERE clause with numbered parameters.
struct WhereBuilder {
    /// Rendered predicates.
    clauses: Vec<String>,
    /// Owned parameters in clause order.
    params: Vec<Box<dyn ToSql + Sync>>,
}

impl WhereBuilder {
    /// Starts a builder whose first predicate is the tenant filter.
    fn for_org(org_id: OrgId) -> Self {
        let mut builder = Self {
            clauses: Vec::new(),
            params: Vec::new(),
        };
        builder.push("org_id = ", org_id.as_uuid());
        builder
    }

    /// Appends a predicate with one parameter.
    fn push<T: ToSql + Sync + 'static>(&mut self, prefix: &str, value: T) {
        self.params.push(Box::new(value));
        let n = self.params.len();
        self.clauses.push(format!("{prefix}${n}"));
    }

    /// Appends a raw predicate without parameters.
    fn push_raw(&mut self, clause: &str) {
        self.clauses.push(clause.to_string());
    }

    /// Appends the optional filters shared by structured queries.
    fn apply(&mut self, query: &DecisionQuery) {
        if let Some(decision_type) = &query.decision_type {
            self.push("decision_type = ", decision_type.clone());
        }
        if !query.agent_keys.is_empty() {
            self.push("agent_id = ANY(", query.agent_keys.clone());
            if let Some(last) = self.clauses.last_mut() {
                last.push(')');
            }
        }
        if let Some(outcome) = &query.outcome {
            self.push("outcome = ", outcome.clone());
        }
        if let Some(confidence_min) = query.confidence_min {
            self.push("confidence >= ", confidence_min);
        }
        if let Some(session_id) = &query.session_id {
            self.push("session_id = ", session_id.clone());
        }
        if let Some(tool) = &query.tool {
            self.push("agent_context->>'client.tool' = ", tool.clone());
        }
        if let Some(model) = &query.model {
            self.push("agent_context->>'client.model' = ", model.clone());
        }
        if let Some(repo) = &query.repo {
            self.params.push(Box::new(repo.clone()));
            let n = self.params.len();
            self.clauses.push(format!(
                "(agent_context->>'server.repo' = ${n} OR agent_context->>'client.repo' = ${n})"
            ));
        }
        if let Some(since) = query.since {
            self.push("valid_from >= ", since);
        }
        if let Some(until) = query.until {
            self.push("valid_from <= ", until);
        }
    }

    /// Renders the WHERE clause.
    fn render(&self) -> String {
        self.clauses.join(" AND ")
    }

    /// Returns the parameter slice for execution.
    fn params(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.params.iter().map(AsRef::as_ref).collect()
    }
}

/// One page of decisions plus the total count for the filter set.
#[derive(Debug, Clone)]
pub struct DecisionPage {
    /// Decisions in the page.
    pub decisions: Vec<Decision>,
    /// Total rows matching the filters.
    pub total: i64,
}

// ============================================================================
// SECTION: Reads
// ============================================================================

/// Runs a structured decision query; current rows only unless asked.
///
/// # Errors
///
/// Returns [`StoreError`] when the query fails.
pub fn query_decisions(
    tx: &mut Transaction<'_>,
    org_id: OrgId,
    query: &DecisionQuery,
) -> Result<DecisionPage, StoreError> {
    let mut builder = WhereBuilder::for_org(org_id);
    if !query.include_superseded {
        builder.push_raw("valid_to IS NULL");
    }
    builder.apply(query);
    run_page_query(tx, &builder, query.limit.max(1), query.offset.max(0))
}

/// Runs a bi-temporal query as of a system instant.
///
/// # Errors
///
/// Returns [`StoreError`] when the query fails.
pub fn query_decisions_temporal(
    tx: &mut Transaction<'_>,
    org_id: OrgId,
    as_of: OffsetDateTime,
    query: &DecisionQuery,
) -> Result<DecisionPage, StoreError> {
    let mut builder = WhereBuilder::for_org(org_id);
    builder.push("transaction_time <= ", as_of);
    builder.params.push(Box::new(as_of));
    let n = builder.params.len();
    builder.clauses.push(format!("(valid_to IS NULL OR valid_to > ${n})"));
    builder.apply(query);
    run_page_query(tx, &builder, query.limit.max(1), query.offset.max(0))
}

/// Executes the assembled page and count statements.
fn run_page_query(
    tx: &mut Transaction<'_>,
    builder: &WhereBuilder,
    limit: i64,
    offset: i64,
) -> Result<DecisionPage, StoreError> {
    let where_clause = builder.render();
    let params = builder.params();
    let count_sql = format!("SELECT COUNT(*) FROM decisions WHERE {where_clause}");
    let total: i64 = tx
        .query_one(&count_sql, &params)
        .map_err(|err| StoreError::from_pg("query_decisions", &err))?
        .get(0);
    let page_sql = format!(
        "SELECT {DECISION_COLUMNS} FROM decisions WHERE {where_clause} ORDER BY valid_from DESC \
         LIMIT {limit} OFFSET {offset}"
    );
    let rows = tx
        .query(&page_sql, &params)
        .map_err(|err| StoreError::from_pg("query_decisions", &err))?;
    let decisions =
        rows.iter().map(decision_from_row).collect::<Result<Vec<_>, StoreError>>()?;
    Ok(DecisionPage {
        decisions,
        total,
    })
}

/// Hydrates current decisions by primary key, preserving input order.
///
/// Stale vector-index hits drop out here because the lookup re-applies the
/// current-row predicate.
///
/// # Errors
///
/// Returns [`StoreError`] when the query fails.
pub fn get_decisions_by_ids(
    tx: &mut Transaction<'_>,
    org_id: OrgId,
    ids: &[DecisionId],
) -> Result<Vec<Decision>, StoreError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let uuids: Vec<Uuid> = ids.iter().map(DecisionId::as_uuid).collect();
    let sql = format!(
        "SELECT {DECISION_COLUMNS} FROM decisions WHERE org_id = $1 AND id = ANY($2) AND valid_to \
         IS NULL"
    );
    let rows = tx
        .query(&sql, &[&org_id.as_uuid(), &uuids])
        .map_err(|err| StoreError::from_pg("get_decisions_by_ids", &err))?;
    let mut by_id = HashMap::new();
    for row in &rows {
        let decision = decision_from_row(row)?;
        by_id.insert(decision.id, decision);
    }
    Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
}

/// Fetches one decision row by id (any validity).
///
/// # Errors
///
/// Returns [`StoreError`] when the query fails.
pub fn get_decision(
    tx: &mut Transaction<'_>,
    org_id: OrgId,
    id: DecisionId,
) -> Result<Option<Decision>, StoreError> {
    let sql = format!(
        "SELECT {DECISION_COLUMNS} FROM decisions WHERE org_id = $1 AND id = $2 ORDER BY \
         transaction_time DESC LIMIT 1"
    );
    let row = tx
        .query_opt(&sql, &[&org_id.as_uuid(), &id.as_uuid()])
        .map_err(|err| StoreError::from_pg("get_decision", &err))?;
    row.as_ref().map(decision_from_row).transpose()
}

/// Loads decisions with embeddings for outbox propagation.
///
/// # Errors
///
/// Returns [`StoreError`] when the query fails.
pub fn get_decisions_with_embeddings(
    tx: &mut Transaction<'_>,
    org_id: OrgId,
    ids: &[DecisionId],
) -> Result<Vec<Decision>, StoreError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let uuids: Vec<Uuid> = ids.iter().map(DecisionId::as_uuid).collect();
    let sql = format!(
        "SELECT {DECISION_COLUMNS}, embedding FROM decisions WHERE org_id = $1 AND id = ANY($2) \
         AND valid_to IS NULL"
    );
    let rows = tx
        .query(&sql, &[&org_id.as_uuid(), &uuids])
        .map_err(|err| StoreError::from_pg("get_decisions_with_embeddings", &err))?;
    rows.iter()
        .map(|row| {
            let mut decision = decision_from_row(row)?;
            let embedding: Option<Vector> = row.get(17);
            decision.embedding = embedding.map(|vector| vector.to_vec());
            Ok(decision)
        })
        .collect()
}

/// In-database vector search fallback, always org-scoped.
///
/// # Errors
///
/// Returns [`StoreError`] when the query fails.
pub fn search_by_embedding(
    tx: &mut Transaction<'_>,
    org_id: OrgId,
    vector: &[f32],
    query: &DecisionQuery,
    limit: i64,
) -> Result<Vec<(Decision, f64)>, StoreError> {
    let mut builder = WhereBuilder::for_org(org_id);
    builder.push_raw("valid_to IS NULL");
    builder.push_raw("embedding IS NOT NULL");
    builder.apply(query);
    let probe = Vector::from(vector.to_vec());
    builder.params.push(Box::new(probe));
    let n = builder.params.len();
    let where_clause = builder.render();
    let sql = format!(
        "SELECT {DECISION_COLUMNS}, 1 - (embedding <=> ${n}) AS similarity FROM decisions WHERE \
         {where_clause} ORDER BY embedding <=> ${n} LIMIT {}",
        limit.max(1)
    );
    let params = builder.params();
    let rows =
        tx.query(&sql, &params).map_err(|err| StoreError::from_pg("search_by_embedding", &err))?;
    rows.iter()
        .map(|row| {
            let decision = decision_from_row(row)?;
            let similarity: f64 = row.get(17);
            Ok((decision, similarity))
        })
        .collect()
}

/// Plain-text search used when no embedding path is available.
///
/// # Errors
///
/// Returns [`StoreError`] when the query fails.
pub fn search_by_text(
    tx: &mut Transaction<'_>,
    org_id: OrgId,
    needle: &str,
    query: &DecisionQuery,
    limit: i64,
) -> Result<Vec<Decision>, StoreError> {
    let mut builder = WhereBuilder::for_org(org_id);
    builder.push_raw("valid_to IS NULL");
    builder.apply(query);
    let pattern = format!("%{}%", needle.replace('%', "\\%").replace('_', "\\_"));
    builder.params.push(Box::new(pattern));
    let n = builder.params.len();
    builder.clauses.push(format!("(outcome ILIKE ${n} OR reasoning ILIKE ${n})"));
    let where_clause = builder.render();
    let sql = format!(
        "SELECT {DECISION_COLUMNS} FROM decisions WHERE {where_clause} ORDER BY valid_from DESC \
         LIMIT {}",
        limit.max(1)
    );
    let params = builder.params();
    let rows =
        tx.query(&sql, &params).map_err(|err| StoreError::from_pg("search_by_text", &err))?;
    rows.iter().map(decision_from_row).collect()
}

// ============================================================================
// SECTION: Enrichment Batches
// ============================================================================

/// Loads consensus counts for a batch of decisions.
///
/// Agreement counts corroborating current decisions of the same type and
/// outcome by other agents; conflict counts open or acknowledged conflict
/// rows touching the decision.
///
/// # Errors
///
/// Returns [`StoreError`] when a query fails.
pub fn consensus_counts(
    tx: &mut Transaction<'_>,
    org_id: OrgId,
    ids: &[DecisionId],
) -> Result<HashMap<DecisionId, (i64, i64)>, StoreError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let uuids: Vec<Uuid> = ids.iter().map(DecisionId::as_uuid).collect();
    let mut out: HashMap<DecisionId, (i64, i64)> = HashMap::new();
    let agreement_rows = tx
        .query(
            "SELECT d.id, COUNT(o.id) FROM decisions d LEFT JOIN decisions o ON o.org_id = \
             d.org_id AND o.decision_type = d.decision_type AND o.outcome = d.outcome AND o.id <> \
             d.id AND o.valid_to IS NULL WHERE d.org_id = $1 AND d.id = ANY($2) GROUP BY d.id",
            &[&org_id.as_uuid(), &uuids],
        )
        .map_err(|err| StoreError::from_pg("consensus_counts", &err))?;
    for row in agreement_rows {
        let id = DecisionId::from_uuid(row.get(0));
        out.entry(id).or_default().0 = row.get(1);
    }
    let conflict_rows = tx
        .query(
            "SELECT c.decision_a_id, c.decision_b_id FROM decision_conflicts c LEFT JOIN \
             conflict_reviews r ON r.conflict_id = c.id WHERE c.org_id = $1 AND \
             (c.decision_a_id = ANY($2) OR c.decision_b_id = ANY($2)) AND COALESCE(r.status, \
             'open') IN ('open', 'acknowledged')",
            &[&org_id.as_uuid(), &uuids],
        )
        .map_err(|err| StoreError::from_pg("consensus_counts", &err))?;
    for row in conflict_rows {
        for index in 0..2 {
            let id = DecisionId::from_uuid(row.get(index));
            if ids.contains(&id) {
                out.entry(id).or_default().1 += 1;
            }
        }
    }
    Ok(out)
}

/// Loads outcome signals for a batch of decisions.
///
/// # Errors
///
/// Returns [`StoreError`] when a query fails.
pub fn outcome_signals(
    tx: &mut Transaction<'_>,
    org_id: OrgId,
    ids: &[DecisionId],
) -> Result<HashMap<DecisionId, OutcomeSignals>, StoreError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let uuids: Vec<Uuid> = ids.iter().map(DecisionId::as_uuid).collect();
    let rows = tx
        .query(
            "SELECT d.id, \
             COALESCE( \
                 (EXTRACT(EPOCH FROM (d.valid_to - d.valid_from)) / 3600.0)::float8, \
                 (SELECT (EXTRACT(EPOCH FROM (p.valid_to - p.valid_from)) / 3600.0)::float8 FROM \
                  decisions p WHERE p.org_id = d.org_id AND p.id = d.precedent_ref AND p.valid_to \
                  IS NOT NULL AND p.decision_type = d.decision_type) \
             ) AS velocity_hours, \
             (SELECT COUNT(*) FROM decisions c WHERE c.org_id = d.org_id AND c.precedent_ref = \
              d.id AND c.valid_to IS NULL) AS citations, \
             (SELECT COUNT(*) FROM decision_conflicts k JOIN conflict_reviews r ON r.conflict_id \
              = k.id WHERE k.org_id = d.org_id AND r.status = 'resolved' AND \
              r.winning_decision_id = d.id) AS won, \
             (SELECT COUNT(*) FROM decision_conflicts k JOIN conflict_reviews r ON r.conflict_id \
              = k.id WHERE k.org_id = d.org_id AND r.status = 'resolved' AND \
              r.winning_decision_id IS NOT NULL AND r.winning_decision_id <> d.id AND \
              (k.decision_a_id = d.id OR k.decision_b_id = d.id)) AS lost \
             FROM decisions d WHERE d.org_id = $1 AND d.id = ANY($2)",
            &[&org_id.as_uuid(), &uuids],
        )
        .map_err(|err| StoreError::from_pg("outcome_signals", &err))?;
    let mut out = HashMap::new();
    for row in rows {
        let id = DecisionId::from_uuid(row.get(0));
        out.insert(id, OutcomeSignals {
            supersession_velocity_hours: row.get(1),
            precedent_citation_count: row.get(2),
            conflicts_won: row.get(3),
            conflicts_lost: row.get(4),
        });
    }
    Ok(out)
}

/// Counts current decisions sharing a type and outcome (corroboration).
///
/// # Errors
///
/// Returns [`StoreError`] when the query fails.
pub fn corroboration_count(
    tx: &mut Transaction<'_>,
    org_id: OrgId,
    decision_type: &str,
    outcome: &str,
) -> Result<i64, StoreError> {
    let row = tx
        .query_one(
            "SELECT COUNT(*) FROM decisions WHERE org_id = $1 AND decision_type = $2 AND outcome \
             = $3 AND valid_to IS NULL",
            &[&org_id.as_uuid(), &decision_type, &outcome],
        )
        .map_err(|err| StoreError::from_pg("corroboration_count", &err))?;
    Ok(row.get(0))
}

/// Counts decisions and distinct types for the stats surface.
///
/// # Errors
///
/// Returns [`StoreError`] when the query fails.
pub fn stats_counts(
    tx: &mut Transaction<'_>,
    org_id: OrgId,
) -> Result<(i64, i64, i64), StoreError> {
    let row = tx
        .query_one(
            "SELECT COUNT(*), COUNT(DISTINCT decision_type), COUNT(DISTINCT agent_id) FROM \
             decisions WHERE org_id = $1 AND valid_to IS NULL",
            &[&org_id.as_uuid()],
        )
        .map_err(|err| StoreError::from_pg("stats_counts", &err))?;
    Ok((row.get(0), row.get(1), row.get(2)))
}

/// Returns the decision-type distribution for the stats surface.
///
/// # Errors
///
/// Returns [`StoreError`] when the query fails.
pub fn type_distribution(
    tx: &mut Transaction<'_>,
    org_id: OrgId,
    limit: i64,
) -> Result<Vec<(String, i64)>, StoreError> {
    let rows = tx
        .query(
            "SELECT decision_type, COUNT(*) FROM decisions WHERE org_id = $1 AND valid_to IS NULL \
             GROUP BY decision_type ORDER BY COUNT(*) DESC LIMIT $2",
            &[&org_id.as_uuid(), &limit],
        )
        .map_err(|err| StoreError::from_pg("type_distribution", &err))?;
    Ok(rows.into_iter().map(|row| (row.get(0), row.get(1))).collect())
}

// ============================================================================
// SECTION: Audit
// ============================================================================

/// Records an audit entry inside the current transaction.
///
/// # Errors
///
/// Returns [`StoreError`] when the insert fails.
pub fn record_audit(
    tx: &mut Transaction<'_>,
    org_id: OrgId,
    event: &str,
    agent: Option<&AgentKey>,
    decision_id: Option<DecisionId>,
    detail: &serde_json::Value,
    now: OffsetDateTime,
) -> Result<(), StoreError> {
    tx.execute(
        "INSERT INTO audit_log (id, org_id, event, agent_id, decision_id, detail, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
        &[
            &Uuid::new_v4(),
            &org_id.as_uuid(),
            &event,
            &agent.map(AgentKey::as_str),
            &decision_id.map(|id| id.as_uuid()),
            detail,
            &now,
        ],
    )
    .map_err(|err| StoreError::from_pg("record_audit", &err))?;
    Ok(())
}

// ============================================================================
// SECTION: Row Decoding
// ============================================================================

/// Decodes a decision row (without embedding).
fn decision_from_row(row: &Row) -> Result<Decision, StoreError> {
    Ok(Decision {
        id: DecisionId::from_uuid(row.get(0)),
        run_id: RunId::from_uuid(row.get(1)),
        agent_key: AgentKey::new(row.get::<_, String>(2)),
        org_id: OrgId::from_uuid(row.get(3)),
        decision_type: row.get(4),
        outcome: row.get(5),
        confidence: row.get(6),
        reasoning: row.get(7),
        quality_score: row.get(8),
        content_hash: row.get(9),
        embedding: None,
        agent_context: row.get(10),
        session_id: row.get(11),
        precedent_ref: row.get::<_, Option<Uuid>>(12).map(DecisionId::from_uuid),
        valid_from: row.get(13),
        valid_to: row.get(14),
        transaction_time: row.get(15),
        created_at: row.get(16),
        agreement_count: 0,
        conflict_count: 0,
        signals: None,
        assessment: None,
    })
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use precedent_core::OrgId;

    use super::DecisionQuery;
    use super::WhereBuilder;

    #[test]
    fn builder_always_leads_with_the_tenant_filter() {
        let builder = WhereBuilder::for_org(OrgId::generate());
        assert_eq!(builder.render(), "org_id = $1");
    }

    #[test]
    fn builder_numbers_parameters_in_clause_order() {
        let mut builder = WhereBuilder::for_org(OrgId::generate());
        builder.push_raw("valid_to IS NULL");
        builder.apply(&DecisionQuery {
            decision_type: Some("architecture".to_string()),
            confidence_min: Some(0.5),
            ..DecisionQuery::default()
        });
        assert_eq!(
            builder.render(),
            "org_id = $1 AND valid_to IS NULL AND decision_type = $2 AND confidence >= $3"
        );
    }

    #[test]
    fn repo_filter_checks_both_namespaces_with_one_parameter() {
        let mut builder = WhereBuilder::for_org(OrgId::generate());
        builder.apply(&DecisionQuery {
            repo: Some("precedent".to_string()),
            ..DecisionQuery::default()
        });
        let rendered = builder.render();
        assert!(rendered.contains("agent_context->>'server.repo' = $2"));
        assert!(rendered.contains("agent_context->>'client.repo' = $2"));
    }

    #[test]
    fn agent_filter_uses_array_containment() {
        let mut builder = WhereBuilder::for_org(OrgId::generate());
        builder.apply(&DecisionQuery {
            agent_keys: vec!["planner".to_string(), "coder".to_string()],
            ..DecisionQuery::default()
        });
        assert!(builder.render().contains("agent_id = ANY($2)"));
    }
}
