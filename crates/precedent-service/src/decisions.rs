// precedent-service/src/decisions.rs
// ============================================================================
// Module: Decision Service
// Description: Trace, Check, Search, Query, Recent, Assess, and Stats.
// Purpose: Orchestrate the decision trace engine end to end.
// Dependencies: precedent-core, precedent-store, precedent-index
// ============================================================================

//! ## Overview
//! The decision service owns the write path (validate, resolve agent,
//! quota, embed, idempotency, atomic trace transaction, usage, notify) and
//! the read paths (precedent check, semantic search, structured and
//! temporal queries, assessments, stats). Embedding and vector-index
//! failures degrade silently; enrichment failures drop the enrichment,
//! never the response.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use postgres::Transaction;
use precedent_broker::Notification;
use precedent_core::Agent;
use precedent_core::AgentId;
use precedent_core::AgentKey;
use precedent_core::Assessment;
use precedent_core::AssessmentId;
use precedent_core::AssessmentOutcome;
use precedent_core::AuditEvent;
use precedent_core::AuditSink;
use precedent_core::Decision;
use precedent_core::DecisionId;
use precedent_core::EmbeddingProvider;
use precedent_core::Organization;
use precedent_core::OrgId;
use precedent_core::Role;
use precedent_core::VectorQuery;
use precedent_core::validate;
use precedent_index::SemanticSearch;
use precedent_store::DecisionQuery;
use precedent_store::NewAlternative;
use precedent_store::NewEvidence;
use precedent_store::Reservation;
use precedent_store::Store;
use precedent_store::TraceParams;
use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::authz;
use crate::authz::GrantCache;
use crate::context::Caller;
use crate::error::ServiceError;
use crate::quota;
use crate::render;
use crate::render::CompactConflict;
use crate::render::CompactDecision;

/// Idempotency reservation lifetime.
const IDEMPOTENCY_TTL: time::Duration = time::Duration::minutes(5);
/// Endpoint label recorded in the idempotency ledger.
const TRACE_ENDPOINT: &str = "trace";
/// Citation threshold under which a precedent hint is offered.
const HINT_CITATION_CEILING: i64 = 5;
/// Default page size for read tools.
const DEFAULT_LIMIT: usize = 10;
/// Maximum page size for read tools.
const MAX_LIMIT: usize = 100;

// ============================================================================
// SECTION: Inputs and Outputs
// ============================================================================

/// Alternative supplied with a trace call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlternativeInput {
    /// Option label.
    pub label: String,
    /// Optional comparative score.
    #[serde(default)]
    pub score: Option<f64>,
    /// Whether this option was selected.
    #[serde(default)]
    pub selected: bool,
    /// Why the option was rejected.
    #[serde(default)]
    pub rejection_reason: Option<String>,
}

/// Evidence supplied with a trace call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvidenceInput {
    /// Source type in lowercase underscore format.
    pub source_type: String,
    /// Source URI with a validated scheme.
    #[serde(default)]
    pub source_uri: Option<String>,
    /// Evidence content.
    pub content: String,
    /// Caller-assigned relevance score.
    #[serde(default)]
    pub relevance_score: Option<f64>,
    /// Open-ended metadata.
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// Trace request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceInput {
    /// Acting agent; defaults to the caller's identity.
    #[serde(default)]
    pub agent_id: Option<String>,
    /// Decision category.
    pub decision_type: String,
    /// Decision outcome statement.
    pub outcome: String,
    /// Caller confidence; defaults to 0.5.
    #[serde(default)]
    pub confidence: Option<f64>,
    /// Free-form reasoning.
    #[serde(default)]
    pub reasoning: Option<String>,
    /// Alternatives considered.
    #[serde(default)]
    pub alternatives: Vec<AlternativeInput>,
    /// Supporting evidence.
    #[serde(default)]
    pub evidence: Vec<EvidenceInput>,
    /// Antecedent decision id; invalid values are stored as null.
    #[serde(default)]
    pub precedent_ref: Option<String>,
    /// Session correlation identifier.
    #[serde(default)]
    pub session_id: Option<String>,
    /// Tool reported by the caller.
    #[serde(default)]
    pub tool: Option<String>,
    /// Model reported by the caller.
    #[serde(default)]
    pub model: Option<String>,
    /// Task reported by the caller.
    #[serde(default)]
    pub task: Option<String>,
    /// Repository scope, usually inferred by the server.
    #[serde(default)]
    pub repo: Option<String>,
    /// External correlation identifier.
    #[serde(default)]
    pub trace_id: Option<String>,
    /// Idempotency key for safe retries.
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

/// Trace response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceOutput {
    /// Recorded decision id.
    pub decision_id: DecisionId,
    /// Run id covering the trace.
    pub run_id: precedent_core::RunId,
    /// Stable status label, `recorded`.
    pub status: String,
}

/// Check request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckInput {
    /// Decision category to look up (required).
    pub decision_type: String,
    /// Optional semantic query.
    #[serde(default)]
    pub query: Option<String>,
    /// Optional agent filter.
    #[serde(default)]
    pub agent_id: Option<String>,
    /// Optional repository filter.
    #[serde(default)]
    pub repo: Option<String>,
    /// Page size.
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Check response.
#[derive(Debug, Clone, Serialize)]
pub struct CheckOutput {
    /// Whether any precedent was found.
    pub has_precedent: bool,
    /// Matching decisions in compact form.
    pub decisions: Vec<CompactDecision>,
    /// Conflicts scoped to the decision type.
    pub conflicts: Vec<CompactConflict>,
    /// Deterministic one-to-three sentence summary.
    pub summary: String,
    /// True when an open conflict demands action.
    pub action_needed: bool,
    /// Suggested precedent to cite, when the caller can write.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precedent_ref_hint: Option<DecisionId>,
}

/// Semantic search request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchInput {
    /// Query text (required).
    pub query: String,
    /// Page size.
    #[serde(default)]
    pub limit: Option<usize>,
    /// Minimum confidence filter.
    #[serde(default)]
    pub confidence_min: Option<f64>,
    /// Decision type filter.
    #[serde(default)]
    pub decision_type: Option<String>,
    /// Agent filter.
    #[serde(default)]
    pub agent_id: Option<String>,
    /// Repository filter.
    #[serde(default)]
    pub repo: Option<String>,
}

/// One semantic search hit.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    /// Matching decision in compact form.
    pub decision: CompactDecision,
    /// Re-scored relevance.
    pub relevance: f64,
}

/// Structured query request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryInput {
    /// Decision type filter.
    #[serde(default)]
    pub decision_type: Option<String>,
    /// Agent filters.
    #[serde(default)]
    pub agent_ids: Vec<String>,
    /// Exact outcome match.
    #[serde(default)]
    pub outcome: Option<String>,
    /// Minimum confidence filter.
    #[serde(default)]
    pub confidence_min: Option<f64>,
    /// Session filter.
    #[serde(default)]
    pub session_id: Option<String>,
    /// Tool filter.
    #[serde(default)]
    pub tool: Option<String>,
    /// Model filter.
    #[serde(default)]
    pub model: Option<String>,
    /// Repository filter.
    #[serde(default)]
    pub repo: Option<String>,
    /// Lower time bound (RFC 3339).
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub since: Option<OffsetDateTime>,
    /// Upper time bound (RFC 3339).
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub until: Option<OffsetDateTime>,
    /// Bi-temporal as-of instant; when set, the query is temporal.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub as_of: Option<OffsetDateTime>,
    /// Page size.
    #[serde(default)]
    pub limit: Option<usize>,
    /// Page offset.
    #[serde(default)]
    pub offset: Option<usize>,
}

/// Structured query response.
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutput {
    /// Decisions visible to the caller.
    pub decisions: Vec<CompactDecision>,
    /// Total rows matching the filters before authorization.
    pub total: i64,
}

/// Assessment request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessInput {
    /// Assessed decision id.
    pub decision_id: String,
    /// Verdict.
    pub outcome: AssessmentOutcome,
    /// Free-form notes.
    #[serde(default)]
    pub notes: Option<String>,
}

/// Aggregate organization health.
#[derive(Debug, Clone, Serialize)]
pub struct StatsOutput {
    /// Current decisions.
    pub total_decisions: i64,
    /// Distinct decision types.
    pub decision_types: i64,
    /// Distinct tracing agents.
    pub active_agents: i64,
    /// Open or acknowledged conflicts.
    pub open_conflicts: i64,
    /// Decision-type distribution, most common first.
    pub type_distribution: Vec<TypeCount>,
    /// Decisions recorded this billing period.
    pub usage_this_period: i64,
    /// Plan decision limit (0 = unlimited).
    pub decision_limit: i64,
    /// Outbox rows waiting for index propagation.
    pub outbox_pending: i64,
    /// Outbox rows past the retry ceiling.
    pub outbox_dead_letters: i64,
    /// Whether the external vector index is healthy.
    pub index_healthy: bool,
}

/// One decision-type bucket in the stats distribution.
#[derive(Debug, Clone, Serialize)]
pub struct TypeCount {
    /// Decision type label.
    pub decision_type: String,
    /// Current decision count.
    pub count: i64,
}

// ============================================================================
// SECTION: Service
// ============================================================================

/// The decision trace engine.
pub struct DecisionService {
    /// Storage backend.
    store: Arc<Store>,
    /// Embedding provider.
    embedder: Arc<dyn EmbeddingProvider>,
    /// Vector-first semantic search.
    search: SemanticSearch,
    /// Per-record authorization cache.
    grant_cache: GrantCache,
    /// Audit sink for security-relevant events.
    audit: Arc<dyn AuditSink>,
    /// Outbox attempt ceiling, echoed into stats.
    outbox_max_attempts: i32,
}

impl DecisionService {
    /// Creates the service.
    #[must_use]
    pub fn new(
        store: Arc<Store>,
        embedder: Arc<dyn EmbeddingProvider>,
        search: SemanticSearch,
        audit: Arc<dyn AuditSink>,
        outbox_max_attempts: i32,
    ) -> Self {
        Self {
            store,
            embedder,
            search,
            grant_cache: GrantCache::new(),
            audit,
            outbox_max_attempts,
        }
    }

    /// Returns the storage backend.
    #[must_use]
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    // ------------------------------------------------------------------
    // Authentication
    // ------------------------------------------------------------------

    /// Authenticates an agent API key within an organization slug.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Auth`] for unknown orgs or keys.
    pub fn authenticate_api_key(
        &self,
        org_slug: &str,
        api_key: &str,
    ) -> Result<Caller, ServiceError> {
        let org = precedent_store::orgs::get_organization_by_slug(&self.store, org_slug)?
            .ok_or_else(|| ServiceError::Auth("unknown organization".to_string()))?;
        let hash = crate::signup::hash_api_key(api_key);
        let scope = self.store.resolve(org.id)?;
        let mut conn = scope.connection()?;
        let mut tx = scope.begin(&mut conn)?;
        let agent = precedent_store::agents::get_agent_by_api_key_hash(&mut tx, org.id, &hash)?
            .ok_or_else(|| ServiceError::Auth("invalid api key".to_string()))?;
        tx.commit().map_err(|err| ServiceError::internal("authenticate", err))?;
        Ok(Caller {
            org_id: org.id,
            agent_id: agent.id,
            agent_key: agent.key,
            role: agent.role,
            tags: agent.tags,
        })
    }

    /// Rebuilds a caller from verified token claims.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Auth`] when the agent no longer exists.
    pub fn resolve_caller(
        &self,
        org_id: OrgId,
        agent_key: &AgentKey,
    ) -> Result<Caller, ServiceError> {
        let scope = self.store.resolve(org_id)?;
        let mut conn = scope.connection()?;
        let mut tx = scope.begin(&mut conn)?;
        let agent = precedent_store::agents::get_agent_by_key(&mut tx, org_id, agent_key)?
            .ok_or_else(|| ServiceError::Auth("agent no longer exists".to_string()))?;
        tx.commit().map_err(|err| ServiceError::internal("resolve_caller", err))?;
        Ok(Caller {
            org_id,
            agent_id: agent.id,
            agent_key: agent.key,
            role: agent.role,
            tags: agent.tags,
        })
    }

    // ------------------------------------------------------------------
    // Trace
    // ------------------------------------------------------------------

    /// Records a decision trace.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] per the boundary taxonomy; embedding and
    /// index degradation never fail the call.
    pub fn trace(&self, caller: &Caller, input: &TraceInput) -> Result<TraceOutput, ServiceError> {
        authz::require_role(caller, Role::Agent)?;
        let agent_key = input
            .agent_id
            .as_deref()
            .map_or_else(|| caller.agent_key.clone(), AgentKey::new);
        authz::require_self_or_admin(caller, &agent_key)?;

        validate::agent_key(agent_key.as_str())?;
        validate::decision_type(&input.decision_type)?;
        validate::outcome(&input.outcome)?;
        let confidence = input.confidence.unwrap_or(0.5);
        validate::confidence(confidence)?;
        if let Some(reasoning) = &input.reasoning {
            validate::reasoning(reasoning)?;
        }
        for evidence in &input.evidence {
            validate::source_type(&evidence.source_type)?;
            validate::evidence_content(&evidence.content)?;
            if let Some(uri) = &evidence.source_uri {
                validate::source_uri(uri)?;
            }
        }

        let org = self.load_org(caller.org_id)?;
        if !org.email_verified {
            return Err(ServiceError::Forbidden(
                "organization email is not verified".to_string(),
            ));
        }
        let now = OffsetDateTime::now_utc();
        quota::check_decision_quota(&self.store, &org, now)?;

        let scope = self.store.resolve(caller.org_id)?;
        self.resolve_or_register_agent(&scope, caller, &org, &agent_key, now)?;

        let embedding = self.embed_decision(&input.decision_type, &input.outcome, input.reasoning.as_deref());
        let precedent_ref = self.resolve_precedent_ref(&scope, caller.org_id, input.precedent_ref.as_deref())?;

        let payload_hash = idempotency_hash(&agent_key, input, precedent_ref);
        if let Some(key) = &input.idempotency_key {
            match self.begin_idempotency(&scope, caller.org_id, &agent_key, key, &payload_hash, now)? {
                Reservation::Owned => {}
                Reservation::Replay {
                    response_body,
                } => {
                    return serde_json::from_str(&response_body)
                        .map_err(|err| ServiceError::internal("idempotency_replay", err));
                }
                Reservation::Mismatch => return Err(ServiceError::IdempotencyMismatch),
                Reservation::InProgress => return Err(ServiceError::IdempotencyInProgress),
            }
        }

        let params = TraceParams {
            org_id: caller.org_id,
            agent: agent_key.clone(),
            trace_id: input.trace_id.clone(),
            parent_run_id: None,
            decision_type: input.decision_type.clone(),
            outcome: input.outcome.clone(),
            confidence,
            reasoning: input.reasoning.clone().filter(|text| !text.is_empty()),
            quality_score: quality_score(confidence, input),
            content_hash: precedent_core::hashing::decision_content_hash(
                &input.decision_type,
                &input.outcome,
                input.reasoning.as_deref(),
            ),
            embedding,
            agent_context: agent_context(input),
            session_id: input.session_id.clone(),
            precedent_ref,
            alternatives: input
                .alternatives
                .iter()
                .map(|alternative| NewAlternative {
                    label: alternative.label.clone(),
                    score: alternative.score,
                    selected: alternative.selected,
                    rejection_reason: alternative.rejection_reason.clone(),
                })
                .collect(),
            evidence: input
                .evidence
                .iter()
                .map(|evidence| NewEvidence {
                    source_type: evidence.source_type.clone(),
                    source_uri: evidence.source_uri.clone(),
                    content: evidence.content.clone(),
                    relevance_score: evidence.relevance_score,
                    metadata: evidence.metadata.clone().unwrap_or_else(|| serde_json::json!({})),
                })
                .collect(),
            now,
        };

        let traced = self.run_trace_tx(&scope, &params);
        let (run, decision) = match traced {
            Ok(result) => result,
            Err(err) => {
                if let Some(key) = &input.idempotency_key {
                    self.clear_idempotency_best_effort(&scope, caller.org_id, &agent_key, key);
                }
                return Err(err);
            }
        };

        let output = TraceOutput {
            decision_id: decision.id,
            run_id: run.id,
            status: "recorded".to_string(),
        };
        if let Some(key) = &input.idempotency_key {
            self.complete_idempotency(&scope, caller.org_id, &agent_key, key, &output);
        }
        quota::increment_usage_best_effort(&self.store, &org, now);
        self.audit.record(&AuditEvent {
            event: "trace_recorded",
            org_id: caller.org_id,
            agent: Some(agent_key),
            decision_id: Some(decision.id),
            detail: serde_json::json!({ "decision_type": input.decision_type }),
        });
        Ok(output)
    }

    /// Runs the atomic trace transaction, publishing the notification in
    /// the same transaction so it is delivered exactly on commit.
    fn run_trace_tx(
        &self,
        scope: &precedent_store::TenantScope,
        params: &TraceParams,
    ) -> Result<(precedent_core::AgentRun, Decision), ServiceError> {
        let mut conn = scope.connection()?;
        let mut tx = scope.begin(&mut conn)?;
        let (run, decision) = precedent_store::decisions::create_trace(&mut tx, params)?;
        precedent_broker::publish(&mut tx, &Notification {
            decision_id: decision.id,
            agent_id: decision.agent_key.clone(),
            org_id: decision.org_id,
            outcome: decision.outcome.clone(),
            decision_type: decision.decision_type.clone(),
        })?;
        tx.commit().map_err(|err| ServiceError::internal("trace_commit", err))?;
        Ok((run, decision))
    }

    /// Revises a decision: the prior row closes and a successor carrying a
    /// fresh id (linked through `precedent_ref`) becomes current.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] per the boundary taxonomy; an explicit
    /// `precedent_ref` naming the revised decision is rejected.
    pub fn revise(
        &self,
        caller: &Caller,
        prior_id_raw: &str,
        input: &TraceInput,
    ) -> Result<TraceOutput, ServiceError> {
        authz::require_role(caller, Role::Agent)?;
        let prior_id =
            DecisionId::parse(prior_id_raw).map_err(|_| ServiceError::NotFound("decision"))?;
        if input.precedent_ref.as_deref() == Some(prior_id_raw) {
            return Err(ServiceError::Validation(precedent_core::ValidationError::Format {
                field: "precedent_ref",
                reason: "a revision may not cite the decision it replaces",
            }));
        }
        let agent_key = input
            .agent_id
            .as_deref()
            .map_or_else(|| caller.agent_key.clone(), AgentKey::new);
        authz::require_self_or_admin(caller, &agent_key)?;
        validate::decision_type(&input.decision_type)?;
        validate::outcome(&input.outcome)?;
        let confidence = input.confidence.unwrap_or(0.5);
        validate::confidence(confidence)?;

        let org = self.load_org(caller.org_id)?;
        let now = OffsetDateTime::now_utc();
        quota::check_decision_quota(&self.store, &org, now)?;
        let scope = self.store.resolve(caller.org_id)?;
        let embedding =
            self.embed_decision(&input.decision_type, &input.outcome, input.reasoning.as_deref());

        let params = TraceParams {
            org_id: caller.org_id,
            agent: agent_key.clone(),
            trace_id: input.trace_id.clone(),
            parent_run_id: None,
            decision_type: input.decision_type.clone(),
            outcome: input.outcome.clone(),
            confidence,
            reasoning: input.reasoning.clone().filter(|text| !text.is_empty()),
            quality_score: quality_score(confidence, input),
            content_hash: precedent_core::hashing::decision_content_hash(
                &input.decision_type,
                &input.outcome,
                input.reasoning.as_deref(),
            ),
            embedding,
            agent_context: agent_context(input),
            session_id: input.session_id.clone(),
            precedent_ref: None,
            alternatives: Vec::new(),
            evidence: Vec::new(),
            now,
        };
        let mut conn = scope.connection()?;
        let mut tx = scope.begin(&mut conn)?;
        let (run, decision) =
            precedent_store::decisions::revise_decision(&mut tx, prior_id, &params)?;
        precedent_broker::publish(&mut tx, &Notification {
            decision_id: decision.id,
            agent_id: decision.agent_key.clone(),
            org_id: decision.org_id,
            outcome: decision.outcome.clone(),
            decision_type: decision.decision_type.clone(),
        })?;
        tx.commit().map_err(|err| ServiceError::internal("revise_commit", err))?;
        quota::increment_usage_best_effort(&self.store, &org, now);
        self.audit.record(&AuditEvent {
            event: "decision_revised",
            org_id: caller.org_id,
            agent: Some(agent_key),
            decision_id: Some(decision.id),
            detail: serde_json::json!({ "prior": prior_id }),
        });
        Ok(TraceOutput {
            decision_id: decision.id,
            run_id: run.id,
            status: "revised".to_string(),
        })
    }

    /// Deletes every decision in the caller's organization (data removal).
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Forbidden`] below org-owner privilege.
    pub fn purge_decisions(&self, caller: &Caller) -> Result<i64, ServiceError> {
        authz::require_role(caller, Role::OrgOwner)?;
        let now = OffsetDateTime::now_utc();
        let scope = self.store.resolve(caller.org_id)?;
        let mut conn = scope.connection()?;
        let mut tx = scope.begin(&mut conn)?;
        let deleted = precedent_store::decisions::delete_all_decisions(&mut tx, caller.org_id, now)?;
        precedent_store::decisions::record_audit(
            &mut tx,
            caller.org_id,
            "decisions_purged",
            Some(&caller.agent_key),
            None,
            &serde_json::json!({ "deleted": deleted }),
            now,
        )?;
        tx.commit().map_err(|err| ServiceError::internal("purge_commit", err))?;
        Ok(deleted)
    }

    // ------------------------------------------------------------------
    // Check
    // ------------------------------------------------------------------

    /// Looks up precedents and conflicts before a decision is made.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] on validation or storage failure.
    pub fn check(&self, caller: &Caller, input: &CheckInput) -> Result<CheckOutput, ServiceError> {
        validate::decision_type(&input.decision_type)?;
        let limit = clamp_limit(input.limit);
        let now = OffsetDateTime::now_utc();
        let scope = self.store.resolve(caller.org_id)?;
        let mut conn = scope.connection()?;
        let mut tx = scope.begin(&mut conn)?;

        let filters = DecisionQuery {
            decision_type: Some(input.decision_type.clone()),
            agent_keys: input.agent_id.iter().cloned().collect(),
            repo: input.repo.clone(),
            limit: i64::try_from(limit).unwrap_or(10),
            ..DecisionQuery::default()
        };
        let mut decisions = self.find_candidates(&mut tx, caller, &filters, input, limit, now)?;
        if let Some(repo) = &input.repo {
            // The vector index carries no repo payload field, so the repo
            // filter is re-applied after hydration.
            decisions.retain(|decision| repo_matches(decision, repo));
        }
        decisions = authz::filter_readable(&mut tx, &self.grant_cache, caller, decisions, now)?;
        self.enrich(&mut tx, caller.org_id, &mut decisions);

        let (conflicts, corroborations) =
            self.load_conflicts_for_check(&mut tx, caller.org_id, &input.decision_type);

        let summary = render::check_summary(&render::SummaryInputs {
            decision_type: &input.decision_type,
            decisions: &decisions,
            conflicts: &conflicts,
            corroborations: &corroborations,
        });
        let action_needed = render::action_needed(&conflicts);
        let precedent_ref_hint = if caller.at_least(Role::Agent) {
            decisions
                .iter()
                .find(|decision| {
                    decision
                        .signals
                        .as_ref()
                        .is_none_or(|signals| signals.precedent_citation_count < HINT_CITATION_CEILING)
                })
                .map(|decision| decision.id)
        } else {
            None
        };

        tx.commit().map_err(|err| ServiceError::internal("check_commit", err))?;
        Ok(CheckOutput {
            has_precedent: !decisions.is_empty(),
            decisions: decisions.iter().map(render::compact_decision).collect(),
            conflicts: crate::conflicts::compact_conflicts(&conflicts, &corroborations),
            summary,
            action_needed,
            precedent_ref_hint,
        })
    }

    /// Selects candidates: semantic when a query is present, structured
    /// otherwise, with text search as the last resort.
    fn find_candidates(
        &self,
        tx: &mut Transaction<'_>,
        caller: &Caller,
        filters: &DecisionQuery,
        input: &CheckInput,
        limit: usize,
        now: OffsetDateTime,
    ) -> Result<Vec<Decision>, ServiceError> {
        let Some(query_text) = input.query.as_deref().filter(|text| !text.trim().is_empty())
        else {
            return Ok(precedent_store::decisions::query_decisions(tx, caller.org_id, filters)?
                .decisions);
        };
        match self.embedder.embed(query_text) {
            Ok(vector) => {
                let vector_query = VectorQuery {
                    org_id: caller.org_id,
                    vector,
                    decision_type: filters.decision_type.clone(),
                    agent_key: input.agent_id.as_deref().map(AgentKey::new),
                    confidence_min: None,
                    since: None,
                    limit,
                };
                let hits = self.search.search(tx, &vector_query, filters, limit, now)?;
                Ok(hits.into_iter().map(|(decision, _)| decision).collect())
            }
            Err(err) => {
                tracing::warn!(error = %err, "embedding unavailable, using text search");
                Ok(precedent_store::decisions::search_by_text(
                    tx,
                    caller.org_id,
                    query_text,
                    filters,
                    filters.limit,
                )?)
            }
        }
    }

    /// Attaches consensus counts, outcome signals, and assessment
    /// summaries; each batch is best-effort.
    fn enrich(&self, tx: &mut Transaction<'_>, org_id: OrgId, decisions: &mut [Decision]) {
        let ids: Vec<DecisionId> = decisions.iter().map(|decision| decision.id).collect();
        match precedent_store::decisions::consensus_counts(tx, org_id, &ids) {
            Ok(counts) => {
                for decision in decisions.iter_mut() {
                    if let Some((agreement, conflict)) = counts.get(&decision.id) {
                        decision.agreement_count = *agreement;
                        decision.conflict_count = *conflict;
                    }
                }
            }
            Err(err) => tracing::warn!(error = %err, "consensus counts unavailable"),
        }
        match precedent_store::decisions::outcome_signals(tx, org_id, &ids) {
            Ok(signals) => {
                for decision in decisions.iter_mut() {
                    decision.signals = signals.get(&decision.id).copied();
                }
            }
            Err(err) => tracing::warn!(error = %err, "outcome signals unavailable"),
        }
        match precedent_store::assessments::summaries(tx, org_id, &ids) {
            Ok(summaries) => {
                for decision in decisions.iter_mut() {
                    decision.assessment = summaries.get(&decision.id).copied();
                }
            }
            Err(err) => tracing::warn!(error = %err, "assessment summaries unavailable"),
        }
    }

    /// Loads open, acknowledged, and resolved conflicts for a type; the
    /// lookup is best-effort and returns empty on failure.
    fn load_conflicts_for_check(
        &self,
        tx: &mut Transaction<'_>,
        org_id: OrgId,
        decision_type: &str,
    ) -> (Vec<precedent_core::DecisionConflict>, Vec<(i64, i64)>) {
        let mut filter = precedent_store::ConflictFilter {
            decision_type: Some(decision_type.to_string()),
            limit: 20,
            ..precedent_store::ConflictFilter::default()
        };
        let mut conflicts =
            match crate::conflicts::list_with_corroboration(tx, org_id, &filter) {
                Ok(loaded) => loaded,
                Err(err) => {
                    tracing::warn!(error = %err, "conflict lookup unavailable");
                    return (Vec::new(), Vec::new());
                }
            };
        filter.status = Some(precedent_core::ConflictStatus::Resolved);
        if let Ok((resolved, corroborations)) =
            crate::conflicts::list_with_corroboration(tx, org_id, &filter)
        {
            conflicts.0.extend(resolved);
            conflicts.1.extend(corroborations);
        }
        conflicts
    }

    // ------------------------------------------------------------------
    // Search / Query / Recent
    // ------------------------------------------------------------------

    /// Semantic search over decisions.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] on validation or storage failure.
    pub fn search(
        &self,
        caller: &Caller,
        input: &SearchInput,
    ) -> Result<Vec<SearchHit>, ServiceError> {
        if input.query.trim().is_empty() {
            return Err(ServiceError::Validation(precedent_core::ValidationError::Empty {
                field: "query",
            }));
        }
        let limit = clamp_limit(input.limit);
        let now = OffsetDateTime::now_utc();
        let scope = self.store.resolve(caller.org_id)?;
        let mut conn = scope.connection()?;
        let mut tx = scope.begin(&mut conn)?;
        let filters = DecisionQuery {
            decision_type: input.decision_type.clone(),
            agent_keys: input.agent_id.iter().cloned().collect(),
            confidence_min: input.confidence_min,
            repo: input.repo.clone(),
            limit: i64::try_from(limit).unwrap_or(10),
            ..DecisionQuery::default()
        };
        let scored = match self.embedder.embed(&input.query) {
            Ok(vector) => {
                let vector_query = VectorQuery {
                    org_id: caller.org_id,
                    vector,
                    decision_type: input.decision_type.clone(),
                    agent_key: input.agent_id.as_deref().map(AgentKey::new),
                    confidence_min: input.confidence_min,
                    since: None,
                    limit,
                };
                self.search.search(&mut tx, &vector_query, &filters, limit, now)?
            }
            Err(err) => {
                tracing::warn!(error = %err, "embedding unavailable, using text search");
                precedent_store::decisions::search_by_text(
                    &mut tx,
                    caller.org_id,
                    &input.query,
                    &filters,
                    filters.limit,
                )?
                .into_iter()
                .map(|decision| (decision, 0.0))
                .collect()
            }
        };
        // Authorization filters by decision; relevances are re-attached by
        // id so filtered-out records cannot shift scores onto neighbors.
        let relevance_by_id: std::collections::HashMap<DecisionId, f64> =
            scored.iter().map(|(decision, relevance)| (decision.id, *relevance)).collect();
        let mut candidates: Vec<Decision> =
            scored.into_iter().map(|(decision, _)| decision).collect();
        if let Some(repo) = &input.repo {
            candidates.retain(|decision| repo_matches(decision, repo));
        }
        let mut decisions =
            authz::filter_readable(&mut tx, &self.grant_cache, caller, candidates, now)?;
        self.enrich(&mut tx, caller.org_id, &mut decisions);
        tx.commit().map_err(|err| ServiceError::internal("search_commit", err))?;
        Ok(decisions
            .iter()
            .map(|decision| SearchHit {
                decision: render::compact_decision(decision),
                relevance: relevance_by_id.get(&decision.id).copied().unwrap_or(0.0),
            })
            .collect())
    }

    /// Structured (and bi-temporal) decision query.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] on storage failure.
    pub fn query(&self, caller: &Caller, input: &QueryInput) -> Result<QueryOutput, ServiceError> {
        let limit = clamp_limit(input.limit);
        let now = OffsetDateTime::now_utc();
        let scope = self.store.resolve(caller.org_id)?;
        let mut conn = scope.connection()?;
        let mut tx = scope.begin(&mut conn)?;
        let filters = DecisionQuery {
            decision_type: input.decision_type.clone(),
            agent_keys: input.agent_ids.clone(),
            outcome: input.outcome.clone(),
            confidence_min: input.confidence_min,
            session_id: input.session_id.clone(),
            tool: input.tool.clone(),
            model: input.model.clone(),
            repo: input.repo.clone(),
            since: input.since,
            until: input.until,
            include_superseded: false,
            limit: i64::try_from(limit).unwrap_or(10),
            offset: i64::try_from(input.offset.unwrap_or(0)).unwrap_or(0),
        };
        let page = match input.as_of {
            Some(as_of) => precedent_store::decisions::query_decisions_temporal(
                &mut tx,
                caller.org_id,
                as_of,
                &filters,
            )?,
            None => precedent_store::decisions::query_decisions(&mut tx, caller.org_id, &filters)?,
        };
        let mut decisions =
            authz::filter_readable(&mut tx, &self.grant_cache, caller, page.decisions, now)?;
        self.enrich(&mut tx, caller.org_id, &mut decisions);
        tx.commit().map_err(|err| ServiceError::internal("query_commit", err))?;
        Ok(QueryOutput {
            decisions: decisions.iter().map(render::compact_decision).collect(),
            total: page.total,
        })
    }

    /// Timeline view: recent decisions under the standard filters.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] on storage failure.
    pub fn recent(
        &self,
        caller: &Caller,
        input: &QueryInput,
    ) -> Result<Vec<CompactDecision>, ServiceError> {
        Ok(self.query(caller, input)?.decisions)
    }

    // ------------------------------------------------------------------
    // Assess
    // ------------------------------------------------------------------

    /// Records a correctness verdict against a decision.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotFound`] when the decision is missing.
    pub fn assess(&self, caller: &Caller, input: &AssessInput) -> Result<Assessment, ServiceError> {
        authz::require_role(caller, Role::Agent)?;
        let decision_id = DecisionId::parse(&input.decision_id)
            .map_err(|_| ServiceError::NotFound("decision"))?;
        let now = OffsetDateTime::now_utc();
        let scope = self.store.resolve(caller.org_id)?;
        let mut conn = scope.connection()?;
        let mut tx = scope.begin(&mut conn)?;
        let decision = precedent_store::decisions::get_decision(&mut tx, caller.org_id, decision_id)?
            .ok_or(ServiceError::NotFound("decision"))?;
        let assessment = Assessment {
            id: AssessmentId::generate(),
            decision_id: decision.id,
            org_id: caller.org_id,
            assessor: caller.agent_key.clone(),
            outcome: input.outcome,
            notes: input.notes.clone().filter(|notes| !notes.is_empty()),
            created_at: now,
        };
        precedent_store::assessments::insert_assessment(&mut tx, &assessment)?;
        precedent_store::decisions::record_audit(
            &mut tx,
            caller.org_id,
            "decision_assessed",
            Some(&caller.agent_key),
            Some(decision.id),
            &serde_json::json!({ "outcome": input.outcome.as_str() }),
            now,
        )?;
        tx.commit().map_err(|err| ServiceError::internal("assess_commit", err))?;
        Ok(assessment)
    }

    // ------------------------------------------------------------------
    // Stats
    // ------------------------------------------------------------------

    /// Aggregate organization health.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] on storage failure.
    pub fn stats(&self, caller: &Caller) -> Result<StatsOutput, ServiceError> {
        let now = OffsetDateTime::now_utc();
        let org = self.load_org(caller.org_id)?;
        let scope = self.store.resolve(caller.org_id)?;
        let mut conn = scope.connection()?;
        let mut tx = scope.begin(&mut conn)?;
        let (total_decisions, decision_types, active_agents) =
            precedent_store::decisions::stats_counts(&mut tx, caller.org_id)?;
        let distribution =
            precedent_store::decisions::type_distribution(&mut tx, caller.org_id, 10)?;
        let open_conflicts =
            precedent_store::conflicts::open_conflict_count(&mut tx, caller.org_id, None)?;
        tx.commit().map_err(|err| ServiceError::internal("stats_commit", err))?;

        let period = precedent_store::orgs::period_label(now);
        let usage_this_period =
            precedent_store::orgs::decision_count(&self.store, caller.org_id, &period)?;
        let mut control = self.store.control_conn()?;
        let outbox_pending = precedent_store::outbox::pending_for_org(&mut control, caller.org_id)?;
        let outbox_dead_letters =
            precedent_store::outbox::dead_letter_count(&mut control, self.outbox_max_attempts)?;
        Ok(StatsOutput {
            total_decisions,
            decision_types,
            active_agents,
            open_conflicts,
            type_distribution: distribution
                .into_iter()
                .map(|(decision_type, count)| TypeCount {
                    decision_type,
                    count,
                })
                .collect(),
            usage_this_period,
            decision_limit: org.decision_limit,
            outbox_pending,
            outbox_dead_letters,
            index_healthy: self.search.index_available(),
        })
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Loads the caller's organization.
    fn load_org(&self, org_id: OrgId) -> Result<Organization, ServiceError> {
        precedent_store::orgs::get_organization(&self.store, org_id)?
            .ok_or(ServiceError::NotFound("organization"))
    }

    /// Resolves the tracing agent, auto-registering under an admin caller.
    fn resolve_or_register_agent(
        &self,
        scope: &precedent_store::TenantScope,
        caller: &Caller,
        org: &Organization,
        agent_key: &AgentKey,
        now: OffsetDateTime,
    ) -> Result<(), ServiceError> {
        let mut conn = scope.connection()?;
        let mut tx = scope.begin(&mut conn)?;
        if precedent_store::agents::get_agent_by_key(&mut tx, caller.org_id, agent_key)?.is_some() {
            return Ok(());
        }
        if !caller.at_least(Role::Admin) {
            return Err(ServiceError::NotFound("agent"));
        }
        quota::check_agent_quota(&mut tx, org)?;
        let agent = Agent {
            id: AgentId::generate(),
            key: agent_key.clone(),
            org_id: caller.org_id,
            name: agent_key.to_string(),
            role: Role::Agent,
            api_key_hash: None,
            tags: Vec::new(),
            metadata: serde_json::json!({ "auto_registered": true }),
            created_at: now,
        };
        precedent_store::agents::insert_agent(&mut tx, &agent)?;
        precedent_store::decisions::record_audit(
            &mut tx,
            caller.org_id,
            "agent_auto_registered",
            Some(&caller.agent_key),
            None,
            &serde_json::json!({ "agent": agent_key.as_str() }),
            now,
        )?;
        tx.commit().map_err(|err| ServiceError::internal("register_agent", err))?;
        Ok(())
    }

    /// Embeds the decision text; failures degrade to no embedding.
    fn embed_decision(
        &self,
        decision_type: &str,
        outcome: &str,
        reasoning: Option<&str>,
    ) -> Option<Vec<f32>> {
        let text = embed_text(decision_type, outcome, reasoning);
        match self.embedder.embed(&text) {
            Ok(vector) => Some(vector),
            Err(err) => {
                tracing::warn!(error = %err, "embedding failed, recording without vector");
                None
            }
        }
    }

    /// Resolves a raw precedent reference; anything unusable becomes null
    /// with a warning rather than failing the trace.
    fn resolve_precedent_ref(
        &self,
        scope: &precedent_store::TenantScope,
        org_id: OrgId,
        raw: Option<&str>,
    ) -> Result<Option<DecisionId>, ServiceError> {
        let Some(raw) = raw.filter(|raw| !raw.trim().is_empty()) else {
            return Ok(None);
        };
        let Ok(id) = DecisionId::parse(raw) else {
            tracing::warn!(value = raw, "precedent_ref is not a uuid, storing null");
            return Ok(None);
        };
        let mut conn = scope.connection()?;
        let mut tx = scope.begin(&mut conn)?;
        let referenced = precedent_store::decisions::get_decision(&mut tx, org_id, id)?;
        tx.commit().map_err(|err| ServiceError::internal("precedent_ref", err))?;
        match referenced {
            Some(_) => Ok(Some(id)),
            None => {
                tracing::warn!(value = raw, "precedent_ref does not resolve, storing null");
                Ok(None)
            }
        }
    }

    /// Reserves an idempotency key in its own transaction.
    fn begin_idempotency(
        &self,
        scope: &precedent_store::TenantScope,
        org_id: OrgId,
        agent: &AgentKey,
        key: &str,
        payload_hash: &str,
        now: OffsetDateTime,
    ) -> Result<Reservation, ServiceError> {
        let mut conn = scope.connection()?;
        let mut tx = scope.begin(&mut conn)?;
        let reservation = precedent_store::idempotency::begin(
            &mut tx,
            org_id,
            agent,
            TRACE_ENDPOINT,
            key,
            payload_hash,
            now,
            IDEMPOTENCY_TTL,
        )?;
        tx.commit().map_err(|err| ServiceError::internal("idempotency_begin", err))?;
        Ok(reservation)
    }

    /// Stores the response body; a failed completion clears the
    /// reservation so retries are not blocked for the full TTL.
    fn complete_idempotency(
        &self,
        scope: &precedent_store::TenantScope,
        org_id: OrgId,
        agent: &AgentKey,
        key: &str,
        output: &TraceOutput,
    ) {
        let body = match serde_json::to_string(output) {
            Ok(body) => body,
            Err(err) => {
                tracing::warn!(error = %err, "idempotency response serialization failed");
                self.clear_idempotency_best_effort(scope, org_id, agent, key);
                return;
            }
        };
        let completed = scope.connection().map_err(ServiceError::from).and_then(|mut conn| {
            let mut tx = scope.begin(&mut conn)?;
            precedent_store::idempotency::complete(&mut tx, org_id, agent, TRACE_ENDPOINT, key, &body)?;
            tx.commit().map_err(|err| ServiceError::internal("idempotency_complete", err))
        });
        if let Err(err) = completed {
            tracing::warn!(error = %err, "idempotency completion failed, clearing reservation");
            self.clear_idempotency_best_effort(scope, org_id, agent, key);
        }
    }

    /// Clears an in-progress reservation, swallowing errors.
    fn clear_idempotency_best_effort(
        &self,
        scope: &precedent_store::TenantScope,
        org_id: OrgId,
        agent: &AgentKey,
        key: &str,
    ) {
        let cleared = scope.connection().map_err(ServiceError::from).and_then(|mut conn| {
            let mut tx = scope.begin(&mut conn)?;
            precedent_store::idempotency::clear_in_progress(&mut tx, org_id, agent, TRACE_ENDPOINT, key)?;
            tx.commit().map_err(|err| ServiceError::internal("idempotency_clear", err))
        });
        if let Err(err) = cleared {
            tracing::warn!(error = %err, "idempotency reservation could not be cleared");
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds the embedding input text for a decision.
#[must_use]
pub fn embed_text(decision_type: &str, outcome: &str, reasoning: Option<&str>) -> String {
    match reasoning.filter(|text| !text.trim().is_empty()) {
        Some(reasoning) => format!("{decision_type}: {outcome} [{reasoning}]"),
        None => format!("{decision_type}: {outcome}"),
    }
}

/// Derives the quality score from confidence and supplied detail.
#[must_use]
pub fn quality_score(confidence: f64, input: &TraceInput) -> f64 {
    let mut score = 0.3f64.mul_add(confidence, 0.3);
    if input.reasoning.as_deref().is_some_and(|text| !text.trim().is_empty()) {
        score += 0.15;
    }
    if !input.evidence.is_empty() {
        score += 0.15;
    }
    if !input.alternatives.is_empty() {
        score += 0.1;
    }
    score.clamp(0.0, 1.0)
}

/// Builds the namespaced agent context object.
fn agent_context(input: &TraceInput) -> serde_json::Value {
    let mut context = serde_json::Map::new();
    if let Some(tool) = &input.tool {
        context.insert("client.tool".to_string(), serde_json::json!(tool));
    }
    if let Some(model) = &input.model {
        context.insert("client.model".to_string(), serde_json::json!(model));
    }
    if let Some(task) = &input.task {
        context.insert("client.task".to_string(), serde_json::json!(task));
    }
    if let Some(repo) = &input.repo {
        context.insert("server.repo".to_string(), serde_json::json!(repo));
    }
    serde_json::Value::Object(context)
}

/// Computes the idempotency payload hash for a trace input.
fn idempotency_hash(
    agent: &AgentKey,
    input: &TraceInput,
    precedent_ref: Option<DecisionId>,
) -> String {
    let evidence: Vec<serde_json::Value> = input
        .evidence
        .iter()
        .map(|evidence| serde_json::json!({ "t": evidence.source_type, "c": evidence.content }))
        .collect();
    let alternatives: Vec<serde_json::Value> = input
        .alternatives
        .iter()
        .map(|alternative| serde_json::json!({ "l": alternative.label, "s": alternative.selected }))
        .collect();
    let precedent = precedent_ref.map(|id| id.to_string());
    precedent_core::hashing::idempotency_payload_hash(
        agent.as_str(),
        &input.decision_type,
        &input.outcome,
        input.confidence.unwrap_or(0.5),
        input.reasoning.as_deref(),
        &evidence,
        &alternatives,
        precedent.as_deref(),
    )
}

/// Clamps a requested limit into the supported page range.
fn clamp_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

/// Returns true when the decision's context names the repository.
fn repo_matches(decision: &Decision, repo: &str) -> bool {
    ["server.repo", "client.repo"].iter().any(|key| {
        decision.agent_context.get(key).and_then(serde_json::Value::as_str) == Some(repo)
    })
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::AlternativeInput;
    use super::EvidenceInput;
    use super::TraceInput;
    use super::clamp_limit;
    use super::embed_text;
    use super::quality_score;

    #[test]
    fn embed_text_brackets_reasoning() {
        assert_eq!(
            embed_text("architecture", "chose Redis", Some("benchmarks won")),
            "architecture: chose Redis [benchmarks won]"
        );
        assert_eq!(embed_text("architecture", "chose Redis", None), "architecture: chose Redis");
        assert_eq!(embed_text("architecture", "chose Redis", Some("  ")), "architecture: chose Redis");
    }

    #[test]
    fn quality_score_rewards_detail_and_stays_bounded() {
        let bare = TraceInput {
            decision_type: "architecture".to_string(),
            outcome: "chose Redis".to_string(),
            ..TraceInput::default()
        };
        let rich = TraceInput {
            reasoning: Some("benchmarks won".to_string()),
            evidence: vec![EvidenceInput {
                source_type: "benchmark".to_string(),
                content: "p99 latency".to_string(),
                ..EvidenceInput::default()
            }],
            alternatives: vec![AlternativeInput {
                label: "in-memory cache".to_string(),
                ..AlternativeInput::default()
            }],
            ..bare.clone()
        };
        assert!(quality_score(0.9, &rich) > quality_score(0.9, &bare));
        assert!(quality_score(1.0, &rich) <= 1.0);
        assert!(quality_score(0.0, &bare) >= 0.0);
    }

    #[test]
    fn limits_are_clamped_to_the_supported_range() {
        assert_eq!(clamp_limit(None), 10);
        assert_eq!(clamp_limit(Some(0)), 1);
        assert_eq!(clamp_limit(Some(1_000)), 100);
        assert_eq!(clamp_limit(Some(25)), 25);
    }

    #[test]
    fn repo_filter_checks_both_context_namespaces() {
        let mut decision = precedent_core::Decision {
            id: precedent_core::DecisionId::generate(),
            run_id: precedent_core::RunId::generate(),
            agent_key: precedent_core::AgentKey::new("planner"),
            org_id: precedent_core::OrgId::generate(),
            decision_type: "architecture".to_string(),
            outcome: "chose Redis".to_string(),
            confidence: 0.8,
            reasoning: None,
            quality_score: 0.5,
            content_hash: String::new(),
            embedding: None,
            agent_context: serde_json::json!({ "server.repo": "precedent" }),
            session_id: None,
            precedent_ref: None,
            valid_from: time::OffsetDateTime::UNIX_EPOCH,
            valid_to: None,
            transaction_time: time::OffsetDateTime::UNIX_EPOCH,
            created_at: time::OffsetDateTime::UNIX_EPOCH,
            agreement_count: 0,
            conflict_count: 0,
            signals: None,
            assessment: None,
        };
        assert!(super::repo_matches(&decision, "precedent"));
        assert!(!super::repo_matches(&decision, "other"));
        decision.agent_context = serde_json::json!({ "client.repo": "precedent" });
        assert!(super::repo_matches(&decision, "precedent"));
    }
}
