// precedent-store/src/migrations.rs
// ============================================================================
// Module: Migrations
// Description: Forward-only numbered migrations for control plane and tenants.
// Purpose: Keep shared and per-tenant schemas reproducible and idempotent.
// Dependencies: postgres
// ============================================================================

//! ## Overview
//! Two migration sequences exist: the control plane (organizations, usage,
//! verifications, outbox) applied once per database, and the tenant sequence
//! applied inside every `tenant_{slug}` schema (and inside the default
//! schema of dedicated enterprise databases). Both are numbered,
//! forward-only, and idempotent; applied versions are recorded in a
//! `schema_migrations` table in the respective scope.

// ============================================================================
// SECTION: Imports
// ============================================================================

use postgres::Transaction;

use crate::error::StoreError;
use crate::tenant::Store;
use crate::tenant::TenantScope;

// ============================================================================
// SECTION: Control-Plane Migrations
// ============================================================================

/// Control-plane migration sequence.
const CONTROL_MIGRATIONS: [(i32, &str); 4] = [
    (
        1,
        "CREATE TABLE IF NOT EXISTS organizations (
            id UUID PRIMARY KEY,
            name TEXT NOT NULL,
            slug TEXT NOT NULL UNIQUE,
            plan TEXT NOT NULL,
            subscription_id TEXT,
            billing_customer_id TEXT,
            decision_limit BIGINT NOT NULL DEFAULT 0,
            agent_limit BIGINT NOT NULL DEFAULT 0,
            email TEXT NOT NULL,
            email_verified BOOLEAN NOT NULL DEFAULT FALSE,
            isolation_tier TEXT NOT NULL DEFAULT 'schema',
            schema_name TEXT NOT NULL,
            database_url TEXT,
            tags TEXT[] NOT NULL DEFAULT '{}',
            created_at TIMESTAMPTZ NOT NULL
        )",
    ),
    (
        2,
        "CREATE TABLE IF NOT EXISTS org_usage (
            org_id UUID NOT NULL,
            period TEXT NOT NULL,
            decision_count BIGINT NOT NULL DEFAULT 0,
            PRIMARY KEY (org_id, period)
        )",
    ),
    (
        3,
        "CREATE TABLE IF NOT EXISTS email_verifications (
            token TEXT PRIMARY KEY,
            org_id UUID NOT NULL,
            expires_at TIMESTAMPTZ NOT NULL,
            used_at TIMESTAMPTZ
        )",
    ),
    (
        4,
        "CREATE TABLE IF NOT EXISTS search_outbox (
            decision_id UUID NOT NULL,
            org_id UUID NOT NULL,
            operation TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL,
            attempts INTEGER NOT NULL DEFAULT 0,
            last_error TEXT,
            locked_until TIMESTAMPTZ,
            UNIQUE (decision_id, operation)
        );
        CREATE INDEX IF NOT EXISTS search_outbox_claim
            ON search_outbox (created_at)",
    ),
];

/// Applies the control-plane migration sequence.
///
/// # Errors
///
/// Returns [`StoreError`] when a migration statement fails.
pub fn apply_control_plane(store: &Store) -> Result<(), StoreError> {
    let mut conn = store.control_conn()?;
    conn.batch_execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )",
    )
    .map_err(|err| StoreError::from_pg("migrate_control", &err))?;
    for (version, sql) in CONTROL_MIGRATIONS {
        let mut tx =
            conn.transaction().map_err(|err| StoreError::from_pg("migrate_control", &err))?;
        let applied = tx
            .query_opt("SELECT version FROM schema_migrations WHERE version = $1", &[&version])
            .map_err(|err| StoreError::from_pg("migrate_control", &err))?;
        if applied.is_none() {
            tx.batch_execute(sql).map_err(|err| StoreError::from_pg("migrate_control", &err))?;
            tx.execute("INSERT INTO schema_migrations (version) VALUES ($1)", &[&version])
                .map_err(|err| StoreError::from_pg("migrate_control", &err))?;
        }
        tx.commit().map_err(|err| StoreError::from_pg("migrate_control", &err))?;
    }
    Ok(())
}

// ============================================================================
// SECTION: Tenant Migrations
// ============================================================================

/// Tenant-schema migration sequence. Statements run with the tenant schema
/// first on the search path, so all names are unqualified.
const TENANT_MIGRATIONS: [(i32, &str); 10] = [
    (
        1,
        "CREATE TABLE IF NOT EXISTS agents (
            id UUID PRIMARY KEY,
            agent_id TEXT NOT NULL,
            org_id UUID NOT NULL,
            name TEXT NOT NULL,
            role TEXT NOT NULL,
            api_key_hash TEXT,
            tags TEXT[] NOT NULL DEFAULT '{}',
            metadata JSONB NOT NULL DEFAULT '{}',
            created_at TIMESTAMPTZ NOT NULL,
            UNIQUE (org_id, agent_id)
        )",
    ),
    (
        2,
        "CREATE TABLE IF NOT EXISTS agent_runs (
            id UUID PRIMARY KEY,
            agent_id TEXT NOT NULL,
            org_id UUID NOT NULL,
            trace_id TEXT,
            parent_run_id UUID,
            status TEXT NOT NULL,
            started_at TIMESTAMPTZ NOT NULL,
            completed_at TIMESTAMPTZ,
            metadata JSONB NOT NULL DEFAULT '{}',
            event_seq BIGINT NOT NULL DEFAULT 0
        );
        CREATE INDEX IF NOT EXISTS agent_runs_by_agent
            ON agent_runs (org_id, agent_id, started_at DESC)",
    ),
    (
        3,
        "CREATE TABLE IF NOT EXISTS agent_events (
            id UUID NOT NULL,
            run_id UUID NOT NULL,
            org_id UUID NOT NULL,
            event_type TEXT NOT NULL,
            sequence_num BIGINT NOT NULL,
            occurred_at TIMESTAMPTZ NOT NULL,
            agent_id TEXT NOT NULL,
            payload JSONB NOT NULL DEFAULT '{}',
            PRIMARY KEY (id, occurred_at)
        ) PARTITION BY RANGE (occurred_at)",
    ),
    (
        4,
        "CREATE TABLE IF NOT EXISTS decisions (
            id UUID PRIMARY KEY,
            run_id UUID NOT NULL,
            agent_id TEXT NOT NULL,
            org_id UUID NOT NULL,
            decision_type TEXT NOT NULL,
            outcome TEXT NOT NULL,
            confidence DOUBLE PRECISION NOT NULL,
            reasoning TEXT,
            quality_score DOUBLE PRECISION NOT NULL DEFAULT 0.5,
            content_hash TEXT NOT NULL,
            embedding vector(1024),
            agent_context JSONB NOT NULL DEFAULT '{}',
            session_id TEXT,
            precedent_ref UUID,
            valid_from TIMESTAMPTZ NOT NULL,
            valid_to TIMESTAMPTZ,
            transaction_time TIMESTAMPTZ NOT NULL,
            created_at TIMESTAMPTZ NOT NULL
        );
        CREATE INDEX IF NOT EXISTS decisions_current_by_agent
            ON decisions (org_id, agent_id, valid_from DESC)
            WHERE valid_to IS NULL;
        CREATE INDEX IF NOT EXISTS decisions_by_type
            ON decisions (org_id, decision_type, valid_from DESC);
        CREATE INDEX IF NOT EXISTS decisions_context_gin
            ON decisions USING gin (agent_context);
        CREATE INDEX IF NOT EXISTS decisions_embedding_hnsw
            ON decisions USING hnsw (embedding vector_cosine_ops)",
    ),
    (
        5,
        "CREATE TABLE IF NOT EXISTS decision_alternatives (
            id UUID PRIMARY KEY,
            decision_id UUID NOT NULL REFERENCES decisions (id) ON DELETE CASCADE,
            label TEXT NOT NULL,
            score DOUBLE PRECISION,
            selected BOOLEAN NOT NULL DEFAULT FALSE,
            rejection_reason TEXT
        );
        CREATE TABLE IF NOT EXISTS decision_evidence (
            id UUID PRIMARY KEY,
            decision_id UUID NOT NULL REFERENCES decisions (id) ON DELETE CASCADE,
            org_id UUID NOT NULL,
            source_type TEXT NOT NULL,
            source_uri TEXT,
            content TEXT NOT NULL,
            relevance_score DOUBLE PRECISION,
            embedding vector(1024),
            metadata JSONB NOT NULL DEFAULT '{}',
            created_at TIMESTAMPTZ NOT NULL
        );
        CREATE INDEX IF NOT EXISTS evidence_by_decision
            ON decision_evidence (decision_id)",
    ),
    (
        6,
        "CREATE TABLE IF NOT EXISTS access_grants (
            id UUID PRIMARY KEY,
            org_id UUID NOT NULL,
            grantor_id UUID NOT NULL,
            grantee_id UUID,
            grantee_tag TEXT,
            resource_type TEXT NOT NULL,
            resource_id TEXT,
            permission TEXT NOT NULL,
            expires_at TIMESTAMPTZ,
            created_at TIMESTAMPTZ NOT NULL,
            CHECK ((grantee_id IS NULL) <> (grantee_tag IS NULL))
        );
        CREATE INDEX IF NOT EXISTS grants_by_grantee
            ON access_grants (org_id, grantee_id);
        CREATE INDEX IF NOT EXISTS grants_by_tag
            ON access_grants (org_id, grantee_tag)",
    ),
    (
        7,
        "CREATE TABLE IF NOT EXISTS assessments (
            id UUID PRIMARY KEY,
            decision_id UUID NOT NULL,
            org_id UUID NOT NULL,
            assessor_agent_id TEXT NOT NULL,
            outcome TEXT NOT NULL,
            notes TEXT,
            created_at TIMESTAMPTZ NOT NULL
        );
        CREATE INDEX IF NOT EXISTS assessments_by_decision
            ON assessments (decision_id, created_at DESC);
        CREATE TABLE IF NOT EXISTS idempotency_keys (
            org_id UUID NOT NULL,
            agent_id TEXT NOT NULL,
            endpoint TEXT NOT NULL,
            idem_key TEXT NOT NULL,
            payload_hash TEXT NOT NULL,
            status TEXT NOT NULL,
            response_body TEXT,
            in_progress_until TIMESTAMPTZ,
            PRIMARY KEY (org_id, agent_id, endpoint, idem_key)
        )",
    ),
    (
        8,
        "CREATE MATERIALIZED VIEW IF NOT EXISTS decision_conflicts AS
        SELECT md5(a.id::text || b.id::text)::uuid AS id,
               a.id AS decision_a_id,
               b.id AS decision_b_id,
               a.org_id AS org_id,
               'outcome_divergence' AS conflict_kind,
               a.agent_id AS agent_a,
               b.agent_id AS agent_b,
               a.outcome AS outcome_a,
               b.outcome AS outcome_b,
               a.decision_type AS decision_type,
               GREATEST(a.valid_from, b.valid_from) AS detected_at
          FROM decisions a
          JOIN decisions b
            ON a.org_id = b.org_id
           AND a.decision_type = b.decision_type
           AND a.id < b.id
           AND a.agent_id <> b.agent_id
           AND a.outcome <> b.outcome
           AND a.valid_to IS NULL
           AND b.valid_to IS NULL
           AND ABS(EXTRACT(EPOCH FROM (a.valid_from - b.valid_from))) < 3600;
        CREATE UNIQUE INDEX IF NOT EXISTS decision_conflicts_pair
            ON decision_conflicts (decision_a_id, decision_b_id);
        CREATE TABLE IF NOT EXISTS conflict_reviews (
            conflict_id UUID PRIMARY KEY,
            org_id UUID NOT NULL,
            category TEXT,
            severity TEXT,
            explanation TEXT,
            status TEXT NOT NULL DEFAULT 'open',
            winning_decision_id UUID,
            updated_at TIMESTAMPTZ NOT NULL
        )",
    ),
    (
        9,
        "ALTER TABLE agents ENABLE ROW LEVEL SECURITY;
        ALTER TABLE agent_runs ENABLE ROW LEVEL SECURITY;
        ALTER TABLE agent_events ENABLE ROW LEVEL SECURITY;
        ALTER TABLE decisions ENABLE ROW LEVEL SECURITY;
        ALTER TABLE decision_evidence ENABLE ROW LEVEL SECURITY;
        ALTER TABLE access_grants ENABLE ROW LEVEL SECURITY;
        ALTER TABLE assessments ENABLE ROW LEVEL SECURITY;
        ALTER TABLE idempotency_keys ENABLE ROW LEVEL SECURITY;
        DROP POLICY IF EXISTS tenant_isolation_agents ON agents;
        CREATE POLICY tenant_isolation_agents ON agents
            USING (org_id = current_setting('app.org_id', true)::uuid);
        DROP POLICY IF EXISTS tenant_isolation_runs ON agent_runs;
        CREATE POLICY tenant_isolation_runs ON agent_runs
            USING (org_id = current_setting('app.org_id', true)::uuid);
        DROP POLICY IF EXISTS tenant_isolation_events ON agent_events;
        CREATE POLICY tenant_isolation_events ON agent_events
            USING (org_id = current_setting('app.org_id', true)::uuid);
        DROP POLICY IF EXISTS tenant_isolation_decisions ON decisions;
        CREATE POLICY tenant_isolation_decisions ON decisions
            USING (org_id = current_setting('app.org_id', true)::uuid);
        DROP POLICY IF EXISTS tenant_isolation_evidence ON decision_evidence;
        CREATE POLICY tenant_isolation_evidence ON decision_evidence
            USING (org_id = current_setting('app.org_id', true)::uuid);
        DROP POLICY IF EXISTS tenant_isolation_grants ON access_grants;
        CREATE POLICY tenant_isolation_grants ON access_grants
            USING (org_id = current_setting('app.org_id', true)::uuid);
        DROP POLICY IF EXISTS tenant_isolation_assessments ON assessments;
        CREATE POLICY tenant_isolation_assessments ON assessments
            USING (org_id = current_setting('app.org_id', true)::uuid);
        DROP POLICY IF EXISTS tenant_isolation_idempotency ON idempotency_keys;
        CREATE POLICY tenant_isolation_idempotency ON idempotency_keys
            USING (org_id = current_setting('app.org_id', true)::uuid)",
    ),
    (
        10,
        "CREATE TABLE IF NOT EXISTS audit_log (
            id UUID PRIMARY KEY,
            org_id UUID NOT NULL,
            event TEXT NOT NULL,
            agent_id TEXT,
            decision_id UUID,
            detail JSONB NOT NULL DEFAULT '{}',
            created_at TIMESTAMPTZ NOT NULL
        );
        CREATE INDEX IF NOT EXISTS audit_log_by_time
            ON audit_log (org_id, created_at DESC);
        ALTER TABLE audit_log ENABLE ROW LEVEL SECURITY;
        DROP POLICY IF EXISTS tenant_isolation_audit ON audit_log;
        CREATE POLICY tenant_isolation_audit ON audit_log
            USING (org_id = current_setting('app.org_id', true)::uuid)",
    ),
];

/// Creates the tenant schema (if missing) and applies the tenant sequence.
///
/// # Errors
///
/// Returns [`StoreError`] when schema creation or a migration fails.
pub fn apply_tenant(scope: &TenantScope) -> Result<(), StoreError> {
    let mut conn = scope.connection()?;
    let create_schema = format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(scope.schema()));
    conn.batch_execute(&create_schema)
        .map_err(|err| StoreError::from_pg("migrate_tenant", &err))?;
    let mut tx = scope.begin(&mut conn)?;
    tx.batch_execute(
        "CREATE EXTENSION IF NOT EXISTS vector;
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )",
    )
    .map_err(|err| StoreError::from_pg("migrate_tenant", &err))?;
    for (version, sql) in TENANT_MIGRATIONS {
        apply_tenant_version(&mut tx, version, sql)?;
    }
    tx.commit().map_err(|err| StoreError::from_pg("migrate_tenant", &err))
}

/// Applies one tenant migration version when not yet recorded.
fn apply_tenant_version(
    tx: &mut Transaction<'_>,
    version: i32,
    sql: &str,
) -> Result<(), StoreError> {
    let applied = tx
        .query_opt("SELECT version FROM schema_migrations WHERE version = $1", &[&version])
        .map_err(|err| StoreError::from_pg("migrate_tenant", &err))?;
    if applied.is_some() {
        return Ok(());
    }
    tx.batch_execute(sql).map_err(|err| StoreError::from_pg("migrate_tenant", &err))?;
    tx.execute("INSERT INTO schema_migrations (version) VALUES ($1)", &[&version])
        .map_err(|err| StoreError::from_pg("migrate_tenant", &err))?;
    Ok(())
}

/// Bootstraps a dedicated tenant database with the outbox table, so trace
/// transactions in that database stay atomic with their index queue rows.
///
/// # Errors
///
/// Returns [`StoreError`] when the bootstrap DDL fails.
pub fn apply_dedicated_bootstrap(scope: &TenantScope) -> Result<(), StoreError> {
    let mut conn = scope.connection()?;
    conn.batch_execute(
        "CREATE TABLE IF NOT EXISTS public.search_outbox (
            decision_id UUID NOT NULL,
            org_id UUID NOT NULL,
            operation TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL,
            attempts INTEGER NOT NULL DEFAULT 0,
            last_error TEXT,
            locked_until TIMESTAMPTZ,
            UNIQUE (decision_id, operation)
        );
        CREATE INDEX IF NOT EXISTS search_outbox_claim
            ON public.search_outbox (created_at)",
    )
    .map_err(|err| StoreError::from_pg("bootstrap_dedicated", &err))?;
    Ok(())
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Quotes a schema identifier, rejecting anything outside `[a-z0-9_]`.
///
/// Schema names are derived from validated slugs, so this is a second line
/// of defense rather than a general-purpose quoting routine.
#[must_use]
pub fn quote_ident(ident: &str) -> String {
    let safe: String =
        ident.chars().filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_').collect();
    format!("\"{safe}\"")
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::CONTROL_MIGRATIONS;
    use super::TENANT_MIGRATIONS;
    use super::quote_ident;

    #[test]
    fn migration_versions_are_sequential() {
        for (index, (version, _)) in CONTROL_MIGRATIONS.iter().enumerate() {
            assert_eq!(*version, i32::try_from(index).unwrap_or(i32::MAX) + 1);
        }
        for (index, (version, _)) in TENANT_MIGRATIONS.iter().enumerate() {
            assert_eq!(*version, i32::try_from(index).unwrap_or(i32::MAX) + 1);
        }
    }

    #[test]
    fn conflict_view_dedupes_on_ordered_pair() {
        let (_, view_sql) = TENANT_MIGRATIONS[7];
        assert!(view_sql.contains("a.id < b.id"));
        assert!(view_sql.contains("decision_conflicts_pair"));
        assert!(view_sql.contains("< 3600"));
    }

    #[test]
    fn quote_ident_strips_hostile_characters() {
        assert_eq!(quote_ident("tenant_acme"), "\"tenant_acme\"");
        assert_eq!(quote_ident("tenant\"; drop table x; --"), "\"tenantdroptablex\"");
    }
}
