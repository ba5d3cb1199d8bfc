// precedent-store/src/agents.rs
// ============================================================================
// Module: Agent Storage
// Description: Agent identity rows within a tenant schema.
// Purpose: Persist agents, their roles, and hashed API keys.
// Dependencies: postgres, precedent-core
// ============================================================================

//! ## Overview
//! Agent rows live in the tenant schema. All operations run inside a
//! tenant transaction opened through [`crate::tenant::TenantScope::begin`],
//! and every statement carries an explicit `org_id` predicate on top of the
//! row-level-security policy.

// ============================================================================
// SECTION: Imports
// ============================================================================

use postgres::Row;
use postgres::Transaction;
use precedent_core::Agent;
use precedent_core::AgentId;
use precedent_core::AgentKey;
use precedent_core::OrgId;
use precedent_core::Role;

use crate::error::StoreError;

// ============================================================================
// SECTION: Operations
// ============================================================================

/// Inserts an agent.
///
/// # Errors
///
/// Returns [`StoreError::Conflict`] when `(org_id, agent_id)` already exists.
pub fn insert_agent(tx: &mut Transaction<'_>, agent: &Agent) -> Result<(), StoreError> {
    tx.execute(
        "INSERT INTO agents (id, agent_id, org_id, name, role, api_key_hash, tags, metadata, \
         created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        &[
            &agent.id.as_uuid(),
            &agent.key.as_str(),
            &agent.org_id.as_uuid(),
            &agent.name,
            &agent.role.as_str(),
            &agent.api_key_hash,
            &agent.tags,
            &agent.metadata,
            &agent.created_at,
        ],
    )
    .map_err(|err| StoreError::from_pg("insert_agent", &err))?;
    Ok(())
}

/// Fetches an agent by its human key.
///
/// # Errors
///
/// Returns [`StoreError`] when the query fails or the row is malformed.
pub fn get_agent_by_key(
    tx: &mut Transaction<'_>,
    org_id: OrgId,
    key: &AgentKey,
) -> Result<Option<Agent>, StoreError> {
    let row = tx
        .query_opt(
            "SELECT id, agent_id, org_id, name, role, api_key_hash, tags, metadata, created_at \
             FROM agents WHERE org_id = $1 AND agent_id = $2",
            &[&org_id.as_uuid(), &key.as_str()],
        )
        .map_err(|err| StoreError::from_pg("get_agent_by_key", &err))?;
    row.map(|row| agent_from_row(&row)).transpose()
}

/// Fetches an agent by record id.
///
/// # Errors
///
/// Returns [`StoreError`] when the query fails or the row is malformed.
pub fn get_agent_by_id(
    tx: &mut Transaction<'_>,
    org_id: OrgId,
    id: AgentId,
) -> Result<Option<Agent>, StoreError> {
    let row = tx
        .query_opt(
            "SELECT id, agent_id, org_id, name, role, api_key_hash, tags, metadata, created_at \
             FROM agents WHERE org_id = $1 AND id = $2",
            &[&org_id.as_uuid(), &id.as_uuid()],
        )
        .map_err(|err| StoreError::from_pg("get_agent_by_id", &err))?;
    row.map(|row| agent_from_row(&row)).transpose()
}

/// Fetches an agent by the SHA-256 fingerprint of its API key.
///
/// # Errors
///
/// Returns [`StoreError`] when the query fails or the row is malformed.
pub fn get_agent_by_api_key_hash(
    tx: &mut Transaction<'_>,
    org_id: OrgId,
    api_key_hash: &str,
) -> Result<Option<Agent>, StoreError> {
    let row = tx
        .query_opt(
            "SELECT id, agent_id, org_id, name, role, api_key_hash, tags, metadata, created_at \
             FROM agents WHERE org_id = $1 AND api_key_hash = $2",
            &[&org_id.as_uuid(), &api_key_hash],
        )
        .map_err(|err| StoreError::from_pg("get_agent_by_api_key_hash", &err))?;
    row.map(|row| agent_from_row(&row)).transpose()
}

/// Counts agents in the organization, for agent quota checks.
///
/// # Errors
///
/// Returns [`StoreError`] when the query fails.
pub fn count_agents(tx: &mut Transaction<'_>, org_id: OrgId) -> Result<i64, StoreError> {
    let row = tx
        .query_one("SELECT COUNT(*) FROM agents WHERE org_id = $1", &[&org_id.as_uuid()])
        .map_err(|err| StoreError::from_pg("count_agents", &err))?;
    Ok(row.get(0))
}

/// Decodes an agent row.
fn agent_from_row(row: &Row) -> Result<Agent, StoreError> {
    let role_label: String = row.get(4);
    let role = Role::parse(&role_label)
        .ok_or_else(|| StoreError::invalid("agent_from_row", format!("unknown role {role_label}")))?;
    Ok(Agent {
        id: AgentId::from_uuid(row.get(0)),
        key: AgentKey::new(row.get::<_, String>(1)),
        org_id: OrgId::from_uuid(row.get(2)),
        name: row.get(3),
        role,
        api_key_hash: row.get(5),
        tags: row.get(6),
        metadata: row.get(7),
        created_at: row.get(8),
    })
}
