// precedent-store/src/grants.rs
// ============================================================================
// Module: Grant Storage
// Description: Access grant rows within a tenant schema.
// Purpose: Persist and evaluate direct and tag-based authorization edges.
// Dependencies: postgres, precedent-core
// ============================================================================

//! ## Overview
//! Grants target either a specific agent or a tag. The read path loads all
//! grants applicable to a caller in one query so page scans evaluate
//! visibility without repeated joins.

// ============================================================================
// SECTION: Imports
// ============================================================================

use postgres::Row;
use postgres::Transaction;
use precedent_core::AccessGrant;
use precedent_core::AgentId;
use precedent_core::GrantId;
use precedent_core::GrantPermission;
use precedent_core::Grantee;
use precedent_core::OrgId;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::StoreError;

// ============================================================================
// SECTION: Operations
// ============================================================================

/// Inserts a grant.
///
/// # Errors
///
/// Returns [`StoreError`] when the insert fails.
pub fn insert_grant(tx: &mut Transaction<'_>, grant: &AccessGrant) -> Result<(), StoreError> {
    let (grantee_id, grantee_tag) = match &grant.grantee {
        Grantee::Agent(id) => (Some(id.as_uuid()), None),
        Grantee::Tag(tag) => (None, Some(tag.clone())),
    };
    tx.execute(
        "INSERT INTO access_grants (id, org_id, grantor_id, grantee_id, grantee_tag, \
         resource_type, resource_id, permission, expires_at, created_at) VALUES ($1, $2, $3, $4, \
         $5, $6, $7, $8, $9, $10)",
        &[
            &grant.id.as_uuid(),
            &grant.org_id.as_uuid(),
            &grant.grantor_id.as_uuid(),
            &grantee_id,
            &grantee_tag,
            &grant.resource_type,
            &grant.resource_id,
            &grant.permission.as_str(),
            &grant.expires_at,
            &grant.created_at,
        ],
    )
    .map_err(|err| StoreError::from_pg("insert_grant", &err))?;
    Ok(())
}

/// Deletes a grant.
///
/// # Errors
///
/// Returns [`StoreError::NotFound`] when the grant does not exist.
pub fn delete_grant(
    tx: &mut Transaction<'_>,
    org_id: OrgId,
    grant_id: GrantId,
) -> Result<(), StoreError> {
    let deleted = tx
        .execute("DELETE FROM access_grants WHERE org_id = $1 AND id = $2", &[
            &org_id.as_uuid(),
            &grant_id.as_uuid(),
        ])
        .map_err(|err| StoreError::from_pg("delete_grant", &err))?;
    if deleted == 0 {
        return Err(StoreError::NotFound {
            what: "grant",
        });
    }
    Ok(())
}

/// Loads all non-expired read grants on agent traces that apply to the
/// caller, either directly or through one of its tags.
///
/// # Errors
///
/// Returns [`StoreError`] when the query fails.
pub fn readable_trace_grants(
    tx: &mut Transaction<'_>,
    org_id: OrgId,
    caller: AgentId,
    tags: &[String],
    now: OffsetDateTime,
) -> Result<Vec<AccessGrant>, StoreError> {
    let rows = tx
        .query(
            "SELECT id, org_id, grantor_id, grantee_id, grantee_tag, resource_type, resource_id, \
             permission, expires_at, created_at FROM access_grants WHERE org_id = $1 AND \
             resource_type = 'agent_traces' AND permission = 'read' AND (expires_at IS NULL OR \
             expires_at > $2) AND (grantee_id = $3 OR grantee_tag = ANY($4))",
            &[&org_id.as_uuid(), &now, &caller.as_uuid(), &tags],
        )
        .map_err(|err| StoreError::from_pg("readable_trace_grants", &err))?;
    rows.iter().map(grant_from_row).collect()
}

/// Lists all grants in the organization.
///
/// # Errors
///
/// Returns [`StoreError`] when the query fails.
pub fn list_grants(
    tx: &mut Transaction<'_>,
    org_id: OrgId,
    limit: i64,
) -> Result<Vec<AccessGrant>, StoreError> {
    let rows = tx
        .query(
            "SELECT id, org_id, grantor_id, grantee_id, grantee_tag, resource_type, resource_id, \
             permission, expires_at, created_at FROM access_grants WHERE org_id = $1 ORDER BY \
             created_at DESC LIMIT $2",
            &[&org_id.as_uuid(), &limit],
        )
        .map_err(|err| StoreError::from_pg("list_grants", &err))?;
    rows.iter().map(grant_from_row).collect()
}

/// Decodes a grant row.
fn grant_from_row(row: &Row) -> Result<AccessGrant, StoreError> {
    let grantee_id: Option<Uuid> = row.get(3);
    let grantee_tag: Option<String> = row.get(4);
    let grantee = match (grantee_id, grantee_tag) {
        (Some(id), None) => Grantee::Agent(AgentId::from_uuid(id)),
        (None, Some(tag)) => Grantee::Tag(tag),
        _ => {
            return Err(StoreError::invalid(
                "grant_from_row",
                "grant must target exactly one of agent or tag",
            ));
        }
    };
    let permission_label: String = row.get(7);
    let permission = GrantPermission::parse(&permission_label).ok_or_else(|| {
        StoreError::invalid("grant_from_row", format!("unknown permission {permission_label}"))
    })?;
    Ok(AccessGrant {
        id: GrantId::from_uuid(row.get(0)),
        org_id: OrgId::from_uuid(row.get(1)),
        grantor_id: AgentId::from_uuid(row.get(2)),
        grantee,
        resource_type: row.get(5),
        resource_id: row.get(6),
        permission,
        expires_at: row.get(8),
        created_at: row.get(9),
    })
}
