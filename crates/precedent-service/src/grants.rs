// precedent-service/src/grants.rs
// ============================================================================
// Module: Grant Management
// Description: Creation and revocation of access grants.
// Purpose: Let admins share trace visibility across agents and tags.
// Dependencies: precedent-core, precedent-store
// ============================================================================

//! ## Overview
//! Grants are admin-managed authorization edges. Creation requires an
//! admin or higher and exactly one grantee (a specific agent or a tag);
//! revocation deletes the edge. The read-path grant cache has a short TTL,
//! so revocations take effect within seconds.

// ============================================================================
// SECTION: Imports
// ============================================================================

use precedent_core::AccessGrant;
use precedent_core::AgentId;
use precedent_core::GrantId;
use precedent_core::GrantPermission;
use precedent_core::Grantee;
use precedent_core::Role;
use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::authz;
use crate::context::Caller;
use crate::decisions::DecisionService;
use crate::error::ServiceError;

// ============================================================================
// SECTION: Inputs
// ============================================================================

/// Grant creation request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateGrantInput {
    /// Direct grantee agent record id.
    #[serde(default)]
    pub grantee_id: Option<AgentId>,
    /// Tag-based grantee.
    #[serde(default)]
    pub grantee_tag: Option<String>,
    /// Resource type; defaults to `agent_traces`.
    #[serde(default)]
    pub resource_type: Option<String>,
    /// Specific resource, or none for every resource of the type.
    #[serde(default)]
    pub resource_id: Option<String>,
    /// Permission level; defaults to read.
    #[serde(default)]
    pub permission: Option<GrantPermission>,
    /// Expiry instant.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
}

// ============================================================================
// SECTION: Service Methods
// ============================================================================

impl DecisionService {
    /// Creates an access grant.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the caller lacks admin privileges or
    /// the grantee specification is ambiguous.
    pub fn create_grant(
        &self,
        caller: &Caller,
        input: &CreateGrantInput,
    ) -> Result<AccessGrant, ServiceError> {
        authz::require_role(caller, Role::Admin)?;
        let grantee = match (input.grantee_id, input.grantee_tag.as_deref()) {
            (Some(id), None) => Grantee::Agent(id),
            (None, Some(tag)) if !tag.trim().is_empty() => Grantee::Tag(tag.to_string()),
            _ => {
                return Err(ServiceError::Validation(precedent_core::ValidationError::Format {
                    field: "grantee",
                    reason: "exactly one of grantee_id or grantee_tag is required",
                }));
            }
        };
        let now = OffsetDateTime::now_utc();
        let grant = AccessGrant {
            id: GrantId::generate(),
            org_id: caller.org_id,
            grantor_id: caller.agent_id,
            grantee,
            resource_type: input
                .resource_type
                .clone()
                .unwrap_or_else(|| "agent_traces".to_string()),
            resource_id: input.resource_id.clone(),
            permission: input.permission.unwrap_or(GrantPermission::Read),
            expires_at: input.expires_at,
            created_at: now,
        };
        let scope = self.store().resolve(caller.org_id)?;
        let mut conn = scope.connection()?;
        let mut tx = scope.begin(&mut conn)?;
        precedent_store::grants::insert_grant(&mut tx, &grant)?;
        precedent_store::decisions::record_audit(
            &mut tx,
            caller.org_id,
            "grant_created",
            Some(&caller.agent_key),
            None,
            &serde_json::json!({ "grant": grant.id, "resource_type": grant.resource_type }),
            now,
        )?;
        tx.commit().map_err(|err| ServiceError::internal("create_grant", err))?;
        Ok(grant)
    }

    /// Revokes an access grant.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotFound`] when the grant does not exist.
    pub fn delete_grant(&self, caller: &Caller, grant_id: GrantId) -> Result<(), ServiceError> {
        authz::require_role(caller, Role::Admin)?;
        let now = OffsetDateTime::now_utc();
        let scope = self.store().resolve(caller.org_id)?;
        let mut conn = scope.connection()?;
        let mut tx = scope.begin(&mut conn)?;
        precedent_store::grants::delete_grant(&mut tx, caller.org_id, grant_id)?;
        precedent_store::decisions::record_audit(
            &mut tx,
            caller.org_id,
            "grant_revoked",
            Some(&caller.agent_key),
            None,
            &serde_json::json!({ "grant": grant_id }),
            now,
        )?;
        tx.commit().map_err(|err| ServiceError::internal("delete_grant", err))?;
        Ok(())
    }
}
