// precedent-service/src/context.rs
// ============================================================================
// Module: Caller Context
// Description: Authenticated principal passed into every service call.
// Purpose: Carry the organization, agent identity, role, and tags.
// Dependencies: precedent-core
// ============================================================================

//! ## Overview
//! Both surfaces resolve their credentials (bearer token or MCP claims)
//! into the same [`Caller`] value before touching the service. All
//! authorization decisions downstream read from it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use precedent_core::AgentId;
use precedent_core::AgentKey;
use precedent_core::OrgId;
use precedent_core::Role;

// ============================================================================
// SECTION: Caller
// ============================================================================

/// Authenticated principal.
#[derive(Debug, Clone, PartialEq)]
pub struct Caller {
    /// Organization the caller belongs to.
    pub org_id: OrgId,
    /// Agent record id.
    pub agent_id: AgentId,
    /// Agent human key.
    pub agent_key: AgentKey,
    /// Role within the organization.
    pub role: Role,
    /// Tags carried by the agent (for tag-based grants).
    pub tags: Vec<String>,
}

impl Caller {
    /// Returns true when the caller holds at least the given role.
    #[must_use]
    pub const fn at_least(&self, role: Role) -> bool {
        self.role.at_least(role)
    }
}
