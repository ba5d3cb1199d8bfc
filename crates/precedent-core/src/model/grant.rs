// precedent-core/src/model/grant.rs
// ============================================================================
// Module: Access Grant Model
// Description: Authorization edges between agents and traced records.
// Purpose: Describe direct and tag-based read/write grants.
// Dependencies: crate::ids, serde, time
// ============================================================================

//! ## Overview
//! Grants are the authorization edges consulted when a non-admin caller
//! reads another agent's traces. A grant targets either a specific agent or
//! every agent carrying a tag, and may be scoped to one resource or to all
//! resources of a type.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::ids::AgentId;
use crate::ids::GrantId;
use crate::ids::OrgId;

// ============================================================================
// SECTION: Permission and Grantee
// ============================================================================

/// Permission level carried by a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantPermission {
    /// Read access.
    Read,
    /// Write access.
    Write,
}

impl GrantPermission {
    /// Returns the stable string label for the permission.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }

    /// Parses a permission from its stable label.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "read" => Some(Self::Read),
            "write" => Some(Self::Write),
            _ => None,
        }
    }
}

/// The receiving side of a grant: a specific agent or a tag.
///
/// # Invariants
/// - Exactly one of the two variants applies to a stored grant row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grantee {
    /// Grant to one agent by record id.
    Agent(AgentId),
    /// Grant to every agent carrying the tag.
    Tag(String),
}

// ============================================================================
// SECTION: Access Grant
// ============================================================================

/// Authorization edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessGrant {
    /// Grant identifier.
    pub id: GrantId,
    /// Owning organization.
    pub org_id: OrgId,
    /// Agent that issued the grant.
    pub grantor_id: AgentId,
    /// Receiving agent or tag.
    pub grantee: Grantee,
    /// Resource type the grant covers, e.g. `agent_traces`.
    pub resource_type: String,
    /// Specific resource, or `None` for every resource of the type.
    pub resource_id: Option<String>,
    /// Permission level.
    pub permission: GrantPermission,
    /// Expiry instant; `None` grants do not expire.
    #[serde(with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
    /// Insert instant.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl AccessGrant {
    /// Returns true when the grant is usable at the given instant.
    #[must_use]
    pub fn active_at(&self, now: OffsetDateTime) -> bool {
        self.expires_at.is_none_or(|expiry| expiry > now)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use time::Duration;
    use time::OffsetDateTime;

    use super::AccessGrant;
    use super::GrantPermission;
    use super::Grantee;
    use crate::ids::AgentId;
    use crate::ids::GrantId;
    use crate::ids::OrgId;

    fn grant(expires_at: Option<OffsetDateTime>) -> AccessGrant {
        AccessGrant {
            id: GrantId::generate(),
            org_id: OrgId::generate(),
            grantor_id: AgentId::generate(),
            grantee: Grantee::Tag("reviewers".to_string()),
            resource_type: "agent_traces".to_string(),
            resource_id: None,
            permission: GrantPermission::Read,
            expires_at,
            created_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn grants_without_expiry_never_expire() {
        let now = OffsetDateTime::UNIX_EPOCH + Duration::days(10_000);
        assert!(grant(None).active_at(now));
    }

    #[test]
    fn expired_grants_are_inactive() {
        let now = OffsetDateTime::UNIX_EPOCH + Duration::hours(2);
        let expiry = OffsetDateTime::UNIX_EPOCH + Duration::hours(1);
        assert!(!grant(Some(expiry)).active_at(now));
        assert!(grant(Some(expiry)).active_at(OffsetDateTime::UNIX_EPOCH));
    }
}
