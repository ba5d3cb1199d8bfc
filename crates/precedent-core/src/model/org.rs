// precedent-core/src/model/org.rs
// ============================================================================
// Module: Organization Model
// Description: Tenant root entity, plans, and isolation tiers.
// Purpose: Describe the organization records held in the control plane.
// Dependencies: crate::ids, serde, time
// ============================================================================

//! ## Overview
//! Organizations are the tenant roots. Each carries a billing plan, quota
//! limits, an isolation tier selecting schema or dedicated-database scoping,
//! and the email verification state gating write access after signup.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::ids::OrgId;

// ============================================================================
// SECTION: Plans and Isolation
// ============================================================================

/// Billing plan for an organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    /// Free tier with tight quota limits.
    Free,
    /// Paid tier with raised limits.
    Pro,
    /// Enterprise tier, unlimited and eligible for database isolation.
    Enterprise,
}

impl Plan {
    /// Returns the stable string label for the plan.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Pro => "pro",
            Self::Enterprise => "enterprise",
        }
    }

    /// Parses a plan from its stable label.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "free" => Some(Self::Free),
            "pro" => Some(Self::Pro),
            "enterprise" => Some(Self::Enterprise),
            _ => None,
        }
    }

    /// Monthly decision quota granted at org creation (0 = unlimited).
    #[must_use]
    pub const fn decision_limit(self) -> i64 {
        match self {
            Self::Free => 500,
            Self::Pro => 10_000,
            Self::Enterprise => 0,
        }
    }

    /// Agent count quota granted at org creation (0 = unlimited).
    #[must_use]
    pub const fn agent_limit(self) -> i64 {
        match self {
            Self::Free => 3,
            Self::Pro => 25,
            Self::Enterprise => 0,
        }
    }
}

/// Tenant isolation tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationTier {
    /// Dedicated schema in the shared database (default).
    Schema,
    /// Dedicated database with its own connection pool.
    Database,
}

impl IsolationTier {
    /// Returns the stable string label for the tier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Schema => "schema",
            Self::Database => "database",
        }
    }

    /// Parses an isolation tier from its stable label.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "schema" => Some(Self::Schema),
            "database" => Some(Self::Database),
            _ => None,
        }
    }
}

// ============================================================================
// SECTION: Organization
// ============================================================================

/// Tenant root record.
///
/// # Invariants
/// - `slug` is unique and kebab-case.
/// - `decision_limit`/`agent_limit` of `0` mean unlimited.
/// - `schema_name` is derived from the slug and never changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    /// Organization identifier.
    pub id: OrgId,
    /// Display name.
    pub name: String,
    /// Unique kebab-case slug.
    pub slug: String,
    /// Billing plan.
    pub plan: Plan,
    /// External subscription identifier, when billing is attached.
    pub subscription_id: Option<String>,
    /// External billing customer identifier.
    pub billing_customer_id: Option<String>,
    /// Monthly decision quota (0 = unlimited).
    pub decision_limit: i64,
    /// Agent count quota (0 = unlimited).
    pub agent_limit: i64,
    /// Contact email used for verification.
    pub email: String,
    /// Whether the contact email has been verified.
    pub email_verified: bool,
    /// Tenant isolation tier.
    pub isolation_tier: IsolationTier,
    /// Schema holding the tenant's tables.
    pub schema_name: String,
    /// Connection string for database-isolated tenants.
    pub database_url: Option<String>,
    /// Free-form organization tags.
    pub tags: Vec<String>,
    /// Creation instant.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Organization {
    /// Returns true when the decision quota is unlimited.
    #[must_use]
    pub const fn unlimited_decisions(&self) -> bool {
        self.decision_limit == 0 || self.decision_limit >= i32::MAX as i64
    }

    /// Returns true when the agent quota is unlimited.
    #[must_use]
    pub const fn unlimited_agents(&self) -> bool {
        self.agent_limit == 0 || self.agent_limit >= i32::MAX as i64
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::IsolationTier;
    use super::Plan;

    #[test]
    fn plan_labels_round_trip() {
        for plan in [Plan::Free, Plan::Pro, Plan::Enterprise] {
            assert_eq!(Plan::parse(plan.as_str()), Some(plan));
        }
        assert_eq!(Plan::parse("platinum"), None);
    }

    #[test]
    fn free_plan_limits_are_bounded() {
        assert_eq!(Plan::Free.decision_limit(), 500);
        assert_eq!(Plan::Free.agent_limit(), 3);
        assert_eq!(Plan::Enterprise.decision_limit(), 0);
    }

    #[test]
    fn isolation_tier_labels_round_trip() {
        for tier in [IsolationTier::Schema, IsolationTier::Database] {
            assert_eq!(IsolationTier::parse(tier.as_str()), Some(tier));
        }
    }
}
