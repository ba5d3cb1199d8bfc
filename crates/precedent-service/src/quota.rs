// precedent-service/src/quota.rs
// ============================================================================
// Module: Quota & Metering
// Description: Plan limit checks and atomic usage accounting.
// Purpose: Refuse writes over plan limits before any work happens.
// Dependencies: precedent-core, precedent-store
// ============================================================================

//! ## Overview
//! Quota checks run before any write work; the usage increment runs after
//! a successful commit. An increment failure is logged, not surfaced: the
//! trace is authoritative and the ledger merely reads slightly low until
//! the next period.

// ============================================================================
// SECTION: Imports
// ============================================================================

use postgres::Transaction;
use precedent_core::Organization;
use precedent_store::Store;
use time::OffsetDateTime;

use crate::error::ServiceError;

// ============================================================================
// SECTION: Checks
// ============================================================================

/// Checks the decision quota for the current period.
///
/// # Errors
///
/// Returns [`ServiceError::QuotaExceeded`] at or past the limit.
pub fn check_decision_quota(
    store: &Store,
    org: &Organization,
    now: OffsetDateTime,
) -> Result<(), ServiceError> {
    if org.unlimited_decisions() {
        return Ok(());
    }
    let period = precedent_store::orgs::period_label(now);
    let used = precedent_store::orgs::decision_count(store, org.id, &period)?;
    if used >= org.decision_limit {
        return Err(ServiceError::QuotaExceeded);
    }
    Ok(())
}

/// Checks the agent quota against the live agent count.
///
/// # Errors
///
/// Returns [`ServiceError::QuotaExceeded`] at or past the limit.
pub fn check_agent_quota(
    tx: &mut Transaction<'_>,
    org: &Organization,
) -> Result<(), ServiceError> {
    if org.unlimited_agents() {
        return Ok(());
    }
    let count = precedent_store::agents::count_agents(tx, org.id)?;
    if count >= org.agent_limit {
        return Err(ServiceError::QuotaExceeded);
    }
    Ok(())
}

/// Increments the usage counter after a committed trace; never fails the
/// caller.
pub fn increment_usage_best_effort(store: &Store, org: &Organization, now: OffsetDateTime) {
    let period = precedent_store::orgs::period_label(now);
    if let Err(err) = precedent_store::orgs::increment_decision_count(store, org.id, &period) {
        tracing::warn!(org = %org.id, error = %err, "usage increment failed after trace commit");
    }
}
