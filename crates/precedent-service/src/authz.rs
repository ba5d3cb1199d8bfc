// precedent-service/src/authz.rs
// ============================================================================
// Module: Authorization
// Description: Per-record access filtering with a bounded grant cache.
// Purpose: Decide which traced records a caller may see or write.
// Dependencies: precedent-core, precedent-store
// ============================================================================

//! ## Overview
//! Reads are filtered per record: a non-admin caller sees a decision when
//! it belongs to its own agent or a live grant covers the target agent,
//! directly or through a tag. Grants are loaded once per request and the
//! verdicts cached in a bounded TTL map so page scans do not repeat joins.
//! Writes are role-gated; all checks fail closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

use postgres::Transaction;
use precedent_core::AgentKey;
use precedent_core::Decision;
use precedent_core::Grantee;
use precedent_core::Role;
use time::OffsetDateTime;

use crate::context::Caller;
use crate::error::ServiceError;

/// How long a cached visibility verdict stays valid.
const GRANT_CACHE_TTL: Duration = Duration::from_secs(5);
/// Cache capacity; oldest entries are evicted past this bound.
const GRANT_CACHE_CAPACITY: usize = 1024;

// ============================================================================
// SECTION: Grant Cache
// ============================================================================

/// One cached visibility verdict.
struct CachedVerdict {
    /// Whether the caller may read the target agent's traces.
    allowed: bool,
    /// When the verdict was computed.
    cached_at: Instant,
}

/// Bounded TTL cache keyed by `(caller, target agent)`.
pub struct GrantCache {
    /// Cached verdicts.
    entries: Mutex<HashMap<(uuid::Uuid, String), CachedVerdict>>,
}

impl Default for GrantCache {
    fn default() -> Self {
        Self::new()
    }
}

impl GrantCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Looks up a fresh verdict.
    fn get(&self, caller: uuid::Uuid, target: &str) -> Option<bool> {
        let entries = self.entries.lock().ok()?;
        let verdict = entries.get(&(caller, target.to_string()))?;
        (verdict.cached_at.elapsed() < GRANT_CACHE_TTL).then_some(verdict.allowed)
    }

    /// Stores a verdict, evicting stale entries past capacity.
    fn put(&self, caller: uuid::Uuid, target: &str, allowed: bool) {
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };
        if entries.len() >= GRANT_CACHE_CAPACITY {
            entries.retain(|_, verdict| verdict.cached_at.elapsed() < GRANT_CACHE_TTL);
        }
        if entries.len() >= GRANT_CACHE_CAPACITY {
            entries.clear();
        }
        entries.insert((caller, target.to_string()), CachedVerdict {
            allowed,
            cached_at: Instant::now(),
        });
    }
}

// ============================================================================
// SECTION: Read Filtering
// ============================================================================

/// Filters decisions to those the caller may read.
///
/// Invisible records are silently dropped, never surfaced as errors.
///
/// # Errors
///
/// Returns [`ServiceError`] when grant loading fails.
pub fn filter_readable(
    tx: &mut Transaction<'_>,
    cache: &GrantCache,
    caller: &Caller,
    decisions: Vec<Decision>,
    now: OffsetDateTime,
) -> Result<Vec<Decision>, ServiceError> {
    if caller.at_least(Role::Admin) {
        return Ok(decisions);
    }
    let grants = precedent_store::grants::readable_trace_grants(
        tx,
        caller.org_id,
        caller.agent_id,
        &caller.tags,
        now,
    )?;
    let mut visible = Vec::with_capacity(decisions.len());
    for decision in decisions {
        if decision.agent_key == caller.agent_key {
            visible.push(decision);
            continue;
        }
        let target = decision.agent_key.as_str();
        let allowed = cache.get(caller.agent_id.as_uuid(), target).unwrap_or_else(|| {
            let allowed = grants.iter().any(|grant| {
                let grantee_matches = match &grant.grantee {
                    Grantee::Agent(id) => *id == caller.agent_id,
                    Grantee::Tag(tag) => caller.tags.contains(tag),
                };
                let resource_matches = grant
                    .resource_id
                    .as_deref()
                    .is_none_or(|resource| resource == target);
                grantee_matches && resource_matches
            });
            cache.put(caller.agent_id.as_uuid(), target, allowed);
            allowed
        });
        if allowed {
            visible.push(decision);
        }
    }
    Ok(visible)
}

// ============================================================================
// SECTION: Write Gates
// ============================================================================

/// Requires the caller to hold at least the given role.
///
/// # Errors
///
/// Returns [`ServiceError::Forbidden`] when the role is insufficient.
pub fn require_role(caller: &Caller, role: Role) -> Result<(), ServiceError> {
    if caller.at_least(role) {
        return Ok(());
    }
    Err(ServiceError::Forbidden(format!("requires role {} or higher", role.as_str())))
}

/// Requires that the caller traces under its own identity unless it holds
/// admin privileges.
///
/// # Errors
///
/// Returns [`ServiceError::Forbidden`] when the identity does not match.
pub fn require_self_or_admin(caller: &Caller, agent: &AgentKey) -> Result<(), ServiceError> {
    if caller.at_least(Role::Admin) || caller.agent_key == *agent {
        return Ok(());
    }
    Err(ServiceError::Forbidden("agents may only trace their own decisions".to_string()))
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use precedent_core::AgentId;
    use precedent_core::AgentKey;
    use precedent_core::OrgId;
    use precedent_core::Role;

    use super::GrantCache;
    use super::require_role;
    use super::require_self_or_admin;
    use crate::context::Caller;

    fn caller(role: Role) -> Caller {
        Caller {
            org_id: OrgId::generate(),
            agent_id: AgentId::generate(),
            agent_key: AgentKey::new("planner"),
            role,
            tags: vec![],
        }
    }

    #[test]
    fn role_gate_rejects_lower_ranks() {
        assert!(require_role(&caller(Role::Admin), Role::Admin).is_ok());
        assert!(require_role(&caller(Role::Agent), Role::Admin).is_err());
        assert!(require_role(&caller(Role::OrgOwner), Role::Admin).is_ok());
    }

    #[test]
    fn non_admin_may_only_trace_as_itself() {
        let me = caller(Role::Agent);
        assert!(require_self_or_admin(&me, &AgentKey::new("planner")).is_ok());
        assert!(require_self_or_admin(&me, &AgentKey::new("coder")).is_err());
        let admin = caller(Role::Admin);
        assert!(require_self_or_admin(&admin, &AgentKey::new("coder")).is_ok());
    }

    #[test]
    fn grant_cache_round_trips_verdicts() {
        let cache = GrantCache::new();
        let caller_id = uuid::Uuid::new_v4();
        assert_eq!(cache.get(caller_id, "coder"), None);
        cache.put(caller_id, "coder", true);
        assert_eq!(cache.get(caller_id, "coder"), Some(true));
        assert_eq!(cache.get(caller_id, "reviewer"), None);
    }
}
