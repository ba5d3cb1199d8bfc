// precedent-service/src/conflicts.rs
// ============================================================================
// Module: Conflict Engine
// Description: Conflict listing, triage, and the periodic refresh loop.
// Purpose: Surface cross-agent disagreements with asymmetry summaries.
// Dependencies: precedent-core, precedent-store
// ============================================================================

//! ## Overview
//! Detection is a materialized view refreshed concurrently on a cadence: a
//! background loop enumerates tenant schemas from the control plane and
//! refreshes each in turn, logging per-schema failures without blocking
//! the rest. Listing joins triage state and attaches the consensus
//! asymmetry note when one side of a pair clearly outweighs the other.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::thread::JoinHandle;
use std::time::Duration;

use postgres::Transaction;
use precedent_core::DecisionConflict;
use precedent_store::ConflictFilter;
use precedent_store::Store;

use crate::error::ServiceError;
use crate::render::CompactConflict;
use crate::render::compact_conflict;

// ============================================================================
// SECTION: Listing
// ============================================================================

/// Lists conflicts with corroboration counts for asymmetry notes.
///
/// # Errors
///
/// Returns [`ServiceError`] when the storage reads fail.
pub fn list_with_corroboration(
    tx: &mut Transaction<'_>,
    org_id: precedent_core::OrgId,
    filter: &ConflictFilter,
) -> Result<(Vec<DecisionConflict>, Vec<(i64, i64)>), ServiceError> {
    let conflicts = precedent_store::conflicts::list_conflicts(tx, org_id, filter)?;
    let mut corroborations = Vec::with_capacity(conflicts.len());
    for conflict in &conflicts {
        let a = precedent_store::decisions::corroboration_count(
            tx,
            org_id,
            &conflict.decision_type,
            &conflict.outcome_a,
        )?;
        let b = precedent_store::decisions::corroboration_count(
            tx,
            org_id,
            &conflict.decision_type,
            &conflict.outcome_b,
        )?;
        corroborations.push((a, b));
    }
    Ok((conflicts, corroborations))
}

/// Renders conflicts into their compact forms.
#[must_use]
pub fn compact_conflicts(
    conflicts: &[DecisionConflict],
    corroborations: &[(i64, i64)],
) -> Vec<CompactConflict> {
    conflicts
        .iter()
        .zip(corroborations)
        .map(|(conflict, (a, b))| compact_conflict(conflict, *a, *b))
        .collect()
}

// ============================================================================
// SECTION: Conflicts Query
// ============================================================================

/// Conflict listing filters accepted by both surfaces.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ConflictsQuery {
    /// Decision type filter.
    #[serde(default)]
    pub decision_type: Option<String>,
    /// Agent filter (either side of the pair).
    #[serde(default)]
    pub agent_id: Option<String>,
    /// Explicit status filter; absent shows open and acknowledged.
    #[serde(default)]
    pub status: Option<String>,
    /// Severity filter.
    #[serde(default)]
    pub severity: Option<String>,
    /// Category filter.
    #[serde(default)]
    pub category: Option<String>,
    /// Page size.
    #[serde(default)]
    pub limit: Option<i64>,
    /// Page offset.
    #[serde(default)]
    pub offset: Option<i64>,
}

impl crate::decisions::DecisionService {
    /// Lists conflicts in compact form with asymmetry notes.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] on unknown filter labels or storage
    /// failure.
    pub fn conflicts(
        &self,
        caller: &crate::context::Caller,
        query: &ConflictsQuery,
    ) -> Result<Vec<CompactConflict>, ServiceError> {
        let status = query
            .status
            .as_deref()
            .map(|label| {
                precedent_core::ConflictStatus::parse(label).ok_or_else(|| {
                    ServiceError::Validation(precedent_core::ValidationError::Format {
                        field: "status",
                        reason: "unknown conflict status",
                    })
                })
            })
            .transpose()?;
        let severity = query
            .severity
            .as_deref()
            .map(|label| {
                precedent_core::ConflictSeverity::parse(label).ok_or_else(|| {
                    ServiceError::Validation(precedent_core::ValidationError::Format {
                        field: "severity",
                        reason: "unknown conflict severity",
                    })
                })
            })
            .transpose()?;
        let category = query
            .category
            .as_deref()
            .map(|label| {
                precedent_core::ConflictCategory::parse(label).ok_or_else(|| {
                    ServiceError::Validation(precedent_core::ValidationError::Format {
                        field: "category",
                        reason: "unknown conflict category",
                    })
                })
            })
            .transpose()?;
        let filter = ConflictFilter {
            decision_type: query.decision_type.clone(),
            agent_key: query.agent_id.clone(),
            status,
            severity,
            category,
            limit: query.limit.unwrap_or(20),
            offset: query.offset.unwrap_or(0),
        };
        let scope = self.store().resolve(caller.org_id)?;
        let mut conn = scope.connection()?;
        let mut tx = scope.begin(&mut conn)?;
        let (conflicts, corroborations) =
            list_with_corroboration(&mut tx, caller.org_id, &filter)?;
        tx.commit().map_err(|err| ServiceError::internal("conflicts_commit", err))?;
        Ok(compact_conflicts(&conflicts, &corroborations))
    }
}

// ============================================================================
// SECTION: Refresh Loop
// ============================================================================

/// Handle to the periodic conflict refresh loop.
pub struct ConflictRefresher {
    /// Shutdown flag shared with the thread.
    shutdown: Arc<AtomicBool>,
    /// Join handle for shutdown.
    handle: Option<JoinHandle<()>>,
}

impl ConflictRefresher {
    /// Spawns the refresh loop with the given cadence.
    #[must_use]
    pub fn spawn(store: Arc<Store>, interval_ms: u64) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);
        let handle = std::thread::spawn(move || {
            let interval = Duration::from_millis(interval_ms.max(1_000));
            while !flag.load(Ordering::Relaxed) {
                refresh_all(&store);
                std::thread::sleep(interval);
            }
        });
        Self {
            shutdown,
            handle: Some(handle),
        }
    }

    /// Signals shutdown and joins the thread.
    pub fn stop(mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ConflictRefresher {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Refreshes every tenant schema once; failures stay local to a schema.
pub fn refresh_all(store: &Store) {
    let schemas = match store.tenant_schemas() {
        Ok(schemas) => schemas,
        Err(err) => {
            tracing::warn!(error = %err, "conflict refresh could not enumerate tenants");
            return;
        }
    };
    for (org_id, schema) in schemas {
        let result = store.resolve(org_id).and_then(|scope| {
            let mut conn = scope.connection()?;
            precedent_store::conflicts::refresh(&mut conn, scope.schema())
        });
        if let Err(err) = result {
            tracing::warn!(schema, error = %err, "conflict refresh failed for tenant");
        }
    }
}
