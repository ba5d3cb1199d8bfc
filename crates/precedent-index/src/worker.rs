// precedent-index/src/worker.rs
// ============================================================================
// Module: Outbox Worker
// Description: Background drain of the search outbox into the vector index.
// Purpose: Keep the derived index eventually consistent with Postgres.
// Dependencies: precedent-store, precedent-core
// ============================================================================

//! ## Overview
//! The worker polls the outbox on a single timer, claims batches with
//! `FOR UPDATE SKIP LOCKED`, groups claims by organization, bulk-loads the
//! decisions, and issues one upsert or delete RPC per group. Failures bump
//! the attempt counter; rows at the attempt ceiling become dead letters
//! that surface in stats but are never retried automatically. Workers in
//! different processes coordinate purely through the row locks.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::thread::JoinHandle;
use std::time::Duration;

use precedent_core::DecisionId;
use precedent_core::Metrics;
use precedent_core::OrgId;
use precedent_core::OutboxOperation;
use precedent_store::PgPool;
use precedent_store::Store;
use time::OffsetDateTime;

use crate::client::VectorIndexClient;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Outbox worker configuration.
#[derive(Debug, Clone)]
pub struct OutboxWorkerConfig {
    /// Poll interval in milliseconds.
    pub poll_interval_ms: u64,
    /// Maximum rows claimed per tick.
    pub batch_size: i64,
    /// Attempt ceiling before a row is dead-lettered.
    pub max_attempts: i32,
}

impl Default for OutboxWorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1_000,
            batch_size: 100,
            max_attempts: 10,
        }
    }
}

// ============================================================================
// SECTION: Worker
// ============================================================================

/// Handle to the running outbox worker thread.
pub struct OutboxWorker {
    /// Shutdown flag shared with the thread.
    shutdown: Arc<AtomicBool>,
    /// Join handle for graceful drain.
    handle: Option<JoinHandle<()>>,
}

impl OutboxWorker {
    /// Spawns the worker thread.
    #[must_use]
    pub fn spawn(
        store: Arc<Store>,
        client: Arc<VectorIndexClient>,
        metrics: Arc<dyn Metrics>,
        config: OutboxWorkerConfig,
    ) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&shutdown);
        let handle = std::thread::spawn(move || {
            let interval = Duration::from_millis(config.poll_interval_ms.max(100));
            while !flag.load(Ordering::Relaxed) {
                run_tick(&store, &client, metrics.as_ref(), &config);
                std::thread::sleep(interval);
            }
            // Drain once more so rows claimed before shutdown are finished.
            run_tick(&store, &client, metrics.as_ref(), &config);
        });
        Self {
            shutdown,
            handle: Some(handle),
        }
    }

    /// Signals shutdown and waits for the drain tick to finish.
    pub fn stop(mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for OutboxWorker {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

// ============================================================================
// SECTION: Tick Processing
// ============================================================================

/// Runs one claim-and-deliver pass over every database holding an outbox.
fn run_tick(
    store: &Store,
    client: &VectorIndexClient,
    metrics: &dyn Metrics,
    config: &OutboxWorkerConfig,
) {
    let mut pools: Vec<PgPool> = vec![store.control_pool().clone()];
    pools.extend(store.dedicated_pools());
    for pool in pools {
        if let Err(err) = drain_pool(store, client, metrics, config, &pool) {
            tracing::warn!(error = %err, "outbox tick failed");
        }
    }
}

/// Claims and delivers one batch from a single database.
fn drain_pool(
    store: &Store,
    client: &VectorIndexClient,
    metrics: &dyn Metrics,
    config: &OutboxWorkerConfig,
    pool: &PgPool,
) -> Result<(), precedent_store::StoreError> {
    let mut conn = pool
        .get()
        .map_err(|err| precedent_store::StoreError::from_pool("outbox_tick", &err))?;
    let now = OffsetDateTime::now_utc();
    let entries =
        precedent_store::outbox::claim_batch(&mut conn, now, config.batch_size, config.max_attempts)?;
    if entries.is_empty() {
        return Ok(());
    }
    metrics.incr("outbox_claimed", entries.len() as u64);

    let mut upserts: BTreeMap<OrgId, Vec<DecisionId>> = BTreeMap::new();
    let mut deletes: Vec<DecisionId> = Vec::new();
    for entry in &entries {
        match entry.operation {
            OutboxOperation::Upsert => {
                upserts.entry(entry.org_id).or_default().push(entry.decision_id);
            }
            OutboxOperation::Delete => deletes.push(entry.decision_id),
        }
    }

    let mut failed: Vec<(DecisionId, OutboxOperation)> = Vec::new();
    let mut done: Vec<(DecisionId, OutboxOperation)> = Vec::new();
    let mut last_error = String::new();

    for (org_id, ids) in &upserts {
        match deliver_upserts(store, client, *org_id, ids) {
            Ok(()) => done.extend(ids.iter().map(|id| (*id, OutboxOperation::Upsert))),
            Err(err) => {
                last_error = err;
                failed.extend(ids.iter().map(|id| (*id, OutboxOperation::Upsert)));
            }
        }
    }
    if !deletes.is_empty() {
        match client.delete_decisions(&deletes) {
            Ok(()) => done.extend(deletes.iter().map(|id| (*id, OutboxOperation::Delete))),
            Err(err) => {
                last_error = err.to_string();
                failed.extend(deletes.iter().map(|id| (*id, OutboxOperation::Delete)));
            }
        }
    }

    precedent_store::outbox::complete(&mut conn, &done)?;
    if !failed.is_empty() {
        metrics.incr("outbox_failed", failed.len() as u64);
        tracing::warn!(error = %last_error, rows = failed.len(), "outbox delivery failed");
        precedent_store::outbox::fail(&mut conn, &failed, &last_error)?;
    }
    let dead = precedent_store::outbox::dead_letter_count(&mut conn, config.max_attempts)?;
    if dead > 0 {
        metrics.incr("outbox_dead_letters", u64::try_from(dead).unwrap_or(0));
    }
    Ok(())
}

/// Loads one organization's decisions and upserts their points.
fn deliver_upserts(
    store: &Store,
    client: &VectorIndexClient,
    org_id: OrgId,
    ids: &[DecisionId],
) -> Result<(), String> {
    let scope = store.resolve(org_id).map_err(|err| err.to_string())?;
    let mut conn = scope.connection().map_err(|err| err.to_string())?;
    let mut tx = scope.begin(&mut conn).map_err(|err| err.to_string())?;
    let decisions = precedent_store::decisions::get_decisions_with_embeddings(&mut tx, org_id, ids)
        .map_err(|err| err.to_string())?;
    tx.commit().map_err(|err| err.to_string())?;
    // Decisions revised between enqueue and claim hydrate empty; their
    // upsert rows are completed without an RPC and the delete row wins.
    client.upsert_decisions(&decisions).map_err(|err| err.to_string())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::OutboxWorkerConfig;

    #[test]
    fn default_worker_config_matches_operational_defaults() {
        let config = OutboxWorkerConfig::default();
        assert_eq!(config.poll_interval_ms, 1_000);
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.max_attempts, 10);
    }
}
