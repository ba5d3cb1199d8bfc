// precedent-store/src/outbox.rs
// ============================================================================
// Module: Search Outbox Storage
// Description: Durable queue driving vector index synchronization.
// Purpose: Enqueue index operations transactionally and claim them safely.
// Dependencies: postgres, precedent-core
// ============================================================================

//! ## Overview
//! Outbox rows are written in the same transaction as the decision they
//! describe, so a committed trace always reaches the vector index
//! eventually. Workers claim batches with `FOR UPDATE SKIP LOCKED`, bump
//! the attempt counter on failure, and leave rows at the attempt ceiling as
//! dead letters for the stats surface.

// ============================================================================
// SECTION: Imports
// ============================================================================

use postgres::Client;
use postgres::Row;
use postgres::Transaction;
use precedent_core::DecisionId;
use precedent_core::OrgId;
use precedent_core::OutboxEntry;
use precedent_core::OutboxOperation;
use time::Duration;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::StoreError;

/// How long a claimed row stays locked to its worker.
const CLAIM_LOCK: Duration = Duration::seconds(30);

// ============================================================================
// SECTION: Enqueue
// ============================================================================

/// Enqueues an index operation inside the caller's transaction.
///
/// The outbox table lives in the `public` schema of whichever database the
/// tenant occupies, so the write commits atomically with the decision.
///
/// # Errors
///
/// Returns [`StoreError`] when the insert fails.
pub fn enqueue(
    tx: &mut Transaction<'_>,
    org_id: OrgId,
    decision_id: DecisionId,
    operation: OutboxOperation,
    now: OffsetDateTime,
) -> Result<(), StoreError> {
    tx.execute(
        "INSERT INTO public.search_outbox (decision_id, org_id, operation, created_at) VALUES \
         ($1, $2, $3, $4) ON CONFLICT (decision_id, operation) DO NOTHING",
        &[&decision_id.as_uuid(), &org_id.as_uuid(), &operation.as_str(), &now],
    )
    .map_err(|err| StoreError::from_pg("outbox_enqueue", &err))?;
    Ok(())
}

// ============================================================================
// SECTION: Claim and Completion
// ============================================================================

/// Claims a batch of due rows, locking them for the claim window.
///
/// # Errors
///
/// Returns [`StoreError`] when the claim statement fails.
pub fn claim_batch(
    conn: &mut Client,
    now: OffsetDateTime,
    batch_size: i64,
    max_attempts: i32,
) -> Result<Vec<OutboxEntry>, StoreError> {
    let locked_until = now + CLAIM_LOCK;
    let rows = conn
        .query(
            "UPDATE public.search_outbox SET locked_until = $2 WHERE (decision_id, operation) IN \
             (SELECT decision_id, operation FROM public.search_outbox WHERE (locked_until IS NULL \
             OR locked_until < $1) AND attempts < $3 ORDER BY created_at LIMIT $4 FOR UPDATE SKIP \
             LOCKED) RETURNING decision_id, org_id, operation, created_at, attempts, last_error, \
             locked_until",
            &[&now, &locked_until, &max_attempts, &batch_size],
        )
        .map_err(|err| StoreError::from_pg("outbox_claim", &err))?;
    rows.iter().map(entry_from_row).collect()
}

/// Deletes rows that were delivered successfully.
///
/// # Errors
///
/// Returns [`StoreError`] when the delete fails.
pub fn complete(
    conn: &mut Client,
    entries: &[(DecisionId, OutboxOperation)],
) -> Result<(), StoreError> {
    for (decision_id, operation) in entries {
        conn.execute(
            "DELETE FROM public.search_outbox WHERE decision_id = $1 AND operation = $2",
            &[&decision_id.as_uuid(), &operation.as_str()],
        )
        .map_err(|err| StoreError::from_pg("outbox_complete", &err))?;
    }
    Ok(())
}

/// Records a delivery failure: bumps attempts, stores the error, unlocks.
///
/// # Errors
///
/// Returns [`StoreError`] when the update fails.
pub fn fail(
    conn: &mut Client,
    entries: &[(DecisionId, OutboxOperation)],
    error: &str,
) -> Result<(), StoreError> {
    for (decision_id, operation) in entries {
        conn.execute(
            "UPDATE public.search_outbox SET attempts = attempts + 1, last_error = $3, \
             locked_until = NULL WHERE decision_id = $1 AND operation = $2",
            &[&decision_id.as_uuid(), &operation.as_str(), &error],
        )
        .map_err(|err| StoreError::from_pg("outbox_fail", &err))?;
    }
    Ok(())
}

/// Counts dead-letter rows (attempts at or past the ceiling).
///
/// # Errors
///
/// Returns [`StoreError`] when the query fails.
pub fn dead_letter_count(conn: &mut Client, max_attempts: i32) -> Result<i64, StoreError> {
    let row = conn
        .query_one("SELECT COUNT(*) FROM public.search_outbox WHERE attempts >= $1", &[
            &max_attempts,
        ])
        .map_err(|err| StoreError::from_pg("outbox_dead_letters", &err))?;
    Ok(row.get(0))
}

/// Counts pending rows for one organization, for the stats surface.
///
/// # Errors
///
/// Returns [`StoreError`] when the query fails.
pub fn pending_for_org(conn: &mut Client, org_id: OrgId) -> Result<i64, StoreError> {
    let row = conn
        .query_one("SELECT COUNT(*) FROM public.search_outbox WHERE org_id = $1", &[
            &org_id.as_uuid(),
        ])
        .map_err(|err| StoreError::from_pg("outbox_pending", &err))?;
    Ok(row.get(0))
}

/// Decodes an outbox row.
fn entry_from_row(row: &Row) -> Result<OutboxEntry, StoreError> {
    let operation_label: String = row.get(2);
    let operation = OutboxOperation::parse(&operation_label).ok_or_else(|| {
        StoreError::invalid("outbox_decode", format!("unknown operation {operation_label}"))
    })?;
    Ok(OutboxEntry {
        decision_id: DecisionId::from_uuid(row.get::<_, Uuid>(0)),
        org_id: OrgId::from_uuid(row.get(1)),
        operation,
        created_at: row.get(3),
        attempts: row.get(4),
        last_error: row.get(5),
        locked_until: row.get(6),
    })
}
