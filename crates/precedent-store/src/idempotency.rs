// precedent-store/src/idempotency.rs
// ============================================================================
// Module: Idempotency Ledger Storage
// Description: Reservation state machine for safe write retries.
// Purpose: Replay completed responses and fence concurrent duplicates.
// Dependencies: postgres, precedent-core
// ============================================================================

//! ## Overview
//! The ledger holds one row per `(org, agent, endpoint, key)`. Reservation
//! is an upsert that either takes ownership, replays a completed response
//! with a matching payload hash, or reports a mismatch or an in-flight
//! duplicate. Expired in-progress reservations are reclaimed in the same
//! statement flow.

// ============================================================================
// SECTION: Imports
// ============================================================================

use postgres::Transaction;
use precedent_core::AgentKey;
use precedent_core::IdempotencyStatus;
use precedent_core::OrgId;
use time::OffsetDateTime;

use crate::error::StoreError;

// ============================================================================
// SECTION: Reservation Outcome
// ============================================================================

/// Result of attempting to reserve an idempotency key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reservation {
    /// The caller owns the key and should execute the request.
    Owned,
    /// A completed entry with the same payload exists; replay its response.
    Replay {
        /// Stored response body.
        response_body: String,
    },
    /// A completed or in-flight entry exists with a different payload.
    Mismatch,
    /// Another request holding the key is still executing.
    InProgress,
}

// ============================================================================
// SECTION: Operations
// ============================================================================

/// Attempts to reserve the key for this request.
///
/// # Errors
///
/// Returns [`StoreError`] when a statement fails.
pub fn begin(
    tx: &mut Transaction<'_>,
    org_id: OrgId,
    agent: &AgentKey,
    endpoint: &str,
    key: &str,
    payload_hash: &str,
    now: OffsetDateTime,
    reservation_ttl: time::Duration,
) -> Result<Reservation, StoreError> {
    let until = now + reservation_ttl;
    let existing = tx
        .query_opt(
            "SELECT payload_hash, status, response_body, in_progress_until FROM idempotency_keys \
             WHERE org_id = $1 AND agent_id = $2 AND endpoint = $3 AND idem_key = $4 FOR UPDATE",
            &[&org_id.as_uuid(), &agent.as_str(), &endpoint, &key],
        )
        .map_err(|err| StoreError::from_pg("idempotency_begin", &err))?;
    let Some(row) = existing else {
        tx.execute(
            "INSERT INTO idempotency_keys (org_id, agent_id, endpoint, idem_key, payload_hash, \
             status, in_progress_until) VALUES ($1, $2, $3, $4, $5, $6, $7)",
            &[
                &org_id.as_uuid(),
                &agent.as_str(),
                &endpoint,
                &key,
                &payload_hash,
                &IdempotencyStatus::InProgress.as_str(),
                &until,
            ],
        )
        .map_err(|err| StoreError::from_pg("idempotency_begin", &err))?;
        return Ok(Reservation::Owned);
    };
    let stored_hash: String = row.get(0);
    let status_label: String = row.get(1);
    let response_body: Option<String> = row.get(2);
    let in_progress_until: Option<OffsetDateTime> = row.get(3);
    let status = IdempotencyStatus::parse(&status_label).ok_or_else(|| {
        StoreError::invalid("idempotency_begin", format!("unknown status {status_label}"))
    })?;
    if stored_hash != payload_hash {
        return Ok(Reservation::Mismatch);
    }
    match status {
        IdempotencyStatus::Completed => {
            let response_body = response_body.ok_or_else(|| {
                StoreError::invalid("idempotency_begin", "completed entry without response")
            })?;
            Ok(Reservation::Replay {
                response_body,
            })
        }
        IdempotencyStatus::InProgress => {
            let expired = in_progress_until.is_none_or(|deadline| deadline <= now);
            if !expired {
                return Ok(Reservation::InProgress);
            }
            tx.execute(
                "UPDATE idempotency_keys SET in_progress_until = $5 WHERE org_id = $1 AND \
                 agent_id = $2 AND endpoint = $3 AND idem_key = $4",
                &[&org_id.as_uuid(), &agent.as_str(), &endpoint, &key, &until],
            )
            .map_err(|err| StoreError::from_pg("idempotency_begin", &err))?;
            Ok(Reservation::Owned)
        }
    }
}

/// Marks the entry completed with the serialized response.
///
/// # Errors
///
/// Returns [`StoreError`] when the update fails.
pub fn complete(
    tx: &mut Transaction<'_>,
    org_id: OrgId,
    agent: &AgentKey,
    endpoint: &str,
    key: &str,
    response_body: &str,
) -> Result<(), StoreError> {
    tx.execute(
        "UPDATE idempotency_keys SET status = $5, response_body = $6, in_progress_until = NULL \
         WHERE org_id = $1 AND agent_id = $2 AND endpoint = $3 AND idem_key = $4",
        &[
            &org_id.as_uuid(),
            &agent.as_str(),
            &endpoint,
            &key,
            &IdempotencyStatus::Completed.as_str(),
            &response_body,
        ],
    )
    .map_err(|err| StoreError::from_pg("idempotency_complete", &err))?;
    Ok(())
}

/// Releases an in-progress reservation after a failed request.
///
/// # Errors
///
/// Returns [`StoreError`] when the delete fails.
pub fn clear_in_progress(
    tx: &mut Transaction<'_>,
    org_id: OrgId,
    agent: &AgentKey,
    endpoint: &str,
    key: &str,
) -> Result<(), StoreError> {
    tx.execute(
        "DELETE FROM idempotency_keys WHERE org_id = $1 AND agent_id = $2 AND endpoint = $3 AND \
         idem_key = $4 AND status = $5",
        &[
            &org_id.as_uuid(),
            &agent.as_str(),
            &endpoint,
            &key,
            &IdempotencyStatus::InProgress.as_str(),
        ],
    )
    .map_err(|err| StoreError::from_pg("idempotency_clear", &err))?;
    Ok(())
}
