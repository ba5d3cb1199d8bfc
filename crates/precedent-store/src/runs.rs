// precedent-store/src/runs.rs
// ============================================================================
// Module: Run Storage
// Description: Agent run lifecycle and the partitioned event log.
// Purpose: Persist invocations and their append-only events in order.
// Dependencies: postgres, precedent-core, time
// ============================================================================

//! ## Overview
//! Runs record one agent invocation each; events are appended under a
//! per-run monotonic sequence number allocated by the run row itself. The
//! event table is range-partitioned by occurrence month and carries no
//! foreign key to runs; the write path validates the run inside the same
//! transaction that allocates the sequence number.

// ============================================================================
// SECTION: Imports
// ============================================================================

use postgres::Row;
use postgres::Transaction;
use precedent_core::AgentEvent;
use precedent_core::AgentKey;
use precedent_core::AgentRun;
use precedent_core::OrgId;
use precedent_core::RunId;
use precedent_core::RunStatus;
use time::Date;
use time::Month;
use time::OffsetDateTime;
use time::Time;

use crate::error::StoreError;

// ============================================================================
// SECTION: Runs
// ============================================================================

/// Inserts a run row.
///
/// # Errors
///
/// Returns [`StoreError`] when the insert fails.
pub fn insert_run(tx: &mut Transaction<'_>, run: &AgentRun) -> Result<(), StoreError> {
    tx.execute(
        "INSERT INTO agent_runs (id, agent_id, org_id, trace_id, parent_run_id, status, \
         started_at, completed_at, metadata) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        &[
            &run.id.as_uuid(),
            &run.agent_key.as_str(),
            &run.org_id.as_uuid(),
            &run.trace_id,
            &run.parent_run_id.map(|id| id.as_uuid()),
            &run.status.as_str(),
            &run.started_at,
            &run.completed_at,
            &run.metadata,
        ],
    )
    .map_err(|err| StoreError::from_pg("insert_run", &err))?;
    Ok(())
}

/// Fetches a run by id.
///
/// # Errors
///
/// Returns [`StoreError`] when the query fails or the row is malformed.
pub fn get_run(
    tx: &mut Transaction<'_>,
    org_id: OrgId,
    run_id: RunId,
) -> Result<Option<AgentRun>, StoreError> {
    let row = tx
        .query_opt(
            "SELECT id, agent_id, org_id, trace_id, parent_run_id, status, started_at, \
             completed_at, metadata FROM agent_runs WHERE org_id = $1 AND id = $2",
            &[&org_id.as_uuid(), &run_id.as_uuid()],
        )
        .map_err(|err| StoreError::from_pg("get_run", &err))?;
    row.map(|row| run_from_row(&row)).transpose()
}

/// Transitions a run to a terminal status.
///
/// # Errors
///
/// Returns [`StoreError::NotFound`] when the run does not exist.
pub fn finish_run(
    tx: &mut Transaction<'_>,
    org_id: OrgId,
    run_id: RunId,
    status: RunStatus,
    completed_at: OffsetDateTime,
) -> Result<(), StoreError> {
    let updated = tx
        .execute(
            "UPDATE agent_runs SET status = $3, completed_at = $4 WHERE org_id = $1 AND id = $2",
            &[&org_id.as_uuid(), &run_id.as_uuid(), &status.as_str(), &completed_at],
        )
        .map_err(|err| StoreError::from_pg("finish_run", &err))?;
    if updated == 0 {
        return Err(StoreError::NotFound {
            what: "run",
        });
    }
    Ok(())
}

/// Decodes a run row.
fn run_from_row(row: &Row) -> Result<AgentRun, StoreError> {
    let status_label: String = row.get(5);
    let status = RunStatus::parse(&status_label).ok_or_else(|| {
        StoreError::invalid("run_from_row", format!("unknown run status {status_label}"))
    })?;
    Ok(AgentRun {
        id: RunId::from_uuid(row.get(0)),
        agent_key: AgentKey::new(row.get::<_, String>(1)),
        org_id: OrgId::from_uuid(row.get(2)),
        trace_id: row.get(3),
        parent_run_id: row.get::<_, Option<uuid::Uuid>>(4).map(RunId::from_uuid),
        status,
        started_at: row.get(6),
        completed_at: row.get(7),
        metadata: row.get(8),
    })
}

// ============================================================================
// SECTION: Events
// ============================================================================

/// Appends an event to a run, allocating the next sequence number.
///
/// The sequence allocation doubles as the run-existence check: updating the
/// run's counter row fails when the run is missing, which is how the
/// partitioned event table enforces its run reference.
///
/// # Errors
///
/// Returns [`StoreError::NotFound`] when the run does not exist.
pub fn append_event(
    tx: &mut Transaction<'_>,
    org_id: OrgId,
    run_id: RunId,
    agent: &AgentKey,
    event_type: &str,
    occurred_at: OffsetDateTime,
    payload: &serde_json::Value,
) -> Result<AgentEvent, StoreError> {
    let row = tx
        .query_opt(
            "UPDATE agent_runs SET event_seq = event_seq + 1 WHERE org_id = $1 AND id = $2 \
             RETURNING event_seq",
            &[&org_id.as_uuid(), &run_id.as_uuid()],
        )
        .map_err(|err| StoreError::from_pg("append_event", &err))?
        .ok_or(StoreError::NotFound {
            what: "run",
        })?;
    let sequence_num: i64 = row.get(0);
    ensure_event_partition(tx, occurred_at)?;
    let id = uuid::Uuid::new_v4();
    tx.execute(
        "INSERT INTO agent_events (id, run_id, org_id, event_type, sequence_num, occurred_at, \
         agent_id, payload) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        &[
            &id,
            &run_id.as_uuid(),
            &org_id.as_uuid(),
            &event_type,
            &sequence_num,
            &occurred_at,
            &agent.as_str(),
            payload,
        ],
    )
    .map_err(|err| StoreError::from_pg("append_event", &err))?;
    Ok(AgentEvent {
        id,
        run_id,
        org_id,
        event_type: event_type.to_string(),
        sequence_num,
        occurred_at,
        agent_key: agent.clone(),
        payload: payload.clone(),
    })
}

/// Lists events for a run ordered by occurrence and sequence.
///
/// # Errors
///
/// Returns [`StoreError`] when the query fails.
pub fn list_events(
    tx: &mut Transaction<'_>,
    org_id: OrgId,
    run_id: RunId,
    limit: i64,
) -> Result<Vec<AgentEvent>, StoreError> {
    let rows = tx
        .query(
            "SELECT id, run_id, org_id, event_type, sequence_num, occurred_at, agent_id, payload \
             FROM agent_events WHERE org_id = $1 AND run_id = $2 ORDER BY occurred_at, \
             sequence_num LIMIT $3",
            &[&org_id.as_uuid(), &run_id.as_uuid(), &limit],
        )
        .map_err(|err| StoreError::from_pg("list_events", &err))?;
    Ok(rows
        .into_iter()
        .map(|row| AgentEvent {
            id: row.get(0),
            run_id: RunId::from_uuid(row.get(1)),
            org_id: OrgId::from_uuid(row.get(2)),
            event_type: row.get(3),
            sequence_num: row.get(4),
            occurred_at: row.get(5),
            agent_key: AgentKey::new(row.get::<_, String>(6)),
            payload: row.get(7),
        })
        .collect())
}

/// Ensures the monthly partition covering `occurred_at` exists.
fn ensure_event_partition(
    tx: &mut Transaction<'_>,
    occurred_at: OffsetDateTime,
) -> Result<(), StoreError> {
    let (name, from, to) = partition_bounds(occurred_at);
    let ddl = format!(
        "CREATE TABLE IF NOT EXISTS {name} PARTITION OF agent_events FOR VALUES FROM \
         ('{from}') TO ('{to}')"
    );
    tx.batch_execute(&ddl).map_err(|err| StoreError::from_pg("ensure_event_partition", &err))?;
    Ok(())
}

/// Computes the partition name and month bounds for an instant.
fn partition_bounds(at: OffsetDateTime) -> (String, String, String) {
    let year = at.year();
    let month = at.month();
    let name = format!("agent_events_y{year:04}m{:02}", u8::from(month));
    let start = Date::from_calendar_date(year, month, 1).unwrap_or(Date::MIN);
    let (next_year, next_month) = match month {
        Month::December => (year + 1, Month::January),
        other => (year, other.next()),
    };
    let end = Date::from_calendar_date(next_year, next_month, 1).unwrap_or(Date::MAX);
    let fmt = |date: Date| {
        let instant = date.with_time(Time::MIDNIGHT).assume_utc();
        format!("{:04}-{:02}-01 00:00:00+00", instant.year(), u8::from(instant.month()))
    };
    (name, fmt(start), fmt(end))
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use time::Date;
    use time::Month;
    use time::Time;

    use super::partition_bounds;

    #[test]
    fn partition_bounds_cover_one_month() {
        let at = Date::from_calendar_date(2026, Month::August, 14)
            .map(|date| date.with_time(Time::MIDNIGHT).assume_utc())
            .unwrap_or(time::OffsetDateTime::UNIX_EPOCH);
        let (name, from, to) = partition_bounds(at);
        assert_eq!(name, "agent_events_y2026m08");
        assert_eq!(from, "2026-08-01 00:00:00+00");
        assert_eq!(to, "2026-09-01 00:00:00+00");
    }

    #[test]
    fn december_rolls_over_to_january() {
        let at = Date::from_calendar_date(2025, Month::December, 31)
            .map(|date| date.with_time(Time::MIDNIGHT).assume_utc())
            .unwrap_or(time::OffsetDateTime::UNIX_EPOCH);
        let (name, _, to) = partition_bounds(at);
        assert_eq!(name, "agent_events_y2025m12");
        assert_eq!(to, "2026-01-01 00:00:00+00");
    }
}
