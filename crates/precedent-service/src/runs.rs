// precedent-service/src/runs.rs
// ============================================================================
// Module: Run Lifecycle
// Description: Explicit run creation, event appends, and completion.
// Purpose: Serve clients that manage runs outside the one-shot trace path.
// Dependencies: precedent-core, precedent-store
// ============================================================================

//! ## Overview
//! `trace` opens and completes a run implicitly; long-running clients can
//! instead create a run, append ordered events to it, and complete it
//! explicitly. Event sequence numbers are allocated by the run row inside
//! the append transaction, which is also what enforces the run reference
//! for the partitioned event table.

// ============================================================================
// SECTION: Imports
// ============================================================================

use precedent_core::AgentEvent;
use precedent_core::AgentKey;
use precedent_core::AgentRun;
use precedent_core::Role;
use precedent_core::RunId;
use precedent_core::RunStatus;
use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::authz;
use crate::context::Caller;
use crate::decisions::DecisionService;
use crate::error::ServiceError;

// ============================================================================
// SECTION: Inputs
// ============================================================================

/// Run creation request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateRunInput {
    /// Acting agent; defaults to the caller's identity.
    #[serde(default)]
    pub agent_id: Option<String>,
    /// External correlation identifier.
    #[serde(default)]
    pub trace_id: Option<String>,
    /// Parent run for nested invocations.
    #[serde(default)]
    pub parent_run_id: Option<RunId>,
    /// Open-ended metadata.
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// Event append request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppendEventInput {
    /// Event type label.
    pub event_type: String,
    /// Open-ended payload.
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
}

/// Run completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteRunInput {
    /// Terminal status; defaults to `completed`.
    #[serde(default)]
    pub status: Option<RunStatus>,
}

// ============================================================================
// SECTION: Service Methods
// ============================================================================

impl DecisionService {
    /// Creates a run in the `running` state.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] on authorization or storage failure.
    pub fn create_run(
        &self,
        caller: &Caller,
        input: &CreateRunInput,
    ) -> Result<AgentRun, ServiceError> {
        authz::require_role(caller, Role::Agent)?;
        let agent_key = input
            .agent_id
            .as_deref()
            .map_or_else(|| caller.agent_key.clone(), AgentKey::new);
        authz::require_self_or_admin(caller, &agent_key)?;
        let run = AgentRun {
            id: RunId::generate(),
            agent_key,
            org_id: caller.org_id,
            trace_id: input.trace_id.clone(),
            parent_run_id: input.parent_run_id,
            status: RunStatus::Running,
            started_at: OffsetDateTime::now_utc(),
            completed_at: None,
            metadata: input.metadata.clone().unwrap_or_else(|| serde_json::json!({})),
        };
        let scope = self.store().resolve(caller.org_id)?;
        let mut conn = scope.connection()?;
        let mut tx = scope.begin(&mut conn)?;
        precedent_store::runs::insert_run(&mut tx, &run)?;
        tx.commit().map_err(|err| ServiceError::internal("create_run", err))?;
        Ok(run)
    }

    /// Appends an event to a run.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotFound`] when the run does not exist.
    pub fn append_event(
        &self,
        caller: &Caller,
        run_id: RunId,
        input: &AppendEventInput,
    ) -> Result<AgentEvent, ServiceError> {
        authz::require_role(caller, Role::Agent)?;
        if input.event_type.trim().is_empty() {
            return Err(ServiceError::Validation(precedent_core::ValidationError::Empty {
                field: "event_type",
            }));
        }
        let scope = self.store().resolve(caller.org_id)?;
        let mut conn = scope.connection()?;
        let mut tx = scope.begin(&mut conn)?;
        let run = precedent_store::runs::get_run(&mut tx, caller.org_id, run_id)?
            .ok_or(ServiceError::NotFound("run"))?;
        authz::require_self_or_admin(caller, &run.agent_key)?;
        let event = precedent_store::runs::append_event(
            &mut tx,
            caller.org_id,
            run_id,
            &caller.agent_key,
            &input.event_type,
            OffsetDateTime::now_utc(),
            &input.payload.clone().unwrap_or_else(|| serde_json::json!({})),
        )?;
        tx.commit().map_err(|err| ServiceError::internal("append_event", err))?;
        Ok(event)
    }

    /// Completes a run with a terminal status.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotFound`] when the run does not exist.
    pub fn complete_run(
        &self,
        caller: &Caller,
        run_id: RunId,
        input: &CompleteRunInput,
    ) -> Result<(), ServiceError> {
        authz::require_role(caller, Role::Agent)?;
        let status = input.status.unwrap_or(RunStatus::Completed);
        if status == RunStatus::Running {
            return Err(ServiceError::Validation(precedent_core::ValidationError::Format {
                field: "status",
                reason: "completion requires a terminal status",
            }));
        }
        let scope = self.store().resolve(caller.org_id)?;
        let mut conn = scope.connection()?;
        let mut tx = scope.begin(&mut conn)?;
        let run = precedent_store::runs::get_run(&mut tx, caller.org_id, run_id)?
            .ok_or(ServiceError::NotFound("run"))?;
        authz::require_self_or_admin(caller, &run.agent_key)?;
        precedent_store::runs::finish_run(
            &mut tx,
            caller.org_id,
            run_id,
            status,
            OffsetDateTime::now_utc(),
        )?;
        tx.commit().map_err(|err| ServiceError::internal("complete_run", err))?;
        Ok(())
    }
}
