// precedent-store/src/lib.rs
// ============================================================================
// Module: Precedent Store Library
// Description: Multi-tenant Postgres storage for decision traces.
// Purpose: Own all SQL: tenancy, migrations, bi-temporal decisions, ledgers.
// Dependencies: postgres, r2d2, pgvector, precedent-core
// ============================================================================

//! ## Overview
//! The store crate is the single authority over SQL. It resolves
//! organizations to tenant scopes (shared schema or dedicated database),
//! applies forward-only migrations, and implements the bi-temporal decision
//! tables, the append-only run/event log, grants, assessments, the conflict
//! materialized view, the idempotency ledger, and the search outbox.
//! Every tenant-scoped statement runs inside a transaction whose first
//! statements set the schema search path and the row-level-security org
//! marker.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod agents;
pub mod assessments;
pub mod conflicts;
pub mod decisions;
pub mod error;
pub mod grants;
pub mod idempotency;
pub mod migrations;
pub mod orgs;
pub mod outbox;
pub mod runs;
pub mod tenant;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use conflicts::ConflictFilter;
pub use decisions::DecisionPage;
pub use decisions::DecisionQuery;
pub use decisions::NewAlternative;
pub use decisions::NewEvidence;
pub use decisions::TraceParams;
pub use error::StoreError;
pub use idempotency::Reservation;
pub use tenant::PgConn;
pub use tenant::PgPool;
pub use tenant::Store;
pub use tenant::StoreConfig;
pub use tenant::TenantScope;
