// precedent-index/src/lib.rs
// ============================================================================
// Module: Precedent Index Library
// Description: Secondary vector index, outbox worker, and search fallback.
// Purpose: Keep a derived vector index consistent and serve semantic queries.
// Dependencies: precedent-core, precedent-store, reqwest
// ============================================================================

//! ## Overview
//! The vector index is derived state: the decisions table is authoritative,
//! and a transactional outbox feeds a background worker that mirrors
//! embeddings into an external index over its REST API. Queries prefer the
//! external index and degrade transparently to the in-database vector
//! search; callers never see index errors.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod client;
pub mod search;
pub mod worker;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use client::VectorIndexClient;
pub use client::VectorIndexConfig;
pub use search::SemanticSearch;
pub use search::rescore;
pub use worker::OutboxWorker;
pub use worker::OutboxWorkerConfig;
