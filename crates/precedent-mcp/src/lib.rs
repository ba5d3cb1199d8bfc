// precedent-mcp/src/lib.rs
// ============================================================================
// Module: Precedent MCP Library
// Description: MCP tool and resource surface for agent frameworks.
// Purpose: Expose the check-before-trace workflow over JSON-RPC 2.0.
// Dependencies: precedent-service, axum, tokio
// ============================================================================

//! ## Overview
//! The MCP surface exposes the decision trace engine as tools (`check`,
//! `trace`, `query`, `search`, `recent`, `stats`, `conflicts`, `assess`)
//! and read-only resources over JSON-RPC 2.0 on stdio or HTTP. The server
//! handshake carries workflow instructions, `trace` nudges callers that
//! skipped `check`, and repository scoping is inferred from client roots
//! when not supplied explicitly. All tool inputs are untrusted; every call
//! authenticates before it touches the engine.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod roots;
pub mod server;
pub mod tools;
pub mod tracker;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use roots::NoopRootsClient;
pub use roots::RootsCache;
pub use roots::RootsClient;
pub use server::McpServer;
pub use server::McpServerError;
pub use tools::RequestContext;
pub use tools::ToolError;
pub use tools::ToolRouter;
pub use tracker::CheckTracker;
