// precedent-mcp/src/tools.rs
// ============================================================================
// Module: MCP Tool Router
// Description: Tool and resource routing for the Precedent MCP server.
// Purpose: Expose thin, authenticated wrappers over the decision service.
// Dependencies: precedent-service, serde_json
// ============================================================================

//! ## Overview
//! The tool router dispatches MCP tool calls to
//! [`precedent_service::DecisionService`]. Every call authenticates from
//! the request context first; an unauthenticated context is a tool error,
//! never a silent pass-through. `check` records the caller in the check
//! tracker, and `trace` appends an advisory content item when no recent
//! check preceded it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use precedent_core::AgentKey;
use precedent_core::OrgId;
use precedent_service::AssessInput;
use precedent_service::Caller;
use precedent_service::CheckInput;
use precedent_service::DecisionService;
use precedent_service::QueryInput;
use precedent_service::SearchInput;
use precedent_service::ServiceError;
use precedent_service::TraceInput;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

use crate::roots;
use crate::roots::RootsCache;
use crate::roots::RootsClient;
use crate::tracker::CheckTracker;

/// Default page size for the resource reads.
const RESOURCE_PAGE: usize = 20;

// ============================================================================
// SECTION: Request Context
// ============================================================================

/// Per-request context carried by the transports.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Session identifier for roots caching.
    pub session_id: String,
    /// Authenticated principal claims, when the transport resolved them.
    pub identity: Option<(OrgId, AgentKey)>,
}

impl RequestContext {
    /// Builds an unauthenticated context for a session.
    #[must_use]
    pub const fn anonymous(session_id: String) -> Self {
        Self {
            session_id,
            identity: None,
        }
    }

    /// Builds an authenticated context.
    #[must_use]
    pub const fn authenticated(session_id: String, org_id: OrgId, agent: AgentKey) -> Self {
        Self {
            session_id,
            identity: Some((org_id, agent)),
        }
    }
}

// ============================================================================
// SECTION: Tool Names and Definitions
// ============================================================================

/// Tools exposed by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolName {
    /// Precedent lookup.
    Check,
    /// Decision recording.
    Trace,
    /// Exact-match structured query.
    Query,
    /// Semantic search.
    Search,
    /// Timeline view.
    Recent,
    /// Aggregate org health.
    Stats,
    /// Conflict listing.
    Conflicts,
    /// Correctness feedback.
    Assess,
}

impl ToolName {
    /// Parses a tool name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "check" => Some(Self::Check),
            "trace" => Some(Self::Trace),
            "query" => Some(Self::Query),
            "search" => Some(Self::Search),
            "recent" => Some(Self::Recent),
            "stats" => Some(Self::Stats),
            "conflicts" => Some(Self::Conflicts),
            "assess" => Some(Self::Assess),
            _ => None,
        }
    }

    /// Returns the stable tool name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Check => "check",
            Self::Trace => "trace",
            Self::Query => "query",
            Self::Search => "search",
            Self::Recent => "recent",
            Self::Stats => "stats",
            Self::Conflicts => "conflicts",
            Self::Assess => "assess",
        }
    }
}

/// Tool annotations per the MCP specification.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ToolAnnotations {
    /// Whether the tool only reads.
    #[serde(rename = "readOnlyHint")]
    pub read_only_hint: bool,
    /// Whether repeat calls are safe.
    #[serde(rename = "idempotentHint")]
    pub idempotent_hint: bool,
    /// Whether the tool destroys data.
    #[serde(rename = "destructiveHint")]
    pub destructive_hint: bool,
}

/// Tool definition advertised by `tools/list`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    /// Tool name.
    pub name: &'static str,
    /// Human-readable description.
    pub description: &'static str,
    /// JSON schema for the argument object.
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
    /// Behavior annotations.
    pub annotations: ToolAnnotations,
}

/// Returns the advertised tool definitions.
#[must_use]
pub fn tool_definitions() -> Vec<ToolDefinition> {
    let read_only = ToolAnnotations {
        read_only_hint: true,
        idempotent_hint: true,
        destructive_hint: false,
    };
    let write = ToolAnnotations {
        read_only_hint: false,
        idempotent_hint: false,
        destructive_hint: false,
    };
    vec![
        ToolDefinition {
            name: "check",
            description: "Look up precedents and conflicts for a decision_type before deciding.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "decision_type": { "type": "string" },
                    "query": { "type": "string" },
                    "agent_id": { "type": "string" },
                    "repo": { "type": "string" },
                    "limit": { "type": "integer" },
                },
                "required": ["decision_type"],
            }),
            annotations: read_only,
        },
        ToolDefinition {
            name: "trace",
            description: "Record a decision: category, outcome, confidence, reasoning, \
                          alternatives, and evidence.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "decision_type": { "type": "string" },
                    "outcome": { "type": "string" },
                    "confidence": { "type": "number" },
                    "reasoning": { "type": "string" },
                    "alternatives": { "type": "array" },
                    "evidence": { "type": "array" },
                    "precedent_ref": { "type": "string" },
                    "model": { "type": "string" },
                    "task": { "type": "string" },
                    "idempotency_key": { "type": "string" },
                },
                "required": ["decision_type", "outcome"],
            }),
            annotations: write,
        },
        ToolDefinition {
            name: "query",
            description: "Exact-match structured query over recorded decisions.",
            input_schema: json!({ "type": "object" }),
            annotations: read_only,
        },
        ToolDefinition {
            name: "search",
            description: "Semantic search over recorded decisions.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string" },
                    "limit": { "type": "integer" },
                    "confidence_min": { "type": "number" },
                    "repo": { "type": "string" },
                },
                "required": ["query"],
            }),
            annotations: read_only,
        },
        ToolDefinition {
            name: "recent",
            description: "Timeline view of recent decisions.",
            input_schema: json!({ "type": "object" }),
            annotations: read_only,
        },
        ToolDefinition {
            name: "stats",
            description: "Aggregate organization health.",
            input_schema: json!({ "type": "object" }),
            annotations: read_only,
        },
        ToolDefinition {
            name: "conflicts",
            description: "List cross-agent decision conflicts.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "status": { "type": "string" },
                    "severity": { "type": "string" },
                    "category": { "type": "string" },
                    "decision_type": { "type": "string" },
                },
            }),
            annotations: read_only,
        },
        ToolDefinition {
            name: "assess",
            description: "Record correctness feedback on a decision.",
            input_schema: json!({
                "type": "object",
                "properties": {
                    "decision_id": { "type": "string" },
                    "outcome": {
                        "type": "string",
                        "enum": ["correct", "incorrect", "partially_correct"],
                    },
                    "notes": { "type": "string" },
                },
                "required": ["decision_id", "outcome"],
            }),
            annotations: write,
        },
    ]
}

// ============================================================================
// SECTION: Tool Output
// ============================================================================

/// Tool output content item.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolContent {
    /// Text content (JSON payloads are serialized into text).
    Text {
        /// Text payload.
        text: String,
    },
}

/// Tool call result payload.
#[derive(Debug, Clone, Serialize)]
pub struct ToolCallResult {
    /// Output content items.
    pub content: Vec<ToolContent>,
    /// Whether the call failed.
    #[serde(rename = "isError", skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

/// Tool routing errors.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Tool name not recognized.
    #[error("unknown tool")]
    UnknownTool,
    /// Missing or invalid authentication.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),
    /// Tool payload deserialization failed.
    #[error("invalid parameters: {0}")]
    InvalidParams(String),
    /// Resource URI not recognized.
    #[error("unknown resource: {0}")]
    UnknownResource(String),
    /// Service-level failure.
    #[error(transparent)]
    Service(#[from] ServiceError),
    /// Serialization failure.
    #[error("serialization failure")]
    Serialization,
}

// ============================================================================
// SECTION: Tool Router
// ============================================================================

/// Routes MCP tool calls into the decision service.
pub struct ToolRouter {
    /// The decision trace engine.
    service: Arc<DecisionService>,
    /// Check-before-trace tracker.
    tracker: CheckTracker,
    /// Session-scoped roots cache.
    roots_cache: RootsCache,
}

impl ToolRouter {
    /// Creates the router.
    #[must_use]
    pub fn new(service: Arc<DecisionService>) -> Self {
        Self {
            service,
            tracker: CheckTracker::default(),
            roots_cache: RootsCache::new(),
        }
    }

    /// Resolves the caller from the request context.
    fn caller(&self, context: &RequestContext) -> Result<Caller, ToolError> {
        let (org_id, agent) = context
            .identity
            .as_ref()
            .ok_or_else(|| ToolError::Unauthenticated("no credentials in context".to_string()))?;
        Ok(self.service.resolve_caller(*org_id, agent)?)
    }

    /// Handles a tool call by name with a JSON argument object.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError`] when authentication, decoding, or the service
    /// call fails.
    pub fn handle_tool_call(
        &self,
        context: &RequestContext,
        roots: &dyn RootsClient,
        name: &str,
        arguments: Value,
    ) -> Result<ToolCallResult, ToolError> {
        let tool = ToolName::parse(name).ok_or(ToolError::UnknownTool)?;
        let caller = self.caller(context)?;
        match tool {
            ToolName::Check => {
                let mut input = decode::<CheckInput>(arguments)?;
                input.repo = roots::resolve_repo_filter(
                    input.repo.as_deref(),
                    &self.roots_cache,
                    &context.session_id,
                    roots,
                );
                self.tracker.record(caller.agent_key.as_str(), &input.decision_type);
                let output = self.service.check(&caller, &input)?;
                single_json(&output)
            }
            ToolName::Trace => {
                let mut input = decode::<TraceInput>(arguments)?;
                if input.repo.is_none() {
                    input.repo = self.roots_cache.resolve(&context.session_id, roots);
                }
                let decision_type = input.decision_type.clone();
                let checked = self.tracker.was_checked(caller.agent_key.as_str(), &decision_type);
                let output = self.service.trace(&caller, &input)?;
                let mut content = vec![json_content(&output)?];
                if !checked {
                    content.push(ToolContent::Text {
                        text: format!(
                            "NOTE: No check was called for decision_type=\"{decision_type}\" \
                             before this trace. Call check first to avoid duplicating or \
                             contradicting prior decisions."
                        ),
                    });
                }
                Ok(ToolCallResult {
                    content,
                    is_error: false,
                })
            }
            ToolName::Query => {
                let mut input = decode::<QueryInput>(arguments)?;
                input.repo = roots::resolve_repo_filter(
                    input.repo.as_deref(),
                    &self.roots_cache,
                    &context.session_id,
                    roots,
                );
                let output = self.service.query(&caller, &input)?;
                single_json(&output)
            }
            ToolName::Search => {
                let mut input = decode::<SearchInput>(arguments)?;
                input.repo = roots::resolve_repo_filter(
                    input.repo.as_deref(),
                    &self.roots_cache,
                    &context.session_id,
                    roots,
                );
                let output = self.service.search(&caller, &input)?;
                single_json(&output)
            }
            ToolName::Recent => {
                let mut input = decode::<QueryInput>(arguments)?;
                input.repo = roots::resolve_repo_filter(
                    input.repo.as_deref(),
                    &self.roots_cache,
                    &context.session_id,
                    roots,
                );
                let output = self.service.recent(&caller, &input)?;
                single_json(&output)
            }
            ToolName::Stats => {
                let output = self.service.stats(&caller)?;
                single_json(&output)
            }
            ToolName::Conflicts => {
                let input = decode::<precedent_service::ConflictsQuery>(arguments)?;
                let output = self.service.conflicts(&caller, &input)?;
                single_json(&output)
            }
            ToolName::Assess => {
                let input = decode::<AssessInput>(arguments)?;
                let output = self.service.assess(&caller, &input)?;
                single_json(&output)
            }
        }
    }

    // ------------------------------------------------------------------
    // Resources
    // ------------------------------------------------------------------

    /// Lists the read-only resources the server exposes.
    #[must_use]
    pub fn list_resources(&self) -> Vec<Value> {
        vec![
            json!({
                "uri": "precedent://session/current",
                "name": "Current session decisions",
                "mimeType": "application/json",
            }),
            json!({
                "uri": "precedent://decisions/recent",
                "name": "Recent org decisions",
                "mimeType": "application/json",
            }),
            json!({
                "uri": "precedent://agent/{id}/history",
                "name": "Agent decision history",
                "mimeType": "application/json",
            }),
        ]
    }

    /// Reads a resource by URI.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError`] for unknown URIs or service failures.
    pub fn read_resource(
        &self,
        context: &RequestContext,
        uri: &str,
    ) -> Result<Value, ToolError> {
        let caller = self.caller(context)?;
        let path = uri.strip_prefix("precedent://").unwrap_or(uri);
        let query = if path == "session/current" {
            QueryInput {
                agent_ids: vec![caller.agent_key.to_string()],
                limit: Some(RESOURCE_PAGE),
                ..QueryInput::default()
            }
        } else if path == "decisions/recent" {
            QueryInput {
                limit: Some(RESOURCE_PAGE),
                ..QueryInput::default()
            }
        } else if let Some(agent) = parse_agent_history(path) {
            QueryInput {
                agent_ids: vec![agent.to_string()],
                limit: Some(RESOURCE_PAGE),
                ..QueryInput::default()
            }
        } else {
            return Err(ToolError::UnknownResource(uri.to_string()));
        };
        let output = self.service.query(&caller, &query)?;
        let text = serde_json::to_string(&output).map_err(|_| ToolError::Serialization)?;
        Ok(json!({
            "contents": [{
                "uri": uri,
                "mimeType": "application/json",
                "text": text,
            }],
        }))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Parses an `agent/{id}/history` resource path, stripping only the
/// trailing segment so agent ids containing "history" resolve correctly.
fn parse_agent_history(path: &str) -> Option<&str> {
    let rest = path.strip_prefix("agent/")?;
    let agent = rest.strip_suffix("/history")?;
    (!agent.is_empty()).then_some(agent)
}

/// Decodes a JSON value into a typed request payload.
fn decode<T: for<'de> Deserialize<'de>>(payload: Value) -> Result<T, ToolError> {
    serde_json::from_value(payload).map_err(|err| ToolError::InvalidParams(err.to_string()))
}

/// Serializes a payload into a single text content item.
fn json_content<T: Serialize>(payload: &T) -> Result<ToolContent, ToolError> {
    let text = serde_json::to_string(payload).map_err(|_| ToolError::Serialization)?;
    Ok(ToolContent::Text {
        text,
    })
}

/// Wraps a payload into a one-item tool result.
fn single_json<T: Serialize>(payload: &T) -> Result<ToolCallResult, ToolError> {
    Ok(ToolCallResult {
        content: vec![json_content(payload)?],
        is_error: false,
    })
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::ToolName;
    use super::tool_definitions;

    #[test]
    fn every_definition_parses_back_to_its_tool() {
        for definition in tool_definitions() {
            assert!(ToolName::parse(definition.name).is_some());
        }
        assert_eq!(tool_definitions().len(), 8);
    }

    #[test]
    fn read_tools_are_annotated_read_only() {
        for definition in tool_definitions() {
            let expect_read_only = !matches!(definition.name, "trace" | "assess");
            assert_eq!(definition.annotations.read_only_hint, expect_read_only);
            assert!(!definition.annotations.destructive_hint);
        }
    }

    #[test]
    fn unknown_tools_do_not_parse() {
        assert_eq!(ToolName::parse("drop_tables"), None);
    }

    #[test]
    fn agent_history_parsing_strips_only_the_trailing_segment() {
        assert_eq!(super::parse_agent_history("agent/planner/history"), Some("planner"));
        assert_eq!(super::parse_agent_history("agent/history-bot/history"), Some("history-bot"));
        assert_eq!(super::parse_agent_history("agent/history/history"), Some("history"));
        assert_eq!(super::parse_agent_history("agent//history"), None);
        assert_eq!(super::parse_agent_history("agent/planner"), None);
        assert_eq!(super::parse_agent_history("decisions/recent"), None);
    }
}
