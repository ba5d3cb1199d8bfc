// precedent-api/src/routes.rs
// ============================================================================
// Module: HTTP Routes
// Description: Route table and handlers for the JSON API.
// Purpose: Authenticate, dispatch into the engine, and envelope responses.
// Dependencies: axum, precedent-service, precedent-broker
// ============================================================================

//! ## Overview
//! All `/v1` routes authenticate a bearer token into a [`Caller`] before
//! touching the engine; `/auth` routes are public. Handlers bridge into
//! the synchronous service with `tokio::task::block_in_place`. The SSE
//! subscription attaches the caller's organization to the notification
//! broker and streams decision envelopes until the client disconnects.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::response::Response;
use axum::response::Sse;
use axum::response::sse::Event;
use axum::routing::delete;
use axum::routing::get;
use axum::routing::post;
use precedent_broker::NotificationBroker;
use precedent_core::BillingGateway;
use precedent_core::GrantId;
use precedent_core::RunId;
use precedent_service::AppendEventInput;
use precedent_service::AssessInput;
use precedent_service::Caller;
use precedent_service::CompleteRunInput;
use precedent_service::ConflictsQuery;
use precedent_service::CreateGrantInput;
use precedent_service::CreateRunInput;
use precedent_service::DecisionService;
use precedent_service::QueryInput;
use precedent_service::SearchInput;
use precedent_service::ServiceError;
use precedent_service::SignupService;
use precedent_service::TraceInput;
use serde::Deserialize;
use serde_json::json;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

use crate::envelope::ApiError;
use crate::envelope::data;

// ============================================================================
// SECTION: State
// ============================================================================

/// Shared state behind every handler.
pub struct ApiState {
    /// The decision trace engine.
    pub service: Arc<DecisionService>,
    /// Signup and verification orchestration.
    pub signup: Arc<SignupService>,
    /// Notification broker feeding SSE subscribers.
    pub broker: Arc<NotificationBroker>,
    /// Billing processor seam.
    pub billing: Arc<dyn BillingGateway>,
    /// JWT signing key.
    pub jwt_secret: Vec<u8>,
    /// Token lifetime in seconds.
    pub token_ttl_secs: u64,
}

/// Builds the route table.
#[must_use]
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/auth/signup", post(auth_signup))
        .route("/auth/verify", get(auth_verify))
        .route("/auth/token", post(auth_token))
        .route("/v1/trace", post(trace))
        .route("/v1/decisions/{id}/revise", post(revise))
        .route("/v1/decisions", delete(purge_decisions))
        .route("/v1/runs", post(create_run))
        .route("/v1/runs/{id}/events", post(append_event))
        .route("/v1/runs/{id}/complete", post(complete_run))
        .route("/v1/query", post(query))
        .route("/v1/query/temporal", post(query_temporal))
        .route("/v1/search", post(search))
        .route("/v1/agents/{id}/history", get(agent_history))
        .route("/v1/conflicts", get(conflicts))
        .route("/v1/grants", post(create_grant))
        .route("/v1/grants/{id}", delete(delete_grant))
        .route("/v1/assess", post(assess))
        .route("/v1/usage", get(usage))
        .route("/v1/subscribe", get(subscribe))
        .route("/billing/checkout", post(billing_checkout))
        .route("/billing/portal", post(billing_portal))
        .route("/billing/webhooks", post(billing_webhook))
        .with_state(state)
}

/// Serves the API on the given bind address.
///
/// # Errors
///
/// Returns an error string when the listener fails.
pub async fn serve(state: Arc<ApiState>, bind: &str) -> Result<(), String> {
    let addr: SocketAddr = bind.parse().map_err(|_| format!("invalid bind address {bind}"))?;
    let listener =
        tokio::net::TcpListener::bind(addr).await.map_err(|err| format!("bind failed: {err}"))?;
    axum::serve(listener, router(state)).await.map_err(|err| format!("serve failed: {err}"))
}

// ============================================================================
// SECTION: Auth Helpers
// ============================================================================

/// Authenticates the bearer token into a caller.
fn authenticate(state: &ApiState, headers: &HeaderMap) -> Result<Caller, ApiError> {
    let token = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::unauthorized("missing bearer token"))?;
    let claims = precedent_service::token::verify(&state.jwt_secret, token)?;
    let caller = tokio::task::block_in_place(|| {
        state.service.resolve_caller(claims.org, &claims.agent_key())
    })?;
    Ok(caller)
}

/// Runs a synchronous service call on the blocking bridge.
fn blocking<T>(f: impl FnOnce() -> Result<T, ServiceError>) -> Result<T, ApiError> {
    tokio::task::block_in_place(f).map_err(ApiError::from)
}

// ============================================================================
// SECTION: Public Routes
// ============================================================================

/// Liveness probe.
async fn health() -> Response {
    data(json!({ "status": "ok" }))
}

/// Signup request body.
#[derive(Debug, Deserialize)]
struct SignupBody {
    /// Organization display name.
    name: String,
    /// Contact email.
    email: String,
}

/// `POST /auth/signup`
async fn auth_signup(
    State(state): State<Arc<ApiState>>,
    Json(body): Json<SignupBody>,
) -> Result<Response, ApiError> {
    let result = blocking(|| state.signup.signup(&body.name, &body.email))?;
    Ok(data(json!({
        "org_id": result.org_id,
        "slug": result.slug,
        "owner_agent": result.owner_agent,
        "api_key": result.api_key,
        "verification": "sent",
    })))
}

/// Verification query string.
#[derive(Debug, Deserialize)]
struct VerifyParams {
    /// One-shot verification token.
    token: String,
}

/// `GET /auth/verify?token=`
async fn auth_verify(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<VerifyParams>,
) -> Result<Response, ApiError> {
    let org_id = blocking(|| state.signup.verify(&params.token))?;
    Ok(data(json!({ "org_id": org_id, "verified": true })))
}

/// Token exchange body.
#[derive(Debug, Deserialize)]
struct TokenBody {
    /// Organization slug.
    org_slug: String,
    /// Agent API key.
    api_key: String,
}

/// `POST /auth/token`
async fn auth_token(
    State(state): State<Arc<ApiState>>,
    Json(body): Json<TokenBody>,
) -> Result<Response, ApiError> {
    let caller = blocking(|| state.service.authenticate_api_key(&body.org_slug, &body.api_key))?;
    let now = u64::try_from(time::OffsetDateTime::now_utc().unix_timestamp()).unwrap_or(0);
    let token = precedent_service::token::issue(
        &state.jwt_secret,
        caller.org_id,
        &caller.agent_key,
        state.token_ttl_secs,
        now,
    )?;
    Ok(data(json!({
        "token": token,
        "token_type": "Bearer",
        "expires_in": state.token_ttl_secs,
        "agent_id": caller.agent_key,
        "role": caller.role,
    })))
}

// ============================================================================
// SECTION: Trace and Runs
// ============================================================================

/// `POST /v1/trace`
async fn trace(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Json(body): Json<TraceInput>,
) -> Result<Response, ApiError> {
    let caller = authenticate(&state, &headers)?;
    let output = blocking(|| state.service.trace(&caller, &body))?;
    Ok(data(output))
}

/// `POST /v1/decisions/{id}/revise`
async fn revise(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<TraceInput>,
) -> Result<Response, ApiError> {
    let caller = authenticate(&state, &headers)?;
    let output = blocking(|| state.service.revise(&caller, &id, &body))?;
    Ok(data(output))
}

/// `DELETE /v1/decisions`
async fn purge_decisions(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let caller = authenticate(&state, &headers)?;
    let deleted = blocking(|| state.service.purge_decisions(&caller))?;
    Ok(data(json!({ "deleted": deleted })))
}

/// `POST /v1/runs`
async fn create_run(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Json(body): Json<CreateRunInput>,
) -> Result<Response, ApiError> {
    let caller = authenticate(&state, &headers)?;
    let run = blocking(|| state.service.create_run(&caller, &body))?;
    Ok(data(run))
}

/// `POST /v1/runs/{id}/events`
async fn append_event(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<AppendEventInput>,
) -> Result<Response, ApiError> {
    let caller = authenticate(&state, &headers)?;
    let run_id = RunId::parse(&id).map_err(|_| ApiError::invalid("run id is not a uuid"))?;
    let event = blocking(|| state.service.append_event(&caller, run_id, &body))?;
    Ok(data(event))
}

/// `POST /v1/runs/{id}/complete`
async fn complete_run(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<CompleteRunInput>,
) -> Result<Response, ApiError> {
    let caller = authenticate(&state, &headers)?;
    let run_id = RunId::parse(&id).map_err(|_| ApiError::invalid("run id is not a uuid"))?;
    blocking(|| state.service.complete_run(&caller, run_id, &body))?;
    Ok(data(json!({ "run_id": run_id, "completed": true })))
}

// ============================================================================
// SECTION: Reads
// ============================================================================

/// `POST /v1/query`
async fn query(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Json(body): Json<QueryInput>,
) -> Result<Response, ApiError> {
    let caller = authenticate(&state, &headers)?;
    let output = blocking(|| state.service.query(&caller, &body))?;
    Ok(data(output))
}

/// `POST /v1/query/temporal`
async fn query_temporal(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Json(body): Json<QueryInput>,
) -> Result<Response, ApiError> {
    if body.as_of.is_none() {
        return Err(ApiError::invalid("temporal queries require as_of"));
    }
    let caller = authenticate(&state, &headers)?;
    let output = blocking(|| state.service.query(&caller, &body))?;
    Ok(data(output))
}

/// `POST /v1/search`
async fn search(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Json(body): Json<SearchInput>,
) -> Result<Response, ApiError> {
    let caller = authenticate(&state, &headers)?;
    let hits = blocking(|| state.service.search(&caller, &body))?;
    Ok(data(hits))
}

/// `GET /v1/agents/{id}/history`
async fn agent_history(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let caller = authenticate(&state, &headers)?;
    let input = QueryInput {
        agent_ids: vec![id],
        limit: Some(50),
        ..QueryInput::default()
    };
    let output = blocking(|| state.service.query(&caller, &input))?;
    Ok(data(output))
}

/// `GET /v1/conflicts`
async fn conflicts(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Query(params): Query<ConflictsQuery>,
) -> Result<Response, ApiError> {
    let caller = authenticate(&state, &headers)?;
    let output = blocking(|| state.service.conflicts(&caller, &params))?;
    Ok(data(output))
}

// ============================================================================
// SECTION: Grants, Assess, Usage
// ============================================================================

/// `POST /v1/grants`
async fn create_grant(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Json(body): Json<CreateGrantInput>,
) -> Result<Response, ApiError> {
    let caller = authenticate(&state, &headers)?;
    let grant = blocking(|| state.service.create_grant(&caller, &body))?;
    Ok(data(grant))
}

/// `DELETE /v1/grants/{id}`
async fn delete_grant(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let caller = authenticate(&state, &headers)?;
    let grant_id = GrantId::parse(&id).map_err(|_| ApiError::invalid("grant id is not a uuid"))?;
    blocking(|| state.service.delete_grant(&caller, grant_id))?;
    Ok(data(json!({ "grant_id": grant_id, "deleted": true })))
}

/// `POST /v1/assess`
async fn assess(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Json(body): Json<AssessInput>,
) -> Result<Response, ApiError> {
    let caller = authenticate(&state, &headers)?;
    let assessment = blocking(|| state.service.assess(&caller, &body))?;
    Ok(data(assessment))
}

/// `GET /v1/usage`
async fn usage(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let caller = authenticate(&state, &headers)?;
    let stats = blocking(|| state.service.stats(&caller))?;
    Ok(data(json!({
        "period_decisions": stats.usage_this_period,
        "decision_limit": stats.decision_limit,
        "total_decisions": stats.total_decisions,
        "outbox_pending": stats.outbox_pending,
    })))
}

// ============================================================================
// SECTION: Subscription
// ============================================================================

/// `GET /v1/subscribe` — SSE stream of decision notifications.
async fn subscribe(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let caller = authenticate(&state, &headers)?;
    let (id, receiver) = state.broker.subscribe(caller.org_id);
    tracing::debug!(org = %caller.org_id, subscriber = ?id, "sse subscriber attached");
    let stream = ReceiverStream::new(receiver).map(|notification| {
        let payload = serde_json::to_string(&notification)
            .unwrap_or_else(|_| "{\"error\":\"serialization\"}".to_string());
        Ok(Event::default().event("decision").data(payload))
    });
    Ok(Sse::new(stream))
}

// ============================================================================
// SECTION: Billing
// ============================================================================

/// Checkout request body.
#[derive(Debug, Deserialize)]
struct CheckoutBody {
    /// Target plan label.
    plan: String,
}

/// `POST /billing/checkout`
async fn billing_checkout(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Json(body): Json<CheckoutBody>,
) -> Result<Response, ApiError> {
    let caller = authenticate(&state, &headers)?;
    if !caller.at_least(precedent_core::Role::OrgOwner) {
        return Err(ApiError::new(
            StatusCode::FORBIDDEN,
            "FORBIDDEN",
            "billing requires the org owner",
        ));
    }
    let url = state
        .billing
        .checkout_url(caller.org_id, &body.plan)
        .map_err(|err| ApiError::new(StatusCode::BAD_REQUEST, "INVALID_INPUT", err.to_string()))?;
    Ok(data(json!({ "checkout_url": url })))
}

/// `POST /billing/portal`
async fn billing_portal(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let caller = authenticate(&state, &headers)?;
    if !caller.at_least(precedent_core::Role::OrgOwner) {
        return Err(ApiError::new(
            StatusCode::FORBIDDEN,
            "FORBIDDEN",
            "billing requires the org owner",
        ));
    }
    let url = state
        .billing
        .portal_url(caller.org_id)
        .map_err(|err| ApiError::new(StatusCode::BAD_REQUEST, "INVALID_INPUT", err.to_string()))?;
    Ok(data(json!({ "portal_url": url })))
}

/// `POST /billing/webhooks`
async fn billing_webhook(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Result<Response, ApiError> {
    let signature = headers
        .get("billing-signature")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("missing webhook signature"))?;
    let event = state
        .billing
        .verify_webhook(&body, signature)
        .map_err(|err| ApiError::unauthorized(err.to_string()))?;
    let applied = apply_billing_event(&state, &event);
    if let Err(err) = &applied {
        tracing::warn!(error = %err.message, "billing event not applied");
    }
    Ok(data(json!({ "received": true })))
}

/// Applies a verified billing event to the organization record.
fn apply_billing_event(state: &ApiState, event: &serde_json::Value) -> Result<(), ApiError> {
    let kind = event.get("type").and_then(serde_json::Value::as_str).unwrap_or_default();
    if kind != "subscription.updated" {
        return Ok(());
    }
    let org_id = event
        .get("org_id")
        .and_then(serde_json::Value::as_str)
        .and_then(|raw| precedent_core::OrgId::parse(raw).ok())
        .ok_or_else(|| ApiError::invalid("billing event without org_id"))?;
    let plan = event
        .get("plan")
        .and_then(serde_json::Value::as_str)
        .and_then(precedent_core::Plan::parse)
        .ok_or_else(|| ApiError::invalid("billing event without plan"))?;
    let subscription = event.get("subscription_id").and_then(serde_json::Value::as_str);
    let customer = event.get("customer_id").and_then(serde_json::Value::as_str);
    tokio::task::block_in_place(|| {
        precedent_store::orgs::update_plan(
            state.service.store(),
            org_id,
            plan,
            subscription,
            customer,
        )
    })
    .map_err(|err| ApiError::from(ServiceError::from(err)))?;
    Ok(())
}
