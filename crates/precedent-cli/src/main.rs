// precedent-cli/src/main.rs
// ============================================================================
// Module: Precedent CLI
// Description: The `precedent` binary: serve, mcp, migrate, config-check.
// Purpose: Assemble the engine from configuration and run the transports.
// Dependencies: clap, tokio, precedent-*
// ============================================================================

//! ## Overview
//! `precedent serve` runs the HTTP API together with the background
//! machinery (outbox worker, conflict refresher, notification listeners)
//! and, when configured, the MCP HTTP transport. `precedent mcp` runs the
//! stdio MCP transport for a single authenticated agent. `precedent
//! migrate` applies control-plane and tenant migrations; `precedent
//! config-check` validates the environment without connecting.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use clap::Parser;
use clap::Subcommand;
use precedent_api::ApiState;
use precedent_broker::NotificationBroker;
use precedent_broker::NotificationListener;
use precedent_config::McpTransport;
use precedent_config::PrecedentConfig;
use precedent_core::AuditEvent;
use precedent_core::AuditSink;
use precedent_core::DisabledBillingGateway;
use precedent_core::EmbeddingProvider;
use precedent_core::MailError;
use precedent_core::NoopMetrics;
use precedent_core::VerificationMailer;
use precedent_index::OutboxWorker;
use precedent_index::SemanticSearch;
use precedent_index::VectorIndexClient;
use precedent_mcp::McpServer;
use precedent_mcp::ToolRouter;
use precedent_providers::HttpEmbeddingProvider;
use precedent_providers::NoopEmbeddingProvider;
use precedent_service::ConflictRefresher;
use precedent_service::DecisionService;
use precedent_service::SignupService;
use precedent_store::Store;
use thiserror::Error;

// ============================================================================
// SECTION: CLI Definition
// ============================================================================

/// Precedent: a multi-tenant decision trace store for AI agents.
#[derive(Debug, Parser)]
#[command(name = "precedent", version, about)]
struct Cli {
    /// Command to run.
    #[command(subcommand)]
    command: Command,
}

/// Top-level commands.
#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP API and background workers.
    Serve,
    /// Run the MCP stdio transport for one authenticated agent.
    Mcp {
        /// Organization slug to authenticate against.
        #[arg(long, env = "PRECEDENT_ORG_SLUG")]
        org_slug: String,
        /// Agent API key.
        #[arg(long, env = "PRECEDENT_API_KEY")]
        api_key: String,
    },
    /// Apply control-plane and tenant migrations, then exit.
    Migrate,
    /// Validate the environment configuration, then exit.
    ConfigCheck,
}

/// CLI errors.
#[derive(Debug, Error)]
enum CliError {
    /// Configuration failure.
    #[error("config error: {0}")]
    Config(#[from] precedent_config::ConfigError),
    /// Storage failure.
    #[error("store error: {0}")]
    Store(#[from] precedent_store::StoreError),
    /// Service failure.
    #[error("service error: {0}")]
    Service(#[from] precedent_service::ServiceError),
    /// Transport failure.
    #[error("server error: {0}")]
    Server(String),
}

// ============================================================================
// SECTION: Seam Implementations
// ============================================================================

/// Mailer that logs verification links instead of sending mail.
struct LogMailer;

impl VerificationMailer for LogMailer {
    fn send_verification(&self, email: &str, verify_url: &str) -> Result<(), MailError> {
        tracing::info!(email, verify_url, "verification link issued");
        Ok(())
    }
}

/// Audit sink writing JSON lines through tracing.
struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: &AuditEvent) {
        let payload = serde_json::to_string(event).unwrap_or_default();
        tracing::info!(target: "audit", %payload, "audit event");
    }
}

// ============================================================================
// SECTION: Assembly
// ============================================================================

/// Everything `serve` and `mcp` need, wired from configuration.
struct Engine {
    /// Storage backend.
    store: Arc<Store>,
    /// The decision trace engine.
    service: Arc<DecisionService>,
    /// Signup orchestration.
    signup: Arc<SignupService>,
    /// Notification broker.
    broker: Arc<NotificationBroker>,
    /// External vector index client, when configured.
    index_client: Option<Arc<VectorIndexClient>>,
}

/// Builds the engine from configuration.
fn build_engine(config: &PrecedentConfig) -> Result<Engine, CliError> {
    let store = Arc::new(Store::connect(config.database.clone())?);
    let embedder: Arc<dyn EmbeddingProvider> = if config.embedding.endpoint.trim().is_empty() {
        tracing::warn!("no embedding endpoint configured, using the zero-vector provider");
        Arc::new(NoopEmbeddingProvider::new(config.embedding.dimension))
    } else {
        Arc::new(
            HttpEmbeddingProvider::new(config.embedding.clone())
                .map_err(|err| CliError::Server(err.to_string()))?,
        )
    };
    let index_client = VectorIndexClient::new(config.vector_index.clone())
        .map_err(|err| CliError::Server(err.to_string()))?
        .map(Arc::new);
    if let Some(client) = &index_client {
        if let Err(err) = client.ensure_collection() {
            tracing::warn!(error = %err, "vector index bootstrap failed, continuing degraded");
        }
    }
    let search = SemanticSearch::new(index_client.clone());
    let service = Arc::new(DecisionService::new(
        Arc::clone(&store),
        embedder,
        search,
        Arc::new(TracingAuditSink),
        config.outbox.max_attempts,
    ));
    let signup = Arc::new(SignupService::new(
        Arc::clone(&store),
        Arc::new(LogMailer),
        config.base_url.clone(),
    ));
    Ok(Engine {
        store,
        service,
        signup,
        broker: Arc::new(NotificationBroker::new()),
        index_client,
    })
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Runs the API server plus background machinery until ctrl-c.
async fn run_serve(config: PrecedentConfig) -> Result<(), CliError> {
    let engine = build_engine(&config)?;

    let _listener =
        NotificationListener::spawn(engine.store.control_pool().clone(), Arc::clone(&engine.broker));
    let _refresher = ConflictRefresher::spawn(Arc::clone(&engine.store), config.conflict_refresh_ms);
    let _worker = engine.index_client.as_ref().map(|client| {
        OutboxWorker::spawn(
            Arc::clone(&engine.store),
            Arc::clone(client),
            Arc::new(NoopMetrics),
            config.outbox.clone(),
        )
    });

    let api_state = Arc::new(ApiState {
        service: Arc::clone(&engine.service),
        signup: Arc::clone(&engine.signup),
        broker: Arc::clone(&engine.broker),
        billing: Arc::new(DisabledBillingGateway),
        jwt_secret: config.auth.jwt_secret.clone().into_bytes(),
        token_ttl_secs: config.auth.token_ttl_secs,
    });

    tracing::info!(bind = %config.server.http_bind, "http api listening");
    if config.server.mcp_transport == McpTransport::Http {
        let router = Arc::new(ToolRouter::new(Arc::clone(&engine.service)));
        let mcp = McpServer::new(router, None, config.auth.jwt_secret.clone().into_bytes());
        let bind = config.server.mcp_bind.clone();
        tracing::info!(bind = %bind, "mcp http transport listening");
        tokio::select! {
            result = precedent_api::serve(api_state, &config.server.http_bind) => {
                result.map_err(CliError::Server)
            }
            result = mcp.serve_http(&bind) => {
                result.map_err(|err| CliError::Server(err.to_string()))
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                Ok(())
            }
        }
    } else {
        tokio::select! {
            result = precedent_api::serve(api_state, &config.server.http_bind) => {
                result.map_err(CliError::Server)
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                Ok(())
            }
        }
    }
}

/// Runs the stdio MCP transport for one authenticated agent.
fn run_mcp(config: &PrecedentConfig, org_slug: &str, api_key: &str) -> Result<(), CliError> {
    let engine = build_engine(config)?;
    let caller = engine.service.authenticate_api_key(org_slug, api_key)?;
    let router = Arc::new(ToolRouter::new(Arc::clone(&engine.service)));
    let server = McpServer::new(
        router,
        Some((caller.org_id, caller.agent_key)),
        config.auth.jwt_secret.clone().into_bytes(),
    );
    server.serve_stdio().map_err(|err| CliError::Server(err.to_string()))
}

/// Applies control-plane and tenant migrations.
fn run_migrate(config: &PrecedentConfig) -> Result<(), CliError> {
    let store = Arc::new(Store::connect(config.database.clone())?);
    for (org_id, schema) in store.tenant_schemas()? {
        let scope = store.resolve(org_id)?;
        precedent_store::migrations::apply_tenant(&scope)?;
        tracing::info!(schema, "tenant schema migrated");
    }
    tracing::info!("migrations applied");
    Ok(())
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();
    let config = PrecedentConfig::from_env()?;
    match cli.command {
        Command::Serve => {
            config.validate()?;
            run_serve(config).await
        }
        Command::Mcp {
            org_slug,
            api_key,
        } => tokio::task::block_in_place(|| run_mcp(&config, &org_slug, &api_key)),
        Command::Migrate => tokio::task::block_in_place(|| run_migrate(&config)),
        Command::ConfigCheck => {
            config.validate()?;
            tracing::info!(
                http_bind = %config.server.http_bind,
                vector_index = !config.vector_index.url.is_empty(),
                embedding = !config.embedding.endpoint.is_empty(),
                "configuration is valid"
            );
            Ok(())
        }
    }
}
