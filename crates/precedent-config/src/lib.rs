// precedent-config/src/lib.rs
// ============================================================================
// Module: Precedent Configuration
// Description: Environment-driven configuration with validation.
// Purpose: Assemble every tunable of the server from the process env.
// Dependencies: precedent-store, precedent-index, precedent-providers
// ============================================================================

//! ## Overview
//! Configuration is read from environment variables into typed sections:
//! database, vector index, embeddings, auth, SMTP seam, billing seam,
//! outbox, conflict refresh, and the server binds. `validate()` enforces
//! cross-field rules before anything connects. An empty vector-index URL
//! disables the external index; everything else has a working default for
//! local development.

// ============================================================================
// SECTION: Imports
// ============================================================================

use precedent_index::OutboxWorkerConfig;
use precedent_index::VectorIndexConfig;
use precedent_providers::HttpEmbeddingConfig;
use precedent_store::StoreConfig;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A value failed to parse.
    #[error("config option {name} is invalid: {reason}")]
    Invalid {
        /// Environment variable name.
        name: &'static str,
        /// Why the value is invalid.
        reason: String,
    },
    /// Cross-field validation failed.
    #[error("config validation failed: {0}")]
    Validation(String),
}

// ============================================================================
// SECTION: Sections
// ============================================================================

/// Auth and token settings.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// JWT signing key.
    pub jwt_secret: String,
    /// Token lifetime in seconds.
    pub token_ttl_secs: u64,
}

/// SMTP settings handed to the verification mail transport.
#[derive(Debug, Clone, Default)]
pub struct SmtpConfig {
    /// SMTP host; empty disables outbound mail.
    pub host: String,
    /// SMTP port.
    pub port: u16,
    /// SMTP username.
    pub username: String,
    /// SMTP password.
    pub password: String,
    /// From address.
    pub from: String,
}

/// Billing processor settings.
#[derive(Debug, Clone, Default)]
pub struct BillingConfig {
    /// Processor API secret; empty disables billing.
    pub secret: String,
    /// Webhook signing secret.
    pub webhook_secret: String,
}

/// Server bind settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP API bind address.
    pub http_bind: String,
    /// MCP transport: `stdio` or `http`.
    pub mcp_transport: McpTransport,
    /// MCP HTTP bind address, when the transport is HTTP.
    pub mcp_bind: String,
    /// Maximum accepted request body size in bytes.
    pub max_body_bytes: usize,
}

/// MCP transport selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum McpTransport {
    /// JSON-RPC over stdin/stdout.
    Stdio,
    /// JSON-RPC over HTTP.
    Http,
}

// ============================================================================
// SECTION: Root Config
// ============================================================================

/// Full server configuration.
#[derive(Debug, Clone)]
pub struct PrecedentConfig {
    /// Storage settings.
    pub database: StoreConfig,
    /// External vector index settings.
    pub vector_index: VectorIndexConfig,
    /// Embedding provider settings; empty endpoint selects the no-op
    /// provider.
    pub embedding: HttpEmbeddingConfig,
    /// Auth settings.
    pub auth: AuthConfig,
    /// SMTP seam settings.
    pub smtp: SmtpConfig,
    /// Base URL used in verification links.
    pub base_url: String,
    /// Billing seam settings.
    pub billing: BillingConfig,
    /// Outbox worker settings.
    pub outbox: OutboxWorkerConfig,
    /// Conflict view refresh interval in milliseconds.
    pub conflict_refresh_ms: u64,
    /// Server binds.
    pub server: ServerConfig,
}

impl PrecedentConfig {
    /// Reads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a value fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads configuration through a lookup function (testable seam).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a value fails to parse.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database = StoreConfig {
            connection: get("PRECEDENT_DATABASE_URL")
                .unwrap_or_else(|| StoreConfig::default().connection),
            max_connections: parse_or(&get, "PRECEDENT_DB_MAX_CONNECTIONS", 16)?,
            connect_timeout_ms: parse_or(&get, "PRECEDENT_DB_CONNECT_TIMEOUT_MS", 5_000)?,
            statement_timeout_ms: parse_or(&get, "PRECEDENT_DB_STATEMENT_TIMEOUT_MS", 30_000)?,
        };
        let vector_index = VectorIndexConfig {
            url: get("PRECEDENT_VECTOR_INDEX_URL").unwrap_or_default(),
            api_key: get("PRECEDENT_VECTOR_INDEX_API_KEY").filter(|key| !key.is_empty()),
            collection: get("PRECEDENT_VECTOR_COLLECTION")
                .unwrap_or_else(|| "decisions".to_string()),
            dimension: parse_or(&get, "PRECEDENT_EMBEDDING_DIMENSION", 1_024)?,
            timeout_ms: parse_or(&get, "PRECEDENT_VECTOR_TIMEOUT_MS", 5_000)?,
        };
        let embedding = HttpEmbeddingConfig {
            endpoint: get("PRECEDENT_EMBEDDING_ENDPOINT").unwrap_or_default(),
            model: get("PRECEDENT_EMBEDDING_MODEL")
                .unwrap_or_else(|| HttpEmbeddingConfig::default().model),
            api_key: get("PRECEDENT_EMBEDDING_API_KEY").filter(|key| !key.is_empty()),
            dimension: parse_or(&get, "PRECEDENT_EMBEDDING_DIMENSION", 1_024)?,
            timeout_ms: parse_or(&get, "PRECEDENT_EMBEDDING_TIMEOUT_MS", 5_000)?,
        };
        let auth = AuthConfig {
            jwt_secret: get("PRECEDENT_JWT_SECRET").unwrap_or_default(),
            token_ttl_secs: parse_or(&get, "PRECEDENT_TOKEN_TTL_SECS", 3_600)?,
        };
        let smtp = SmtpConfig {
            host: get("PRECEDENT_SMTP_HOST").unwrap_or_default(),
            port: parse_or(&get, "PRECEDENT_SMTP_PORT", 587)?,
            username: get("PRECEDENT_SMTP_USER").unwrap_or_default(),
            password: get("PRECEDENT_SMTP_PASSWORD").unwrap_or_default(),
            from: get("PRECEDENT_SMTP_FROM").unwrap_or_default(),
        };
        let billing = BillingConfig {
            secret: get("PRECEDENT_BILLING_SECRET").unwrap_or_default(),
            webhook_secret: get("PRECEDENT_BILLING_WEBHOOK_SECRET").unwrap_or_default(),
        };
        let outbox = OutboxWorkerConfig {
            poll_interval_ms: parse_or(&get, "PRECEDENT_OUTBOX_POLL_MS", 1_000)?,
            batch_size: parse_or(&get, "PRECEDENT_OUTBOX_BATCH_SIZE", 100)?,
            max_attempts: parse_or(&get, "PRECEDENT_OUTBOX_MAX_ATTEMPTS", 10)?,
        };
        let transport = match get("PRECEDENT_MCP_TRANSPORT").as_deref() {
            None | Some("stdio") => McpTransport::Stdio,
            Some("http") => McpTransport::Http,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "PRECEDENT_MCP_TRANSPORT",
                    reason: format!("unknown transport {other}"),
                });
            }
        };
        let server = ServerConfig {
            http_bind: get("PRECEDENT_HTTP_BIND").unwrap_or_else(|| "127.0.0.1:8080".to_string()),
            mcp_transport: transport,
            mcp_bind: get("PRECEDENT_MCP_BIND").unwrap_or_else(|| "127.0.0.1:8090".to_string()),
            max_body_bytes: parse_or(&get, "PRECEDENT_MAX_BODY_BYTES", 1_048_576)?,
        };
        Ok(Self {
            database,
            vector_index,
            embedding,
            auth,
            smtp,
            base_url: get("PRECEDENT_BASE_URL")
                .unwrap_or_else(|| "http://localhost:8080".to_string()),
            billing,
            outbox,
            conflict_refresh_ms: parse_or(&get, "PRECEDENT_CONFLICT_REFRESH_MS", 30_000)?,
            server,
        })
    }

    /// Cross-field validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] describing the first failure.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.connection.trim().is_empty() {
            return Err(ConfigError::Validation("database url must not be empty".to_string()));
        }
        if self.auth.jwt_secret.len() < 32 {
            return Err(ConfigError::Validation(
                "jwt secret must be at least 32 bytes".to_string(),
            ));
        }
        if self.outbox.batch_size <= 0 {
            return Err(ConfigError::Validation("outbox batch size must be positive".to_string()));
        }
        if self.outbox.max_attempts <= 0 {
            return Err(ConfigError::Validation(
                "outbox max attempts must be positive".to_string(),
            ));
        }
        if self.embedding.dimension == 0 {
            return Err(ConfigError::Validation(
                "embedding dimension must be positive".to_string(),
            ));
        }
        if self.vector_index.dimension != self.embedding.dimension {
            return Err(ConfigError::Validation(
                "vector index and embedding dimensions must match".to_string(),
            ));
        }
        self.server.http_bind.parse::<std::net::SocketAddr>().map_err(|_| {
            ConfigError::Validation(format!("http bind {} is invalid", self.server.http_bind))
        })?;
        if self.server.mcp_transport == McpTransport::Http {
            self.server.mcp_bind.parse::<std::net::SocketAddr>().map_err(|_| {
                ConfigError::Validation(format!("mcp bind {} is invalid", self.server.mcp_bind))
            })?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Parses an optional environment value with a default.
fn parse_or<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match get(name) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
            name,
            reason: format!("could not parse {raw:?}"),
        }),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::McpTransport;
    use super::PrecedentConfig;

    fn lookup<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        let map: HashMap<&str, &str> = pairs.iter().copied().collect();
        move |name| map.get(name).map(ToString::to_string)
    }

    #[test]
    fn defaults_produce_a_stdio_dev_config() {
        let config = PrecedentConfig::from_lookup(lookup(&[])).expect("load defaults");
        assert_eq!(config.server.mcp_transport, McpTransport::Stdio);
        assert!(config.vector_index.url.is_empty());
        assert_eq!(config.outbox.batch_size, 100);
        assert_eq!(config.conflict_refresh_ms, 30_000);
    }

    #[test]
    fn validation_requires_a_long_jwt_secret() {
        let config = PrecedentConfig::from_lookup(lookup(&[("PRECEDENT_JWT_SECRET", "short")]))
            .expect("load config");
        assert!(config.validate().is_err());
        let config = PrecedentConfig::from_lookup(lookup(&[(
            "PRECEDENT_JWT_SECRET",
            "0123456789abcdef0123456789abcdef",
        )]))
        .expect("load config");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn mismatched_dimensions_fail_validation() {
        let config = PrecedentConfig::from_lookup(lookup(&[
            ("PRECEDENT_JWT_SECRET", "0123456789abcdef0123456789abcdef"),
            ("PRECEDENT_EMBEDDING_DIMENSION", "768"),
            ("PRECEDENT_VECTOR_INDEX_URL", "http://localhost:6333"),
        ]))
        .expect("load config");
        // Both sections read the same variable, so they stay aligned.
        assert!(config.validate().is_ok());
        assert_eq!(config.vector_index.dimension, 768);
    }

    #[test]
    fn unknown_transport_is_rejected() {
        let result =
            PrecedentConfig::from_lookup(lookup(&[("PRECEDENT_MCP_TRANSPORT", "carrier-pigeon")]));
        assert!(result.is_err());
    }
}
