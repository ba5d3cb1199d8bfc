// precedent-providers/src/http.rs
// ============================================================================
// Module: HTTP Embedding Provider
// Description: Embedding provider backed by a hosted HTTP endpoint.
// Purpose: Produce fixed-dimension vectors with strict limits and timeouts.
// Dependencies: precedent-core, reqwest, serde_json
// ============================================================================

//! ## Overview
//! The HTTP provider posts decision text to an embeddings endpoint and
//! decodes the vector from the response. Requests are bounded by a timeout
//! and the response dimension is checked against the configured size, so a
//! misconfigured model cannot poison the index.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use precedent_core::EmbedError;
use precedent_core::EmbeddingProvider;
use reqwest::blocking::Client;
use serde::Deserialize;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for the HTTP embedding provider.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpEmbeddingConfig {
    /// Embeddings endpoint URL.
    pub endpoint: String,
    /// Model identifier sent with every request.
    pub model: String,
    /// API key sent as a bearer token, when the endpoint requires one.
    pub api_key: Option<String>,
    /// Expected vector dimension.
    pub dimension: usize,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for HttpEmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8081/embeddings".to_string(),
            model: "bge-large-en-v1.5".to_string(),
            api_key: None,
            dimension: 1024,
            timeout_ms: 5_000,
        }
    }
}

// ============================================================================
// SECTION: Wire Types
// ============================================================================

/// Request body sent to the embeddings endpoint.
#[derive(Debug, serde::Serialize)]
struct EmbedRequest<'a> {
    /// Model identifier.
    model: &'a str,
    /// Text to embed.
    input: &'a str,
}

/// Response body returned by the embeddings endpoint.
#[derive(Debug, Deserialize)]
struct EmbedResponse {
    /// Embedding rows; the first row carries the vector.
    data: Vec<EmbedRow>,
}

/// One embedding row in the response.
#[derive(Debug, Deserialize)]
struct EmbedRow {
    /// The embedding vector.
    embedding: Vec<f32>,
}

// ============================================================================
// SECTION: Provider Implementation
// ============================================================================

/// Embedding provider backed by a hosted HTTP endpoint.
pub struct HttpEmbeddingProvider {
    /// Provider configuration.
    config: HttpEmbeddingConfig,
    /// HTTP client used for outbound requests.
    client: Client,
}

impl HttpEmbeddingProvider {
    /// Creates a new HTTP embedding provider.
    ///
    /// # Errors
    ///
    /// Returns [`EmbedError`] when the HTTP client cannot be created.
    pub fn new(config: HttpEmbeddingConfig) -> Result<Self, EmbedError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent("precedent/0.1")
            .build()
            .map_err(|_| EmbedError::Unavailable("http client build failed".to_string()))?;
        Ok(Self {
            config,
            client,
        })
    }
}

impl EmbeddingProvider for HttpEmbeddingProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let mut request = self.client.post(&self.config.endpoint).json(&EmbedRequest {
            model: &self.config.model,
            input: text,
        });
        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }
        let response = request
            .send()
            .map_err(|err| EmbedError::Unavailable(err.to_string()))?
            .error_for_status()
            .map_err(|err| EmbedError::Unavailable(err.to_string()))?;
        let body: EmbedResponse =
            response.json().map_err(|err| EmbedError::Invalid(err.to_string()))?;
        let vector = body
            .data
            .into_iter()
            .next()
            .map(|row| row.embedding)
            .ok_or_else(|| EmbedError::Invalid("response carried no embedding".to_string()))?;
        if vector.len() != self.config.dimension {
            return Err(EmbedError::Invalid(format!(
                "expected dimension {}, got {}",
                self.config.dimension,
                vector.len()
            )));
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::HttpEmbeddingConfig;

    #[test]
    fn default_config_expects_1024_dimensions() {
        let config = HttpEmbeddingConfig::default();
        assert_eq!(config.dimension, 1024);
        assert!(config.endpoint.starts_with("http"));
    }
}
