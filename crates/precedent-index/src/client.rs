// precedent-index/src/client.rs
// ============================================================================
// Module: Vector Index Client
// Description: REST client for the external vector index.
// Purpose: Mirror decision embeddings and serve filtered similarity queries.
// Dependencies: precedent-core, reqwest, serde_json
// ============================================================================

//! ## Overview
//! The client speaks the index's REST API: collection bootstrap with cosine
//! distance and HNSW parameters, point upserts and deletes, filtered
//! searches, and tenant-scoped counts. `org_id` is an indexed payload
//! keyword and the first condition on every query filter. Health probes are
//! cheap, bounded to one second, and cached for five so request paths never
//! stall on a sick index.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

use precedent_core::Decision;
use precedent_core::DecisionId;
use precedent_core::OrgId;
use precedent_core::VectorHit;
use precedent_core::VectorIndexError;
use precedent_core::VectorQuery;
use precedent_core::VectorSearcher;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::Value;
use serde_json::json;

/// How long a health probe result stays cached.
const HEALTH_CACHE: Duration = Duration::from_secs(5);
/// Health probe timeout.
const HEALTH_PROBE_TIMEOUT: Duration = Duration::from_secs(1);

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for the vector index client.
#[derive(Debug, Clone, Deserialize)]
pub struct VectorIndexConfig {
    /// Index base URL; empty disables the external index entirely.
    pub url: String,
    /// API key sent with every request, when the index requires one.
    pub api_key: Option<String>,
    /// Collection name shared by all tenants.
    pub collection: String,
    /// Vector dimension.
    pub dimension: usize,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for VectorIndexConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: None,
            collection: "decisions".to_string(),
            dimension: 1024,
            timeout_ms: 5_000,
        }
    }
}

// ============================================================================
// SECTION: Wire Types
// ============================================================================

/// Search response envelope.
#[derive(Debug, Deserialize)]
struct SearchResponse {
    /// Scored hits.
    result: Vec<ScoredPoint>,
}

/// One scored point in a search response.
#[derive(Debug, Deserialize)]
struct ScoredPoint {
    /// Point id (the decision UUID).
    id: String,
    /// Cosine similarity score.
    score: f64,
}

/// Count response envelope.
#[derive(Debug, Deserialize)]
struct CountResponse {
    /// Count payload.
    result: CountResult,
}

/// Count payload.
#[derive(Debug, Deserialize)]
struct CountResult {
    /// Matching point count.
    count: u64,
}

// ============================================================================
// SECTION: Client
// ============================================================================

/// REST client for the external vector index.
pub struct VectorIndexClient {
    /// Client configuration.
    config: VectorIndexConfig,
    /// HTTP client used for index requests.
    http: Client,
    /// Cached health probe result.
    health: Mutex<Option<(Instant, bool)>>,
}

impl VectorIndexClient {
    /// Creates a client; returns `None` when no index URL is configured.
    ///
    /// # Errors
    ///
    /// Returns [`VectorIndexError`] when the HTTP client cannot be created.
    pub fn new(config: VectorIndexConfig) -> Result<Option<Self>, VectorIndexError> {
        if config.url.trim().is_empty() {
            return Ok(None);
        }
        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent("precedent/0.1")
            .build()
            .map_err(|_| VectorIndexError::Unavailable("http client build failed".to_string()))?;
        Ok(Some(Self {
            config,
            http,
            health: Mutex::new(None),
        }))
    }

    /// Creates the shared collection when it does not exist yet.
    ///
    /// The collection uses cosine distance with HNSW (`m = 16`,
    /// `ef_construct = 128`) and indexes `org_id` as a payload keyword.
    ///
    /// # Errors
    ///
    /// Returns [`VectorIndexError`] when bootstrap fails.
    pub fn ensure_collection(&self) -> Result<(), VectorIndexError> {
        let url = format!("{}/collections/{}", self.base(), self.config.collection);
        let exists = self
            .request(self.http.get(&url))
            .map(|response| response.status().is_success())
            .unwrap_or(false);
        if !exists {
            let body = json!({
                "vectors": { "size": self.config.dimension, "distance": "Cosine" },
                "hnsw_config": { "m": 16, "ef_construct": 128 },
            });
            let response = self
                .request(self.http.put(&url).json(&body))
                .map_err(|err| VectorIndexError::Unavailable(err.to_string()))?;
            if !response.status().is_success() {
                return Err(VectorIndexError::Unavailable(format!(
                    "collection bootstrap failed: {}",
                    response.status()
                )));
            }
        }
        let index_url = format!("{url}/index");
        let body = json!({ "field_name": "org_id", "field_schema": "keyword" });
        // Payload index creation is idempotent on the index side; a conflict
        // response is fine.
        let _ = self.request(self.http.put(&index_url).json(&body));
        Ok(())
    }

    /// Upserts decision points in one call.
    ///
    /// # Errors
    ///
    /// Returns [`VectorIndexError`] when the upsert fails.
    pub fn upsert_decisions(&self, decisions: &[Decision]) -> Result<(), VectorIndexError> {
        let points: Vec<Value> = decisions
            .iter()
            .filter_map(|decision| {
                decision.embedding.as_ref().map(|embedding| {
                    json!({
                        "id": decision.id.to_string(),
                        "vector": embedding,
                        "payload": {
                            "org_id": decision.org_id.to_string(),
                            "agent_id": decision.agent_key.as_str(),
                            "decision_type": decision.decision_type,
                            "confidence": decision.confidence,
                            "quality_score": decision.quality_score,
                            "valid_from": decision.valid_from.unix_timestamp(),
                            "run_id": decision.run_id.to_string(),
                            "outcome": decision.outcome,
                        },
                    })
                })
            })
            .collect();
        if points.is_empty() {
            return Ok(());
        }
        let url =
            format!("{}/collections/{}/points?wait=true", self.base(), self.config.collection);
        let response = self
            .request(self.http.put(&url).json(&json!({ "points": points })))
            .map_err(|err| VectorIndexError::Unavailable(err.to_string()))?;
        if !response.status().is_success() {
            return Err(VectorIndexError::Unavailable(format!(
                "upsert failed: {}",
                response.status()
            )));
        }
        Ok(())
    }

    /// Deletes decision points by id in one call.
    ///
    /// # Errors
    ///
    /// Returns [`VectorIndexError`] when the delete fails.
    pub fn delete_decisions(&self, ids: &[DecisionId]) -> Result<(), VectorIndexError> {
        if ids.is_empty() {
            return Ok(());
        }
        let url = format!(
            "{}/collections/{}/points/delete?wait=true",
            self.base(),
            self.config.collection
        );
        let points: Vec<String> = ids.iter().map(ToString::to_string).collect();
        let response = self
            .request(self.http.post(&url).json(&json!({ "points": points })))
            .map_err(|err| VectorIndexError::Unavailable(err.to_string()))?;
        if !response.status().is_success() {
            return Err(VectorIndexError::Unavailable(format!(
                "delete failed: {}",
                response.status()
            )));
        }
        Ok(())
    }

    /// Counts points for one organization.
    ///
    /// # Errors
    ///
    /// Returns [`VectorIndexError`] when the count fails.
    pub fn count_for_org(&self, org_id: OrgId) -> Result<u64, VectorIndexError> {
        let url = format!("{}/collections/{}/points/count", self.base(), self.config.collection);
        let body = json!({
            "filter": { "must": [{ "key": "org_id", "match": { "value": org_id.to_string() } }] },
            "exact": true,
        });
        let response = self
            .request(self.http.post(&url).json(&body))
            .map_err(|err| VectorIndexError::Unavailable(err.to_string()))?;
        let decoded: CountResponse =
            response.json().map_err(|err| VectorIndexError::Invalid(err.to_string()))?;
        Ok(decoded.result.count)
    }

    /// Builds the filter expression for a query; `org_id` comes first.
    fn filter_for(query: &VectorQuery) -> Value {
        let mut must = vec![json!({
            "key": "org_id",
            "match": { "value": query.org_id.to_string() },
        })];
        if let Some(decision_type) = &query.decision_type {
            must.push(json!({ "key": "decision_type", "match": { "value": decision_type } }));
        }
        if let Some(agent) = &query.agent_key {
            must.push(json!({ "key": "agent_id", "match": { "value": agent.as_str() } }));
        }
        if let Some(confidence_min) = query.confidence_min {
            must.push(json!({ "key": "confidence", "range": { "gte": confidence_min } }));
        }
        if let Some(since) = query.since {
            must.push(json!({ "key": "valid_from", "range": { "gte": since.unix_timestamp() } }));
        }
        json!({ "must": must })
    }

    /// Applies the API key header and sends the request.
    fn request(
        &self,
        builder: reqwest::blocking::RequestBuilder,
    ) -> Result<reqwest::blocking::Response, reqwest::Error> {
        let builder = match &self.config.api_key {
            Some(api_key) => builder.header("api-key", api_key),
            None => builder,
        };
        builder.send()
    }

    /// Returns the base URL without a trailing slash.
    fn base(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }
}

impl VectorSearcher for VectorIndexClient {
    fn search(&self, query: &VectorQuery) -> Result<Vec<VectorHit>, VectorIndexError> {
        let url = format!("{}/collections/{}/points/search", self.base(), self.config.collection);
        let body = json!({
            "vector": query.vector,
            "limit": query.limit,
            "filter": Self::filter_for(query),
            "with_payload": false,
        });
        let response = self
            .request(self.http.post(&url).json(&body))
            .map_err(|err| VectorIndexError::Unavailable(err.to_string()))?;
        if !response.status().is_success() {
            return Err(VectorIndexError::Unavailable(format!(
                "search failed: {}",
                response.status()
            )));
        }
        let decoded: SearchResponse =
            response.json().map_err(|err| VectorIndexError::Invalid(err.to_string()))?;
        decoded
            .result
            .into_iter()
            .map(|point| {
                let decision_id = DecisionId::parse(&point.id)
                    .map_err(|err| VectorIndexError::Invalid(err.to_string()))?;
                Ok(VectorHit {
                    decision_id,
                    similarity: point.score,
                })
            })
            .collect()
    }

    fn healthy(&self) -> bool {
        {
            let Ok(cache) = self.health.lock() else {
                return false;
            };
            if let Some((probed_at, healthy)) = *cache {
                if probed_at.elapsed() < HEALTH_CACHE {
                    return healthy;
                }
            }
        }
        let url = format!("{}/healthz", self.base());
        let healthy = self
            .request(self.http.get(&url).timeout(HEALTH_PROBE_TIMEOUT))
            .map(|response| response.status().is_success())
            .unwrap_or(false);
        if let Ok(mut cache) = self.health.lock() {
            *cache = Some((Instant::now(), healthy));
        }
        healthy
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use precedent_core::OrgId;
    use precedent_core::VectorQuery;

    use super::VectorIndexClient;
    use super::VectorIndexConfig;

    #[test]
    fn empty_url_disables_the_client() {
        let client = VectorIndexClient::new(VectorIndexConfig::default()).expect("build client");
        assert!(client.is_none());
    }

    #[test]
    fn filter_puts_the_tenant_condition_first() {
        let query = VectorQuery {
            org_id: OrgId::generate(),
            vector: vec![0.0; 4],
            decision_type: Some("architecture".to_string()),
            agent_key: None,
            confidence_min: Some(0.5),
            since: None,
            limit: 10,
        };
        let filter = VectorIndexClient::filter_for(&query);
        let must = filter["must"].as_array().map(Vec::as_slice).unwrap_or_default();
        assert_eq!(must[0]["key"], "org_id");
        assert_eq!(must.len(), 3);
    }
}
