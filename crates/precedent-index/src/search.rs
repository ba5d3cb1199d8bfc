// precedent-index/src/search.rs
// ============================================================================
// Module: Semantic Search Orchestration
// Description: Vector-first search with transparent in-database fallback.
// Purpose: Serve semantic queries without ever surfacing index failures.
// Dependencies: precedent-core, precedent-store
// ============================================================================

//! ## Overview
//! Queries prefer the external vector index when it is healthy: over-fetch
//! three times the requested limit, hydrate the ids from Postgres (which
//! re-applies the current-row predicate and discards stale index entries),
//! re-score by quality and age, and truncate. Any index error degrades to
//! the in-database vector search; both failing degrades to text search at
//! the caller's discretion. Degradation is logged, never surfaced.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use postgres::Transaction;
use precedent_core::Decision;
use precedent_core::VectorQuery;
use precedent_core::VectorSearcher;
use precedent_store::DecisionQuery;
use precedent_store::StoreError;
use time::OffsetDateTime;

use crate::client::VectorIndexClient;

/// Over-fetch multiplier applied before re-scoring.
const OVERFETCH: usize = 3;

// ============================================================================
// SECTION: Re-scoring
// ============================================================================

/// Re-scores a similarity hit by decision quality and age.
///
/// `relevance = similarity * (0.6 + 0.3 * quality) * 1 / (1 + age_days / 90)`.
/// Higher similarity always wins at equal quality and age.
#[must_use]
pub fn rescore(similarity: f64, quality_score: f64, age_days: f64) -> f64 {
    similarity * 0.3f64.mul_add(quality_score.clamp(0.0, 1.0), 0.6)
        / (1.0 + age_days.max(0.0) / 90.0)
}

/// Returns the decision's age in fractional days at the given instant.
#[must_use]
pub fn age_days(decision: &Decision, now: OffsetDateTime) -> f64 {
    let seconds = (now - decision.valid_from).whole_seconds();
    if seconds <= 0 { 0.0 } else { seconds as f64 / 86_400.0 }
}

// ============================================================================
// SECTION: Orchestration
// ============================================================================

/// Vector-first semantic search over decisions.
pub struct SemanticSearch {
    /// External index client; `None` when the index is disabled.
    client: Option<Arc<VectorIndexClient>>,
}

impl SemanticSearch {
    /// Creates the orchestrator.
    #[must_use]
    pub const fn new(client: Option<Arc<VectorIndexClient>>) -> Self {
        Self {
            client,
        }
    }

    /// Returns the external client when one is configured.
    #[must_use]
    pub fn client(&self) -> Option<&Arc<VectorIndexClient>> {
        self.client.as_ref()
    }

    /// Returns true when the external index is configured and healthy.
    #[must_use]
    pub fn index_available(&self) -> bool {
        self.client.as_ref().is_some_and(|client| client.healthy())
    }

    /// Runs a semantic query, falling back to in-database vector search.
    ///
    /// The returned pairs carry the re-scored relevance, sorted descending
    /// and truncated to `limit`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] only when the in-database fallback itself
    /// fails; external index errors are absorbed.
    pub fn search(
        &self,
        tx: &mut Transaction<'_>,
        query: &VectorQuery,
        filters: &DecisionQuery,
        limit: usize,
        now: OffsetDateTime,
    ) -> Result<Vec<(Decision, f64)>, StoreError> {
        if let Some(client) = &self.client {
            if client.healthy() {
                let mut wide = query.clone();
                wide.limit = limit.saturating_mul(OVERFETCH).max(1);
                match client.search(&wide) {
                    Ok(hits) => {
                        let ids: Vec<_> = hits.iter().map(|hit| hit.decision_id).collect();
                        let decisions = precedent_store::decisions::get_decisions_by_ids(
                            tx,
                            query.org_id,
                            &ids,
                        )?;
                        return Ok(Self::rank(decisions, &hits, limit, now));
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "vector index query failed, falling back");
                    }
                }
            } else {
                tracing::debug!("vector index unhealthy, using in-database search");
            }
        }
        let fallback = precedent_store::decisions::search_by_embedding(
            tx,
            query.org_id,
            &query.vector,
            filters,
            i64::try_from(limit.saturating_mul(OVERFETCH).max(1)).unwrap_or(i64::MAX),
        )?;
        let mut scored: Vec<(Decision, f64)> = fallback
            .into_iter()
            .map(|(decision, similarity)| {
                let relevance =
                    rescore(similarity, decision.quality_score, age_days(&decision, now));
                (decision, relevance)
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }

    /// Joins hydrated decisions with their hits and re-scores.
    fn rank(
        decisions: Vec<Decision>,
        hits: &[precedent_core::VectorHit],
        limit: usize,
        now: OffsetDateTime,
    ) -> Vec<(Decision, f64)> {
        let mut scored: Vec<(Decision, f64)> = decisions
            .into_iter()
            .map(|decision| {
                let similarity = hits
                    .iter()
                    .find(|hit| hit.decision_id == decision.id)
                    .map_or(0.0, |hit| hit.similarity);
                let relevance =
                    rescore(similarity, decision.quality_score, age_days(&decision, now));
                (decision, relevance)
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        scored
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::rescore;

    #[test]
    fn rescore_prefers_higher_similarity_at_equal_quality_and_age() {
        assert!(rescore(0.9, 0.5, 10.0) > rescore(0.8, 0.5, 10.0));
    }

    #[test]
    fn rescore_decays_with_age() {
        assert!(rescore(0.9, 0.5, 0.0) > rescore(0.9, 0.5, 180.0));
    }

    #[test]
    fn rescore_rewards_quality() {
        assert!(rescore(0.9, 1.0, 30.0) > rescore(0.9, 0.0, 30.0));
    }

    #[test]
    fn fresh_perfect_hit_scores_at_most_zero_point_nine() {
        let top = rescore(1.0, 1.0, 0.0);
        assert!((top - 0.9).abs() < 1e-9);
    }
}
