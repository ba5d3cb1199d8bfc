// precedent-core/src/hashing.rs
// ============================================================================
// Module: Precedent Content Hashing
// Description: Deterministic content and payload hashing utilities.
// Purpose: Provide stable digests for decisions and idempotency replay checks.
// Dependencies: serde_json, sha2
// ============================================================================

//! ## Overview
//! Decisions carry a content hash over their semantic fields, and the
//! idempotency ledger compares retried payloads by a deterministic hash of
//! the request fields. Both are lowercase hex SHA-256.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use sha2::Digest;
use sha2::Sha256;

// ============================================================================
// SECTION: Hashing Helpers
// ============================================================================

/// Hashes raw bytes with SHA-256 and returns lowercase hex.
#[must_use]
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex_encode(&hasher.finalize())
}

/// Computes the content hash of a decision's semantic fields.
///
/// The hash covers `decision_type`, `outcome`, and `reasoning`, joined with
/// newline separators so field boundaries cannot collide.
#[must_use]
pub fn decision_content_hash(decision_type: &str, outcome: &str, reasoning: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(decision_type.as_bytes());
    hasher.update(b"\n");
    hasher.update(outcome.as_bytes());
    hasher.update(b"\n");
    hasher.update(reasoning.unwrap_or_default().as_bytes());
    hex_encode(&hasher.finalize())
}

/// Computes the idempotency payload hash for a trace request.
///
/// The hash covers the fields the ledger compares on replay; map keys in
/// the JSON fragments are sorted by `serde_json` so the digest is stable.
#[must_use]
pub fn idempotency_payload_hash(
    agent: &str,
    decision_type: &str,
    outcome: &str,
    confidence: f64,
    reasoning: Option<&str>,
    evidence: &[Value],
    alternatives: &[Value],
    precedent_ref: Option<&str>,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(agent.as_bytes());
    hasher.update(b"\n");
    hasher.update(decision_type.as_bytes());
    hasher.update(b"\n");
    hasher.update(outcome.as_bytes());
    hasher.update(b"\n");
    hasher.update(format!("{confidence:.6}").as_bytes());
    hasher.update(b"\n");
    hasher.update(reasoning.unwrap_or_default().as_bytes());
    hasher.update(b"\n");
    for value in evidence {
        hasher.update(value.to_string().as_bytes());
        hasher.update(b"\x1f");
    }
    hasher.update(b"\n");
    for value in alternatives {
        hasher.update(value.to_string().as_bytes());
        hasher.update(b"\x1f");
    }
    hasher.update(b"\n");
    hasher.update(precedent_ref.unwrap_or_default().as_bytes());
    hex_encode(&hasher.finalize())
}

/// Encodes bytes as lowercase hex.
#[must_use]
fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::decision_content_hash;
    use super::hash_bytes;
    use super::idempotency_payload_hash;

    #[test]
    fn content_hash_is_stable() {
        let a = decision_content_hash("architecture", "chose Redis", Some("benchmarks"));
        let b = decision_content_hash("architecture", "chose Redis", Some("benchmarks"));
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn content_hash_separates_fields() {
        let joined = decision_content_hash("ab", "c", None);
        let shifted = decision_content_hash("a", "bc", None);
        assert_ne!(joined, shifted);
    }

    #[test]
    fn payload_hash_reflects_every_field() {
        let base = idempotency_payload_hash(
            "planner",
            "architecture",
            "chose Redis",
            0.85,
            None,
            &[],
            &[],
            None,
        );
        let with_evidence = idempotency_payload_hash(
            "planner",
            "architecture",
            "chose Redis",
            0.85,
            None,
            &[json!({"content": "bench"})],
            &[],
            None,
        );
        assert_ne!(base, with_evidence);
    }

    #[test]
    fn known_sha256_vector_matches() {
        assert_eq!(
            hash_bytes(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
