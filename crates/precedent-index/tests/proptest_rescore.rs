// precedent-index/tests/proptest_rescore.rs
// ============================================================================
// Module: Re-scoring Property-Based Tests
// Description: Property tests for the relevance re-scoring formula.
// Purpose: Detect panics and invariants across wide input ranges.
// ============================================================================

//! Property-based tests for re-scoring invariants.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use precedent_index::rescore;
use proptest::prelude::*;

proptest! {
    #[test]
    fn similarity_order_is_preserved_at_equal_quality_and_age(
        s1 in 0.0_f64..=1.0,
        s2 in 0.0_f64..=1.0,
        quality in 0.0_f64..=1.0,
        age in 0.0_f64..3650.0,
    ) {
        if s1 > s2 {
            prop_assert!(rescore(s1, quality, age) > rescore(s2, quality, age));
        }
    }

    #[test]
    fn relevance_stays_within_the_similarity_envelope(
        similarity in 0.0_f64..=1.0,
        quality in 0.0_f64..=1.0,
        age in 0.0_f64..3650.0,
    ) {
        let relevance = rescore(similarity, quality, age);
        prop_assert!(relevance >= 0.0);
        prop_assert!(relevance <= similarity * 0.9 + 1e-12);
    }

    #[test]
    fn out_of_range_quality_is_clamped(similarity in 0.0_f64..=1.0, age in 0.0_f64..100.0) {
        let high = rescore(similarity, 5.0, age);
        let clamped = rescore(similarity, 1.0, age);
        prop_assert!((high - clamped).abs() < 1e-12);
    }
}
