// precedent-core/tests/proptest_validate.rs
// ============================================================================
// Module: Validation Property-Based Tests
// Description: Property tests for validation rules and role ordering.
// Purpose: Detect panics and invariants across wide input ranges.
// ============================================================================

//! Property-based tests for validation invariants.

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

use precedent_core::Role;
use precedent_core::validate;
use proptest::prelude::*;

/// All roles in ascending rank order.
const ROLES: [Role; 5] =
    [Role::Reader, Role::Agent, Role::Admin, Role::OrgOwner, Role::PlatformAdmin];

proptest! {
    #[test]
    fn confidence_accepts_exactly_the_unit_interval(value in -10.0_f64..10.0) {
        let accepted = validate::confidence(value).is_ok();
        prop_assert_eq!(accepted, (0.0..=1.0).contains(&value));
    }

    #[test]
    fn validators_never_panic_on_arbitrary_input(value in ".*") {
        let _ = validate::decision_type(&value);
        let _ = validate::outcome(&value);
        let _ = validate::source_type(&value);
        let _ = validate::source_uri(&value);
        let _ = validate::slug(&value);
        let _ = validate::email(&value);
        let _ = validate::agent_key(&value);
    }

    #[test]
    fn role_ordering_is_total_and_antisymmetric(a in 0_usize..5, b in 0_usize..5) {
        let (ra, rb) = (ROLES[a], ROLES[b]);
        prop_assert!(ra.at_least(rb) || rb.at_least(ra));
        if ra.at_least(rb) && rb.at_least(ra) {
            prop_assert_eq!(ra, rb);
        }
    }
}

#[test]
fn reader_is_never_at_least_admin() {
    assert!(!Role::Reader.at_least(Role::Admin));
}
