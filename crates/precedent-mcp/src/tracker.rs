// precedent-mcp/src/tracker.rs
// ============================================================================
// Module: Check Tracker
// Description: In-memory record of recent check calls per agent and type.
// Purpose: Let trace nudge callers that skipped the check step.
// Dependencies: std
// ============================================================================

//! ## Overview
//! The tracker maps `(agent, decision_type)` to the last check instant
//! inside a one-hour window. `check` writes it, `trace` reads it; a
//! missing or stale entry makes `trace` succeed with an advisory content
//! item. The map purges lazily once it outgrows its bound.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

/// Window within which a check counts as recent.
const CHECK_WINDOW: Duration = Duration::from_secs(3_600);
/// Size bound that triggers a lazy purge.
const PURGE_THRESHOLD: usize = 1_000;

// ============================================================================
// SECTION: Tracker
// ============================================================================

/// In-memory check tracker.
pub struct CheckTracker {
    /// Last check instant per `(agent, decision_type)`.
    entries: Mutex<HashMap<(String, String), Instant>>,
    /// Window within which a check counts.
    window: Duration,
}

impl Default for CheckTracker {
    fn default() -> Self {
        Self::new(CHECK_WINDOW)
    }
}

impl CheckTracker {
    /// Creates a tracker with a custom window.
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            window,
        }
    }

    /// Records a check for the agent and decision type.
    pub fn record(&self, agent: &str, decision_type: &str) {
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };
        if entries.len() > PURGE_THRESHOLD {
            let window = self.window;
            entries.retain(|_, at| at.elapsed() < window);
        }
        entries.insert((agent.to_string(), decision_type.to_string()), Instant::now());
    }

    /// Returns true when the agent checked this type within the window.
    #[must_use]
    pub fn was_checked(&self, agent: &str, decision_type: &str) -> bool {
        let Ok(entries) = self.entries.lock() else {
            return false;
        };
        entries
            .get(&(agent.to_string(), decision_type.to_string()))
            .is_some_and(|at| at.elapsed() < self.window)
    }

    /// Returns the tracked entry count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    /// Returns true when nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::CheckTracker;

    #[test]
    fn checks_are_remembered_per_agent_and_type() {
        let tracker = CheckTracker::default();
        tracker.record("planner", "architecture");
        assert!(tracker.was_checked("planner", "architecture"));
        assert!(!tracker.was_checked("planner", "security"));
        assert!(!tracker.was_checked("coder", "architecture"));
    }

    #[test]
    fn stale_entries_fall_outside_the_window() {
        let tracker = CheckTracker::new(Duration::from_millis(10));
        tracker.record("planner", "architecture");
        std::thread::sleep(Duration::from_millis(25));
        assert!(!tracker.was_checked("planner", "architecture"));
    }

    #[test]
    fn oversized_maps_purge_lazily_on_record() {
        let tracker = CheckTracker::new(Duration::from_millis(5));
        for index in 0..1_100 {
            tracker.record(&format!("agent-{index}"), "architecture");
        }
        std::thread::sleep(Duration::from_millis(10));
        tracker.record("fresh", "architecture");
        assert!(tracker.len() <= 2);
    }
}
