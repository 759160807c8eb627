//! Convergence tracking for writes against the eventually-consistent directory API.
//!
//! The directory API offers no strongly-consistent read after a write. A
//! [`ConsistencyTracker`] watches the fingerprint (ETag) of the written object
//! across successive polls and decides when the object has settled:
//!
//! - **Quorum**: at least [`STABLE_POLL_QUORUM`] consecutive unchanged polls,
//!   after having seen at least as many fingerprint changes as writes issued.
//! - **Fallback**: the fingerprint stayed put for roughly half of the budget's
//!   worth of poll intervals. Sub-writes that settled before polling started
//!   never show up as changes, so the quorum alone could wait forever.
//!
//! The fallback is a heuristic. It trades strict correctness for forward
//! progress on a racy backend.

use std::time::Duration;

use crate::types::{DEFAULT_POLL_INTERVAL, STABLE_POLL_QUORUM};

/// Polling state for one write operation.
///
/// A tracker is created after the mutation(s) of a single create or update,
/// fed by [`wait_for_consistency`](crate::poller::wait_for_consistency), and
/// dropped when the wait ends. It is never shared between operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsistencyTracker {
    label: String,
    budget: Duration,
    poll_interval: Duration,
    expected_mutations: u32,
    awaiting_creation: bool,
    consecutive_matches: u32,
    fingerprint_changes: u32,
    last_fingerprint: Option<String>,
}

impl ConsistencyTracker {
    /// Create a tracker with all counters zeroed.
    ///
    /// `expected_mutations` is the number of discrete writes the operation
    /// issued, e.g. one base update plus one insert per alias.
    pub fn new(label: impl Into<String>, budget: Duration, expected_mutations: u32) -> Self {
        Self {
            label: label.into(),
            budget,
            poll_interval: DEFAULT_POLL_INTERVAL,
            expected_mutations,
            awaiting_creation: false,
            consecutive_matches: 0,
            fingerprint_changes: 0,
            last_fingerprint: None,
        }
    }

    /// Set the cadence the poller uses between probes.
    ///
    /// The fallback threshold is derived from this interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Mark the tracked object as just created.
    ///
    /// A not-found probe is then a propagation race rather than a failure.
    pub fn awaiting_creation(mut self) -> Self {
        self.awaiting_creation = true;
        self
    }

    /// Resource label used in diagnostics.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Total wall-clock time allotted to the wait.
    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Cadence between probes.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Number of writes the operation issued.
    pub fn expected_mutations(&self) -> u32 {
        self.expected_mutations
    }

    /// Whether a not-found probe should be tolerated.
    pub fn is_awaiting_creation(&self) -> bool {
        self.awaiting_creation
    }

    /// Consecutive polls that returned an unchanged fingerprint.
    pub fn consecutive_matches(&self) -> u32 {
        self.consecutive_matches
    }

    /// Fingerprint transitions observed since tracking began.
    pub fn fingerprint_changes(&self) -> u32 {
        self.fingerprint_changes
    }

    /// The most recently observed fingerprint.
    pub fn last_fingerprint(&self) -> Option<&str> {
        self.last_fingerprint.as_deref()
    }

    /// Record a poll that saw the same fingerprint as before.
    pub fn on_unchanged(&mut self) {
        self.consecutive_matches = self.consecutive_matches.saturating_add(1);
    }

    /// Record a poll that saw a new fingerprint.
    pub fn on_changed(&mut self, fingerprint: impl Into<String>) {
        self.consecutive_matches = 0;
        self.last_fingerprint = Some(fingerprint.into());
        self.fingerprint_changes = self.fingerprint_changes.saturating_add(1);
    }

    /// Record a poll that could not find the object.
    ///
    /// Neither a match nor a change: the stable streak starts over.
    pub fn on_missing(&mut self) {
        self.consecutive_matches = 0;
    }

    /// Number of consecutive unchanged polls that is accepted as settled
    /// regardless of how many changes were observed.
    ///
    /// Half of the polls that fit in the budget's whole minutes, never less
    /// than one.
    pub fn fallback_threshold(&self) -> u32 {
        let minutes = self.budget.as_secs() / 60;
        let interval_ms = self.poll_interval.as_millis().max(1);
        let polls_per_minute = u64::try_from(60_000 / interval_ms).unwrap_or(u64::MAX);
        let threshold = minutes.saturating_mul(polls_per_minute) / 2;
        u32::try_from(threshold).unwrap_or(u32::MAX).max(1)
    }

    /// Whether the tracked object is considered settled.
    pub fn has_converged(&self) -> bool {
        let quorum = self.consecutive_matches >= STABLE_POLL_QUORUM
            && self.fingerprint_changes >= self.expected_mutations;
        quorum || self.consecutive_matches >= self.fallback_threshold()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker(expected: u32) -> ConsistencyTracker {
        ConsistencyTracker::new("group", Duration::from_secs(5 * 60), expected)
    }

    #[test]
    fn test_new_tracker_is_zeroed() {
        let t = tracker(2);
        assert_eq!(t.label(), "group");
        assert_eq!(t.expected_mutations(), 2);
        assert_eq!(t.consecutive_matches(), 0);
        assert_eq!(t.fingerprint_changes(), 0);
        assert_eq!(t.last_fingerprint(), None);
        assert_eq!(t.poll_interval(), DEFAULT_POLL_INTERVAL);
        assert!(!t.is_awaiting_creation());
        assert!(!t.has_converged());
    }

    #[test]
    fn test_on_changed_resets_matches() {
        let mut t = tracker(1);
        t.on_changed("a");
        for _ in 0..3 {
            t.on_unchanged();
        }
        assert_eq!(t.consecutive_matches(), 3);

        t.on_changed("b");
        assert_eq!(t.consecutive_matches(), 0);
        assert_eq!(t.fingerprint_changes(), 2);
        assert_eq!(t.last_fingerprint(), Some("b"));
    }

    #[test]
    fn test_on_unchanged_keeps_fingerprint_state() {
        let mut t = tracker(1);
        t.on_changed("etag-a");
        for _ in 0..10 {
            t.on_unchanged();
            assert_eq!(t.fingerprint_changes(), 1);
            assert_eq!(t.last_fingerprint(), Some("etag-a"));
        }
    }

    #[test]
    fn test_on_missing_resets_only_the_streak() {
        let mut t = tracker(1);
        t.on_changed("a");
        t.on_unchanged();
        t.on_unchanged();
        t.on_missing();
        assert_eq!(t.consecutive_matches(), 0);
        assert_eq!(t.fingerprint_changes(), 1);
        assert_eq!(t.last_fingerprint(), Some("a"));
    }

    #[test]
    fn test_quorum_requires_expected_changes() {
        let mut t = tracker(3);
        t.on_changed("a");
        t.on_changed("b");
        for _ in 0..4 {
            t.on_unchanged();
        }
        assert!(!t.has_converged(), "only 2 of 3 writes observed");

        t.on_changed("c");
        for _ in 0..3 {
            t.on_unchanged();
            assert!(!t.has_converged());
        }
        t.on_unchanged();
        assert!(t.has_converged());
    }

    #[test]
    fn test_quorum_single_write() {
        let mut t = tracker(1);
        t.on_changed("etagA");
        for i in 1..=4 {
            assert!(!t.has_converged(), "converged early after {} matches", i - 1);
            t.on_unchanged();
        }
        assert!(t.has_converged());
    }

    #[test]
    fn test_fallback_threshold_default_interval() {
        // floor(minutes) * 6 / 2 with a 10 second cadence
        let cases = [(300, 15), (60, 3), (90, 3), (20 * 60, 60), (119, 3)];
        for (secs, expected) in cases {
            let t = ConsistencyTracker::new("user", Duration::from_secs(secs), 1);
            assert_eq!(t.fallback_threshold(), expected, "budget {}s", secs);
        }
    }

    #[test]
    fn test_fallback_threshold_custom_interval() {
        let t = tracker(1).with_poll_interval(Duration::from_secs(5));
        assert_eq!(t.fallback_threshold(), 30);

        let t = tracker(1).with_poll_interval(Duration::from_secs(120));
        assert_eq!(t.fallback_threshold(), 1);
    }

    #[test]
    fn test_fallback_threshold_never_zero() {
        let t = ConsistencyTracker::new("schema", Duration::from_secs(1), 1);
        assert_eq!(t.fallback_threshold(), 1);
        assert!(!t.has_converged());
    }

    #[test]
    fn test_fallback_converges_without_expected_changes() {
        let mut t = tracker(5);
        t.on_changed("only-change");
        for _ in 0..14 {
            t.on_unchanged();
            assert!(!t.has_converged());
        }
        t.on_unchanged();
        assert_eq!(t.consecutive_matches(), 15);
        assert!(t.has_converged());
    }

    #[test]
    fn test_zero_expected_mutations_still_needs_quorum() {
        let mut t = tracker(0);
        assert!(!t.has_converged());
        for _ in 0..3 {
            t.on_unchanged();
        }
        assert!(!t.has_converged());
        t.on_unchanged();
        assert!(t.has_converged());
    }
}
