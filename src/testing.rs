//! Testing utilities for resource operations that wait for consistency.
//!
//! [`ScriptedProbe`] stands in for the remote API: it replays a fixed script
//! of probe outcomes, counts how often it was called and records which
//! fingerprint each call offered. Together with tokio's paused clock this
//! lets a test run a whole five-minute polling budget instantly.
//!
//! # Example
//!
//! ```ignore
//! use googleworkspace_provider_core::testing::{assert_converged, ScriptedProbe};
//! use googleworkspace_provider_core::{wait_for_consistency, ConsistencyTracker};
//!
//! #[tokio::test(start_paused = true)]
//! async fn test_group_settles() {
//!     let probe = ScriptedProbe::new().then_modified("etag-1").then_not_modified(4);
//!     let mut tracker = ConsistencyTracker::new("group", Duration::from_secs(300), 1);
//!
//!     let result = wait_for_consistency(&mut tracker, probe.as_probe()).await;
//!
//!     assert_converged(&result);
//!     assert_eq!(probe.calls(), 5);
//! }
//! ```

use std::collections::VecDeque;
use std::future::{ready, Ready};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::poller::FingerprintSource;
use crate::types::ProbeOutcome;

/// What a [`ScriptedProbe`] answers once its script has been used up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Exhausted {
    /// Fail with an SDK error, so over-polling shows up as a failure.
    #[default]
    Fail,
    /// Keep reporting the object as unchanged.
    NotModified,
    /// Report a never-before-seen fingerprint on every call.
    FreshFingerprint,
}

/// A probe that replays a script of outcomes.
#[derive(Debug, Default)]
pub struct ScriptedProbe {
    script: Mutex<VecDeque<Result<ProbeOutcome, ProviderError>>>,
    when_exhausted: Exhausted,
    calls: AtomicUsize,
    offered: Mutex<Vec<Option<String>>>,
}

impl ScriptedProbe {
    /// Create a probe with an empty script that fails once exhausted.
    pub fn new() -> Self {
        Self::default()
    }

    /// A probe whose object never settles: every call yields a new fingerprint.
    pub fn ever_changing() -> Self {
        Self::new().when_exhausted(Exhausted::FreshFingerprint)
    }

    /// Choose the answer given after the script runs out.
    pub fn when_exhausted(mut self, exhausted: Exhausted) -> Self {
        self.when_exhausted = exhausted;
        self
    }

    /// Append `times` copies of `outcome` to the script.
    pub fn then_outcome(self, outcome: ProbeOutcome, times: usize) -> Self {
        {
            let mut script = self.script.lock().unwrap_or_else(PoisonError::into_inner);
            script.extend(std::iter::repeat(outcome).take(times).map(Ok));
        }
        self
    }

    /// Append one `Modified(fingerprint)` to the script.
    pub fn then_modified(self, fingerprint: &str) -> Self {
        self.then_outcome(ProbeOutcome::modified(fingerprint), 1)
    }

    /// Append `times` `NotModified` answers to the script.
    pub fn then_not_modified(self, times: usize) -> Self {
        self.then_outcome(ProbeOutcome::NotModified, times)
    }

    /// Append `times` `NotFound` answers to the script.
    pub fn then_not_found(self, times: usize) -> Self {
        self.then_outcome(ProbeOutcome::NotFound, times)
    }

    /// Append a fatal error to the script.
    pub fn then_fail(self, err: ProviderError) -> Self {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Err(err));
        self
    }

    /// Number of times the probe has been called.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The fingerprint offered on each call, in call order.
    pub fn offered_fingerprints(&self) -> Vec<Option<String>> {
        self.offered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Answer one call.
    pub fn next_outcome(
        &self,
        last_fingerprint: Option<&str>,
    ) -> Result<ProbeOutcome, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.offered
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(last_fingerprint.map(str::to_owned));

        let scripted = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();

        match (scripted, self.when_exhausted) {
            (Some(step), _) => step,
            (None, Exhausted::NotModified) => Ok(ProbeOutcome::NotModified),
            (None, Exhausted::FreshFingerprint) => {
                Ok(ProbeOutcome::Modified(format!("etag-{}", call)))
            }
            (None, Exhausted::Fail) => Err(ProviderError::Sdk(format!(
                "probe script exhausted at call {}",
                call
            ))),
        }
    }

    /// Borrow the probe as a closure for
    /// [`wait_for_consistency`](crate::poller::wait_for_consistency).
    pub fn as_probe(
        &self,
    ) -> impl FnMut(Option<String>) -> Ready<Result<ProbeOutcome, ProviderError>> + '_ {
        move |last| ready(self.next_outcome(last.as_deref()))
    }
}

#[async_trait]
impl FingerprintSource for ScriptedProbe {
    async fn probe(&self, last_fingerprint: Option<&str>) -> Result<ProbeOutcome, ProviderError> {
        self.next_outcome(last_fingerprint)
    }
}

// =========================================================================
// Assertion Helpers
// =========================================================================

/// Assert that a wait ended in convergence.
///
/// # Panics
///
/// Panics if the wait returned an error.
pub fn assert_converged(result: &Result<(), ProviderError>) {
    if let Err(err) = result {
        panic!("Expected the resource to converge, but got: {}", err);
    }
}

/// Assert that a wait timed out, and that the error names `label`.
///
/// # Panics
///
/// Panics if the wait succeeded, failed with another error, or the timeout
/// message does not mention the label.
pub fn assert_timed_out(result: &Result<(), ProviderError>, label: &str) {
    match result {
        Err(ProviderError::DeadlineExceeded(msg)) => assert!(
            msg.contains(label),
            "Expected timeout message to name '{}', got: {}",
            label,
            msg
        ),
        Err(other) => panic!("Expected a timeout, but got: {}", other),
        Ok(()) => panic!("Expected a timeout, but the resource converged"),
    }
}

/// Assert that a wait was aborted by an error other than a timeout.
///
/// # Panics
///
/// Panics if the wait succeeded or timed out.
pub fn assert_fatal(result: &Result<(), ProviderError>) {
    match result {
        Err(ProviderError::DeadlineExceeded(msg)) => {
            panic!("Expected a fatal error, but the wait timed out: {}", msg)
        }
        Err(_) => {}
        Ok(()) => panic!("Expected a fatal error, but the resource converged"),
    }
}
