//! The post-write polling loop.
//!
//! Every mutating resource operation ends the same way: build a
//! [`ConsistencyTracker`], then hand it to [`wait_for_consistency`] together
//! with a probe that performs one conditional fetch of the written object.
//! Only the probe differs between groups, users, schemas and the rest.
//!
//! ```ignore
//! use googleworkspace_provider_core::{wait_for_consistency, ConsistencyTracker, ProbeOutcome};
//!
//! let mut tracker = ConsistencyTracker::new("group", timeout, 1 + aliases.len() as u32)
//!     .awaiting_creation();
//! wait_for_consistency(&mut tracker, |etag| {
//!     let client = client.clone();
//!     let key = key.clone();
//!     async move {
//!         let response = client.get_group(&key, etag.as_deref()).await?;
//!         ProbeOutcome::from_response(response.status, response.etag.as_deref())
//!     }
//! })
//! .await?;
//! ```

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::consistency::ConsistencyTracker;
use crate::error::ProviderError;
use crate::retry::{retry_until_deadline, Backoff, RetryError};
use crate::types::ProbeOutcome;

/// A remote object whose fingerprint can be fetched conditionally.
///
/// Implementations send the last known fingerprint as `If-None-Match` (when
/// present) and classify the response, typically with
/// [`ProbeOutcome::from_response`]. Any `Err` aborts the wait.
#[async_trait]
pub trait FingerprintSource: Send + Sync {
    /// Fetch the object's current fingerprint.
    async fn probe(&self, last_fingerprint: Option<&str>) -> Result<ProbeOutcome, ProviderError>;
}

/// Poll `probe` until `tracker` converges, the probe fails, or the tracker's
/// budget runs out.
///
/// The probe receives the last observed fingerprint. Outcomes are applied as
/// follows:
///
/// - `NotModified`, or `Modified` with the last fingerprint: one more stable poll.
/// - `Modified` with a new fingerprint: a change; the stable streak restarts.
/// - `NotFound`: neutral while the tracker is awaiting creation, otherwise a
///   [`ProviderError::NotFound`].
/// - `Err`: returned as-is without further polling.
///
/// Each round runs inside [`retry_until_deadline`] at the tracker's poll
/// interval; an unsettled round is a retryable timeout. Convergence is checked
/// before every probe, so no probe is sent once the object is settled. On
/// timeout a [`ProviderError::DeadlineExceeded`] naming the tracker's label is
/// returned.
#[instrument(
    skip_all,
    fields(resource = %tracker.label(), expected = tracker.expected_mutations())
)]
pub async fn wait_for_consistency<F, Fut>(
    tracker: &mut ConsistencyTracker,
    mut probe: F,
) -> Result<(), ProviderError>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<ProbeOutcome, ProviderError>>,
{
    let budget = tracker.budget();
    let cadence = Backoff::Fixed(tracker.poll_interval());
    let started = Instant::now();
    let rounds = Cell::new(0u32);
    let probe_failed = Cell::new(false);
    let tracker = RefCell::new(tracker);
    let (tracker, rounds, probe_failed) = (&tracker, &rounds, &probe_failed);

    let result = retry_until_deadline(budget, &cadence, move || {
        let pending = {
            let state = tracker.borrow();
            if state.has_converged() {
                None
            } else {
                rounds.set(rounds.get() + 1);
                Some(probe(state.last_fingerprint().map(str::to_owned)))
            }
        };

        async move {
            let Some(pending) = pending else {
                return Ok::<(), RetryError>(());
            };
            let fatal = |err| {
                probe_failed.set(true);
                RetryError::NonRetryable(err)
            };
            let outcome = pending.await.map_err(fatal)?;

            let mut state = tracker.borrow_mut();
            apply_outcome(&mut **state, outcome).map_err(fatal)?;
            debug!(
                rounds = rounds.get(),
                matches = state.consecutive_matches(),
                changes = state.fingerprint_changes(),
                fingerprint = state.last_fingerprint().unwrap_or_default(),
                "polled resource"
            );

            if state.has_converged() {
                Ok(())
            } else {
                Err(RetryError::Retryable(ProviderError::DeadlineExceeded(format!(
                    "timed out while waiting for {} to become consistent",
                    state.label()
                ))))
            }
        }
    })
    .await;

    match &result {
        Ok(()) => info!(
            rounds = rounds.get(),
            changes = tracker.borrow().fingerprint_changes(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "resource is consistent"
        ),
        Err(err) if probe_failed.get() => {
            warn!(rounds = rounds.get(), error = %err, "consistency probe failed")
        }
        Err(_) => warn!(
            rounds = rounds.get(),
            budget_secs = budget.as_secs(),
            "gave up waiting for consistency"
        ),
    }
    result
}

fn apply_outcome(
    tracker: &mut ConsistencyTracker,
    outcome: ProbeOutcome,
) -> Result<(), ProviderError> {
    match outcome {
        ProbeOutcome::NotModified => tracker.on_unchanged(),
        ProbeOutcome::Modified(fingerprint)
            if tracker.last_fingerprint() == Some(fingerprint.as_str()) =>
        {
            tracker.on_unchanged()
        }
        ProbeOutcome::Modified(fingerprint) => tracker.on_changed(fingerprint),
        ProbeOutcome::NotFound if tracker.is_awaiting_creation() => tracker.on_missing(),
        ProbeOutcome::NotFound => {
            return Err(ProviderError::NotFound(format!(
                "{} disappeared while waiting for consistency",
                tracker.label()
            )))
        }
    }
    Ok(())
}

/// [`wait_for_consistency`] driven by a [`FingerprintSource`].
pub async fn wait_for_source<S>(
    tracker: &mut ConsistencyTracker,
    source: &S,
) -> Result<(), ProviderError>
where
    S: FingerprintSource + ?Sized,
{
    wait_for_consistency(tracker, move |last| async move {
        source.probe(last.as_deref()).await
    })
    .await
}

/// Poll a "does it exist yet" predicate until it holds.
///
/// Used where fingerprints are not available, such as alias creation.
/// Retryable API errors (429, 503) count as "not yet"; any other error aborts.
/// Running out of budget always yields a [`ProviderError::DeadlineExceeded`]
/// naming `label`, even when the last attempt was rate limited.
#[instrument(skip_all, fields(resource = %label, budget_secs = budget.as_secs()))]
pub async fn wait_for_existence<F, Fut>(
    label: &str,
    budget: Duration,
    backoff: &Backoff,
    mut predicate: F,
) -> Result<(), ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, ProviderError>>,
{
    let timed_out = || {
        ProviderError::DeadlineExceeded(format!("timed out while waiting for {} to exist", label))
    };

    retry_until_deadline(budget, backoff, || {
        let check = predicate();
        async move {
            match check.await {
                Ok(true) => Ok(()),
                Ok(false) => Err(RetryError::Retryable(timed_out())),
                Err(err) => Err(RetryError::from(err)),
            }
        }
    })
    .await
    .map_err(|err| {
        // only retryable errors are returned on timeout
        if err.is_retryable() {
            timed_out()
        } else {
            err
        }
    })?;

    info!("resource exists");
    Ok(())
}
