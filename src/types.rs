//! Probe outcomes and polling constants shared by every resource type.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// Consecutive unchanged polls required before a write counts as settled.
pub const STABLE_POLL_QUORUM: u32 = 4;

/// Default cadence between two consistency probes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Default wall-clock budget for a create, read, update or delete.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// The result of one conditional fetch of a tracked object.
///
/// Fatal failures are not part of this type; probes return them as the `Err`
/// side of `Result<ProbeOutcome, ProviderError>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "fingerprint")]
pub enum ProbeOutcome {
    /// The object still carries the fingerprint that was offered (HTTP 304).
    NotModified,
    /// The object was returned with the given fingerprint.
    Modified(String),
    /// The object does not exist (yet).
    NotFound,
}

impl ProbeOutcome {
    /// Create a `Modified` outcome.
    pub fn modified(fingerprint: impl Into<String>) -> Self {
        Self::Modified(fingerprint.into())
    }

    /// Classify the response to a conditional `GET` sent with `If-None-Match`.
    ///
    /// `etag` is the response's ETag (header or `etag` body field). Statuses
    /// other than 2xx, 304 and 404 become the matching [`ProviderError`].
    ///
    /// # Examples
    ///
    /// ```
    /// use googleworkspace_provider_core::ProbeOutcome;
    ///
    /// let outcome = ProbeOutcome::from_response(304, None).unwrap();
    /// assert_eq!(outcome, ProbeOutcome::NotModified);
    ///
    /// let outcome = ProbeOutcome::from_response(200, Some("\"abc\"")).unwrap();
    /// assert_eq!(outcome, ProbeOutcome::modified("\"abc\""));
    /// ```
    pub fn from_response(status: u16, etag: Option<&str>) -> Result<Self, ProviderError> {
        match status {
            304 => Ok(Self::NotModified),
            404 => Ok(Self::NotFound),
            200..=299 => match etag {
                Some(etag) if !etag.is_empty() => Ok(Self::Modified(etag.to_string())),
                _ => Err(ProviderError::Sdk(format!(
                    "response with status {} carried no etag",
                    status
                ))),
            },
            _ => Err(ProviderError::from_http_status(
                status,
                format!("unexpected status {} while polling", status),
            )),
        }
    }
}
