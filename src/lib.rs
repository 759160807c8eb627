//! Google Workspace Provider Core
//!
//! Write-path machinery for a provider that manages Google Workspace Admin SDK
//! objects (users, groups, org units, schemas, Chrome policies, domains,
//! roles). The directory API is eventually consistent: a read issued right
//! after an insert or update may return the old object, or nothing at all.
//! Every mutating resource operation therefore finishes by polling the object
//! until it has visibly settled.
//!
//! # Overview
//!
//! The crate provides:
//!
//! - **ConsistencyTracker**: per-operation polling state and the "has it
//!   settled?" heuristic
//! - **wait_for_consistency**: the deadline-bounded polling loop that drives a
//!   tracker with a caller-supplied probe
//! - **wait_for_existence**: exponential-backoff polling of a boolean
//!   predicate, for writes without a fingerprint such as aliases
//! - **Retry helpers**: bounded retries for rate-limited (429) and
//!   unavailable (503) API calls
//! - **Configuration**: per-operation timeouts and the poll interval
//! - **Error types**: a common error type for resource operations
//! - **Logging**: integration with `tracing` for structured logging
//!
//! # Quick Start
//!
//! ```ignore
//! use googleworkspace_provider_core::{
//!     wait_for_consistency, ConsistencyConfig, Operation, ProbeOutcome, ProviderError,
//! };
//!
//! async fn create_group(
//!     client: &DirectoryClient,
//!     config: &ConsistencyConfig,
//!     group: Group,
//! ) -> Result<Group, ProviderError> {
//!     let created = client.insert_group(&group).await?;
//!     for alias in &group.aliases {
//!         client.insert_group_alias(&created.id, alias).await?;
//!     }
//!
//!     let writes = 1 + group.aliases.len() as u32;
//!     let mut tracker = config.tracker(Operation::Create, "group", writes);
//!     wait_for_consistency(&mut tracker, |etag| {
//!         let id = created.id.clone();
//!         async move {
//!             let response = client.get_group(&id, etag.as_deref()).await?;
//!             ProbeOutcome::from_response(response.status, response.etag.as_deref())
//!         }
//!     })
//!     .await?;
//!
//!     Ok(created)
//! }
//! ```
//!
//! # Convergence
//!
//! A write is considered settled when either
//!
//! - the fingerprint has been stable for 4 consecutive polls and at least as
//!   many fingerprint changes as writes have been observed, or
//! - the fingerprint has been stable for about half of the polls that fit in
//!   the operation's budget.
//!
//! See [`consistency`] for details.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod consistency;
pub mod error;
pub mod logging;
pub mod poller;
pub mod retry;
pub mod testing;
pub mod types;

// Re-export main types at crate root
pub use config::{ConsistencyConfig, Operation, ResourceTimeouts};
pub use consistency::ConsistencyTracker;
pub use error::ProviderError;
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use poller::{wait_for_consistency, wait_for_existence, wait_for_source, FingerprintSource};
pub use retry::{
    retry_until_deadline, with_transient_retry, Backoff, Deadline, RetryError, RetryPolicy,
};
pub use types::{
    ProbeOutcome, DEFAULT_OPERATION_TIMEOUT, DEFAULT_POLL_INTERVAL, STABLE_POLL_QUORUM,
};

// Re-export async_trait for convenience
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tracing;
