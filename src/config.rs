//! Timeouts and polling cadence for resource operations.
//!
//! The values come from the provider configuration block and follow the
//! duration syntax Terraform uses for `timeouts` (`"90s"`, `"5m"`, `"1h30m"`):
//!
//! ```json
//! {
//!   "poll_interval": "10s",
//!   "timeouts": { "create": "10m", "update": "10m" }
//! }
//! ```
//!
//! Every field is optional; missing ones fall back to the defaults.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::consistency::ConsistencyTracker;
use crate::error::ProviderError;
use crate::types::{DEFAULT_OPERATION_TIMEOUT, DEFAULT_POLL_INTERVAL};

/// A resource lifecycle operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Create a new resource.
    Create,
    /// Read the current state of a resource.
    Read,
    /// Update an existing resource.
    Update,
    /// Delete a resource.
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Wall-clock budget per lifecycle operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ResourceTimeouts {
    /// Budget for create, including the consistency wait.
    #[serde(deserialize_with = "deserialize_duration")]
    pub create: Duration,
    /// Budget for read.
    #[serde(deserialize_with = "deserialize_duration")]
    pub read: Duration,
    /// Budget for update, including the consistency wait.
    #[serde(deserialize_with = "deserialize_duration")]
    pub update: Duration,
    /// Budget for delete.
    #[serde(deserialize_with = "deserialize_duration")]
    pub delete: Duration,
}

impl Default for ResourceTimeouts {
    fn default() -> Self {
        Self {
            create: DEFAULT_OPERATION_TIMEOUT,
            read: DEFAULT_OPERATION_TIMEOUT,
            update: DEFAULT_OPERATION_TIMEOUT,
            delete: DEFAULT_OPERATION_TIMEOUT,
        }
    }
}

impl ResourceTimeouts {
    /// The budget for `operation`.
    pub fn for_operation(&self, operation: Operation) -> Duration {
        match operation {
            Operation::Create => self.create,
            Operation::Read => self.read,
            Operation::Update => self.update,
            Operation::Delete => self.delete,
        }
    }
}

/// Settings shared by every consistency wait of a configured provider.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConsistencyConfig {
    /// Cadence between two consistency probes.
    #[serde(deserialize_with = "deserialize_duration")]
    pub poll_interval: Duration,
    /// Per-operation budgets.
    pub timeouts: ResourceTimeouts,
}

impl Default for ConsistencyConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeouts: ResourceTimeouts::default(),
        }
    }
}

impl ConsistencyConfig {
    /// Create a configuration with the defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the timeout of one operation.
    pub fn with_timeout(mut self, operation: Operation, timeout: Duration) -> Self {
        match operation {
            Operation::Create => self.timeouts.create = timeout,
            Operation::Read => self.timeouts.read = timeout,
            Operation::Update => self.timeouts.update = timeout,
            Operation::Delete => self.timeouts.delete = timeout,
        }
        self
    }

    /// Read the settings from a provider configuration object.
    ///
    /// `null` yields the defaults. Keys this crate does not know about are
    /// ignored, so the whole provider block can be passed in.
    pub fn from_value(config: &serde_json::Value) -> Result<Self, ProviderError> {
        if config.is_null() {
            return Ok(Self::default());
        }
        let parsed: Self = serde_json::from_value(config.clone())?;
        parsed.validate()?;
        Ok(parsed)
    }

    /// Check that the settings describe a usable polling loop.
    pub fn validate(&self) -> Result<(), ProviderError> {
        if self.poll_interval.is_zero() {
            return Err(ProviderError::Configuration(
                "poll_interval must be greater than zero".to_string(),
            ));
        }
        for operation in [
            Operation::Create,
            Operation::Read,
            Operation::Update,
            Operation::Delete,
        ] {
            if self.timeouts.for_operation(operation).is_zero() {
                return Err(ProviderError::Configuration(format!(
                    "{} timeout must be greater than zero",
                    operation
                )));
            }
        }
        Ok(())
    }

    /// Build the tracker for a write of `label` under `operation`'s budget.
    ///
    /// Only `Operation::Create` trackers tolerate a not-found poll. During an
    /// update the object already existed, so a not-found poll fails the wait.
    pub fn tracker(
        &self,
        operation: Operation,
        label: impl Into<String>,
        expected_mutations: u32,
    ) -> ConsistencyTracker {
        let tracker = ConsistencyTracker::new(
            label,
            self.timeouts.for_operation(operation),
            expected_mutations,
        )
        .with_poll_interval(self.poll_interval);

        if operation == Operation::Create {
            tracker.awaiting_creation()
        } else {
            tracker
        }
    }
}

/// Parse a Terraform-style duration such as `"45s"`, `"5m"` or `"1h30m"`.
///
/// Supported units are those of Go's `time.ParseDuration`: `ns`, `us` (also
/// `µs` and `μs`), `ms`, `s`, `m` and `h`. Numbers may carry a fraction
/// (`"1.5h"`). A bare `"0"` is accepted.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use googleworkspace_provider_core::config::parse_duration;
///
/// assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
/// assert!(parse_duration("ten minutes").is_err());
/// ```
pub fn parse_duration(input: &str) -> Result<Duration, ProviderError> {
    let invalid = || ProviderError::Configuration(format!("invalid duration: {:?}", input));

    let mut rest = input.trim();
    if rest.is_empty() {
        return Err(invalid());
    }
    if rest == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total = Duration::ZERO;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(number_len);
        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);
        rest = tail;

        if number.is_empty() {
            return Err(invalid());
        }
        let unit_nanos: u64 = match unit {
            "ns" => 1,
            "us" | "\u{b5}s" | "\u{3bc}s" => 1_000,
            "ms" => 1_000_000,
            "s" => 1_000_000_000,
            "m" => 60_000_000_000,
            "h" => 3_600_000_000_000,
            _ => return Err(invalid()),
        };

        let part = if number.contains('.') {
            let value: f64 = number.parse().map_err(|_| invalid())?;
            Duration::try_from_secs_f64(value * unit_nanos as f64 / 1_000_000_000.0)
                .map_err(|_| invalid())?
        } else {
            let value: u64 = number.parse().map_err(|_| invalid())?;
            let nanos = value.checked_mul(unit_nanos).ok_or_else(invalid)?;
            Duration::from_nanos(nanos)
        };
        total = total.checked_add(part).ok_or_else(invalid)?;
    }

    Ok(total)
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_duration(&raw).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("45s").unwrap(), Duration::from_secs(45));
        assert_eq!(parse_duration("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("1.5h").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration(" 10s ").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_parse_duration_sub_millisecond_units() {
        assert_eq!(parse_duration("250ns").unwrap(), Duration::from_nanos(250));
        assert_eq!(parse_duration("1500us").unwrap(), Duration::from_micros(1500));
        assert_eq!(parse_duration("3\u{b5}s").unwrap(), Duration::from_micros(3));
        assert_eq!(parse_duration("3\u{3bc}s").unwrap(), Duration::from_micros(3));
        assert_eq!(
            parse_duration("1s500ms250us").unwrap(),
            Duration::from_micros(1_500_250)
        );
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        for input in ["", "10", "m", "5 minutes", "5d", "1..5s", "-5s"] {
            let err = parse_duration(input).unwrap_err();
            assert!(
                matches!(err, ProviderError::Configuration(_)),
                "{:?} should be rejected",
                input
            );
        }
    }

    #[test]
    fn test_defaults() {
        let config = ConsistencyConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.timeouts.create, Duration::from_secs(300));
        assert_eq!(config.timeouts.delete, Duration::from_secs(300));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_value() {
        let config = ConsistencyConfig::from_value(&json!({
            "customer_id": "C01234",
            "poll_interval": "5s",
            "timeouts": {"create": "10m", "update": "1h"}
        }))
        .unwrap();

        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.timeouts.create, Duration::from_secs(600));
        assert_eq!(config.timeouts.update, Duration::from_secs(3600));
        assert_eq!(config.timeouts.read, DEFAULT_OPERATION_TIMEOUT);
    }

    #[test]
    fn test_from_value_null_and_empty() {
        assert_eq!(
            ConsistencyConfig::from_value(&serde_json::Value::Null).unwrap(),
            ConsistencyConfig::default()
        );
        assert_eq!(
            ConsistencyConfig::from_value(&json!({})).unwrap(),
            ConsistencyConfig::default()
        );
    }

    #[test]
    fn test_from_value_invalid_duration() {
        let err = ConsistencyConfig::from_value(&json!({"poll_interval": "soon"})).unwrap_err();
        assert!(matches!(err, ProviderError::Serialization(_)));
    }

    #[test]
    fn test_from_value_zero_interval() {
        let err = ConsistencyConfig::from_value(&json!({"poll_interval": "0"})).unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }

    #[test]
    fn test_with_timeout_builder() {
        let config = ConsistencyConfig::new()
            .with_poll_interval(Duration::from_secs(2))
            .with_timeout(Operation::Update, Duration::from_secs(120));
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(
            config.timeouts.for_operation(Operation::Update),
            Duration::from_secs(120)
        );
        assert_eq!(
            config.timeouts.for_operation(Operation::Create),
            DEFAULT_OPERATION_TIMEOUT
        );
    }

    #[test]
    fn test_tracker_for_operation() {
        let config = ConsistencyConfig::new()
            .with_poll_interval(Duration::from_secs(5))
            .with_timeout(Operation::Create, Duration::from_secs(600));

        let tracker = config.tracker(Operation::Create, "group", 3);
        assert_eq!(tracker.label(), "group");
        assert_eq!(tracker.budget(), Duration::from_secs(600));
        assert_eq!(tracker.poll_interval(), Duration::from_secs(5));
        assert_eq!(tracker.expected_mutations(), 3);
        assert!(tracker.is_awaiting_creation());

        let tracker = config.tracker(Operation::Update, "group", 1);
        assert_eq!(tracker.budget(), DEFAULT_OPERATION_TIMEOUT);
        assert!(!tracker.is_awaiting_creation());
    }

    #[test]
    fn test_operation_display() {
        assert_eq!(Operation::Create.to_string(), "create");
        assert_eq!(Operation::Delete.to_string(), "delete");
    }
}
