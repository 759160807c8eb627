//! Logging setup for the provider process.
//!
//! Logs go to **stderr**; Terraform owns the plugin's stdout. The filter is
//! chosen in this order:
//!
//! 1. `RUST_LOG`, with the full `tracing` directive syntax
//!    (`googleworkspace_provider_core=debug`).
//! 2. `TF_LOG`, the level Terraform users already set
//!    (`TRACE`, `DEBUG`, `INFO`, `WARN`, `ERROR`; `JSON` means `trace`).
//! 3. The default level (`info` unless given).
//!
//! ```bash
//! # Watch every consistency probe
//! TF_LOG=DEBUG terraform apply
//!
//! # Only this crate at trace level
//! RUST_LOG=googleworkspace_provider_core=trace terraform apply
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the default logging subscriber.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    init_logging_with_default("info");
}

/// Initialize logging with a custom default level.
///
/// The default applies only when neither `RUST_LOG` nor `TF_LOG` is set.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging_with_default(default_level: &str) {
    tracing_subscriber::registry()
        .with(env_filter(default_level))
        .with(stderr_layer())
        .init();
}

/// Try to initialize logging, returning false if already initialized.
///
/// Useful in tests, where several cases may race to install a subscriber.
pub fn try_init_logging() -> bool {
    tracing_subscriber::registry()
        .with(env_filter("info"))
        .with(stderr_layer())
        .try_init()
        .is_ok()
}

fn stderr_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
}

fn env_filter(default_level: &str) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let level = std::env::var("TF_LOG")
        .ok()
        .and_then(|value| tf_log_level(&value))
        .unwrap_or(default_level);
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Translate a `TF_LOG` value into a `tracing` level directive.
fn tf_log_level(value: &str) -> Option<&'static str> {
    match value.trim().to_ascii_uppercase().as_str() {
        "TRACE" | "JSON" => Some("trace"),
        "DEBUG" => Some("debug"),
        "INFO" => Some("info"),
        "WARN" => Some("warn"),
        "ERROR" => Some("error"),
        "OFF" => Some("off"),
        _ => None,
    }
}
