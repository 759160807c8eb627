//! Error types for Google Workspace resource operations.

use thiserror::Error;

/// Errors that can occur while writing a resource or waiting for it to settle.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested resource was not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// An internal SDK error occurred.
    #[error("SDK error: {0}")]
    Sdk(String),

    /// A configuration error occurred.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Resource already exists (create conflict).
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    /// Permission denied (authentication/authorization failure).
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Quota or rate limit exceeded (HTTP 429).
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Service temporarily unavailable (HTTP 503).
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Operation timed out, including waits for eventual consistency.
    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// Operation failed due to current state (precondition not met).
    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    /// Invalid request from client.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The Admin SDK answered with a status that has no dedicated variant.
    #[error("API error (HTTP {status}): {message}")]
    Api {
        /// HTTP status code of the response.
        status: u16,
        /// Error message returned by the API.
        message: String,
    },
}

impl ProviderError {
    /// Get the error message as a string.
    pub fn message(&self) -> &str {
        match self {
            Self::NotFound(msg)
            | Self::Sdk(msg)
            | Self::Configuration(msg)
            | Self::AlreadyExists(msg)
            | Self::PermissionDenied(msg)
            | Self::ResourceExhausted(msg)
            | Self::Unavailable(msg)
            | Self::DeadlineExceeded(msg)
            | Self::FailedPrecondition(msg)
            | Self::InvalidRequest(msg) => msg,
            Self::Serialization(_err) => "serialization error (see Debug output)",
            Self::Api { message, .. } => message,
        }
    }

    /// Map a failed Admin SDK response onto an error variant.
    ///
    /// # Examples
    ///
    /// ```
    /// use googleworkspace_provider_core::ProviderError;
    ///
    /// let err = ProviderError::from_http_status(429, "quota exceeded");
    /// assert!(matches!(err, ProviderError::ResourceExhausted(_)));
    /// assert!(err.is_retryable());
    /// ```
    pub fn from_http_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            400 => Self::InvalidRequest(message),
            401 | 403 => Self::PermissionDenied(message),
            404 => Self::NotFound(message),
            409 => Self::AlreadyExists(message),
            412 => Self::FailedPrecondition(message),
            429 => Self::ResourceExhausted(message),
            503 => Self::Unavailable(message),
            504 => Self::DeadlineExceeded(message),
            _ => Self::Api { status, message },
        }
    }

    /// Whether the broader retry utility should try the request again.
    ///
    /// Only rate limiting (429) and unavailability (503) are transient. Every
    /// other error, including a consistency timeout, is final.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ResourceExhausted(_) | Self::Unavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProviderError::NotFound("groups/eng@example.com".to_string());
        assert_eq!(format!("{}", err), "Resource not found: groups/eng@example.com");

        let err = ProviderError::DeadlineExceeded("still waiting".to_string());
        assert_eq!(format!("{}", err), "Deadline exceeded: still waiting");

        let err = ProviderError::Api {
            status: 500,
            message: "backend error".to_string(),
        };
        assert_eq!(format!("{}", err), "API error (HTTP 500): backend error");
    }

    #[test]
    fn test_from_http_status() {
        assert!(matches!(
            ProviderError::from_http_status(400, "bad"),
            ProviderError::InvalidRequest(_)
        ));
        assert!(matches!(
            ProviderError::from_http_status(401, "who"),
            ProviderError::PermissionDenied(_)
        ));
        assert!(matches!(
            ProviderError::from_http_status(403, "no"),
            ProviderError::PermissionDenied(_)
        ));
        assert!(matches!(
            ProviderError::from_http_status(404, "gone"),
            ProviderError::NotFound(_)
        ));
        assert!(matches!(
            ProviderError::from_http_status(409, "dup"),
            ProviderError::AlreadyExists(_)
        ));
        assert!(matches!(
            ProviderError::from_http_status(412, "etag mismatch"),
            ProviderError::FailedPrecondition(_)
        ));
        assert!(matches!(
            ProviderError::from_http_status(429, "slow down"),
            ProviderError::ResourceExhausted(_)
        ));
        assert!(matches!(
            ProviderError::from_http_status(503, "later"),
            ProviderError::Unavailable(_)
        ));
        assert!(matches!(
            ProviderError::from_http_status(500, "boom"),
            ProviderError::Api { status: 500, .. }
        ));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(ProviderError::ResourceExhausted("429".into()).is_retryable());
        assert!(ProviderError::Unavailable("503".into()).is_retryable());

        assert!(!ProviderError::NotFound("x".into()).is_retryable());
        assert!(!ProviderError::DeadlineExceeded("x".into()).is_retryable());
        assert!(!ProviderError::PermissionDenied("x".into()).is_retryable());
        assert!(!ProviderError::Api {
            status: 500,
            message: "x".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_message_method() {
        let err = ProviderError::NotFound("user-123".to_string());
        assert_eq!(err.message(), "user-123");

        let err = ProviderError::from_http_status(502, "bad gateway");
        assert_eq!(err.message(), "bad gateway");
    }
}
