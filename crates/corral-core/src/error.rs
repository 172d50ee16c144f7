//! Error taxonomy for the sync pipeline.
//!
//! Every error carries a stable kind assigned at the point of creation;
//! the task envelope and the vendor gateways branch on
//! [`SyncError::is_transient`] and [`SyncError::error_code`] rather than on
//! message text.

use thiserror::Error;

/// Error that can occur while synchronizing contacts with a vendor.
#[derive(Debug, Error)]
pub enum SyncError {
    // Transport errors (transient)
    /// Network or vendor-side failure that may resolve on its own.
    #[error("transient vendor error: {message}")]
    Transient {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Vendor asked us to slow down.
    #[error("rate limited by vendor")]
    RateLimited { retry_after_secs: Option<u64> },

    /// Explicit request to retry later (lock contention, vendor index lag).
    #[error("retry requested: {message}")]
    Retry { message: String },

    // Authentication (fatal once the gateway's single re-auth has failed)
    /// Credential acquisition or refresh failed.
    #[error("authentication failed: {message}")]
    Auth { message: String },

    // HTTP errors the gateway does not interpret further
    /// Non-2xx response outside the dedicated variants below.
    #[error("vendor returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The requested record does not exist. Often a valid `None`, not a
    /// failure; callers decide.
    #[error("not found: {resource}")]
    NotFound { resource: String },

    /// The vendor rejected a create as a duplicate.
    #[error("duplicate record: {identifier}")]
    Duplicate { identifier: String },

    // Identity resolution
    /// More than one record matched an identifier that must be unique.
    #[error("multiple records matched {identifier}")]
    AmbiguousIdentity { identifier: String },

    // Caller bugs (fatal, never retried)
    /// A required argument was missing or malformed.
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    /// An outbound application field name is not in the mapping vocabulary.
    #[error("unknown application field: {field}")]
    UnknownField { field: String },

    /// Gateway or config construction failed.
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Payload could not be serialized or deserialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SyncError {
    /// Whether the operation should be retried with backoff.
    ///
    /// Transient errors are temporary conditions: network trouble, vendor
    /// 5xx, rate limiting, or an explicit retry request.
    pub fn is_transient(&self) -> bool {
        match self {
            SyncError::Transient { .. } | SyncError::RateLimited { .. } | SyncError::Retry { .. } => {
                true
            }
            SyncError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Whether retrying cannot help.
    pub fn is_permanent(&self) -> bool {
        !self.is_transient()
    }

    /// Stable code for classification and logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            SyncError::Transient { .. } => "TRANSIENT",
            SyncError::RateLimited { .. } => "RATE_LIMITED",
            SyncError::Retry { .. } => "RETRY",
            SyncError::Auth { .. } => "AUTH_FAILED",
            SyncError::Http { .. } => "HTTP_ERROR",
            SyncError::NotFound { .. } => "NOT_FOUND",
            SyncError::Duplicate { .. } => "DUPLICATE",
            SyncError::AmbiguousIdentity { .. } => "AMBIGUOUS_IDENTITY",
            SyncError::InvalidArgument { .. } => "INVALID_ARGUMENT",
            SyncError::UnknownField { .. } => "UNKNOWN_FIELD",
            SyncError::InvalidConfig { .. } => "INVALID_CONFIG",
            SyncError::Serialization(_) => "SERIALIZATION",
        }
    }

    // Convenience constructors

    /// Create a transient error.
    pub fn transient(message: impl Into<String>) -> Self {
        SyncError::Transient {
            message: message.into(),
            source: None,
        }
    }

    /// Create a transient error with an underlying cause.
    pub fn transient_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        SyncError::Transient {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an explicit retry request.
    pub fn retry(message: impl Into<String>) -> Self {
        SyncError::Retry {
            message: message.into(),
        }
    }

    /// Create an authentication error.
    pub fn auth(message: impl Into<String>) -> Self {
        SyncError::Auth {
            message: message.into(),
        }
    }

    /// Create an invalid-argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        SyncError::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create an invalid-configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        SyncError::InvalidConfig {
            message: message.into(),
        }
    }
}

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let transient = vec![
            SyncError::transient("connection reset"),
            SyncError::RateLimited {
                retry_after_secs: Some(30),
            },
            SyncError::retry("could not acquire lock"),
            SyncError::Http {
                status: 503,
                body: "unavailable".into(),
            },
        ];
        for err in transient {
            assert!(err.is_transient(), "expected {} transient", err.error_code());
            assert!(!err.is_permanent());
        }
    }

    #[test]
    fn test_permanent_classification() {
        let permanent = vec![
            SyncError::auth("bad credentials"),
            SyncError::invalid_argument("no identifier supplied"),
            SyncError::UnknownField { field: "foo".into() },
            SyncError::AmbiguousIdentity {
                identifier: "amo_user_id=1".into(),
            },
            SyncError::NotFound {
                resource: "/ctms/abc".into(),
            },
            SyncError::Http {
                status: 422,
                body: "unprocessable".into(),
            },
        ];
        for err in permanent {
            assert!(err.is_permanent(), "expected {} permanent", err.error_code());
        }
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(SyncError::auth("x").error_code(), "AUTH_FAILED");
        assert_eq!(
            SyncError::UnknownField { field: "f".into() }.error_code(),
            "UNKNOWN_FIELD"
        );
    }

    #[test]
    fn test_display() {
        let err = SyncError::UnknownField { field: "foo".into() };
        assert_eq!(err.to_string(), "unknown application field: foo");
    }
}
