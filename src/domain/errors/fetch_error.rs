//! Errors surfaced to callers of an image lookup.

use thiserror::Error;

/// Result type for image lookups.
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// User-visible lookup failures.
///
/// Cloneable so a single outcome can be handed to every waiter of a shared
/// fetch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[allow(missing_docs)]
pub enum FetchError {
    #[error("malformed identifier {identifier:?}: {reason}")]
    MalformedIdentifier { identifier: String, reason: String },

    #[error("network failure: {message}")]
    NetworkFailure {
        message: String,
        status: Option<u16>,
    },

    #[error("failed to decode image: {message}")]
    DecodeFailure { message: String },
}

impl FetchError {
    /// Creates malformed identifier error.
    #[must_use]
    pub fn malformed(identifier: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedIdentifier {
            identifier: identifier.into(),
            reason: reason.into(),
        }
    }

    /// Creates network error without an HTTP status.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::NetworkFailure {
            message: message.into(),
            status: None,
        }
    }

    /// Creates network error for a non-success HTTP status.
    #[must_use]
    pub fn http_status(status: u16, reason: Option<&str>) -> Self {
        Self::NetworkFailure {
            message: format!("HTTP {status}: {}", reason.unwrap_or("Unknown")),
            status: Some(status),
        }
    }

    /// Creates decode error.
    #[must_use]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::DecodeFailure {
            message: message.into(),
        }
    }

    /// Returns whether error is network related.
    #[must_use]
    pub const fn is_network_error(&self) -> bool {
        matches!(self, Self::NetworkFailure { .. })
    }

    /// Returns the HTTP status that caused the failure, if any.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::NetworkFailure { status, .. } => *status,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_error() {
        let err = FetchError::http_status(404, Some("Not Found"));
        assert!(err.is_network_error());
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.to_string(), "network failure: HTTP 404: Not Found");
    }

    #[test]
    fn test_decode_error_has_no_status() {
        let err = FetchError::decode("bad magic");
        assert!(!err.is_network_error());
        assert_eq!(err.status(), None);
    }
}
