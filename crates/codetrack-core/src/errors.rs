//! Unified error type for the synchronization layer
//!
//! Every fetch, mutation and notification failure is expressed as a
//! [`SyncError`] value. The type is `Clone` because a single coalesced fetch
//! hands the same outcome to every caller that joined it.

use serde::{Deserialize, Serialize};

use crate::domain::Domain;

/// Unified error type for codetrack operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum SyncError {
    /// A fetch or mutation needed an owning identity and none was signed in
    #[error("Not authenticated")]
    NotAuthenticated,

    /// Network or storage call failed; the cached snapshot is retained
    #[error("Fetch failed for {domain}: {message}")]
    TransientFetchFailure {
        /// Domain whose refresh failed
        domain: Domain,
        /// Error message from the remote collaborator
        message: String,
    },

    /// A fetch did not settle within the configured timeout
    #[error("Fetch for {domain} timed out after {after_ms}ms")]
    Timeout {
        /// Domain whose refresh timed out
        domain: Domain,
        /// Timeout that elapsed, in milliseconds
        after_ms: u64,
    },

    /// A subscriber or bus listener panicked during delivery
    #[error("Listener failed: {message}")]
    ListenerFailure {
        /// Panic payload rendered as text
        message: String,
    },

    /// The remote answered with data for a different domain
    #[error("Payload mismatch: expected {expected}, got {actual}")]
    PayloadMismatch {
        /// Domain the caller asked for
        expected: Domain,
        /// Domain the payload carried
        actual: Domain,
    },

    /// The remote refused a mutation (unknown record, invalid state, ...)
    #[error("Rejected: {message}")]
    Rejected {
        /// Reason given by the remote
        message: String,
    },

    /// Invalid configuration
    #[error("Config error: {message}")]
    Config {
        /// What was wrong with the configuration
        message: String,
    },

    /// Internal system error
    #[error("Internal error: {message}")]
    Internal {
        /// Error message describing the internal error
        message: String,
    },
}

impl SyncError {
    /// Create a transient fetch failure for a domain
    pub fn transient(domain: Domain, message: impl Into<String>) -> Self {
        Self::TransientFetchFailure {
            domain,
            message: message.into(),
        }
    }

    /// Create a listener failure
    pub fn listener(message: impl Into<String>) -> Self {
        Self::ListenerFailure {
            message: message.into(),
        }
    }

    /// Create a rejected-mutation error
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether retrying later may succeed.
    ///
    /// Polling keeps ticking regardless; this only informs callers deciding
    /// whether to show a transient indicator or a hard failure.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::TransientFetchFailure { .. } | Self::Timeout { .. }
        )
    }
}

/// Standard Result type for codetrack operations
pub type SyncResult<T> = std::result::Result<T, SyncError>;

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::internal(format!("serialization: {err}"))
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        Self::internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SyncError::transient(Domain::Users, "connection reset");
        assert_eq!(err.to_string(), "Fetch failed for users: connection reset");
    }

    #[test]
    fn test_transient_classification() {
        assert!(SyncError::transient(Domain::Users, "x").is_transient());
        assert!(SyncError::Timeout {
            domain: Domain::Notifications,
            after_ms: 10
        }
        .is_transient());
        assert!(!SyncError::NotAuthenticated.is_transient());
        assert!(!SyncError::listener("boom").is_transient());
    }

    #[test]
    fn test_io_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert!(matches!(SyncError::from(io_err), SyncError::Internal { .. }));
    }
}
