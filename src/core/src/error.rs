//! Error types for the entitlements client
//!
//! Every variant is `Clone` so that a single failed refresh can be handed to
//! all callers waiting on it.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EntitlementsError>;

/// Entitlements client error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntitlementsError {
    /// Token generation was rejected, or no token could be attached to a request
    #[error("Identity failure: {0}")]
    IdentityFailure(String),

    /// Backoff gave up after the final attempt
    #[error("Retries exhausted for '{label}' after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        label: String,
        attempts: u32,
        #[source]
        last_error: Box<EntitlementsError>,
    },

    /// Component used before it was started
    #[error("Unable to use gateway, the gateway has not started")]
    NotStarted,

    /// Component used after disposal
    #[error("Unable to use component, it has been disposed")]
    Disposed,

    /// A second authorization observer was registered
    #[error("An authorization observer has already been bound")]
    ObserverAlreadyBound,

    /// Remote service refused the request for lack of permission
    #[error("Entitlements failed: {0}")]
    EntitlementsFailed(String),

    /// Collaborator I/O failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid caller input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl EntitlementsError {
    /// Create an identity failure
    pub fn identity<S: Into<String>>(msg: S) -> Self {
        EntitlementsError::IdentityFailure(msg.into())
    }

    /// Create a transport error
    pub fn transport<S: Into<String>>(msg: S) -> Self {
        EntitlementsError::Transport(msg.into())
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        EntitlementsError::Configuration(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid<S: Into<String>>(msg: S) -> Self {
        EntitlementsError::InvalidInput(msg.into())
    }

    /// True when the error (or the last error behind exhausted retries) is an
    /// identity failure.
    pub fn is_identity_failure(&self) -> bool {
        match self {
            EntitlementsError::IdentityFailure(_) => true,
            EntitlementsError::RetriesExhausted { last_error, .. } => last_error.is_identity_failure(),
            _ => false,
        }
    }

    /// Lifecycle and misuse errors are fatal to the call; everything that
    /// crossed an I/O boundary may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EntitlementsError::IdentityFailure(_)
                | EntitlementsError::Transport(_)
                | EntitlementsError::EntitlementsFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EntitlementsError::transport("connection reset");
        assert_eq!(err.to_string(), "Transport error: connection reset");

        let err = EntitlementsError::ObserverAlreadyBound;
        assert_eq!(err.to_string(), "An authorization observer has already been bound");
    }

    #[test]
    fn test_identity_failure_classification() {
        let exhausted = EntitlementsError::RetriesExhausted {
            label: "Read JWT token".to_string(),
            attempts: 3,
            last_error: Box::new(EntitlementsError::identity("impersonation rejected")),
        };
        assert!(exhausted.is_identity_failure());

        let exhausted = EntitlementsError::RetriesExhausted {
            label: "Read JWT token".to_string(),
            attempts: 3,
            last_error: Box::new(EntitlementsError::transport("timeout")),
        };
        assert!(!exhausted.is_identity_failure());
    }

    #[test]
    fn test_lifecycle_errors_not_retryable() {
        assert!(!EntitlementsError::NotStarted.is_retryable());
        assert!(!EntitlementsError::Disposed.is_retryable());
        assert!(!EntitlementsError::ObserverAlreadyBound.is_retryable());
        assert!(EntitlementsError::transport("boom").is_retryable());
    }
}
