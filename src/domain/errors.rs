//! Domain errors for the linkgate session gateway.

use thiserror::Error;

use crate::domain::ports::{ConnectionError, StoreError};

/// Why an operation is forbidden by the session's current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidState {
    AlreadyConnected,
    AlreadyConnecting,
    Inactive,
}

impl InvalidState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AlreadyConnected => "session is already connected",
            Self::AlreadyConnecting => "session is already connecting",
            Self::Inactive => "session is inactive",
        }
    }
}

impl std::fmt::Display for InvalidState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain-level errors returned by session lifecycle operations.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Session already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid state for session {id}: {reason}")]
    InvalidState { id: String, reason: InvalidState },

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Session store error: {0}")]
    Store(#[source] StoreError),

    #[error("Connection manager error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
    pub fn invalid_state(id: impl Into<String>, reason: InvalidState) -> Self {
        Self::InvalidState { id: id.into(), reason }
    }

    /// Whether this error came from a collaborator (store or connection manager).
    pub fn is_collaborator_error(&self) -> bool {
        matches!(self, Self::Store(_) | Self::Connection(_))
    }
}

impl From<StoreError> for DomainError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => DomainError::NotFound(id),
            StoreError::AlreadyExists(name) => DomainError::AlreadyExists(name),
            other => DomainError::Store(other),
        }
    }
}

impl From<tokio::task::JoinError> for DomainError {
    fn from(err: tokio::task::JoinError) -> Self {
        DomainError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_not_found_maps_to_domain_not_found() {
        let err: DomainError = StoreError::NotFound("abc".to_string()).into();
        assert!(matches!(err, DomainError::NotFound(id) if id == "abc"));
    }

    #[test]
    fn test_store_database_error_stays_collaborator_error() {
        let err: DomainError = StoreError::Database("disk I/O error".to_string()).into();
        assert!(err.is_collaborator_error());
        assert!(err.to_string().contains("disk I/O error"));
    }

    #[test]
    fn test_invalid_state_message() {
        let err = DomainError::invalid_state("abc", InvalidState::Inactive);
        assert_eq!(err.to_string(), "Invalid state for session abc: session is inactive");
    }
}
