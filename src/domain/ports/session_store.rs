//! Session store port (trait) for dependency injection.
//!
//! Defines the contract for durable session storage that infrastructure
//! adapters must implement. The lifecycle service depends on this trait,
//! not on a concrete database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::models::{Session, SessionStatus};

/// Errors raised by a session store.
///
/// `NotFound` is distinguishable from generic failures so callers can map it
/// to a domain-level not-found result.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session not found: {0}")]
    NotFound(String),

    #[error("session name already taken: {0}")]
    AlreadyExists(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

/// Durable storage for session records.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a new session.
    ///
    /// # Errors
    /// - `AlreadyExists` if the name is taken
    /// - `Database` on persistence failure
    async fn create(&self, session: &Session) -> StoreResult<()>;

    /// Fetch a session by id, `NotFound` if absent.
    async fn get_by_id(&self, id: &str) -> StoreResult<Session>;

    /// Fetch a session by its unique name, `NotFound` if absent.
    async fn get_by_name(&self, name: &str) -> StoreResult<Session>;

    /// All sessions, oldest first.
    async fn list(&self) -> StoreResult<Vec<Session>>;

    /// Sessions with `is_active = true`, oldest first.
    async fn list_active(&self) -> StoreResult<Vec<Session>>;

    /// Overwrite every mutable field of an existing session.
    async fn update(&self, session: &Session) -> StoreResult<()>;

    /// Remove a session record, `NotFound` if absent.
    async fn delete(&self, id: &str) -> StoreResult<()>;

    /// Set status and advance `updated_at`.
    async fn update_status(&self, id: &str, status: SessionStatus) -> StoreResult<()>;

    /// Set `last_seen` and advance `updated_at`.
    async fn update_last_seen(&self, id: &str, last_seen: DateTime<Utc>) -> StoreResult<()>;

    /// Set the messaging-network account id and advance `updated_at`.
    async fn update_external_id(&self, id: &str, external_id: &str) -> StoreResult<()>;

    async fn exists_by_name(&self, name: &str) -> StoreResult<bool>;

    /// Sessions that have authenticated at least once.
    async fn get_sessions_with_external_id(&self) -> StoreResult<Vec<Session>>;
}
