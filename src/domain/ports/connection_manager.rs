//! Connection manager port.
//!
//! The connection manager owns the live protocol clients, one per session
//! slot. It is the other half of session truth: the store says what was
//! last recorded, the manager says what is actually happening on the wire.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::domain::models::SessionStatus;

/// Errors raised by the connection manager or a protocol client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    /// No live slot is registered for the session.
    #[error("no live slot registered for session {0}")]
    SlotNotFound(String),

    #[error("live slot already registered for session {0}")]
    SlotAlreadyRegistered(String),

    /// The protocol client refused or failed the request.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("invalid proxy: {0}")]
    InvalidProxy(String),
}

pub type ConnectionResult<T> = Result<T, ConnectionError>;

/// Handle to one live protocol client.
#[async_trait]
pub trait ProtocolClient: Send + Sync {
    /// Open the connection to the messaging network.
    async fn connect(&self, session_id: &str) -> ConnectionResult<()>;

    /// Current QR code, `None` when no code is pending (e.g. already authenticated).
    async fn get_qr_code(&self, session_id: &str) -> ConnectionResult<Option<String>>;

    async fn disconnect(&self, session_id: &str) -> ConnectionResult<()>;

    async fn status(&self) -> SessionStatus;

    /// Request a pairing code for the given phone number (digits only).
    async fn pair_phone(&self, session_id: &str, phone_number: &str) -> ConnectionResult<String>;

    async fn set_proxy(&self, proxy_url: &str) -> ConnectionResult<()>;
}

/// Registry of live per-session protocol clients.
#[async_trait]
pub trait ConnectionManager: Send + Sync {
    /// Allocate the live slot for a session.
    async fn register_session(&self, id: &str) -> ConnectionResult<()>;

    /// Handle to the session's client, `SlotNotFound` if none is registered.
    async fn get_client(&self, id: &str) -> ConnectionResult<Arc<dyn ProtocolClient>>;

    async fn is_connected(&self, id: &str) -> bool;

    async fn disconnect_session(&self, id: &str) -> ConnectionResult<()>;

    /// Deregister the live slot, disconnecting its client.
    async fn remove_session(&self, id: &str) -> ConnectionResult<()>;

    async fn get_session_status(&self, id: &str) -> ConnectionResult<SessionStatus>;

    async fn get_qr_code(&self, id: &str) -> ConnectionResult<String>;

    async fn pair_phone(&self, id: &str, phone_number: &str) -> ConnectionResult<String>;

    async fn set_proxy(&self, id: &str, proxy_url: &str) -> ConnectionResult<()>;
}
