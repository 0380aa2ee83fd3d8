//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines async trait interfaces that infrastructure adapters must implement:
//! - SessionStore: Durable storage of session records
//! - ConnectionManager: Registry of live protocol clients
//!
//! These traits define the contracts that allow the domain to be independent
//! of specific infrastructure implementations.

pub mod connection_manager;
pub mod session_store;

pub use connection_manager::{ConnectionError, ConnectionManager, ConnectionResult, ProtocolClient};
pub use session_store::{SessionStore, StoreError, StoreResult};
