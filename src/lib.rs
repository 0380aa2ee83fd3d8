//! Linkgate - messaging session gateway
//!
//! Linkgate keeps two views of every messaging-network session in step: the
//! durable session record in SQLite and the live protocol client held in
//! memory. Lifecycle operations (create, connect, disconnect, delete, status,
//! QR code, phone pairing, proxy) are exposed over a REST API.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Session model, error taxonomy and port traits
//! - **Service Layer** (`services`): Lifecycle orchestration with compensation
//! - **Adapters** (`adapters`): SQLite store, live connection registry, HTTP API
//! - **Infrastructure Layer** (`infrastructure`): Configuration and logging
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use linkgate::adapters::connection::{LiveConnectionManager, LoopbackClientFactory};
//! use linkgate::adapters::sqlite::{create_migrated_test_pool, SqliteSessionStore};
//! use linkgate::services::{NewSession, SessionLifecycleService};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = Arc::new(SqliteSessionStore::new(create_migrated_test_pool().await?));
//!     let connections = Arc::new(LiveConnectionManager::new(Arc::new(LoopbackClientFactory::new())));
//!     let service = SessionLifecycleService::new(store, connections);
//!
//!     let session = service.create_session(NewSession::named("alpha")).await?;
//!     let outcome = service.connect_session(&session.id).await?;
//!     println!("scan {:?}", outcome.qr_code);
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{DomainError, DomainResult, InvalidState};
pub use domain::models::{Config, Session, SessionStatus};
pub use services::{NewSession, SessionLifecycleService};
