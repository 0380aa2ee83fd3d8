//! CLI command implementations.

pub mod serve;
pub mod session;

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::adapters::connection::build_connection_manager;
use crate::adapters::sqlite::{initialize_database, PoolConfig, SqliteSessionStore};
use crate::domain::models::Config;
use crate::services::SessionLifecycleService;

/// Open the configured database and wire the lifecycle service around it.
pub async fn build_service(config: &Config) -> Result<SessionLifecycleService> {
    let pool = initialize_database(&config.database.url(), PoolConfig::from(&config.database))
        .await
        .with_context(|| format!("Failed to open database at {}", config.database.path))?;

    let store = Arc::new(SqliteSessionStore::new(pool));
    let connections = build_connection_manager(&config.connection)?;
    Ok(SessionLifecycleService::new(store, connections))
}
