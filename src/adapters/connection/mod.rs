//! Live connection adapters: the client registry and the protocol drivers.

pub mod loopback;
pub mod registry;

pub use loopback::{LoopbackClient, LoopbackClientFactory};
pub use registry::{ClientFactory, LiveConnectionManager};

use std::sync::Arc;

use crate::domain::models::ConnectionConfig;

/// Build the connection manager for the configured driver.
pub fn build_connection_manager(config: &ConnectionConfig) -> anyhow::Result<Arc<LiveConnectionManager>> {
    let factory: Arc<dyn ClientFactory> = match config.driver.as_str() {
        "loopback" => Arc::new(LoopbackClientFactory::new()),
        other => anyhow::bail!("Unknown connection driver: {other}"),
    };
    Ok(Arc::new(LiveConnectionManager::new(factory)))
}
