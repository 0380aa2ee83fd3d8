//! Common test utilities for integration tests
//!
//! Wires the lifecycle service over an in-memory SQLite store and a live
//! connection registry whose clients can be scripted to succeed, fail, or
//! stall.

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::RwLock;

use linkgate::adapters::connection::{ClientFactory, LiveConnectionManager, LoopbackClientFactory};
use linkgate::adapters::sqlite::{create_migrated_test_pool, initialize_database, PoolConfig, SqliteSessionStore};
use linkgate::domain::models::SessionStatus;
use linkgate::domain::ports::{ConnectionError, ConnectionManager, ConnectionResult, ProtocolClient};
use linkgate::services::SessionLifecycleService;

/// How scripted clients behave.
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub qr_code: Option<String>,
    pub connect_error: Option<String>,
    pub connect_delay: Option<Duration>,
}

pub struct ScriptedClient {
    script: Script,
    status: RwLock<SessionStatus>,
}

#[async_trait]
impl ProtocolClient for ScriptedClient {
    async fn connect(&self, _session_id: &str) -> ConnectionResult<()> {
        if let Some(delay) = self.script.connect_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(ref message) = self.script.connect_error {
            return Err(ConnectionError::Protocol(message.clone()));
        }
        *self.status.write().await = SessionStatus::Connecting;
        Ok(())
    }

    async fn get_qr_code(&self, _session_id: &str) -> ConnectionResult<Option<String>> {
        Ok(self.script.qr_code.clone())
    }

    async fn disconnect(&self, _session_id: &str) -> ConnectionResult<()> {
        *self.status.write().await = SessionStatus::Disconnected;
        Ok(())
    }

    async fn status(&self) -> SessionStatus {
        *self.status.read().await
    }

    async fn pair_phone(&self, _session_id: &str, _phone_number: &str) -> ConnectionResult<String> {
        Ok("PAIR-0001".to_string())
    }

    async fn set_proxy(&self, _proxy_url: &str) -> ConnectionResult<()> {
        Ok(())
    }
}

pub struct ScriptedFactory {
    pub script: Script,
}

impl ClientFactory for ScriptedFactory {
    fn create_client(&self, _session_id: &str) -> ConnectionResult<Arc<dyn ProtocolClient>> {
        Ok(Arc::new(ScriptedClient {
            script: self.script.clone(),
            status: RwLock::new(SessionStatus::Disconnected),
        }))
    }
}

/// Registry wrapper that counts calls and can be told to fail slot removal.
pub struct InstrumentedManager {
    inner: LiveConnectionManager,
    pub calls: AtomicUsize,
    pub fail_remove: AtomicBool,
}

impl InstrumentedManager {
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            inner: LiveConnectionManager::new(factory),
            calls: AtomicUsize::new(0),
            fail_remove: AtomicBool::new(false),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConnectionManager for InstrumentedManager {
    async fn register_session(&self, id: &str) -> ConnectionResult<()> {
        self.record();
        self.inner.register_session(id).await
    }

    async fn get_client(&self, id: &str) -> ConnectionResult<Arc<dyn ProtocolClient>> {
        self.record();
        self.inner.get_client(id).await
    }

    async fn is_connected(&self, id: &str) -> bool {
        self.record();
        self.inner.is_connected(id).await
    }

    async fn disconnect_session(&self, id: &str) -> ConnectionResult<()> {
        self.record();
        self.inner.disconnect_session(id).await
    }

    async fn remove_session(&self, id: &str) -> ConnectionResult<()> {
        self.record();
        if self.fail_remove.load(Ordering::SeqCst) {
            return Err(ConnectionError::Protocol("slot teardown failed".to_string()));
        }
        self.inner.remove_session(id).await
    }

    async fn get_session_status(&self, id: &str) -> ConnectionResult<SessionStatus> {
        self.record();
        self.inner.get_session_status(id).await
    }

    async fn get_qr_code(&self, id: &str) -> ConnectionResult<String> {
        self.record();
        self.inner.get_qr_code(id).await
    }

    async fn pair_phone(&self, id: &str, phone_number: &str) -> ConnectionResult<String> {
        self.record();
        self.inner.pair_phone(id, phone_number).await
    }

    async fn set_proxy(&self, id: &str, proxy_url: &str) -> ConnectionResult<()> {
        self.record();
        self.inner.set_proxy(id, proxy_url).await
    }
}

pub struct Harness<M> {
    pub service: SessionLifecycleService,
    pub store: Arc<SqliteSessionStore>,
    pub connections: Arc<M>,
    /// Holds the on-disk database alive, when there is one.
    pub dir: Option<TempDir>,
}

pub async fn sqlite_store() -> Arc<SqliteSessionStore> {
    let pool = create_migrated_test_pool()
        .await
        .expect("Failed to create migrated test pool");
    Arc::new(SqliteSessionStore::new(pool))
}

/// Store on a WAL database file with the default multi-connection pool.
pub async fn disk_store() -> (Arc<SqliteSessionStore>, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let url = format!("sqlite:{}", dir.path().join("linkgate.db").display());
    let pool = initialize_database(&url, PoolConfig::default())
        .await
        .expect("Failed to initialize on-disk database");
    (Arc::new(SqliteSessionStore::new(pool)), dir)
}

fn loopback_over(
    store: Arc<SqliteSessionStore>,
    dir: Option<TempDir>,
) -> (Harness<LiveConnectionManager>, Arc<LoopbackClientFactory>) {
    let factory = Arc::new(LoopbackClientFactory::new());
    let connections = Arc::new(LiveConnectionManager::new(factory.clone()));
    let service = SessionLifecycleService::new(store.clone(), connections.clone());
    (
        Harness {
            service,
            store,
            connections,
            dir,
        },
        factory,
    )
}

/// Service over in-memory SQLite and the loopback driver.
pub async fn loopback_harness() -> (Harness<LiveConnectionManager>, Arc<LoopbackClientFactory>) {
    loopback_over(sqlite_store().await, None)
}

/// Service over an on-disk database and the loopback driver.
pub async fn disk_loopback_harness() -> (Harness<LiveConnectionManager>, Arc<LoopbackClientFactory>) {
    let (store, dir) = disk_store().await;
    loopback_over(store, Some(dir))
}

/// Service over SQLite and scripted clients behind an instrumented registry.
pub async fn scripted_harness(script: Script) -> Harness<InstrumentedManager> {
    let connections = Arc::new(InstrumentedManager::new(Arc::new(ScriptedFactory { script })));
    let store = sqlite_store().await;
    let service = SessionLifecycleService::new(store.clone(), connections.clone());
    Harness {
        service,
        store,
        connections,
        dir: None,
    }
}
