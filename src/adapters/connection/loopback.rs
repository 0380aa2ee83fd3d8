//! Loopback protocol driver.
//!
//! Simulates the messaging network in-process: connecting issues a QR code,
//! and [`LoopbackClient::authenticate`] stands in for the user scanning it.
//! Used for local runs and tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::registry::ClientFactory;
use crate::domain::models::SessionStatus;
use crate::domain::ports::{ConnectionError, ConnectionResult, ProtocolClient};

#[derive(Debug, Default)]
struct LoopbackState {
    status: SessionStatus,
    qr_code: Option<String>,
    qr_generation: u32,
    external_id: String,
    proxy: Option<String>,
}

/// One simulated protocol client.
#[derive(Debug, Default)]
pub struct LoopbackClient {
    state: RwLock<LoopbackState>,
    fail_connect: AtomicBool,
}

impl LoopbackClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a completed QR scan or pairing.
    pub async fn authenticate(&self, external_id: impl Into<String>) {
        let mut state = self.state.write().await;
        state.status = SessionStatus::Connected;
        state.external_id = external_id.into();
        state.qr_code = None;
    }

    /// Simulate the network dropping the connection.
    pub async fn drop_connection(&self) {
        let mut state = self.state.write().await;
        state.status = SessionStatus::Disconnected;
        state.qr_code = None;
    }

    /// Make subsequent `connect` calls fail.
    pub fn set_fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    pub async fn external_id(&self) -> String {
        self.state.read().await.external_id.clone()
    }

    pub async fn proxy(&self) -> Option<String> {
        self.state.read().await.proxy.clone()
    }
}

#[async_trait]
impl ProtocolClient for LoopbackClient {
    async fn connect(&self, session_id: &str) -> ConnectionResult<()> {
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(ConnectionError::Protocol(format!(
                "loopback connect refused for session {session_id}"
            )));
        }

        let mut state = self.state.write().await;
        if state.status != SessionStatus::Disconnected {
            return Ok(());
        }

        state.status = SessionStatus::Connecting;
        state.qr_generation += 1;
        state.qr_code = Some(format!("loopback-qr:{session_id}:{}", state.qr_generation));
        Ok(())
    }

    async fn get_qr_code(&self, _session_id: &str) -> ConnectionResult<Option<String>> {
        Ok(self.state.read().await.qr_code.clone())
    }

    async fn disconnect(&self, _session_id: &str) -> ConnectionResult<()> {
        self.drop_connection().await;
        Ok(())
    }

    async fn status(&self) -> SessionStatus {
        self.state.read().await.status
    }

    async fn pair_phone(&self, session_id: &str, phone_number: &str) -> ConnectionResult<String> {
        if self.state.read().await.status == SessionStatus::Connected {
            return Err(ConnectionError::Protocol(format!(
                "session {session_id} is already paired"
            )));
        }

        let seed = Uuid::new_v5(&Uuid::NAMESPACE_OID, format!("{session_id}:{phone_number}").as_bytes())
            .simple()
            .to_string()
            .to_uppercase();
        Ok(format!("{}-{}", &seed[..4], &seed[4..8]))
    }

    async fn set_proxy(&self, proxy_url: &str) -> ConnectionResult<()> {
        self.state.write().await.proxy = Some(proxy_url.to_string());
        Ok(())
    }
}

/// Creates [`LoopbackClient`]s and keeps a handle to each one.
#[derive(Debug, Default)]
pub struct LoopbackClientFactory {
    clients: Mutex<HashMap<String, Arc<LoopbackClient>>>,
}

impl LoopbackClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recent client created for `session_id`.
    pub fn client(&self, session_id: &str) -> Option<Arc<LoopbackClient>> {
        self.clients
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(session_id)
            .cloned()
    }
}

impl ClientFactory for LoopbackClientFactory {
    fn create_client(&self, session_id: &str) -> ConnectionResult<Arc<dyn ProtocolClient>> {
        let client = Arc::new(LoopbackClient::new());
        self.clients
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session_id.to_string(), Arc::clone(&client));
        Ok(client)
    }
}
