//! In-process registry of live protocol clients.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::models::SessionStatus;
use crate::domain::ports::{ConnectionError, ConnectionManager, ConnectionResult, ProtocolClient};

/// Builds the protocol client for a newly registered slot.
pub trait ClientFactory: Send + Sync {
    fn create_client(&self, session_id: &str) -> ConnectionResult<Arc<dyn ProtocolClient>>;
}

/// [`ConnectionManager`] keeping one client per session id in memory.
///
/// Operations that only observe or tear down a slot (`is_connected`,
/// `get_session_status`, `disconnect_session`, `remove_session`) treat a
/// missing slot as disconnected. Operations that need a client fail with
/// `SlotNotFound`.
pub struct LiveConnectionManager {
    clients: RwLock<HashMap<String, Arc<dyn ProtocolClient>>>,
    factory: Arc<dyn ClientFactory>,
}

impl LiveConnectionManager {
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
            factory,
        }
    }

    /// Number of registered slots.
    pub async fn len(&self) -> usize {
        self.clients.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.read().await.is_empty()
    }

    async fn lookup(&self, id: &str) -> Option<Arc<dyn ProtocolClient>> {
        self.clients.read().await.get(id).cloned()
    }
}

#[async_trait]
impl ConnectionManager for LiveConnectionManager {
    async fn register_session(&self, id: &str) -> ConnectionResult<()> {
        let mut clients = self.clients.write().await;
        if clients.contains_key(id) {
            return Err(ConnectionError::SlotAlreadyRegistered(id.to_string()));
        }

        let client = self.factory.create_client(id)?;
        clients.insert(id.to_string(), client);
        tracing::debug!(session_id = %id, "live slot registered");
        Ok(())
    }

    async fn get_client(&self, id: &str) -> ConnectionResult<Arc<dyn ProtocolClient>> {
        self.lookup(id)
            .await
            .ok_or_else(|| ConnectionError::SlotNotFound(id.to_string()))
    }

    async fn is_connected(&self, id: &str) -> bool {
        match self.lookup(id).await {
            Some(client) => client.status().await == SessionStatus::Connected,
            None => false,
        }
    }

    async fn disconnect_session(&self, id: &str) -> ConnectionResult<()> {
        match self.lookup(id).await {
            Some(client) => client.disconnect(id).await,
            None => Ok(()),
        }
    }

    async fn remove_session(&self, id: &str) -> ConnectionResult<()> {
        let removed = self.clients.write().await.remove(id);
        if let Some(client) = removed {
            client.disconnect(id).await?;
            tracing::debug!(session_id = %id, "live slot removed");
        }
        Ok(())
    }

    async fn get_session_status(&self, id: &str) -> ConnectionResult<SessionStatus> {
        match self.lookup(id).await {
            Some(client) => Ok(client.status().await),
            None => Ok(SessionStatus::Disconnected),
        }
    }

    async fn get_qr_code(&self, id: &str) -> ConnectionResult<String> {
        self.get_client(id)
            .await?
            .get_qr_code(id)
            .await?
            .ok_or_else(|| ConnectionError::Protocol(format!("no QR code pending for session {id}")))
    }

    async fn pair_phone(&self, id: &str, phone_number: &str) -> ConnectionResult<String> {
        self.get_client(id).await?.pair_phone(id, phone_number).await
    }

    async fn set_proxy(&self, id: &str, proxy_url: &str) -> ConnectionResult<()> {
        self.get_client(id).await?.set_proxy(proxy_url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::connection::loopback::LoopbackClientFactory;

    fn manager() -> (LiveConnectionManager, Arc<LoopbackClientFactory>) {
        let factory = Arc::new(LoopbackClientFactory::new());
        (LiveConnectionManager::new(factory.clone()), factory)
    }

    #[tokio::test]
    async fn test_register_twice_is_rejected() {
        let (manager, _) = manager();
        manager.register_session("s1").await.unwrap();

        assert_eq!(
            manager.register_session("s1").await,
            Err(ConnectionError::SlotAlreadyRegistered("s1".to_string()))
        );
        assert_eq!(manager.len().await, 1);
    }

    #[tokio::test]
    async fn test_missing_slot_behaviour() {
        let (manager, _) = manager();

        assert!(manager.is_empty().await);
        assert!(!manager.is_connected("ghost").await);
        assert_eq!(manager.disconnect_session("ghost").await, Ok(()));
        assert_eq!(manager.remove_session("ghost").await, Ok(()));
        assert_eq!(
            manager.get_session_status("ghost").await,
            Ok(SessionStatus::Disconnected)
        );
        assert!(matches!(
            manager.get_client("ghost").await,
            Err(ConnectionError::SlotNotFound(_))
        ));
        assert!(matches!(
            manager.get_qr_code("ghost").await,
            Err(ConnectionError::SlotNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_connect_then_qr_then_authenticate() {
        let (manager, factory) = manager();
        manager.register_session("s1").await.unwrap();

        let client = manager.get_client("s1").await.unwrap();
        client.connect("s1").await.unwrap();
        assert_eq!(
            manager.get_session_status("s1").await,
            Ok(SessionStatus::Connecting)
        );
        assert!(manager.get_qr_code("s1").await.unwrap().starts_with("loopback-qr:s1:"));

        factory.client("s1").unwrap().authenticate("15550001111@s.net").await;
        assert!(manager.is_connected("s1").await);
        assert!(matches!(
            manager.get_qr_code("s1").await,
            Err(ConnectionError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_remove_disconnects_client() {
        let (manager, factory) = manager();
        manager.register_session("s1").await.unwrap();
        manager.get_client("s1").await.unwrap().connect("s1").await.unwrap();

        manager.remove_session("s1").await.unwrap();
        assert!(manager.is_empty().await);
        assert_eq!(
            factory.client("s1").unwrap().status().await,
            SessionStatus::Disconnected
        );
    }

    #[tokio::test]
    async fn test_set_proxy_reaches_client() {
        let (manager, factory) = manager();
        manager.register_session("s1").await.unwrap();

        manager.set_proxy("s1", "socks5://proxy.local:1080").await.unwrap();
        assert_eq!(
            factory.client("s1").unwrap().proxy().await.as_deref(),
            Some("socks5://proxy.local:1080")
        );
    }
}
