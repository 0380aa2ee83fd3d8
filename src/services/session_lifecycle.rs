//! Session lifecycle service.
//!
//! Coordinates the durable session store with the live connection manager.
//! The two fail independently, so every multi-step operation is an ordered
//! sequence of independently committing steps with a named compensation for
//! each step that can be left dangling. When a compensation itself fails it
//! is logged and the original error is still the one returned.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn, Instrument};

use crate::domain::errors::{DomainError, DomainResult, InvalidState};
use crate::domain::models::{Session, SessionStatus};
use crate::domain::ports::{
    ConnectionError, ConnectionManager, ConnectionResult, ProtocolClient, SessionStore,
};
use crate::services::session_locks::SessionLocks;
use crate::services::validation::{
    normalize_phone_number, validate_proxy_url, validate_session_name, validate_webhook_url,
};

/// Request to create a session.
///
/// `webhook` and `proxy_url` are transient: they are validated and applied,
/// never persisted.
#[derive(Debug, Clone, Default)]
pub struct NewSession {
    pub name: String,
    pub webhook: Option<String>,
    pub proxy_url: Option<String>,
}

impl NewSession {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Result of a connect request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOutcome {
    pub status: SessionStatus,
    /// QR code to scan; `None` when the account may already be authenticated.
    pub qr_code: Option<String>,
}

/// Reconciled status of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub status: SessionStatus,
    pub external_id: String,
    pub last_seen: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrCodeOutcome {
    pub qr_code: String,
    pub status: SessionStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingOutcome {
    pub pairing_code: String,
    /// Normalized digits the code was requested for.
    pub phone_number: String,
}

/// Counts from a startup restore pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    /// Records whose stale non-disconnected status was reset
    pub reset: usize,
    /// Live slots allocated
    pub registered: usize,
    /// Authenticated sessions reconnected
    pub reconnected: usize,
    /// Registrations or reconnects that failed
    pub failed: usize,
}

/// Orchestrates session create/connect/disconnect/delete and friends.
///
/// Holds no session state of its own; all continuity lives in the store and
/// the connection manager. Mutating operations on one id are serialized
/// through [`SessionLocks`].
#[derive(Clone)]
pub struct SessionLifecycleService {
    store: Arc<dyn SessionStore>,
    connections: Arc<dyn ConnectionManager>,
    locks: SessionLocks,
}

impl SessionLifecycleService {
    pub fn new(store: Arc<dyn SessionStore>, connections: Arc<dyn ConnectionManager>) -> Self {
        Self {
            store,
            connections,
            locks: SessionLocks::new(),
        }
    }

    /// Create a session record and allocate its live slot.
    ///
    /// Runs on its own task so that a cancelled caller cannot interrupt the
    /// compensating delete.
    #[instrument(skip(self, request), fields(name = %request.name), err)]
    pub async fn create_session(&self, request: NewSession) -> DomainResult<Session> {
        let name = validate_session_name(&request.name)?;
        let proxy_url = request
            .proxy_url
            .as_deref()
            .map(validate_proxy_url)
            .transpose()?;
        if let Some(webhook) = request.webhook.as_deref() {
            validate_webhook_url(webhook)?;
        }

        let this = self.clone();
        tokio::spawn(async move { this.create_steps(name, proxy_url).await }.in_current_span()).await?
    }

    async fn create_steps(&self, name: String, proxy_url: Option<String>) -> DomainResult<Session> {
        let _guard = self.locks.acquire(&name_lock_key(&name)).await;

        if self.store.exists_by_name(&name).await? {
            return Err(DomainError::AlreadyExists(name));
        }

        let session = Session::new(name);
        self.store.create(&session).await?;
        debug!(session_id = %session.id, "session record persisted");

        if let Err(err) = self.connections.register_session(&session.id).await {
            error!(session_id = %session.id, error = %err, "live slot registration failed");
            self.compensate_create(&session.id, false).await;
            return Err(err.into());
        }

        if let Some(proxy_url) = proxy_url {
            if let Err(err) = self.connections.set_proxy(&session.id, &proxy_url).await {
                error!(session_id = %session.id, error = %err, "applying proxy to new slot failed");
                self.compensate_create(&session.id, true).await;
                return Err(err.into());
            }
        }

        info!(session_id = %session.id, name = %session.name, "session created");
        Ok(session)
    }

    /// Undo a partial create. Failures are logged, never returned.
    async fn compensate_create(&self, id: &str, slot_allocated: bool) {
        if slot_allocated {
            if let Err(err) = self.connections.remove_session(id).await {
                error!(session_id = %id, error = %err, "compensating slot removal failed");
            }
        }

        match self.store.delete(id).await {
            Ok(()) => info!(session_id = %id, "rolled back session record"),
            Err(err) => error!(
                session_id = %id,
                error = %err,
                "compensating delete failed, record left without a live slot"
            ),
        }
    }

    /// Start connecting a session.
    ///
    /// `Connecting` is persisted before the live side is contacted and rolled
    /// back to `Disconnected` if client lookup or connect fails. The step
    /// sequence runs on its own task so the rollback still happens if the
    /// caller is cancelled mid-way.
    #[instrument(skip(self), err)]
    pub async fn connect_session(&self, id: &str) -> DomainResult<ConnectOutcome> {
        let this = self.clone();
        let id = id.to_string();
        tokio::spawn(async move { this.connect_steps(&id).await }.in_current_span()).await?
    }

    async fn connect_steps(&self, id: &str) -> DomainResult<ConnectOutcome> {
        let _guard = self.locks.acquire(id).await;

        let session = self.store.get_by_id(id).await?;
        if !session.can_connect() {
            return Err(DomainError::invalid_state(id, connect_refusal(&session)));
        }

        self.store.update_status(id, SessionStatus::Connecting).await?;

        let client = match self.acquire_client(id).await {
            Ok(client) => client,
            Err(err) => {
                warn!(session_id = %id, error = %err, "no live client available");
                self.rollback_connect(id).await;
                return Err(err.into());
            }
        };

        if let Err(err) = client.connect(id).await {
            warn!(session_id = %id, error = %err, "connect failed");
            self.rollback_connect(id).await;
            return Err(err.into());
        }

        let qr_code = match client.get_qr_code(id).await {
            Ok(Some(code)) if !code.is_empty() => Some(code),
            Ok(_) => {
                debug!(session_id = %id, "no QR code pending, account may already be authenticated");
                None
            }
            Err(err) => {
                warn!(session_id = %id, error = %err, "QR code fetch failed after connect");
                None
            }
        };

        info!(session_id = %id, has_qr = qr_code.is_some(), "session connecting");
        Ok(ConnectOutcome {
            status: SessionStatus::Connecting,
            qr_code,
        })
    }

    /// Client handle for `id`, registering the slot once if it is missing.
    async fn acquire_client(&self, id: &str) -> ConnectionResult<Arc<dyn ProtocolClient>> {
        match self.connections.get_client(id).await {
            Err(ConnectionError::SlotNotFound(_)) => {
                debug!(session_id = %id, "live slot missing, registering");
                self.connections.register_session(id).await?;
                self.connections.get_client(id).await
            }
            other => other,
        }
    }

    async fn rollback_connect(&self, id: &str) {
        if let Err(err) = self
            .store
            .update_status(id, SessionStatus::Disconnected)
            .await
        {
            error!(
                session_id = %id,
                error = %err,
                "rollback to disconnected failed, session may be stuck connecting"
            );
        }
    }

    /// Disconnect a session. A no-op when already disconnected.
    ///
    /// The persisted status only changes after the live side confirms.
    #[instrument(skip(self), err)]
    pub async fn disconnect_session(&self, id: &str) -> DomainResult<SessionStatus> {
        let _guard = self.locks.acquire(id).await;

        let session = self.store.get_by_id(id).await?;
        if session.status == SessionStatus::Disconnected {
            debug!(session_id = %id, "already disconnected");
            return Ok(SessionStatus::Disconnected);
        }

        self.connections.disconnect_session(id).await?;
        self.store
            .update_status(id, SessionStatus::Disconnected)
            .await?;

        info!(session_id = %id, "session disconnected");
        Ok(SessionStatus::Disconnected)
    }

    /// Persisted status reconciled against the live side.
    ///
    /// The live status wins on mismatch and is written back best-effort.
    #[instrument(skip(self), err)]
    pub async fn get_status(&self, id: &str) -> DomainResult<StatusReport> {
        let _guard = self.locks.acquire(id).await;

        let mut session = self.store.get_by_id(id).await?;

        match self.connections.get_session_status(id).await {
            Ok(live) if live != session.status => {
                let persisted = session.status;
                session.apply_status(live);
                self.persist_reconciled(&session).await;
                info!(
                    session_id = %id,
                    persisted = %persisted,
                    live = %live,
                    "reconciled session status with live side"
                );
            }
            Ok(_) => {}
            Err(err) => {
                debug!(session_id = %id, error = %err, "live status unavailable, using persisted");
            }
        }

        Ok(StatusReport {
            status: session.status,
            external_id: session.external_id,
            last_seen: session.last_seen,
        })
    }

    async fn persist_reconciled(&self, session: &Session) {
        if let Err(err) = self.store.update_status(&session.id, session.status).await {
            warn!(session_id = %session.id, error = %err, "persisting reconciled status failed");
            return;
        }

        if session.status == SessionStatus::Connected {
            if let Some(last_seen) = session.last_seen {
                if let Err(err) = self.store.update_last_seen(&session.id, last_seen).await {
                    warn!(session_id = %session.id, error = %err, "persisting last_seen failed");
                }
            }
        }
    }

    /// Delete a session.
    ///
    /// Live-side cleanup is advisory; only removal of the durable record can fail the call.
    #[instrument(skip(self), err)]
    pub async fn delete_session(&self, id: &str) -> DomainResult<()> {
        let _guard = self.locks.acquire(id).await;

        self.store.get_by_id(id).await?;

        if self.connections.is_connected(id).await {
            if let Err(err) = self.connections.disconnect_session(id).await {
                warn!(session_id = %id, error = %err, "disconnect before delete failed");
            }
        }

        if let Err(err) = self.connections.remove_session(id).await {
            warn!(session_id = %id, error = %err, "removing live slot failed");
        }

        self.store.delete(id).await?;
        info!(session_id = %id, "session deleted");
        Ok(())
    }

    /// Current QR code, or an empty code when the session is already connected.
    #[instrument(skip(self), err)]
    pub async fn get_qr_code(&self, id: &str) -> DomainResult<QrCodeOutcome> {
        let _guard = self.locks.acquire(id).await;

        let session = self.store.get_by_id(id).await?;

        let status = match self.connections.get_session_status(id).await {
            Ok(live) => live,
            Err(err) => {
                debug!(session_id = %id, error = %err, "live status unavailable, using persisted");
                session.status
            }
        };

        if status == SessionStatus::Connected {
            return Ok(QrCodeOutcome {
                qr_code: String::new(),
                status,
            });
        }

        let qr_code = self.connections.get_qr_code(id).await?;
        Ok(QrCodeOutcome { qr_code, status })
    }

    /// Request a pairing code so the account can be linked without a QR scan.
    #[instrument(skip(self, phone_number), err)]
    pub async fn pair_phone(&self, id: &str, phone_number: &str) -> DomainResult<PairingOutcome> {
        let phone_number = normalize_phone_number(phone_number)?;
        let _guard = self.locks.acquire(id).await;

        self.store.get_by_id(id).await?;
        if self.connections.is_connected(id).await {
            return Err(DomainError::invalid_state(id, InvalidState::AlreadyConnected));
        }

        let pairing_code = self.connections.pair_phone(id, &phone_number).await?;
        info!(session_id = %id, "pairing code issued");
        Ok(PairingOutcome {
            pairing_code,
            phone_number,
        })
    }

    #[instrument(skip(self), err)]
    pub async fn set_proxy(&self, id: &str, proxy_url: &str) -> DomainResult<String> {
        let proxy_url = validate_proxy_url(proxy_url)?;
        let _guard = self.locks.acquire(id).await;

        self.store.get_by_id(id).await?;
        self.connections.set_proxy(id, &proxy_url).await?;

        info!(session_id = %id, "proxy updated");
        Ok(proxy_url)
    }

    pub async fn get_session(&self, id: &str) -> DomainResult<Session> {
        Ok(self.store.get_by_id(id).await?)
    }

    pub async fn get_session_by_name(&self, name: &str) -> DomainResult<Session> {
        Ok(self.store.get_by_name(name).await?)
    }

    pub async fn list_sessions(&self, active_only: bool) -> DomainResult<Vec<Session>> {
        let sessions = if active_only {
            self.store.list_active().await?
        } else {
            self.store.list().await?
        };
        Ok(sessions)
    }

    /// Soft-disable a session, disconnecting it first if the live side is up.
    #[instrument(skip(self), err)]
    pub async fn deactivate_session(&self, id: &str) -> DomainResult<Session> {
        let _guard = self.locks.acquire(id).await;

        let mut session = self.store.get_by_id(id).await?;
        let live = self
            .connections
            .get_session_status(id)
            .await
            .unwrap_or(session.status);

        if live != SessionStatus::Disconnected || session.status != SessionStatus::Disconnected {
            self.connections.disconnect_session(id).await?;
        }

        session.deactivate();
        self.store.update(&session).await?;
        info!(session_id = %id, "session deactivated");
        Ok(session)
    }

    #[instrument(skip(self), err)]
    pub async fn activate_session(&self, id: &str) -> DomainResult<Session> {
        let _guard = self.locks.acquire(id).await;

        let mut session = self.store.get_by_id(id).await?;
        if session.is_active {
            return Ok(session);
        }

        session.activate();
        self.store.update(&session).await?;
        info!(session_id = %id, "session activated");
        Ok(session)
    }

    /// Bring the live side back in line with the store after a restart.
    ///
    /// Stale `connecting`/`connected` records are reset, active sessions get a
    /// live slot, and sessions that authenticated before are reconnected.
    /// Individual failures are logged and counted.
    #[instrument(skip(self), err)]
    pub async fn restore_sessions(&self) -> DomainResult<RestoreReport> {
        let mut report = RestoreReport::default();

        for session in self.store.list().await? {
            if session.status == SessionStatus::Disconnected {
                continue;
            }
            match self
                .store
                .update_status(&session.id, SessionStatus::Disconnected)
                .await
            {
                Ok(()) => report.reset += 1,
                Err(err) => warn!(session_id = %session.id, error = %err, "resetting stale status failed"),
            }
        }

        for session in self.store.list_active().await? {
            match self.connections.register_session(&session.id).await {
                Ok(()) => report.registered += 1,
                Err(ConnectionError::SlotAlreadyRegistered(_)) => {}
                Err(err) => {
                    warn!(session_id = %session.id, error = %err, "registering live slot failed");
                    report.failed += 1;
                }
            }
        }

        let authenticated: Vec<Session> = self
            .store
            .get_sessions_with_external_id()
            .await?
            .into_iter()
            .filter(|s| s.is_active)
            .collect();

        let results = join_all(authenticated.iter().map(|s| self.connect_session(&s.id))).await;
        for (session, result) in authenticated.iter().zip(results) {
            match result {
                Ok(_) => report.reconnected += 1,
                Err(err) => {
                    warn!(session_id = %session.id, error = %err, "reconnect on restore failed");
                    report.failed += 1;
                }
            }
        }

        info!(
            reset = report.reset,
            registered = report.registered,
            reconnected = report.reconnected,
            failed = report.failed,
            "session restore complete"
        );
        Ok(report)
    }
}

fn connect_refusal(session: &Session) -> InvalidState {
    if !session.is_active {
        InvalidState::Inactive
    } else if session.status == SessionStatus::Connected {
        InvalidState::AlreadyConnected
    } else {
        InvalidState::AlreadyConnecting
    }
}

fn name_lock_key(name: &str) -> String {
    format!("name:{name}")
}
