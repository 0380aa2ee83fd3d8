//! Session domain model.
//!
//! A session is the durable record of one logical connection slot to the
//! messaging network. The live half of a session (the protocol client) is
//! owned by the connection manager; this record is the persisted half.

use chrono::{DateTime, Duration, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum length of a session name.
pub const MAX_SESSION_NAME_LEN: usize = 64;

/// Connection status of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// No live connection (initial state)
    #[default]
    Disconnected,
    /// Connect requested, waiting for authentication
    Connecting,
    /// Authenticated and online
    Connected,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        }
    }
}

/// A status string that names none of the [`SessionStatus`] variants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown session status: {0}")]
pub struct UnknownStatus(pub String);

impl std::str::FromStr for SessionStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "disconnected" => Ok(Self::Disconnected),
            "connecting" => Ok(Self::Connecting),
            "connected" => Ok(Self::Connected),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted session record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Unique identifier, assigned at creation
    pub id: String,
    /// Unique human-readable label
    pub name: String,
    /// Current connection status
    pub status: SessionStatus,
    /// Account identifier on the messaging network; empty until first authentication
    pub external_id: String,
    /// Soft-disable flag; inactive sessions cannot be connected
    pub is_active: bool,
    /// Last transition into `Connected`
    pub last_seen: Option<DateTime<Utc>>,
    /// When created
    pub created_at: DateTime<Utc>,
    /// When last mutated
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create a new, active, disconnected session with a generated id.
    pub fn new(name: impl Into<String>) -> Self {
        let now = now_micros();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            status: SessionStatus::Disconnected,
            external_id: String::new(),
            is_active: true,
            last_seen: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether a connect attempt is allowed from the current state.
    pub fn can_connect(&self) -> bool {
        self.status == SessionStatus::Disconnected && self.is_active
    }

    /// Whether the session has authenticated at least once.
    pub fn has_authenticated(&self) -> bool {
        !self.external_id.is_empty()
    }

    pub fn set_connecting(&mut self) {
        self.status = SessionStatus::Connecting;
        self.touch();
    }

    pub fn set_connected(&mut self, external_id: impl Into<String>) {
        let external_id = external_id.into();
        if !external_id.is_empty() {
            self.external_id = external_id;
        }
        self.status = SessionStatus::Connected;
        self.touch();
        self.last_seen = Some(self.updated_at);
    }

    /// Mark disconnected. The external id is kept.
    pub fn set_disconnected(&mut self) {
        self.status = SessionStatus::Disconnected;
        self.touch();
    }

    /// Apply a status observed elsewhere (e.g. the live side).
    ///
    /// `last_seen` is only refreshed when the new status is `Connected`.
    pub fn apply_status(&mut self, status: SessionStatus) {
        self.status = status;
        self.touch();
        if status == SessionStatus::Connected {
            self.last_seen = Some(self.updated_at);
        }
    }

    /// Soft-disable the session. Status is forced to `Disconnected`.
    pub fn deactivate(&mut self) {
        self.is_active = false;
        self.status = SessionStatus::Disconnected;
        self.touch();
    }

    pub fn activate(&mut self) {
        self.is_active = true;
        self.touch();
    }

    /// Advance `updated_at`, strictly.
    pub fn touch(&mut self) {
        self.updated_at = next_timestamp(self.updated_at);
    }
}

/// Current time at microsecond precision, the resolution timestamps are stored at.
pub fn now_micros() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Canonical text form of a timestamp: RFC3339, microseconds, `Z` suffix.
///
/// Fixed width keeps text ordering identical to time ordering.
pub fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Current time, or one microsecond past `previous` if the clock has not moved.
pub fn next_timestamp(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = now_micros();
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}
