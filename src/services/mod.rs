pub mod session_lifecycle;
pub mod session_locks;
pub mod validation;

pub use session_lifecycle::{
    ConnectOutcome, NewSession, PairingOutcome, QrCodeOutcome, RestoreReport,
    SessionLifecycleService, StatusReport,
};
pub use session_locks::{SessionLockGuard, SessionLocks};
