pub mod config;
pub mod session;

pub use config::{Config, ConnectionConfig, DatabaseConfig, ServerConfig};
pub use session::{
    format_timestamp, next_timestamp, now_micros, Session, SessionStatus, UnknownStatus, MAX_SESSION_NAME_LEN,
};
