//! Adapters for external systems: durable storage, live connections and HTTP.

pub mod connection;
pub mod http;
pub mod sqlite;
