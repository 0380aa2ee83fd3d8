//! Infrastructure layer module
//!
//! Cross-cutting concerns that every entry point needs:
//! - Configuration management
//! - Logging infrastructure

pub mod config;
pub mod logging;
