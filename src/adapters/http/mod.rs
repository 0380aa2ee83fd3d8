//! HTTP adapter exposing session lifecycle operations as a REST API.

pub mod sessions_http;

pub use sessions_http::{build_router, error_status, ErrorResponse, SessionsHttpServer};
