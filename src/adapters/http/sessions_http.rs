//! Sessions HTTP server.
//!
//! REST surface over the session lifecycle service. Every handler is a thin
//! translation: decode the request, call one lifecycle operation, map the
//! result or the domain error to a JSON response.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::domain::errors::{DomainError, InvalidState};
use crate::domain::models::{format_timestamp, ServerConfig, Session};
use crate::services::{
    ConnectOutcome, NewSession, PairingOutcome, QrCodeOutcome, SessionLifecycleService, StatusReport,
};

/// Request to create a session.
#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub name: String,
    #[serde(default)]
    pub webhook: Option<String>,
    #[serde(default)]
    pub proxy_url: Option<String>,
}

/// Query parameters for session listing.
#[derive(Debug, Default, Deserialize)]
pub struct ListSessionsParams {
    #[serde(default)]
    pub active: bool,
}

#[derive(Debug, Deserialize)]
pub struct PairPhoneRequest {
    pub phone_number: String,
}

#[derive(Debug, Deserialize)]
pub struct SetProxyRequest {
    pub proxy_url: String,
}

/// Response with a session record.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub id: String,
    pub name: String,
    pub status: String,
    pub external_id: String,
    pub is_active: bool,
    pub last_seen: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Session> for SessionResponse {
    fn from(s: Session) -> Self {
        Self {
            id: s.id,
            name: s.name,
            status: s.status.as_str().to_string(),
            external_id: s.external_id,
            is_active: s.is_active,
            last_seen: s.last_seen.map(format_timestamp),
            created_at: format_timestamp(s.created_at),
            updated_at: format_timestamp(s.updated_at),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConnectResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr_code: Option<String>,
}

impl From<ConnectOutcome> for ConnectResponse {
    fn from(o: ConnectOutcome) -> Self {
        Self {
            status: o.status.as_str().to_string(),
            qr_code: o.qr_code,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusOnlyResponse {
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<String>,
}

impl From<StatusReport> for StatusResponse {
    fn from(r: StatusReport) -> Self {
        Self {
            status: r.status.as_str().to_string(),
            external_id: Some(r.external_id).filter(|id| !id.is_empty()),
            last_seen: r.last_seen.map(format_timestamp),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QrCodeResponse {
    pub qr_code: String,
    pub status: String,
}

impl From<QrCodeOutcome> for QrCodeResponse {
    fn from(o: QrCodeOutcome) -> Self {
        Self {
            qr_code: o.qr_code,
            status: o.status.as_str().to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PairPhoneResponse {
    pub pairing_code: String,
    pub phone_number: String,
}

impl From<PairingOutcome> for PairPhoneResponse {
    fn from(o: PairingOutcome) -> Self {
        Self {
            pairing_code: o.pairing_code,
            phone_number: o.phone_number,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SetProxyResponse {
    pub proxy_url: String,
}

/// Error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<T, ApiError>;

/// Map a domain error to its transport status and stable error code.
pub fn error_status(err: &DomainError) -> (StatusCode, &'static str) {
    match err {
        DomainError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        DomainError::AlreadyExists(_) => (StatusCode::CONFLICT, "ALREADY_EXISTS"),
        DomainError::InvalidState { reason, .. } => (
            StatusCode::CONFLICT,
            match reason {
                InvalidState::AlreadyConnected => "ALREADY_CONNECTED",
                InvalidState::AlreadyConnecting => "ALREADY_CONNECTING",
                InvalidState::Inactive => "SESSION_INACTIVE",
            },
        ),
        DomainError::ValidationFailed(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        DomainError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR"),
        DomainError::Connection(_) => (StatusCode::BAD_GATEWAY, "CONNECTION_ERROR"),
        DomainError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
    }
}

fn api_error(err: DomainError) -> ApiError {
    let (status, code) = error_status(&err);
    if status.is_server_error() {
        tracing::error!(code, error = %err, "request failed");
    }
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
            code: code.to_string(),
        }),
    )
}

/// Shared state for the sessions HTTP server.
struct AppState {
    service: SessionLifecycleService,
}

/// Build the `/api/v1` router around a lifecycle service.
pub fn build_router(service: SessionLifecycleService, config: &ServerConfig) -> Router {
    let state = Arc::new(AppState { service });

    let app = Router::new()
        .route("/api/v1/sessions", post(create_session).get(list_sessions))
        .route("/api/v1/sessions/{id}", get(get_session).delete(delete_session))
        .route("/api/v1/sessions/{id}/connect", post(connect_session))
        .route("/api/v1/sessions/{id}/disconnect", post(disconnect_session))
        .route("/api/v1/sessions/{id}/status", get(get_status))
        .route("/api/v1/sessions/{id}/qr", get(get_qr_code))
        .route("/api/v1/sessions/{id}/pair", post(pair_phone))
        .route("/api/v1/sessions/{id}/proxy", put(set_proxy))
        .route("/api/v1/sessions/{id}/deactivate", post(deactivate_session))
        .route("/api/v1/sessions/{id}/activate", post(activate_session))
        .route("/health", get(health_check))
        .with_state(state)
        .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
        .layer(TraceLayer::new_for_http());

    if config.enable_cors {
        app.layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
    } else {
        app
    }
}

/// Sessions HTTP Server.
pub struct SessionsHttpServer {
    config: ServerConfig,
    service: SessionLifecycleService,
}

impl SessionsHttpServer {
    pub fn new(service: SessionLifecycleService, config: ServerConfig) -> Self {
        Self { config, service }
    }

    /// Start the server with a shutdown signal.
    pub async fn serve_with_shutdown<F>(
        self,
        shutdown: F,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port).parse()?;
        let router = build_router(self.service, &self.config);

        let listener = TcpListener::bind(addr).await?;
        tracing::info!(addr = %listener.local_addr()?, "sessions HTTP server listening");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}

// Handler functions

async fn health_check() -> &'static str {
    "OK"
}

async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateSessionRequest>,
) -> ApiResult<(StatusCode, Json<SessionResponse>)> {
    let request = NewSession {
        name: req.name,
        webhook: req.webhook,
        proxy_url: req.proxy_url,
    };

    let session = state.service.create_session(request).await.map_err(api_error)?;
    Ok((StatusCode::CREATED, Json(session.into())))
}

async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListSessionsParams>,
) -> ApiResult<Json<Vec<SessionResponse>>> {
    let sessions = state
        .service
        .list_sessions(params.active)
        .await
        .map_err(api_error)?;
    Ok(Json(sessions.into_iter().map(SessionResponse::from).collect()))
}

async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<SessionResponse>> {
    let session = state.service.get_session(&id).await.map_err(api_error)?;
    Ok(Json(session.into()))
}

async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.service.delete_session(&id).await.map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn connect_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<ConnectResponse>> {
    let outcome = state.service.connect_session(&id).await.map_err(api_error)?;
    Ok(Json(outcome.into()))
}

async fn disconnect_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<StatusOnlyResponse>> {
    let status = state.service.disconnect_session(&id).await.map_err(api_error)?;
    Ok(Json(StatusOnlyResponse {
        status: status.as_str().to_string(),
    }))
}

async fn get_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<StatusResponse>> {
    let report = state.service.get_status(&id).await.map_err(api_error)?;
    Ok(Json(report.into()))
}

async fn get_qr_code(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<QrCodeResponse>> {
    let outcome = state.service.get_qr_code(&id).await.map_err(api_error)?;
    Ok(Json(outcome.into()))
}

async fn pair_phone(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<PairPhoneRequest>,
) -> ApiResult<Json<PairPhoneResponse>> {
    let outcome = state
        .service
        .pair_phone(&id, &req.phone_number)
        .await
        .map_err(api_error)?;
    Ok(Json(outcome.into()))
}

async fn set_proxy(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(req): Json<SetProxyRequest>,
) -> ApiResult<Json<SetProxyResponse>> {
    let proxy_url = state
        .service
        .set_proxy(&id, &req.proxy_url)
        .await
        .map_err(api_error)?;
    Ok(Json(SetProxyResponse { proxy_url }))
}

async fn deactivate_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<SessionResponse>> {
    let session = state.service.deactivate_session(&id).await.map_err(api_error)?;
    Ok(Json(session.into()))
}

async fn activate_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<SessionResponse>> {
    let session = state.service.activate_session(&id).await.map_err(api_error)?;
    Ok(Json(session.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{ConnectionError, StoreError};

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (DomainError::NotFound("x".into()), StatusCode::NOT_FOUND, "NOT_FOUND"),
            (DomainError::AlreadyExists("x".into()), StatusCode::CONFLICT, "ALREADY_EXISTS"),
            (
                DomainError::invalid_state("x", InvalidState::AlreadyConnected),
                StatusCode::CONFLICT,
                "ALREADY_CONNECTED",
            ),
            (
                DomainError::invalid_state("x", InvalidState::AlreadyConnecting),
                StatusCode::CONFLICT,
                "ALREADY_CONNECTING",
            ),
            (
                DomainError::invalid_state("x", InvalidState::Inactive),
                StatusCode::CONFLICT,
                "SESSION_INACTIVE",
            ),
            (
                DomainError::ValidationFailed("bad".into()),
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
            ),
            (
                DomainError::Store(StoreError::Database("down".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
                "STORE_ERROR",
            ),
            (
                DomainError::Connection(ConnectionError::Protocol("boom".into())),
                StatusCode::BAD_GATEWAY,
                "CONNECTION_ERROR",
            ),
            (
                DomainError::Internal("join".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
            ),
        ];

        for (err, status, code) in cases {
            assert_eq!(error_status(&err), (status, code), "{err}");
        }
    }

    #[test]
    fn test_create_request_deserialization() {
        let req: CreateSessionRequest =
            serde_json::from_str(r#"{"name": "alpha", "proxy_url": "http://p:8080"}"#).unwrap();
        assert_eq!(req.name, "alpha");
        assert_eq!(req.proxy_url.as_deref(), Some("http://p:8080"));
        assert!(req.webhook.is_none());
    }

    #[test]
    fn test_status_response_omits_empty_fields() {
        let report = StatusReport {
            status: crate::domain::models::SessionStatus::Disconnected,
            external_id: String::new(),
            last_seen: None,
        };
        let json = serde_json::to_value(StatusResponse::from(report)).unwrap();
        assert_eq!(json, serde_json::json!({"status": "disconnected"}));
    }
}
