//! HTTP relay between the chat front-end and the provider
//!
//! Exposes a single POST endpoint that forwards the caller's JSON body to the
//! configured provider with the relay's credential attached, then either
//! streams the provider's success response straight back or returns its
//! error payload unchanged.

use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::{ConnectInfo, Request, State},
    http::{Method, Response, StatusCode, header},
    routing::{any, get},
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;

use crate::config::RelayConfig;
use crate::error::{RelayChatError, Result};

use super::error::RelayError;
use super::headers::{Credential, FORWARDED_FOR_HEADER, ForwardedContext, REFERER_HEADER, TITLE_HEADER};

/// Path of the relay endpoint
pub const PROXY_PATH: &str = "/api/proxy";

const MISSING_CREDENTIAL: &str = "relay credential is not configured";

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Relay configuration
    pub config: RelayConfig,
    /// HTTP client for upstream requests
    pub client: reqwest::Client,
    /// Provider credential, if one is configured
    pub credential: Option<Credential>,
}

impl AppState {
    /// Build state with the credential read from the configured environment variable
    pub fn from_env(config: RelayConfig) -> Result<Self> {
        let credential = Credential::from_env(&config.api_key_env);
        if credential.is_none() {
            tracing::warn!(
                "Environment variable {} is not set; relay requests will fail",
                config.api_key_env
            );
        }
        Self::with_credential(config, credential)
    }

    pub fn with_credential(config: RelayConfig, credential: Option<Credential>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| RelayChatError::Relay(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            config,
            client,
            credential,
        })
    }
}

/// The relay server
pub struct RelayServer {
    state: Arc<AppState>,
}

impl RelayServer {
    pub fn new(state: AppState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    /// Bind the configured address and serve until Ctrl+C or SIGTERM
    pub async fn serve(&self) -> Result<()> {
        let addr: SocketAddr = self
            .state
            .config
            .listen_addr
            .parse()
            .map_err(|e| RelayChatError::Config(format!("Invalid listen address: {e}")))?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| RelayChatError::Relay(format!("Failed to bind to {addr}: {e}")))?;

        self.serve_listener(listener, shutdown_signal()).await
    }

    /// Serve on an already-bound listener until `shutdown` resolves
    pub async fn serve_listener<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local_addr = listener
            .local_addr()
            .map_err(|e| RelayChatError::Relay(format!("Failed to read local address: {e}")))?;

        tracing::info!("Starting relay on {local_addr}");
        tracing::info!("Forwarding {PROXY_PATH} to {}", self.state.config.upstream_url);

        let app = create_router(self.state.clone());

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| RelayChatError::Relay(format!("Server error: {e}")))?;

        tracing::info!("Relay shut down gracefully");
        Ok(())
    }
}

/// Create the router with all routes configured
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/debug", get(debug_handler))
        .route(PROXY_PATH, any(proxy_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint - returns JSON status
async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Reports whether a credential is configured, never the credential itself
async fn debug_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "credential_configured": state.credential.is_some(),
        "key_length": state.credential.as_ref().map(Credential::len).unwrap_or(0),
    }))
}

async fn proxy_handler(State(state): State<Arc<AppState>>, request: Request) -> Response<Body> {
    match relay_request(&state, request).await {
        Ok(response) => response,
        Err(e) => {
            match &e {
                RelayError::UpstreamRejected { status, body } => tracing::warn!(
                    error_type = e.category(),
                    status = %status,
                    body_length = body.len(),
                    "Upstream rejected request, passing error through"
                ),
                RelayError::Internal(details) => tracing::error!(
                    error_type = e.category(),
                    error_message = %details,
                    "Relay request failed"
                ),
                _ => tracing::debug!(error_type = e.category(), "Rejected relay request: {e}"),
            }
            e.into_response()
        }
    }
}

async fn relay_request(
    state: &AppState,
    request: Request,
) -> std::result::Result<Response<Body>, RelayError> {
    if request.method() != Method::POST {
        return Err(RelayError::MethodNotAllowed(request.method().to_string()));
    }

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let context = ForwardedContext::from_request(
        request.headers(),
        peer,
        &state.config.default_referer,
        &state.config.default_client_addr,
    );

    let credential = state
        .credential
        .as_ref()
        .ok_or_else(|| RelayError::Internal(MISSING_CREDENTIAL.to_string()))?;

    let body = axum::body::to_bytes(request.into_body(), usize::MAX)
        .await
        .map_err(|e| RelayError::BadRequest(format!("Failed to read request body: {e}")))?;
    validate_json(&body)?;

    tracing::debug!(
        origin = %context.origin,
        client_addr = %context.client_addr,
        body_length = body.len(),
        "Relaying request upstream"
    );

    let response = state
        .client
        .post(&state.config.upstream_url)
        .header(header::AUTHORIZATION, credential.bearer())
        .header(header::CONTENT_TYPE, "application/json")
        .header(REFERER_HEADER, context.origin)
        .header(FORWARDED_FOR_HEADER, context.client_addr)
        .header(TITLE_HEADER, state.config.app_title.as_str())
        .body(body)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                RelayError::Internal(format!("Upstream connection timed out: {e}"))
            } else if e.is_connect() {
                RelayError::Internal(format!("Failed to connect to upstream: {e}"))
            } else {
                RelayError::Internal(format!("Upstream request failed: {e}"))
            }
        })?;

    let status = StatusCode::from_u16(response.status().as_u16())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    if !status.is_success() {
        let body = response
            .text()
            .await
            .map_err(|e| RelayError::Internal(format!("Failed to read upstream error body: {e}")))?;
        return Err(RelayError::UpstreamRejected { status, body });
    }

    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(response.bytes_stream()))
        .map_err(|e| RelayError::Internal(format!("Failed to build response: {e}")))
}

fn validate_json(body: &Bytes) -> std::result::Result<(), RelayError> {
    serde_json::from_slice::<serde::de::IgnoredAny>(body)
        .map(|_| ())
        .map_err(|e| RelayError::BadRequest(format!("Request body is not valid JSON: {e}")))
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_state(credential: Option<&str>) -> Arc<AppState> {
        let config = RelayConfig {
            upstream_url: "http://127.0.0.1:9/v1/chat/completions".to_string(),
            ..RelayConfig::default()
        };
        Arc::new(AppState::with_credential(config, credential.and_then(Credential::new)).unwrap())
    }

    async fn body_json(response: Response<Body>) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = create_router(test_state(Some("sk-test")));

        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_debug_reports_length_only() {
        let app = create_router(test_state(Some("sk-test-1234")));

        let response = app
            .oneshot(Request::builder().uri("/api/debug").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let json = body_json(response).await;
        assert_eq!(json["credential_configured"], true);
        assert_eq!(json["key_length"], 12);
        assert!(!json.to_string().contains("sk-test"));
    }

    #[tokio::test]
    async fn test_get_on_proxy_is_method_not_allowed() {
        let app = create_router(test_state(Some("sk-test")));

        let response = app
            .oneshot(Request::builder().uri(PROXY_PATH).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body_json(response).await["error"], "Method Not Allowed");
    }

    #[tokio::test]
    async fn test_missing_credential_is_internal() {
        let app = create_router(test_state(None));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(PROXY_PATH)
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["error"], "Internal Server Error");
        assert_eq!(json["details"], MISSING_CREDENTIAL);
    }

    #[tokio::test]
    async fn test_invalid_json_is_bad_request() {
        let app = create_router(test_state(Some("sk-test")));

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(PROXY_PATH)
                    .body(Body::from("not json"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "Bad Request");
    }
}
