//! HTTP gateway in front of the scriptlog dispatcher
//!
//! A relay connected to the chat platform forwards each message as a JSON
//! event (`POST /events`) and each settings button click as an interaction
//! (`POST /interactions`). The gateway runs it through the dispatcher and
//! answers with the replies the relay should post, files inlined as base64.
//! Both endpoints require `Authorization: Bearer <token>`.

pub mod error;
pub mod wire;

pub use error::{GatewayError, Result};
pub use wire::{GatewayResponse, WireReply};

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::{self, Next};
use axum::response::{Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use scriptlog_core::config::GatewayConfig;
use scriptlog_core::transport::{CollectingSink, IncomingEvent, Interaction};
use scriptlog_core::Dispatcher;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Bearer token relays must present.
    pub token: String,
    /// Maximum request body size in bytes
    pub max_body_size: usize,
    pub enable_logging: bool,
}

impl ServerConfig {
    pub fn new(bind_addr: SocketAddr, token: impl Into<String>) -> Self {
        Self {
            bind_addr,
            token: token.into(),
            max_body_size: 8 * 1024 * 1024,
            enable_logging: true,
        }
    }

    /// Builds the server settings from the `gateway` config section, reading
    /// the token from the environment variable it names.
    pub fn from_gateway_config(config: &GatewayConfig) -> Result<Self> {
        let bind_addr = config.bind_addr.parse().map_err(|e| {
            GatewayError::config_error(format!("Invalid bind address '{}': {}", config.bind_addr, e))
        })?;
        let token = resolve_token(&config.token_env)?;
        Ok(Self::new(bind_addr, token).with_max_body_size(config.max_body_bytes))
    }

    pub fn with_max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    pub fn with_logging(mut self, enable: bool) -> Self {
        self.enable_logging = enable;
        self
    }
}

/// Reads a non-empty token from `var`.
pub fn resolve_token(var: &str) -> Result<String> {
    match std::env::var(var) {
        Ok(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
        _ => Err(GatewayError::config_error(format!(
            "{} environment variable is not set",
            var
        ))),
    }
}

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub token: Arc<str>,
}

async fn require_bearer(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let presented = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match presented {
        Some(token) if tokens_match(token, &state.token) => next.run(request).await,
        _ => {
            log::warn!("Rejected {} {}: bad or missing token", request.method(), request.uri());
            axum::response::IntoResponse::into_response(GatewayError::Unauthorized)
        }
    }
}

/// Compares without short-circuiting on the first differing byte. Only the
/// length can leak.
fn tokens_match(presented: &str, expected: &str) -> bool {
    let (presented, expected) = (presented.as_bytes(), expected.as_bytes());
    if presented.len() != expected.len() {
        return false;
    }
    presented
        .iter()
        .zip(expected)
        .fold(0u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}

async fn events_handler(
    State(state): State<AppState>,
    body: std::result::Result<Json<IncomingEvent>, JsonRejection>,
) -> Result<Json<GatewayResponse>> {
    let Json(event) = body.map_err(|e| GatewayError::invalid_request(e.body_text()))?;
    let request_id = uuid::Uuid::new_v4().to_string();
    log::debug!("Event {} from {}", request_id, event.author_id);

    let sink = CollectingSink::new();
    let outcome = state.dispatcher.handle_event(&event, &sink).await;
    let summary = wire::describe_dispatch(&outcome);
    log::info!("Event {} finished: {}", request_id, summary.0);

    Ok(Json(GatewayResponse::new(request_id, summary, sink.into_replies())))
}

async fn interactions_handler(
    State(state): State<AppState>,
    body: std::result::Result<Json<Interaction>, JsonRejection>,
) -> Result<Json<GatewayResponse>> {
    let Json(interaction) = body.map_err(|e| GatewayError::invalid_request(e.body_text()))?;
    let request_id = uuid::Uuid::new_v4().to_string();

    let sink = CollectingSink::new();
    let outcome = state.dispatcher.handle_interaction(&interaction, &sink).await;
    let summary = wire::describe_interaction(&outcome);
    log::info!(
        "Interaction {} on {}'s '{}' by {}: {}",
        request_id,
        interaction.owner_id,
        interaction.setting,
        interaction.user_id,
        summary.0
    );

    Ok(Json(GatewayResponse::new(request_id, summary, sink.into_replies())))
}

pub struct Gateway {
    dispatcher: Arc<Dispatcher>,
    config: ServerConfig,
}

impl Gateway {
    pub fn new(dispatcher: Arc<Dispatcher>, config: ServerConfig) -> Self {
        Self { dispatcher, config }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn build_router(&self) -> Router {
        let state = AppState {
            dispatcher: self.dispatcher.clone(),
            token: Arc::from(self.config.token.as_str()),
        };

        let protected = Router::new()
            .route("/events", post(events_handler))
            .route("/interactions", post(interactions_handler))
            .route_layer(middleware::from_fn_with_state(state.clone(), require_bearer));

        let mut router = Router::new()
            .route(
                "/health",
                get(|| async {
                    Json(HealthResponse {
                        status: "healthy".to_string(),
                        timestamp: chrono::Utc::now(),
                        version: env!("CARGO_PKG_VERSION").to_string(),
                    })
                }),
            )
            .merge(protected)
            .layer(DefaultBodyLimit::max(self.config.max_body_size))
            .with_state(state);

        if self.config.enable_logging {
            router = router.layer(TraceLayer::new_for_http());
        }

        router
    }

    /// Serves until Ctrl+C (or SIGTERM on unix).
    pub async fn serve(self) -> Result<()> {
        let router = self.build_router();
        let listener = TcpListener::bind(self.config.bind_addr).await.map_err(|e| {
            GatewayError::config_error(format!(
                "Failed to bind to {}: {}",
                self.config.bind_addr, e
            ))
        })?;

        log::info!("scriptlog gateway listening on {}", self.config.bind_addr);
        log::info!("Health check: http://{}/health", self.config.bind_addr);

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| GatewayError::Internal(format!("Server error: {}", e)))?;

        log::info!("scriptlog gateway stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => log::info!("Received Ctrl+C, shutting down"),
        _ = terminate => log::info!("Received SIGTERM, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_match_only_on_exact_equality() {
        assert!(tokens_match("relay-secret", "relay-secret"));
        assert!(!tokens_match("relay-secreT", "relay-secret"));
        assert!(!tokens_match("relay-secret ", "relay-secret"));
        assert!(!tokens_match("", "relay-secret"));
    }
}
