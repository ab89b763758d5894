//! Application routing configuration with middleware stack.
//!
//! # Middleware Stack (outermost first)
//!
//! ```text
//! Request
//!    │
//!    ▼
//! ┌──────────────────┐
//! │ Request Logging  │ ← one RequestLog per request, after the body is sent
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │   Catch Panic    │ ← handler panic becomes a logged 500
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │  Authentication  │ ← 401 if invalid (protected routes only)
//! └────────┬─────────┘
//!          │
//!          ▼
//!      Handler
//! ```
//!
//! # Route Groups
//!
//! - `/health` - Liveness check (never authenticated)
//! - `/whoami` - Identity of the calling client

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower_http::catch_panic::CatchPanicLayer;
use tracing::info;

use crate::config::Config;
use crate::handlers;
use crate::instrument::{LogSink, RequestLogLayer};
use crate::middleware::{ApiKeyAuth, JsonErrorHandler, KeyTable};
use crate::models::ApiClient;

/// Auth layer configured from `API_PROVIDER` and `API_KEYS`.
pub type ClientAuth = ApiKeyAuth<KeyTable<ApiClient>, JsonErrorHandler, ApiClient>;

/// Build the auth layer, or `None` when no keys are configured.
pub fn client_auth(config: &Config) -> Option<ClientAuth> {
    if !config.auth_enabled() {
        return None;
    }

    let keys = KeyTable::new(
        config
            .api_keys
            .iter()
            .map(|(key, name)| (key.clone(), ApiClient::new(name.clone()))),
    );
    Some(ApiKeyAuth::new(
        config.api_provider.clone(),
        keys,
        JsonErrorHandler,
    ))
}

/// Build the application router with all routes and middleware configured.
///
/// # Arguments
///
/// * `config` - Decides whether protected routes require an API key
/// * `sink` - Receives one record per request, including 401s, 404s and panics
pub fn build_router(config: &Config, sink: Arc<dyn LogSink>) -> Router {
    let mut protected = Router::new().route("/whoami", get(handlers::whoami));

    match client_auth(config) {
        Some(auth) => {
            info!(
                provider = %auth.provider(),
                keys = config.api_keys.len(),
                "API key authentication enabled"
            );
            protected = protected.route_layer(auth);
        }
        None => info!("API key authentication disabled (no API_KEYS set)"),
    }

    Router::new()
        .route("/health", get(handlers::health_check))
        .merge(protected)
        .layer(CatchPanicLayer::new())
        .layer(RequestLogLayer::from_shared(sink))
}
