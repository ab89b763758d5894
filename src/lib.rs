//! # Request Telemetry
//!
//! HTTP middleware for axum/tower services that reports every request to
//! pluggable telemetry sinks, plus API key authentication:
//!
//! - **Instrumentation**: status, body size, duration and request metadata
//!   captured once per request, after the response body is sent
//! - **Sinks**: structured `tracing` logs, DogStatsD metrics, Elastic
//!   Beanstalk healthd logs, Prometheus
//! - **Security**: `Authorization: <provider> <apiKey>` with a pluggable
//!   key finder and error handler
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Axum HTTP Server                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  RequestLogLayer → CatchPanic → ApiKeyAuth → Handler        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  LogSink (Fanout)                                           │
//! ├──────────────┬──────────────┬──────────────┬────────────────┤
//! │  Structured  │   Statsd     │   Healthd    │  Prometheus    │
//! └──────────────┴──────────────┴──────────────┴────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use request_telemetry::{Config, build_router, sinks};
//!
//! # fn main() -> Result<(), request_telemetry::AppError> {
//! let config = Config::from_env()?;
//! let sinks = sinks::from_config(&config)?;
//! let app = build_router(&config, Arc::new(sinks));
//! // Serve with `into_make_service_with_connect_info::<SocketAddr>()`...
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! ```bash
//! STATSD_ADDR=127.0.0.1:8125 STATSD_NAMESPACE=service.logging.live. \
//! API_KEYS=abc123=graze cargo run
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod instrument;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod sinks;
pub mod statsd;
pub mod utils;

// Re-exports for convenience
pub use config::{Config, LogFormat};
pub use error::{AppError, AppResult};
pub use instrument::{Fanout, LogSink, RequestLog, RequestLogLayer};
pub use routes::build_router;
