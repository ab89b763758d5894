//! Prometheus metrics for request observability.
//!
//! Request metrics are recorded through the `metrics` facade by
//! [`crate::sinks::PrometheusSink`] and exposed by the Prometheus exporter on
//! a dedicated listener (default: `0.0.0.0:9090`).
//!
//! # Available Metrics
//!
//! ## Counters
//! - `http_requests_total` - Requests handled (labels: endpoint, method, status)
//!
//! ## Histograms
//! - `http_request_duration_seconds` - Time to complete the response
//!   (labels: endpoint, method, status)
//!
//! Recording before [`init_metrics`] is a no-op.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{error, info};

use crate::error::{AppError, AppResult};

/// Metric names as constants for consistency.
pub mod names {
    pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";
}

/// Install the Prometheus exporter listening on `metrics_addr`.
///
/// # Errors
///
/// Returns `AppError::Metrics` if the exporter cannot be installed (address
/// in use, recorder already set).
pub fn init_metrics(metrics_addr: SocketAddr) -> AppResult<()> {
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .map_err(|e| AppError::Metrics(format!("Failed to install Prometheus exporter: {e}")))?;

    describe_counter!(
        names::HTTP_REQUESTS_TOTAL,
        "Total number of HTTP requests handled"
    );
    describe_histogram!(
        names::HTTP_REQUEST_DURATION_SECONDS,
        "HTTP request duration in seconds, until the response body is sent"
    );

    info!(addr = %metrics_addr, "Prometheus metrics endpoint started");
    Ok(())
}

/// Try to initialize metrics, logging any errors but not failing.
pub fn try_init_metrics(metrics_addr: SocketAddr) -> bool {
    match init_metrics(metrics_addr) {
        Ok(()) => true,
        Err(e) => {
            error!(error = %e, "Failed to initialize metrics, continuing without metrics");
            false
        }
    }
}

/// Record one completed request.
pub fn record_request(endpoint: &str, method: &str, status: u16, duration_secs: f64) {
    let status = status.to_string();
    counter!(names::HTTP_REQUESTS_TOTAL, "endpoint" => endpoint.to_string(), "method" => method.to_string(), "status" => status.clone())
        .increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, "endpoint" => endpoint.to_string(), "method" => method.to_string(), "status" => status)
        .record(duration_secs);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_request_without_recorder() {
        record_request("/orders", "POST", 201, 0.045);
    }
}
