//! Log sinks turning a [`RequestLog`](crate::instrument::RequestLog) into
//! telemetry.
//!
//! - [`StructuredSink`]: one structured `tracing` record per request
//! - [`StatsdSink`]: response time and count metrics over DogStatsD
//! - [`HealthdSink`]: AWS Elastic Beanstalk enhanced health log lines
//! - [`PrometheusSink`]: request counter and duration histogram
//!
//! None of them surface delivery failures to the request.

pub mod healthd;
pub mod prometheus;
pub mod statsd;
pub mod structured;

use tracing::info;

use crate::config::Config;
use crate::error::AppResult;
use crate::instrument::Fanout;
use crate::statsd::StatsdClient;

pub use healthd::HealthdSink;
pub use prometheus::PrometheusSink;
pub use statsd::StatsdSink;
pub use structured::{LogBackend, LogContext, StructuredSink, TracingBackend};

/// Sinks enabled by `config`.
///
/// The structured sink is always present. [`PrometheusSink`] is left to the
/// caller since it depends on the exporter being installed.
///
/// # Errors
///
/// Returns an error if the statsd address does not resolve or the healthd
/// directory cannot be created.
pub fn from_config(config: &Config) -> AppResult<Fanout> {
    let mut sinks = Fanout::new().with(StructuredSink::default());

    if let Some(addr) = &config.statsd_addr {
        let client = StatsdClient::new(addr.as_str())?
            .with_namespace(config.statsd_namespace.clone())
            .with_tags(config.statsd_tags.iter().cloned());
        info!(addr = %addr, namespace = %config.statsd_namespace, "Statsd reporting enabled");
        sinks = sinks.with(StatsdSink::new(client));
    }

    if let Some(dir) = &config.healthd_log_dir {
        info!(dir = %dir, "Healthd logging enabled");
        sinks = sinks.with(HealthdSink::hourly(dir)?);
    }

    Ok(sinks)
}
