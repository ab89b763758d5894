//! AWS Elastic Beanstalk enhanced health ("healthd") request log.
//!
//! The health agent tails `/var/log/nginx/healthd/application.log.*` and
//! expects exactly nginx's `healthd` log_format:
//!
//! ```text
//! $msec"$uri"$status"$request_time"$upstream_response_time"$http_x_forwarded_for
//! 1437609879.311"/"200"0.050"0.050"177.72.242.17
//! ```
//!
//! There is no upstream here, so the upstream time repeats the request time.

use std::io::Write;
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use tracing::warn;
use tracing_appender::rolling::{RollingFileAppender, Rotation};

use crate::error::{AppError, AppResult};
use crate::instrument::{LogSink, RequestLog};

/// File name prefix the health agent looks for; the appender adds `.YYYY-MM-DD-HH`.
pub const HEALTHD_FILE_PREFIX: &str = "application.log";

/// Sink writing one healthd line per request.
pub struct HealthdSink {
    writer: Mutex<Box<dyn Write + Send>>,
}

impl HealthdSink {
    /// Write lines to `writer`.
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Mutex::new(Box::new(writer)),
        }
    }

    /// Write lines to `dir/application.log.YYYY-MM-DD-HH`, switching files
    /// every hour (UTC).
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if `dir` cannot be created or the
    /// first file cannot be opened.
    pub fn hourly(dir: impl AsRef<Path>) -> AppResult<Self> {
        let appender = RollingFileAppender::builder()
            .rotation(Rotation::HOURLY)
            .filename_prefix(HEALTHD_FILE_PREFIX)
            .build(dir.as_ref())
            .map_err(|e| {
                AppError::ConfigError(format!(
                    "Cannot open healthd log in {}: {e}",
                    dir.as_ref().display()
                ))
            })?;
        Ok(Self::new(appender))
    }

    /// Render `event` as a healthd line, without the trailing newline.
    pub fn format(event: &RequestLog) -> String {
        let completed = event
            .timestamp
            .checked_add_signed(chrono::Duration::nanoseconds(
                i64::try_from(event.duration.as_nanos()).unwrap_or(i64::MAX),
            ))
            .unwrap_or(event.timestamp);
        let millis = completed.timestamp_millis();
        let secs = event.duration_secs();

        format!(
            "{}.{:03}\"{}\"{}\"{:.3}\"{:.3}\"{}",
            millis.div_euclid(1000),
            millis.rem_euclid(1000),
            event.path,
            event.status.as_u16(),
            secs,
            secs,
            user_ip(event),
        )
    }
}

/// Forwarded-for chain if present, otherwise the peer IP.
fn user_ip(event: &RequestLog) -> String {
    if !event.forwarded_for.is_empty() {
        return event.forwarded_for.clone();
    }
    event
        .remote_ip()
        .map(|ip| ip.to_string())
        .unwrap_or_default()
}

impl LogSink for HealthdSink {
    fn log(&self, event: &RequestLog) {
        let line = Self::format(event);
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = writeln!(writer, "{line}").and_then(|()| writer.flush()) {
            warn!(error = %e, "Failed to write healthd log line");
        }
    }
}
