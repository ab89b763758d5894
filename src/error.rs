use thiserror::Error;

/// Application-wide startup and configuration errors.
///
/// Request-path failures of the middleware itself are not represented here:
/// authentication failures are [`AuthError`](crate::middleware::AuthError)
/// and sink failures are logged and dropped.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Metrics error: {0}")]
    Metrics(String),
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_conversion() {
        let err: AppError = std::io::Error::other("disk full").into();
        assert!(matches!(err, AppError::Io(_)));
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn test_config_error_message() {
        let err = AppError::ConfigError("Invalid PORT: invalid digit".to_string());
        assert_eq!(err.to_string(), "Configuration error: Invalid PORT: invalid digit");
    }
}
