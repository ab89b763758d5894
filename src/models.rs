use chrono::{DateTime, Utc};
use serde::Serialize;

/// Caller identified by an API key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiClient {
    pub name: String,
}

impl ApiClient {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always "healthy" while the process serves requests
    pub status: String,
    /// Application version
    pub version: String,
    /// Server time of the check
    pub timestamp: DateTime<Utc>,
}

/// Identity resolved for the current request.
#[derive(Debug, Serialize)]
pub struct WhoAmIResponse {
    /// Whether the request went through API key authentication
    pub authenticated: bool,
    /// Client name, `None` when authentication is disabled
    pub client: Option<String>,
}
