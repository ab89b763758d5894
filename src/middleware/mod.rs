//! HTTP middleware for authentication.
//!
//! - **API Key Authentication**: `Authorization: <provider> <apiKey>` resolved
//!   to an identity by a pluggable [`Finder`]
//! - **Client IP**: best-effort client address for audit logs
//!
//! Request instrumentation lives in [`crate::instrument`].

pub mod auth;
pub mod ip;

pub use auth::{
    ApiKeyAuth, ApiKeyAuthService, AuthError, Finder, JsonErrorHandler, KeyTable, OnError,
    RequestIdentityExt, UnknownKey,
};
pub use ip::{FORWARDED_FOR_HEADER, UNKNOWN_IP, extract_client_ip};
