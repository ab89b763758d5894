//! API key authentication middleware.
//!
//! Clients authenticate with a single header:
//!
//! ```text
//! Authorization: <provider> <apiKey>
//! ```
//!
//! The provider must match the configured name exactly; the key is resolved
//! to an identity by a [`Finder`]. On success the identity is inserted into
//! the request extensions, where handlers read it with
//! `axum::Extension<I>` or [`RequestIdentityExt::identity`].
//!
//! # Flow
//!
//! ```text
//! no header ──────────────► NoHeader      ─┐
//! not "<provider> <key>" ─► InvalidFormat ─┤
//! provider mismatch ──────► BadProvider   ─┼─► OnError(req, err, 401)
//! finder error ───────────► InvalidKey    ─┘
//! identity found ─────────► inner service
//! ```
//!
//! The middleware never builds an error response itself; that is the job of
//! the [`OnError`] handler (default: [`JsonErrorHandler`]). It keeps no state
//! between requests.
//!
//! # Usage
//!
//! ```rust,ignore
//! let keys = KeyTable::new([("secret-key", ApiClient::new("billing"))]);
//! let auth = ApiKeyAuth::new("Service", keys, JsonErrorHandler);
//!
//! let app = Router::new()
//!     .route("/orders", get(list_orders))
//!     .route_layer(auth);
//! ```

use std::marker::PhantomData;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use axum::http::{HeaderValue, Request, Response, StatusCode};
use axum::response::IntoResponse;
use serde::Serialize;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tower::{BoxError, Layer, Service};
use tracing::{debug, warn};

use super::ip::extract_client_ip;

/// Expected shape of the `Authorization` header, reported in errors.
pub const AUTHORIZATION_FORMAT: &str = "<provider> <apiKey>";

/// Why a request was rejected.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("no Authorization header provided")]
    NoHeader,

    #[error("provided Authorization header in invalid format, expecting: {format} got: {header}")]
    InvalidFormat { format: &'static str, header: String },

    #[error("Authorization provider does not match. Expecting: {expected} got: {provider}")]
    BadProvider { provider: String, expected: String },

    #[error("provided api key: '{key}' is not valid: {source}")]
    InvalidKey {
        key: String,
        #[source]
        source: BoxError,
    },
}

impl AuthError {
    /// Stable, secret-free name of the failure, for logs and response bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::NoHeader => "no_header",
            AuthError::InvalidFormat { .. } => "invalid_format",
            AuthError::BadProvider { .. } => "bad_provider",
            AuthError::InvalidKey { .. } => "invalid_key",
        }
    }
}

/// Resolves an API key to an identity.
///
/// Implemented for closures `Fn(&str, &Request<Body>) -> Result<I, BoxError>`.
pub trait Finder<I>: Send + Sync + 'static {
    /// # Errors
    ///
    /// Any error rejects the request with [`AuthError::InvalidKey`].
    fn find(&self, key: &str, req: &Request<Body>) -> Result<I, BoxError>;
}

impl<F, I> Finder<I> for F
where
    F: Fn(&str, &Request<Body>) -> Result<I, BoxError> + Send + Sync + 'static,
{
    fn find(&self, key: &str, req: &Request<Body>) -> Result<I, BoxError> {
        self(key, req)
    }
}

/// Builds the response for a rejected request.
///
/// Implemented for closures `Fn(&Request<Body>, AuthError, StatusCode) -> Response<Body>`.
pub trait OnError: Send + Sync + 'static {
    fn handle(&self, req: &Request<Body>, err: AuthError, status: StatusCode) -> Response<Body>;
}

impl<F> OnError for F
where
    F: Fn(&Request<Body>, AuthError, StatusCode) -> Response<Body> + Send + Sync + 'static,
{
    fn handle(&self, req: &Request<Body>, err: AuthError, status: StatusCode) -> Response<Body> {
        self(req, err, status)
    }
}

/// Error body written by [`JsonErrorHandler`].
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
}

/// Default [`OnError`]: JSON body with the failure kind and message.
///
/// The message of [`AuthError::InvalidKey`] is replaced so the rejected key
/// and lookup internals are not echoed back.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonErrorHandler;

impl OnError for JsonErrorHandler {
    fn handle(&self, _req: &Request<Body>, err: AuthError, status: StatusCode) -> Response<Body> {
        let message = match &err {
            AuthError::InvalidKey { .. } => "provided api key is not valid".to_string(),
            other => other.to_string(),
        };
        let body = ErrorResponse {
            error: err.kind(),
            message,
        };

        let mut response = (status, axum::Json(body)).into_response();
        response
            .headers_mut()
            .insert(WWW_AUTHENTICATE, HeaderValue::from_static("API-Key"));
        response
    }
}

/// API key authentication layer.
pub struct ApiKeyAuth<F, E, I> {
    provider: Arc<str>,
    finder: Arc<F>,
    on_error: Arc<E>,
    _identity: PhantomData<fn() -> I>,
}

impl<F, E, I> ApiKeyAuth<F, E, I>
where
    F: Finder<I>,
    E: OnError,
    I: Clone + Send + Sync + 'static,
{
    /// Create a new API key auth layer.
    ///
    /// # Arguments
    ///
    /// * `provider` - Expected first token of the `Authorization` header (no spaces)
    /// * `finder` - Resolves the key to an identity
    /// * `on_error` - Builds the response for rejected requests
    pub fn new(provider: impl Into<String>, finder: F, on_error: E) -> Self {
        Self {
            provider: Arc::from(provider.into()),
            finder: Arc::new(finder),
            on_error: Arc::new(on_error),
            _identity: PhantomData,
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }
}

impl<F, E, I> Clone for ApiKeyAuth<F, E, I> {
    fn clone(&self) -> Self {
        Self {
            provider: self.provider.clone(),
            finder: self.finder.clone(),
            on_error: self.on_error.clone(),
            _identity: PhantomData,
        }
    }
}

impl<S, F, E, I> Layer<S> for ApiKeyAuth<F, E, I> {
    type Service = ApiKeyAuthService<S, F, E, I>;

    fn layer(&self, inner: S) -> Self::Service {
        ApiKeyAuthService {
            inner,
            auth: self.clone(),
        }
    }
}

/// API key authentication service wrapper.
pub struct ApiKeyAuthService<S, F, E, I> {
    inner: S,
    auth: ApiKeyAuth<F, E, I>,
}

impl<S: Clone, F, E, I> Clone for ApiKeyAuthService<S, F, E, I> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            auth: self.auth.clone(),
        }
    }
}

impl<S, F, E, I> Service<Request<Body>> for ApiKeyAuthService<S, F, E, I>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
    F: Finder<I>,
    E: OnError,
    I: Clone + Send + Sync + 'static,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        match authenticate(&self.auth.provider, self.auth.finder.as_ref(), &req) {
            Ok(identity) => {
                debug!(provider = %self.auth.provider, "API key authentication successful");
                req.extensions_mut().insert(identity);
                Box::pin(inner.call(req))
            }
            Err(err) => {
                warn!(
                    path = %req.uri().path(),
                    client_ip = %extract_client_ip(&req),
                    reason = err.kind(),
                    "API key authentication failed"
                );
                let response = self
                    .auth
                    .on_error
                    .handle(&req, err, StatusCode::UNAUTHORIZED);
                Box::pin(async move { Ok(response) })
            }
        }
    }
}

/// Run the header checks and key lookup for `req`.
///
/// # Errors
///
/// Returns the first check that failed, see [`AuthError`].
pub fn authenticate<F, I>(provider: &str, finder: &F, req: &Request<Body>) -> Result<I, AuthError>
where
    F: Finder<I> + ?Sized,
{
    let header = req.headers().get(AUTHORIZATION).ok_or(AuthError::NoHeader)?;

    let invalid_format = || AuthError::InvalidFormat {
        format: AUTHORIZATION_FORMAT,
        header: String::from_utf8_lossy(header.as_bytes()).into_owned(),
    };
    let value = header.to_str().map_err(|_| invalid_format())?;

    let mut parts = value.split(' ');
    let (given, key) = match (parts.next(), parts.next(), parts.next()) {
        (Some(given), Some(key), None) => (given, key),
        _ => return Err(invalid_format()),
    };

    if given != provider {
        return Err(AuthError::BadProvider {
            provider: given.to_string(),
            expected: provider.to_string(),
        });
    }

    finder.find(key, req).map_err(|source| AuthError::InvalidKey {
        key: key.to_string(),
        source,
    })
}

/// Extension trait reading the identity attached by [`ApiKeyAuth`].
pub trait RequestIdentityExt {
    fn identity<I: Send + Sync + 'static>(&self) -> Option<&I>;
}

impl<B> RequestIdentityExt for Request<B> {
    fn identity<I: Send + Sync + 'static>(&self) -> Option<&I> {
        self.extensions().get::<I>()
    }
}

/// Returned by [`KeyTable`] for keys it does not hold.
#[derive(Error, Debug, Clone, Copy)]
#[error("no identity registered for this key")]
pub struct UnknownKey;

/// Fixed set of keys, each mapped to an identity.
///
/// Every lookup compares against all stored keys in constant time, so
/// response timing does not reveal how much of a key matched.
#[derive(Debug, Clone)]
pub struct KeyTable<I> {
    entries: Vec<(String, I)>,
}

impl<I> KeyTable<I> {
    pub fn new<K>(entries: impl IntoIterator<Item = (K, I)>) -> Self
    where
        K: Into<String>,
    {
        Self {
            entries: entries.into_iter().map(|(k, i)| (k.into(), i)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Identity registered for `key`.
    pub fn lookup(&self, key: &str) -> Option<&I> {
        let mut found = None;
        for (candidate, identity) in &self.entries {
            if constant_time_eq(candidate, key) {
                found = Some(identity);
            }
        }
        found
    }
}

impl<I> Finder<I> for KeyTable<I>
where
    I: Clone + Send + Sync + 'static,
{
    fn find(&self, key: &str, _req: &Request<Body>) -> Result<I, BoxError> {
        self.lookup(key).cloned().ok_or_else(|| UnknownKey.into())
    }
}

/// Perform constant-time comparison of two strings.
fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
