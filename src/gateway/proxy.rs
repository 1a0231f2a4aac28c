//! Request forwarding to the backend services.
//!
//! Bodies are buffered in both directions. The outbound call lives inside the
//! handler future, so a client that disconnects drops it mid-flight; whatever
//! the backend already committed stays committed.

use axum::{
    body::{to_bytes, Body},
    extract::Extension,
    http::{
        header::{
            CONNECTION, CONTENT_LENGTH, HOST, PROXY_AUTHENTICATE, PROXY_AUTHORIZATION, TE,
            TRAILER, TRANSFER_ENCODING, UPGRADE,
        },
        HeaderMap, HeaderName, Request,
    },
    response::Response,
    BoxError,
};
use http_body_util::LengthLimitError;
use reqwest::{redirect::Policy, Client};
use std::{sync::Arc, time::Duration};
use tracing::{debug, error, instrument};
use url::Url;

use crate::{error::ApiError, APP_USER_AGENT};

use super::{
    identity::{apply, authorize, Identity},
    routes::{resolve, target_url},
    GatewayState,
};

/// Largest request body the gateway buffers.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("connect failed: {0}")]
    Connect(#[source] reqwest::Error),
    #[error("timed out: {0}")]
    Timeout(#[source] reqwest::Error),
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("request body exceeds {} bytes", MAX_BODY_BYTES)]
    TooLarge,
    #[error("failed to read body: {0}")]
    Body(#[source] BoxError),
}

impl From<axum::Error> for ProxyError {
    fn from(err: axum::Error) -> Self {
        let err = err.into_inner();
        if err.is::<LengthLimitError>() {
            Self::TooLarge
        } else {
            Self::Body(err)
        }
    }
}

impl From<reqwest::Error> for ProxyError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err)
        } else if err.is_connect() {
            Self::Connect(err)
        } else {
            Self::Transport(err)
        }
    }
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    [
        CONNECTION,
        PROXY_AUTHENTICATE,
        PROXY_AUTHORIZATION,
        TE,
        TRAILER,
        TRANSFER_ENCODING,
        UPGRADE,
    ]
    .contains(name)
        || name.as_str() == "keep-alive"
}

/// Headers worth passing on. `Host` and `Content-Length` are recomputed by the
/// HTTP client for the outbound hop.
fn forwardable(headers: &HeaderMap) -> HeaderMap {
    headers
        .iter()
        .filter(|(name, _)| !is_hop_by_hop(name) && **name != HOST && **name != CONTENT_LENGTH)
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

#[derive(Debug, Clone)]
pub struct ServiceClient {
    client: Client,
}

impl ServiceClient {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(timeout)
            .redirect(Policy::none())
            .build()?;

        Ok(Self { client })
    }

    /// Send `request` to `target`, attaching `identity` in place of any
    /// identity headers the client sent.
    ///
    /// # Errors
    /// Returns an error if a body cannot be read or the backend cannot be
    /// reached in time
    pub async fn send(
        &self,
        target: Url,
        request: Request<Body>,
        identity: Option<&Identity>,
    ) -> Result<Response, ProxyError> {
        let (parts, body) = request.into_parts();
        let body = to_bytes(body, MAX_BODY_BYTES).await?;

        let mut headers = forwardable(&parts.headers);
        apply(&mut headers, identity);

        let upstream = self
            .client
            .request(parts.method, target)
            .headers(headers)
            .body(body)
            .send()
            .await?;

        let status = upstream.status();
        let headers = forwardable(upstream.headers());
        let bytes = upstream.bytes().await?;

        let mut response = Response::new(Body::from(bytes));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

/// Fallback handler: everything that is not a gateway endpoint is either a
/// routed backend path or a 404.
#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn forward(
    state: Extension<Arc<GatewayState>>,
    request: Request<Body>,
) -> Result<Response, ApiError> {
    let path = request.uri().path().to_string();
    let (route, rest) = resolve(&path).ok_or(ApiError::NotFound)?;

    let identity = authorize(route.access, request.headers(), state.tokens()).map_err(|err| {
        debug!(code = err.code(), "Rejected request to protected route");
        ApiError::Auth(err)
    })?;

    let backend = route.backend;
    let target = target_url(state.config().upstream(backend), rest, request.uri().query())
        .map_err(|err| {
            error!(backend = backend.name(), "Failed to build target URL: {err}");
            ApiError::UpstreamUnavailable
        })?;

    debug!(backend = backend.name(), %target, "Forwarding request");

    state
        .client()
        .send(target, request, identity.as_ref())
        .await
        .map_err(|err| match err {
            ProxyError::TooLarge => {
                debug!(backend = backend.name(), "Rejected oversized request body");
                ApiError::PayloadTooLarge
            }
            err => {
                error!(backend = backend.name(), "Proxy error: {err}");
                ApiError::UpstreamUnavailable
            }
        })
}
