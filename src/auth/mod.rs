//! Auth service: OTP login, token refresh and logout over HTTP.

use anyhow::{Context, Result};
use axum::{
    extract::Extension,
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

pub mod handlers;
mod openapi;
pub mod state;
pub mod types;

#[cfg(test)]
mod tests;

pub use self::openapi::openapi;
pub use self::state::{AuthConfig, AuthState};

use crate::server::{cors, not_found, shutdown_signal, with_http_layers};

/// Routes with state attached, without the tracing and CORS layers.
pub fn router(state: Arc<AuthState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/otp/request", post(handlers::request_otp))
        .route("/otp/verify", post(handlers::verify_otp))
        .route("/me", get(handlers::me))
        .route("/refresh", post(handlers::refresh))
        .route("/logout", post(handlers::logout))
        .route("/logout/all", post(handlers::logout_all))
        .route("/api-docs/openapi.json", get(openapi::openapi_json))
        .fallback(not_found)
        .layer(Extension(state))
}

/// Start the auth service
/// # Errors
/// Return error if the listener cannot be bound or the server fails
pub async fn new(port: u16, state: Arc<AuthState>, cors_origins: Vec<HeaderValue>) -> Result<()> {
    let environment = state.config().environment();
    let otp_ttl = state.config().otp().ttl_seconds;

    let app = with_http_layers(router(state), cors(cors_origins));

    let listener = TcpListener::bind(format!("::0:{port}"))
        .await
        .with_context(|| format!("Failed to bind port {port}"))?;

    info!("Auth service listening on [::]:{}", port);
    info!(%environment, otp_ttl, "Auth service configuration");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
