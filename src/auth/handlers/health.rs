use axum::{
    extract::Extension,
    response::{IntoResponse, Json},
};
use std::sync::Arc;
use tracing::{debug, error};

use crate::{
    auth::{state::AuthState, types::Health},
    server::x_app_headers,
    timestamp_now,
};

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is up; `store` reports the key-value store check", body = Health),
    ),
    tag = "health"
)]
/// Liveness plus a store ping. Always 200 so a store outage stays visible
/// without taking the service out of rotation.
pub async fn health(state: Extension<Arc<AuthState>>) -> impl IntoResponse {
    let store = match state.store().ping().await {
        Ok(()) => {
            debug!("Store connection is healthy");
            "connected"
        }
        Err(err) => {
            error!("Store ping failed: {err}");
            "error"
        }
    };

    let body = Health {
        status: "healthy".to_string(),
        service: "auth-service".to_string(),
        store: store.to_string(),
        timestamp: timestamp_now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    (x_app_headers(), Json(body))
}
