//! Gateway-local endpoints: health and the operator broadcast surface.

use axum::{
    extract::Extension,
    http::HeaderMap,
    response::{IntoResponse, Json},
};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{instrument, warn};

use crate::{error::ApiError, server::x_app_headers, timestamp_now};

use super::{
    notify::{Notification, NotificationKind},
    routes::Backend,
    GatewayState,
};

pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Health {
    pub status: String,
    pub timestamp: String,
    pub service: String,
    pub version: String,
    pub connected_clients: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Services {
    pub auth: String,
    pub billing: String,
    pub grievance: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WebsocketStatus {
    pub enabled: bool,
    pub connected_clients: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ApiHealth {
    pub status: String,
    pub services: Services,
    pub websocket: WebsocketStatus,
}

#[derive(Deserialize, Debug, Default)]
pub struct BroadcastRequest {
    pub message: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub priority: Option<i64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BroadcastResponse {
    pub success: bool,
    pub notification: Notification,
    pub recipients: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClientsResponse {
    pub connected_clients: i64,
    pub timestamp: String,
}

/// `GET /health`
pub async fn health(state: Extension<Arc<GatewayState>>) -> impl IntoResponse {
    let body = Health {
        status: "healthy".to_string(),
        timestamp: timestamp_now(),
        service: "api-gateway".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        connected_clients: state.hub().connected(),
    };

    (x_app_headers(), Json(body))
}

/// `GET /api/health`
pub async fn api_health(state: Extension<Arc<GatewayState>>) -> Json<ApiHealth> {
    let config = state.config();
    Json(ApiHealth {
        status: "healthy".to_string(),
        services: Services {
            auth: config.upstream(Backend::Auth).to_string(),
            billing: config.upstream(Backend::Billing).to_string(),
            grievance: config.upstream(Backend::Grievance).to_string(),
        },
        websocket: WebsocketStatus {
            enabled: true,
            connected_clients: state.hub().connected(),
        },
    })
}

fn check_admin(state: &GatewayState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(expected) = state.config().admin_token() else {
        return Ok(());
    };

    let presented = headers
        .get(ADMIN_TOKEN_HEADER)
        .map_or(&[][..], |value| value.as_bytes());
    if bool::from(presented.ct_eq(expected.expose_secret().as_bytes())) {
        Ok(())
    } else {
        warn!("Rejected admin request");
        Err(ApiError::Unauthorized {
            error: "Unauthorized",
            message: "A valid admin token is required",
        })
    }
}

/// `POST /admin/broadcast`
#[instrument(skip_all)]
pub async fn broadcast(
    state: Extension<Arc<GatewayState>>,
    headers: HeaderMap,
    payload: Option<Json<BroadcastRequest>>,
) -> Result<Json<BroadcastResponse>, ApiError> {
    check_admin(&state, &headers)?;

    let request = payload.map(|Json(request)| request).unwrap_or_default();

    let message = request
        .message
        .filter(|message| !message.trim().is_empty())
        .ok_or_else(|| ApiError::validation("Message is required", "Message is required"))?;

    let kind = match request.kind.as_deref() {
        None => NotificationKind::default(),
        Some(kind) => kind.parse::<NotificationKind>().map_err(|_| {
            ApiError::validation(
                "Invalid notification type",
                "Type must be one of info, warning, alert, success",
            )
        })?,
    };

    let (notification, recipients) = state
        .hub()
        .broadcast(kind, message, request.priority.unwrap_or(1));

    Ok(Json(BroadcastResponse {
        success: true,
        notification,
        recipients,
    }))
}

/// `GET /admin/clients`
pub async fn clients(
    state: Extension<Arc<GatewayState>>,
    headers: HeaderMap,
) -> Result<Json<ClientsResponse>, ApiError> {
    check_admin(&state, &headers)?;

    Ok(Json(ClientsResponse {
        connected_clients: state.hub().connected(),
        timestamp: timestamp_now(),
    }))
}
