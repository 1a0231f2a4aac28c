//! Bearer-authenticated endpoints: profile echo, refresh rotation and logout.

use axum::{extract::Extension, http::HeaderMap, Json};
use chrono::DateTime;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    auth::{
        state::AuthState,
        types::{LogoutRequest, LogoutResponse, MeResponse, RefreshRequest, TokenResponse},
    },
    bearer::{authenticate, bearer_token},
    error::{ApiError, AuthFailure, ErrorBody},
    token::{fingerprint, fingerprint_prefix, TokenKind},
};

#[utoipa::path(
    get,
    path = "/me",
    responses(
        (status = 200, description = "Identity carried by the access token", body = MeResponse),
        (status = 401, description = "Missing, expired, malformed or refresh token", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "session"
)]
#[instrument(skip_all)]
pub async fn me(
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
) -> Result<Json<MeResponse>, ApiError> {
    let claims = authenticate(&headers, state.tokens(), TokenKind::Access).map_err(ApiError::Auth)?;

    let created_at = DateTime::from_timestamp(claims.iat, 0)
        .map(|issued| issued.to_rfc3339())
        .unwrap_or_default();

    Ok(Json(MeResponse {
        id: claims.id,
        phone_number: claims.phone,
        email: claims.email,
        name: None,
        created_at,
    }))
}

#[utoipa::path(
    post,
    path = "/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New token pair", body = TokenResponse),
        (status = 400, description = "Missing refresh token", body = ErrorBody),
        (status = 401, description = "Expired, malformed or access token", body = ErrorBody),
    ),
    tag = "session"
)]
#[instrument(skip_all)]
pub async fn refresh(
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<RefreshRequest>>,
) -> Result<Json<TokenResponse>, ApiError> {
    let Some(presented) = payload.and_then(|Json(request)| request.refresh_token) else {
        return Err(ApiError::validation(
            "Refresh token required",
            "refreshToken must be provided",
        ));
    };

    let claims = state
        .tokens()
        .verify(&presented)
        .map_err(|err| ApiError::Auth(err.into()))?;
    if claims.kind != TokenKind::Refresh {
        return Err(ApiError::Auth(AuthFailure::WrongKind));
    }

    let pair = state
        .tokens()
        .issue(&claims.id, &claims.phone, claims.email.as_deref())
        .map_err(|err| {
            error!("Failed to issue tokens: {err}");
            ApiError::Internal("Token refresh failed")
        })?;

    // Session bookkeeping is advisory; failures never fail the refresh.
    if let Err(err) = state.sessions().open(&claims.id, &pair.refresh_token).await {
        warn!("Failed to record rotated session: {err}");
    }
    let previous = fingerprint(&presented);
    if let Err(err) = state
        .sessions()
        .close(&claims.id, fingerprint_prefix(&previous))
        .await
    {
        warn!("Failed to close previous session: {err}");
    }

    debug!(subject = %claims.id, "Token pair rotated");

    Ok(Json(TokenResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        expires_in: pair.access_ttl_seconds,
    }))
}

#[utoipa::path(
    post,
    path = "/logout",
    request_body(content = LogoutRequest, description = "Refresh token to close; defaults to the bearer token"),
    responses(
        (status = 200, description = "Always succeeds", body = LogoutResponse),
    ),
    tag = "session"
)]
#[instrument(skip_all)]
pub async fn logout(
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<LogoutRequest>>,
) -> Json<LogoutResponse> {
    let presented = payload
        .and_then(|Json(request)| request.refresh_token)
        .or_else(|| bearer_token(&headers).map(str::to_string));

    if let Some(token) = presented {
        match state.tokens().verify(&token) {
            Ok(claims) => {
                let hash = fingerprint(&token);
                if let Err(err) = state
                    .sessions()
                    .close(&claims.id, fingerprint_prefix(&hash))
                    .await
                {
                    warn!("Failed to close session: {err}");
                }
            }
            Err(err) => debug!("Logout with unverifiable token: {err}"),
        }
    }

    Json(LogoutResponse {
        success: true,
        message: "Logged out successfully".to_string(),
    })
}

#[utoipa::path(
    post,
    path = "/logout/all",
    responses(
        (status = 200, description = "All session records removed", body = LogoutResponse),
        (status = 401, description = "Missing, expired, malformed or refresh token", body = ErrorBody),
    ),
    security(("bearer" = [])),
    tag = "session"
)]
#[instrument(skip_all)]
pub async fn logout_all(
    headers: HeaderMap,
    state: Extension<Arc<AuthState>>,
) -> Result<Json<LogoutResponse>, ApiError> {
    let claims = authenticate(&headers, state.tokens(), TokenKind::Access).map_err(ApiError::Auth)?;

    match state.sessions().close_all(&claims.id).await {
        Ok(removed) => info!(subject = %claims.id, removed, "Logged out everywhere"),
        Err(err) => warn!("Failed to close sessions: {err}"),
    }

    Ok(Json(LogoutResponse {
        success: true,
        message: "Logged out from all sessions".to_string(),
    }))
}
