//! OTP login.
//!
//! Flow Overview:
//! 1) `/otp/request` validates the phone, refuses while locked out, and stores
//!    a fresh code (exposed in the response only in development).
//! 2) `/otp/verify` checks the code, then mints a token pair for the phone's
//!    subject and records the refresh token in the session registry.

use axum::{extract::Extension, Json};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        state::AuthState,
        types::{LoginResponse, OtpRequest, OtpRequestResponse, OtpVerifyRequest, UserProfile},
    },
    error::{ApiError, ErrorBody},
    otp::{valid_code, valid_phone, OtpError},
    session::subject_id,
};

fn invalid_phone() -> ApiError {
    ApiError::validation(
        "Invalid phone number",
        "Please enter a valid 10-digit Indian mobile number",
    )
}

fn locked(state: &AuthState) -> ApiError {
    ApiError::Locked {
        message: format!(
            "Too many failed attempts. Please wait {} minutes.",
            state.config().lockout_minutes()
        ),
    }
}

#[utoipa::path(
    post,
    path = "/otp/request",
    request_body = OtpRequest,
    responses(
        (status = 200, description = "Code issued", body = OtpRequestResponse),
        (status = 400, description = "Invalid phone number", body = ErrorBody),
        (status = 429, description = "Phone is locked out", body = ErrorBody),
    ),
    tag = "otp"
)]
#[instrument(skip_all)]
pub async fn request_otp(
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<OtpRequest>>,
) -> Result<Json<OtpRequestResponse>, ApiError> {
    let phone = payload
        .and_then(|Json(request)| request.phone_number)
        .unwrap_or_default();

    let ticket = match state.otp().request(&phone).await {
        Ok(ticket) => ticket,
        Err(OtpError::InvalidPhone) => return Err(invalid_phone()),
        Err(OtpError::Locked) => {
            return Err(ApiError::Locked {
                message: format!(
                    "Please wait {} minutes before requesting another OTP",
                    state.config().lockout_minutes()
                ),
            })
        }
        Err(OtpError::Store(err)) => {
            error!("Failed to store OTP: {err}");
            return Err(ApiError::Internal("Failed to send OTP"));
        }
    };

    let development = state.config().environment().is_development();
    if development {
        info!(phone = %phone, otp = %ticket.code, "Development OTP issued");
    } else {
        info!("OTP issued");
    }

    Ok(Json(OtpRequestResponse {
        success: true,
        message: "OTP sent successfully".to_string(),
        expires_in: ticket.expires_in,
        dev_otp: development.then_some(ticket.code),
    }))
}

#[utoipa::path(
    post,
    path = "/otp/verify",
    request_body = OtpVerifyRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 400, description = "Missing or malformed fields", body = ErrorBody),
        (status = 401, description = "Invalid or expired OTP", body = ErrorBody),
        (status = 429, description = "Phone is locked out", body = ErrorBody),
    ),
    tag = "otp"
)]
#[instrument(skip_all)]
pub async fn verify_otp(
    state: Extension<Arc<AuthState>>,
    payload: Option<Json<OtpVerifyRequest>>,
) -> Result<Json<LoginResponse>, ApiError> {
    let request = payload
        .map(|Json(request)| request)
        .unwrap_or_default();
    let (Some(phone), Some(code)) = (request.phone_number, request.otp) else {
        return Err(ApiError::validation(
            "Phone number and OTP are required",
            "Both phoneNumber and otp must be provided",
        ));
    };

    if !valid_phone(&phone) {
        return Err(invalid_phone());
    }

    // A locked phone is refused before the code is even looked at.
    let length = state.config().otp().length;
    if !valid_code(&code, length) {
        if matches!(state.otp().is_locked(&phone).await, Ok(true)) {
            return Err(locked(&state));
        }
        return Err(ApiError::validation(
            "Invalid OTP format",
            format!("OTP must be {length} digits"),
        ));
    }

    match state.otp().verify(&phone, &code).await {
        Ok(true) => {}
        Ok(false) => {
            return Err(ApiError::Unauthorized {
                error: "Invalid or expired OTP",
                message: "Please check the OTP or request a new one",
            })
        }
        Err(OtpError::InvalidPhone) => return Err(invalid_phone()),
        Err(OtpError::Locked) => return Err(locked(&state)),
        Err(OtpError::Store(err)) => {
            error!("Failed to verify OTP: {err}");
            return Err(ApiError::Internal("Verification failed"));
        }
    }

    let subject = subject_id(&phone);

    let is_new_user = match state.sessions().has_sessions(&subject).await {
        Ok(existing) => !existing,
        Err(err) => {
            warn!("Failed to look up sessions: {err}");
            true
        }
    };

    let pair = state.tokens().issue(&subject, &phone, None).map_err(|err| {
        error!("Failed to issue tokens: {err}");
        ApiError::Internal("Verification failed")
    })?;

    // Advisory: the tokens stay valid even if the record cannot be written.
    if let Err(err) = state.sessions().open(&subject, &pair.refresh_token).await {
        warn!("Failed to record session: {err}");
    }

    info!(subject = %subject, is_new_user, "User logged in");

    Ok(Json(LoginResponse {
        success: true,
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        expires_in: pair.access_ttl_seconds,
        user: UserProfile {
            id: subject,
            phone_number: phone,
            name: None,
            email: None,
            is_new_user,
        },
    }))
}
