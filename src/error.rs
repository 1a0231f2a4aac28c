//! HTTP error taxonomy shared by the gateway and the auth service.
//!
//! Every rejected request gets a JSON body with a human `error` title, an
//! optional `message`, and a stable snake_case `code` clients can match on.
//! Upstream and internal failures carry only generic text; the cause is logged
//! where the error is created.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::token::VerificationError;

/// Why a bearer credential was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    Missing,
    Expired,
    Malformed,
    WrongKind,
}

impl AuthFailure {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Missing => "token_missing",
            Self::Expired => "token_expired",
            Self::Malformed => "token_invalid",
            Self::WrongKind => "token_wrong_kind",
        }
    }

    const fn title(self) -> &'static str {
        match self {
            Self::Missing => "Unauthorized",
            Self::Expired => "Token Expired",
            Self::Malformed => "Invalid Token",
            Self::WrongKind => "Invalid token type",
        }
    }

    const fn message(self) -> &'static str {
        match self {
            Self::Missing => "No authentication token provided",
            Self::Expired => "Your session has expired. Please login again.",
            Self::Malformed => "The provided token is invalid.",
            Self::WrongKind => "The provided token cannot be used for this operation.",
        }
    }
}

impl From<VerificationError> for AuthFailure {
    fn from(err: VerificationError) -> Self {
        match err {
            VerificationError::Expired => Self::Expired,
            VerificationError::Malformed => Self::Malformed,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{message}")]
    Validation {
        error: &'static str,
        message: String,
    },
    #[error("authentication failed: {}", .0.code())]
    Auth(AuthFailure),
    #[error("{message}")]
    Unauthorized {
        error: &'static str,
        message: &'static str,
    },
    #[error("{message}")]
    Locked { message: String },
    #[error("rate limited")]
    RateLimited,
    #[error("not found")]
    NotFound,
    #[error("payload too large")]
    PayloadTooLarge,
    #[error("upstream unavailable")]
    UpstreamUnavailable,
    #[error("{0}")]
    Internal(&'static str),
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub code: String,
}

impl ApiError {
    pub fn validation(error: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            error,
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Auth(_) | Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::Locked { .. } | Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UpstreamUnavailable => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    #[must_use]
    pub fn body(&self) -> ErrorBody {
        let (error, message, code) = match self {
            Self::Validation { error, message } => {
                ((*error).to_string(), Some(message.clone()), "validation_error")
            }
            Self::Auth(failure) => (
                failure.title().to_string(),
                Some(failure.message().to_string()),
                failure.code(),
            ),
            Self::Unauthorized { error, message } => (
                (*error).to_string(),
                Some((*message).to_string()),
                "unauthorized",
            ),
            Self::Locked { message } => (
                "Too many attempts".to_string(),
                Some(message.clone()),
                "locked",
            ),
            Self::RateLimited => (
                "Too many requests, please try again later.".to_string(),
                None,
                "rate_limited",
            ),
            Self::NotFound => (
                "Not Found".to_string(),
                Some("The requested resource does not exist".to_string()),
                "not_found",
            ),
            Self::PayloadTooLarge => (
                "Payload Too Large".to_string(),
                Some("The request body exceeds the allowed size".to_string()),
                "payload_too_large",
            ),
            Self::UpstreamUnavailable => (
                "Service temporarily unavailable".to_string(),
                None,
                "upstream_unavailable",
            ),
            Self::Internal(message) => (
                "Internal Server Error".to_string(),
                Some((*message).to_string()),
                "internal_error",
            ),
        };

        ErrorBody {
            error,
            message,
            code: code.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}
