//! Identity forwarded to backends.
//!
//! Backends trust `X-User-ID` / `X-User-Phone` without re-verifying, so the
//! gateway removes any client-supplied copies and only sets them from a token
//! it verified itself.

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use tracing::warn;

use crate::{
    bearer::authenticate,
    error::AuthFailure,
    token::{TokenClaims, TokenKind, TokenService},
};

use super::routes::Access;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_PHONE_HEADER: &str = "x-user-phone";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub subject_id: String,
    pub phone: String,
}

impl From<TokenClaims> for Identity {
    fn from(claims: TokenClaims) -> Self {
        Self {
            subject_id: claims.id,
            phone: claims.phone,
        }
    }
}

/// Identity required by `access`: none for public routes, a verified access
/// token for protected ones.
///
/// # Errors
/// Returns the reason a protected route's bearer token was refused.
pub fn authorize(
    access: Access,
    headers: &HeaderMap,
    tokens: &TokenService,
) -> Result<Option<Identity>, AuthFailure> {
    match access {
        Access::Public => Ok(None),
        Access::Protected => authenticate(headers, tokens, TokenKind::Access)
            .map(Identity::from)
            .map(Some),
    }
}

/// Replace any identity headers in `headers` with `identity`.
pub fn apply(headers: &mut HeaderMap, identity: Option<&Identity>) {
    let spoofed_id = headers.remove(USER_ID_HEADER).is_some();
    let spoofed_phone = headers.remove(USER_PHONE_HEADER).is_some();
    if spoofed_id || spoofed_phone {
        warn!("Dropped client-supplied identity headers");
    }

    let Some(identity) = identity else {
        return;
    };
    match (
        HeaderValue::from_str(&identity.subject_id),
        HeaderValue::from_str(&identity.phone),
    ) {
        (Ok(id), Ok(phone)) => {
            headers.insert(HeaderName::from_static(USER_ID_HEADER), id);
            headers.insert(HeaderName::from_static(USER_PHONE_HEADER), phone);
        }
        _ => warn!("Identity is not a valid header value"),
    }
}
