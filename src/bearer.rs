//! `Authorization: Bearer` credentials checked against the token service.

use axum::http::{header::AUTHORIZATION, HeaderMap};

use crate::{
    error::AuthFailure,
    token::{TokenClaims, TokenKind, TokenService},
};

/// Token from an `Authorization: Bearer <token>` header, if present.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Verify the bearer token and require it to be of `kind`.
///
/// # Errors
/// `Missing` without a usable header, `Expired`/`Malformed` from verification,
/// `WrongKind` when the token verifies but is of the other kind.
pub fn authenticate(
    headers: &HeaderMap,
    tokens: &TokenService,
    kind: TokenKind,
) -> Result<TokenClaims, AuthFailure> {
    let token = bearer_token(headers).ok_or(AuthFailure::Missing)?;
    let claims = tokens.verify(token)?;
    if claims.kind != kind {
        return Err(AuthFailure::WrongKind);
    }
    Ok(claims)
}
