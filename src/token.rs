//! Access/refresh token pairs signed with a shared `HS256` secret.
//!
//! Verification is offline and stateless, which is what lets the gateway
//! authorize requests without a round trip to the auth service. The service
//! does not check the token kind: callers compare [`TokenClaims::kind`] against
//! what they expect.

use chrono::Utc;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;
use ulid::Ulid;

/// Number of hex characters of a fingerprint used in session keys.
pub const FINGERPRINT_PREFIX_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject id.
    pub id: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "type")]
    pub kind: TokenKind,
    /// Unique per token so two pairs minted in the same second never collide.
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_ttl_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum VerificationError {
    #[error("token expired")]
    Expired,
    #[error("token malformed")]
    Malformed,
}

#[derive(Debug, thiserror::Error)]
#[error("failed to sign token: {0}")]
pub struct SigningError(#[from] jsonwebtoken::errors::Error);

pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    #[must_use]
    pub fn new(secret: &SecretString, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        let secret = secret.expose_secret().as_bytes();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            access_ttl,
            refresh_ttl,
        }
    }

    #[must_use]
    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    #[must_use]
    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Mint an access/refresh pair for a subject.
    ///
    /// # Errors
    /// Returns an error if signing fails.
    pub fn issue(
        &self,
        subject_id: &str,
        phone: &str,
        email: Option<&str>,
    ) -> Result<TokenPair, SigningError> {
        let now = Utc::now().timestamp();
        let claims = |kind: TokenKind, ttl: Duration| TokenClaims {
            id: subject_id.to_string(),
            phone: phone.to_string(),
            email: email.map(str::to_string),
            kind,
            jti: Ulid::new().to_string(),
            iat: now,
            exp: now.saturating_add(i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX)),
        };

        Ok(TokenPair {
            access_token: self.sign(&claims(TokenKind::Access, self.access_ttl))?,
            refresh_token: self.sign(&claims(TokenKind::Refresh, self.refresh_ttl))?,
            access_ttl_seconds: self.access_ttl.as_secs(),
        })
    }

    /// Check signature and expiry and return the claims.
    ///
    /// # Errors
    /// `Expired` for a well-formed token past its `exp`; `Malformed` for
    /// anything else, including a signature made with another secret.
    pub fn verify(&self, token: &str) -> Result<TokenClaims, VerificationError> {
        decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => VerificationError::Expired,
                _ => VerificationError::Malformed,
            })
    }

    fn sign(&self, claims: &TokenClaims) -> Result<String, SigningError> {
        Ok(encode(
            &Header::new(Algorithm::HS256),
            claims,
            &self.encoding_key,
        )?)
    }
}

/// One-way digest of a token for session bookkeeping (hex SHA-256).
#[must_use]
pub fn fingerprint(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Leading part of a fingerprint used to key a session record.
#[must_use]
pub fn fingerprint_prefix(fingerprint: &str) -> &str {
    fingerprint
        .get(..FINGERPRINT_PREFIX_LEN)
        .unwrap_or(fingerprint)
}
