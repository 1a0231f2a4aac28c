//! One-time codes for phone login with attempt-based lockout.
//!
//! Per phone number the authenticator moves through `NONE -> ISSUED ->
//! {VERIFIED, EXPIRED, LOCKED}`. Both the code and the failure counter live in
//! the store with their own TTLs; a lockout ends only when the counter expires.

use rand::{rngs::OsRng, Rng};
use regex::Regex;
use tracing::{debug, instrument, warn};

use crate::store::{CodeCheck, SharedStore, StoreError};

#[derive(Debug, Clone)]
pub struct OtpConfig {
    pub length: usize,
    pub ttl_seconds: u64,
    pub max_attempts: u32,
    pub lockout_seconds: u64,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            length: 6,
            ttl_seconds: 300,
            max_attempts: 5,
            lockout_seconds: 900,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OtpError {
    #[error("invalid phone number")]
    InvalidPhone,
    #[error("too many failed attempts")]
    Locked,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A freshly issued code. The code is handed back so the caller can deliver
/// it; it must not be logged outside development.
#[derive(Debug, Clone)]
pub struct OtpTicket {
    pub code: String,
    pub expires_in: u64,
}

/// Ten digits, leading digit 6-9.
#[must_use]
pub fn valid_phone(phone: &str) -> bool {
    Regex::new(r"^[6-9]\d{9}$").is_ok_and(|re| re.is_match(phone))
}

/// Exactly `length` ASCII digits.
#[must_use]
pub fn valid_code(code: &str, length: usize) -> bool {
    code.len() == length && code.bytes().all(|b| b.is_ascii_digit())
}

fn otp_key(phone: &str) -> String {
    format!("otp:{phone}")
}

fn attempts_key(phone: &str) -> String {
    format!("otp_attempts:{phone}")
}

/// Each digit drawn independently and uniformly from the OS CSPRNG.
fn generate_code(length: usize) -> String {
    (0..length)
        .map(|_| char::from(b'0' + OsRng.gen_range(0..10u8)))
        .collect()
}

pub struct OtpAuthenticator {
    store: SharedStore,
    config: OtpConfig,
}

impl OtpAuthenticator {
    #[must_use]
    pub fn new(store: SharedStore, config: OtpConfig) -> Self {
        Self { store, config }
    }

    #[must_use]
    pub fn config(&self) -> &OtpConfig {
        &self.config
    }

    async fn failed_attempts(&self, phone: &str) -> Result<u32, OtpError> {
        let Some(raw) = self.store.get(&attempts_key(phone)).await? else {
            return Ok(0);
        };
        raw.parse::<u32>().map_err(|_| {
            warn!("Attempt counter holds a non-integer value");
            OtpError::Store(StoreError::Backend(
                "attempt counter is not an integer".to_string(),
            ))
        })
    }

    /// Whether the phone has reached the failed-attempt threshold.
    ///
    /// # Errors
    /// Returns an error if the store cannot be read.
    pub async fn is_locked(&self, phone: &str) -> Result<bool, OtpError> {
        Ok(self.failed_attempts(phone).await? >= self.config.max_attempts)
    }

    /// Issue a new code for `phone`, replacing any live one.
    ///
    /// # Errors
    /// `InvalidPhone` for a malformed number, `Locked` while the phone is locked
    /// out (the lockout TTL is left untouched), `Store` on storage failure.
    #[instrument(skip(self))]
    pub async fn request(&self, phone: &str) -> Result<OtpTicket, OtpError> {
        if !valid_phone(phone) {
            return Err(OtpError::InvalidPhone);
        }
        if self.is_locked(phone).await? {
            debug!("OTP request refused, phone is locked");
            return Err(OtpError::Locked);
        }

        let code = generate_code(self.config.length);
        self.store
            .set_ex(&otp_key(phone), &code, self.config.ttl_seconds)
            .await?;

        Ok(OtpTicket {
            code,
            expires_in: self.config.ttl_seconds,
        })
    }

    /// Check `code` against the live code for `phone`.
    ///
    /// Returns `Ok(false)` when no code is live (the counter is not touched) or
    /// on mismatch (the counter is incremented). On a match the code and the
    /// counter are both removed. The lock check, comparison and counter update
    /// run as one store operation, so concurrent guesses cannot get past the
    /// threshold.
    ///
    /// # Errors
    /// `InvalidPhone`, `Locked` while locked out, or `Store`.
    #[instrument(skip(self, code))]
    pub async fn verify(&self, phone: &str, code: &str) -> Result<bool, OtpError> {
        if !valid_phone(phone) {
            return Err(OtpError::InvalidPhone);
        }

        let outcome = self
            .store
            .check_code(
                &otp_key(phone),
                &attempts_key(phone),
                code,
                self.config.max_attempts,
                self.config.lockout_seconds,
            )
            .await?;

        match outcome {
            CodeCheck::Locked => {
                debug!("OTP verification refused, phone is locked");
                Err(OtpError::Locked)
            }
            CodeCheck::Missing => {
                debug!("No live OTP");
                Ok(false)
            }
            CodeCheck::Matched => Ok(true),
            CodeCheck::Mismatched(failures) => {
                debug!(failures, "OTP mismatch");
                Ok(false)
            }
        }
    }
}
