//! # Suvidha (Gateway & Authentication)
//!
//! `suvidha` is the ingress and identity layer of the citizen utility portal.
//! It ships two services from one binary:
//!
//! - **auth**: OTP-driven login for mobile numbers, `HS256` access/refresh
//!   token pairs, and an advisory session registry kept in Redis.
//! - **gateway**: the single public entry point. It rate-limits clients,
//!   verifies bearer tokens offline, forwards requests to the auth, billing and
//!   grievance backends, and relays operator broadcasts over WebSocket.
//!
//! ## Identity
//!
//! Tokens are self-contained: the gateway never calls the auth service to
//! authorize a request. Every consumer checks the token `type` claim, so an
//! `access` token cannot be used to refresh and a `refresh` token cannot be used
//! to call an API.
//!
//! ## Store Layout
//!
//! | Key | Value | TTL |
//! |---|---|---|
//! | `otp:{phone}` | zero-padded code | OTP lifetime |
//! | `otp_attempts:{phone}` | failed attempt count | lockout duration |
//! | `session:{subject}:{fingerprint_prefix}` | JSON session record | refresh lifetime |
//!
//! Session records are advisory: refresh succeeds on signature, expiry and kind
//! alone.

pub mod auth;
pub mod bearer;
pub mod cli;
pub mod error;
pub mod gateway;
pub mod otp;
pub mod server;
pub mod session;
pub mod store;
pub mod token;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

/// Current UTC time formatted the way every JSON body in this crate reports it.
#[must_use]
pub fn timestamp_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn timestamp_is_rfc3339_utc() {
        let now = timestamp_now();
        assert!(now.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(&now).is_ok());
    }
}
