pub mod auth;
pub mod gateway;

mod run;

use anyhow::{Context, Result};
use axum::http::HeaderValue;
use secrecy::SecretString;
use std::time::Duration;

use crate::{server::Environment, token::TokenService};

/// Settings both services share.
#[derive(Debug)]
pub struct ServiceArgs {
    pub port: u16,
    pub environment: Environment,
    pub jwt_secret: SecretString,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub cors_origins: Vec<String>,
}

impl ServiceArgs {
    #[must_use]
    pub fn token_service(&self) -> TokenService {
        TokenService::new(
            &self.jwt_secret,
            self.access_token_ttl,
            self.refresh_token_ttl,
        )
    }

    /// # Errors
    /// Returns an error if an origin is not a valid header value
    pub fn cors_origins(&self) -> Result<Vec<HeaderValue>> {
        self.cors_origins
            .iter()
            .map(|origin| {
                HeaderValue::from_str(origin.trim())
                    .with_context(|| format!("invalid CORS origin: {origin}"))
            })
            .collect()
    }
}

#[derive(Debug)]
pub enum Action {
    Auth(auth::Args),
    Gateway(gateway::Args),
}

impl Action {
    /// Execute the action.
    /// # Errors
    /// Returns an error if the action fails.
    pub async fn execute(self) -> Result<()> {
        run::execute(self).await
    }
}
