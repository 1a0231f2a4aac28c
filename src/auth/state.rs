//! Auth service configuration and the state shared by its handlers.

use crate::{
    otp::{OtpAuthenticator, OtpConfig},
    server::Environment,
    session::SessionRegistry,
    store::SharedStore,
    token::TokenService,
};

#[derive(Clone, Debug, Default)]
pub struct AuthConfig {
    environment: Environment,
    otp: OtpConfig,
}

impl AuthConfig {
    #[must_use]
    pub fn new(environment: Environment) -> Self {
        Self {
            environment,
            otp: OtpConfig::default(),
        }
    }

    #[must_use]
    pub fn with_otp(mut self, otp: OtpConfig) -> Self {
        self.otp = otp;
        self
    }

    #[must_use]
    pub fn environment(&self) -> Environment {
        self.environment
    }

    #[must_use]
    pub fn otp(&self) -> &OtpConfig {
        &self.otp
    }

    /// Static lockout wording; never reveals the time actually remaining.
    pub(super) fn lockout_minutes(&self) -> u64 {
        self.otp.lockout_seconds.div_ceil(60)
    }
}

pub struct AuthState {
    config: AuthConfig,
    store: SharedStore,
    tokens: TokenService,
    otp: OtpAuthenticator,
    sessions: SessionRegistry,
}

impl AuthState {
    #[must_use]
    pub fn new(config: AuthConfig, store: SharedStore, tokens: TokenService) -> Self {
        let otp = OtpAuthenticator::new(store.clone(), config.otp().clone());
        let sessions = SessionRegistry::new(store.clone(), tokens.refresh_ttl());

        Self {
            config,
            store,
            tokens,
            otp,
            sessions,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    #[must_use]
    pub fn otp(&self) -> &OtpAuthenticator {
        &self.otp
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }
}
