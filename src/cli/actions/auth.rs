use anyhow::{Context, Result};
use std::{sync::Arc, time::Duration};
use tracing::{debug, info};

use crate::{
    auth::{self, AuthConfig, AuthState},
    cli::actions::ServiceArgs,
    otp::OtpConfig,
    store::{self, MEMORY_STORE_URL},
};

#[derive(Debug)]
pub struct Args {
    pub service: ServiceArgs,
    pub redis_url: String,
    pub store_timeout: Duration,
    pub otp: OtpConfig,
}

/// Execute the auth service action.
/// # Errors
/// Returns an error if the store is unreachable or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let store = store::connect(&args.redis_url, args.store_timeout)
        .await
        .context("Could not connect to the session store")?;
    store
        .ping()
        .await
        .context("Session store did not answer a ping")?;
    info!("Session store connected");

    let config = AuthConfig::new(args.service.environment).with_otp(args.otp);
    let state = Arc::new(AuthState::new(
        config,
        store,
        args.service.token_service(),
    ));

    auth::new(args.service.port, state, args.service.cors_origins()?).await
}

fn log_startup_args(args: &Args) {
    let store = if args.redis_url == MEMORY_STORE_URL {
        "memory"
    } else {
        "redis"
    };
    info!(
        port = args.service.port,
        environment = %args.service.environment,
        store,
        "Starting auth service"
    );
    debug!(
        access_ttl = args.service.access_token_ttl.as_secs(),
        refresh_ttl = args.service.refresh_token_ttl.as_secs(),
        otp_length = args.otp.length,
        otp_ttl = args.otp.ttl_seconds,
        max_attempts = args.otp.max_attempts,
        lockout = args.otp.lockout_seconds,
        "Auth settings"
    );
}
