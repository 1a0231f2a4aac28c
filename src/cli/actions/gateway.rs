use anyhow::{Context, Result};
use secrecy::SecretString;
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, warn};

use crate::{
    cli::actions::ServiceArgs,
    gateway::{self, GatewayConfig, GatewayState, Upstreams},
};

#[derive(Debug)]
pub struct Args {
    pub service: ServiceArgs,
    pub upstreams: Upstreams,
    pub proxy_timeout: Duration,
    pub rate_limit_window: Duration,
    pub rate_limit_max_requests: usize,
    pub trust_forwarded_for: bool,
    pub admin_token: Option<SecretString>,
}

/// Execute the gateway action.
/// # Errors
/// Returns an error if the HTTP client cannot be built or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let config = GatewayConfig::new(args.service.environment, args.upstreams)
        .with_proxy_timeout(args.proxy_timeout)
        .with_rate_limit(args.rate_limit_window, args.rate_limit_max_requests)
        .with_trust_forwarded_for(args.trust_forwarded_for)
        .with_admin_token(args.admin_token);

    let state = GatewayState::new(config, args.service.token_service())
        .context("Failed to build the proxy client")?;

    gateway::new(
        args.service.port,
        Arc::new(state),
        args.service.cors_origins()?,
    )
    .await
}

fn log_startup_args(args: &Args) {
    info!(
        port = args.service.port,
        environment = %args.service.environment,
        "Starting gateway"
    );
    debug!(
        window_ms = u64::try_from(args.rate_limit_window.as_millis()).unwrap_or(u64::MAX),
        max_requests = args.rate_limit_max_requests,
        proxy_timeout = args.proxy_timeout.as_secs(),
        trust_forwarded_for = args.trust_forwarded_for,
        "Gateway settings"
    );
    if args.admin_token.is_none() {
        warn!("No admin token configured, /admin endpoints are open");
    }
}
