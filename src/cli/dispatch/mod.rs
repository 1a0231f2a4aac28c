use crate::{
    cli::actions::{auth, gateway, Action, ServiceArgs},
    gateway::Upstreams,
    otp::OtpConfig,
    server::Environment,
};
use anyhow::{anyhow, Context, Result};
use clap::ArgMatches;
use secrecy::SecretString;
use std::time::Duration;
use url::Url;

fn required<T: Clone + Send + Sync + 'static>(matches: &ArgMatches, id: &str) -> Result<T> {
    matches
        .get_one::<T>(id)
        .cloned()
        .with_context(|| format!("missing required argument: --{id}"))
}

fn service_args(matches: &ArgMatches) -> Result<ServiceArgs> {
    Ok(ServiceArgs {
        port: required(matches, "port")?,
        environment: matches
            .get_one::<Environment>("environment")
            .copied()
            .unwrap_or_default(),
        jwt_secret: SecretString::from(required::<String>(matches, "jwt-secret")?),
        access_token_ttl: required(matches, "access-token-ttl")?,
        refresh_token_ttl: required(matches, "refresh-token-ttl")?,
        cors_origins: matches
            .get_many::<String>("cors-origins")
            .map(|origins| origins.cloned().collect())
            .unwrap_or_default(),
    })
}

fn auth_args(matches: &ArgMatches) -> Result<auth::Args> {
    let otp = OtpConfig {
        length: usize::from(required::<u8>(matches, "otp-length")?),
        ttl_seconds: required(matches, "otp-ttl-seconds")?,
        max_attempts: required(matches, "otp-max-attempts")?,
        lockout_seconds: required(matches, "otp-lockout-seconds")?,
    };

    Ok(auth::Args {
        service: service_args(matches)?,
        redis_url: required(matches, "redis-url")?,
        store_timeout: Duration::from_millis(required(matches, "store-timeout-ms")?),
        otp,
    })
}

fn gateway_args(matches: &ArgMatches) -> Result<gateway::Args> {
    let upstreams = Upstreams {
        auth: required::<Url>(matches, "auth-service-url")?,
        billing: required::<Url>(matches, "billing-service-url")?,
        grievance: required::<Url>(matches, "grievance-service-url")?,
    };
    let max_requests = required::<u32>(matches, "rate-limit-max-requests")?;

    Ok(gateway::Args {
        service: service_args(matches)?,
        upstreams,
        proxy_timeout: Duration::from_secs(required(matches, "proxy-timeout-seconds")?),
        rate_limit_window: Duration::from_millis(required(matches, "rate-limit-window-ms")?),
        rate_limit_max_requests: usize::try_from(max_requests)?,
        trust_forwarded_for: matches.get_flag("trust-forwarded-for"),
        admin_token: matches
            .get_one::<String>("admin-token")
            .filter(|token| !token.is_empty())
            .cloned()
            .map(SecretString::from),
    })
}

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &ArgMatches) -> Result<Action> {
    match matches.subcommand() {
        Some(("auth", sub)) => Ok(Action::Auth(auth_args(sub)?)),
        Some(("gateway", sub)) => Ok(Action::Gateway(gateway_args(sub)?)),
        _ => Err(anyhow!("unknown subcommand")),
    }
}
