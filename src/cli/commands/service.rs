use clap::{Arg, Command};
use std::time::Duration;

use crate::server::Environment;

pub const DEFAULT_CORS_ORIGINS: [&str; 4] = [
    "http://localhost:5173",
    "http://localhost:5174",
    "http://localhost:8080",
    "http://localhost:8081",
];

/// Parse `<n>{s|m|h|d}` into a non-zero duration.
///
/// # Errors
/// Returns an error string if the unit is unknown or the amount is not a
/// positive integer.
pub fn parse_ttl(value: &str) -> Result<Duration, String> {
    let value = value.trim();
    let unit = value
        .chars()
        .last()
        .ok_or_else(|| "empty duration".to_string())?;
    let multiplier = match unit {
        's' => 1,
        'm' => 60,
        'h' => 60 * 60,
        'd' => 24 * 60 * 60,
        _ => return Err(format!("invalid duration unit in {value:?}, use s, m, h or d")),
    };

    let amount = value[..value.len() - unit.len_utf8()]
        .parse::<u64>()
        .map_err(|_| format!("invalid duration amount in {value:?}"))?;
    if amount == 0 {
        return Err("duration must be greater than zero".to_string());
    }

    amount
        .checked_mul(multiplier)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration {value:?} is too large"))
}

/// Flags every service takes: listener, environment, token signing, CORS.
pub fn with_args(command: Command, default_port: &'static str) -> Command {
    command
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value(default_port)
                .env("SUVIDHA_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("environment")
                .long("environment")
                .help("development exposes OTP codes in responses and logs")
                .default_value("development")
                .env("SUVIDHA_ENVIRONMENT")
                .value_parser(clap::value_parser!(Environment)),
        )
        .arg(
            Arg::new("jwt-secret")
                .long("jwt-secret")
                .help("HS256 secret shared by the gateway and the auth service")
                .env("SUVIDHA_JWT_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new("access-token-ttl")
                .long("access-token-ttl")
                .help("Access token lifetime, e.g. 15m, 24h")
                .default_value("24h")
                .env("SUVIDHA_ACCESS_TOKEN_TTL")
                .value_parser(parse_ttl),
        )
        .arg(
            Arg::new("refresh-token-ttl")
                .long("refresh-token-ttl")
                .help("Refresh token lifetime, e.g. 7d")
                .default_value("7d")
                .env("SUVIDHA_REFRESH_TOKEN_TTL")
                .value_parser(parse_ttl),
        )
        .arg(
            Arg::new("cors-origins")
                .long("cors-origins")
                .help("Comma separated list of allowed browser origins")
                .default_values(DEFAULT_CORS_ORIGINS)
                .env("SUVIDHA_CORS_ORIGINS")
                .value_delimiter(','),
        )
}
