use clap::{Arg, ArgAction, Command};
use url::Url;

use super::service;

#[must_use]
pub fn subcommand() -> Command {
    let command = Command::new("gateway")
        .about("Run the API gateway")
        .arg(
            Arg::new("auth-service-url")
                .long("auth-service-url")
                .help("Base URL of the auth service")
                .default_value("http://localhost:3001")
                .env("SUVIDHA_AUTH_SERVICE_URL")
                .value_parser(clap::value_parser!(Url)),
        )
        .arg(
            Arg::new("billing-service-url")
                .long("billing-service-url")
                .help("Base URL of the billing service")
                .default_value("http://localhost:3002")
                .env("SUVIDHA_BILLING_SERVICE_URL")
                .value_parser(clap::value_parser!(Url)),
        )
        .arg(
            Arg::new("grievance-service-url")
                .long("grievance-service-url")
                .help("Base URL of the grievance service")
                .default_value("http://localhost:3003")
                .env("SUVIDHA_GRIEVANCE_SERVICE_URL")
                .value_parser(clap::value_parser!(Url)),
        )
        .arg(
            Arg::new("proxy-timeout-seconds")
                .long("proxy-timeout-seconds")
                .help("Timeout for each forwarded request in seconds")
                .default_value("30")
                .env("SUVIDHA_PROXY_TIMEOUT_SECONDS")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("rate-limit-window-ms")
                .long("rate-limit-window-ms")
                .help("Rate limit window in milliseconds")
                .default_value("60000")
                .env("SUVIDHA_RATE_LIMIT_WINDOW_MS")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("rate-limit-max-requests")
                .long("rate-limit-max-requests")
                .help("Requests admitted per client within the window")
                .default_value("100")
                .env("SUVIDHA_RATE_LIMIT_MAX_REQUESTS")
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new("trust-forwarded-for")
                .long("trust-forwarded-for")
                .help("Rate limit on X-Forwarded-For / X-Real-IP instead of the socket peer")
                .env("SUVIDHA_TRUST_FORWARDED_FOR")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("admin-token")
                .long("admin-token")
                .help("Require this value in X-Admin-Token for /admin endpoints")
                .env("SUVIDHA_ADMIN_TOKEN")
                .hide_env_values(true),
        );

    service::with_args(command, "3000")
}
