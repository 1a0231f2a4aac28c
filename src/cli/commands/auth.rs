use clap::{Arg, Command};

use super::service;

#[must_use]
pub fn subcommand() -> Command {
    let command = Command::new("auth")
        .about("Run the auth service (OTP login, tokens, sessions)")
        .arg(
            Arg::new("redis-url")
                .long("redis-url")
                .help("Redis connection URL, or memory:// for an in-process store")
                .default_value("redis://localhost:6379")
                .env("SUVIDHA_REDIS_URL"),
        )
        .arg(
            Arg::new("store-timeout-ms")
                .long("store-timeout-ms")
                .help("Timeout for each store call in milliseconds")
                .default_value("2000")
                .env("SUVIDHA_STORE_TIMEOUT_MS")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("otp-length")
                .long("otp-length")
                .help("Number of digits in an OTP")
                .default_value("6")
                .env("SUVIDHA_OTP_LENGTH")
                .value_parser(clap::value_parser!(u8).range(4..=10)),
        )
        .arg(
            Arg::new("otp-ttl-seconds")
                .long("otp-ttl-seconds")
                .help("OTP lifetime in seconds")
                .default_value("300")
                .env("SUVIDHA_OTP_TTL_SECONDS")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("otp-max-attempts")
                .long("otp-max-attempts")
                .help("Failed verifications before the phone is locked out")
                .default_value("5")
                .env("SUVIDHA_OTP_MAX_ATTEMPTS")
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new("otp-lockout-seconds")
                .long("otp-lockout-seconds")
                .help("Lockout duration in seconds")
                .default_value("900")
                .env("SUVIDHA_OTP_LOCKOUT_SECONDS")
                .value_parser(clap::value_parser!(u64).range(1..)),
        );

    service::with_args(command, "3001")
}
