pub mod auth;
pub mod gateway;
mod logging;
pub mod service;

use clap::{
    builder::{
        styling::{AnsiColor, Effects, Styles},
        ValueParser,
    },
    ColorChoice, Command,
};

pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            if parsed <= 5 {
                return Ok(parsed);
            }
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err("invalid log level".to_string()),
        }
    })
}

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("suvidha")
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(gateway::subcommand())
        .subcommand(auth::subcommand());

    logging::with_args(command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use url::Url;

    const SECRET: (&str, Option<&str>) = ("SUVIDHA_JWT_SECRET", Some("secret"));

    #[test]
    fn test_new() {
        let command = new();

        assert_eq!(command.get_name(), "suvidha");
        assert_eq!(
            command.get_about().map(ToString::to_string),
            Some(env!("CARGO_PKG_DESCRIPTION").to_string())
        );
        assert_eq!(
            command.get_version().map(ToString::to_string),
            Some(env!("CARGO_PKG_VERSION").to_string())
        );
    }

    #[test]
    fn test_subcommand_required() {
        let result = new().try_get_matches_from(vec!["suvidha"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_jwt_secret_required() {
        temp_env::with_vars([("SUVIDHA_JWT_SECRET", None::<&str>)], || {
            let result = new().try_get_matches_from(vec!["suvidha", "auth"]);
            assert_eq!(
                result.map_err(|e| e.kind()).err(),
                Some(clap::error::ErrorKind::MissingRequiredArgument)
            );
        });
    }

    #[test]
    fn test_auth_defaults() {
        temp_env::with_vars([SECRET, ("SUVIDHA_PORT", None)], || {
            let matches = new().get_matches_from(vec!["suvidha", "auth"]);
            let Some(("auth", sub)) = matches.subcommand() else {
                panic!("expected auth subcommand");
            };
            assert_eq!(sub.get_one::<u16>("port").copied(), Some(3001));
            assert_eq!(
                sub.get_one::<String>("redis-url").cloned(),
                Some("redis://localhost:6379".to_string())
            );
            assert_eq!(sub.get_one::<u8>("otp-length").copied(), Some(6));
            assert_eq!(sub.get_one::<u32>("otp-max-attempts").copied(), Some(5));
            assert_eq!(sub.get_one::<u64>("otp-lockout-seconds").copied(), Some(900));
            assert_eq!(
                sub.get_one::<Duration>("access-token-ttl").copied(),
                Some(Duration::from_secs(86_400))
            );
            assert_eq!(
                sub.get_many::<String>("cors-origins")
                    .map(|origins| origins.count()),
                Some(4)
            );
        });
    }

    #[test]
    fn test_gateway_env() {
        temp_env::with_vars(
            [
                SECRET,
                ("SUVIDHA_PORT", Some("8000")),
                ("SUVIDHA_BILLING_SERVICE_URL", Some("http://billing:4000")),
                ("SUVIDHA_RATE_LIMIT_MAX_REQUESTS", Some("10")),
                ("SUVIDHA_CORS_ORIGINS", Some("https://kiosk.gov.in,https://admin.gov.in")),
                ("SUVIDHA_ENVIRONMENT", Some("production")),
            ],
            || {
                let matches = new().get_matches_from(vec!["suvidha", "gateway"]);
                let Some(("gateway", sub)) = matches.subcommand() else {
                    panic!("expected gateway subcommand");
                };
                assert_eq!(sub.get_one::<u16>("port").copied(), Some(8000));
                assert_eq!(
                    sub.get_one::<Url>("billing-service-url").map(Url::as_str),
                    Some("http://billing:4000/")
                );
                assert_eq!(sub.get_one::<u32>("rate-limit-max-requests").copied(), Some(10));
                assert_eq!(
                    sub.get_one::<crate::server::Environment>("environment").copied(),
                    Some(crate::server::Environment::Production)
                );
                let origins: Vec<&String> = sub
                    .get_many::<String>("cors-origins")
                    .map(Iterator::collect)
                    .unwrap_or_default();
                assert_eq!(origins, ["https://kiosk.gov.in", "https://admin.gov.in"]);
            },
        );
    }

    #[test]
    fn test_invalid_ttl_rejected() {
        temp_env::with_vars([SECRET], || {
            let result = new().try_get_matches_from(vec![
                "suvidha",
                "auth",
                "--access-token-ttl",
                "forever",
            ]);
            assert_eq!(
                result.map_err(|e| e.kind()).err(),
                Some(clap::error::ErrorKind::ValueValidation)
            );
        });
    }

    #[test]
    fn test_check_log_level_env() {
        let levels = ["error", "warn", "info", "debug", "trace"];
        for (index, &level) in levels.iter().enumerate() {
            temp_env::with_vars([SECRET, ("SUVIDHA_LOG_LEVEL", Some(level))], || {
                let matches = new().get_matches_from(vec!["suvidha", "gateway"]);
                assert_eq!(
                    matches.get_one::<u8>("verbosity").copied(),
                    u8::try_from(index).ok()
                );
            });
        }
    }

    #[test]
    fn test_check_log_level_verbosity() {
        for index in 0..5usize {
            temp_env::with_vars([SECRET, ("SUVIDHA_LOG_LEVEL", None)], || {
                let mut args = vec!["suvidha".to_string(), "auth".to_string()];
                if index > 0 {
                    args.push(format!("-{}", "v".repeat(index)));
                }

                let matches = new().get_matches_from(args);
                assert_eq!(
                    matches.get_one::<u8>("verbosity").copied(),
                    u8::try_from(index).ok()
                );
            });
        }
    }
}
