use clap::{Arg, ArgAction, Command};

use super::validator_log_level;

pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("verbosity")
                .short('v')
                .long("verbose")
                .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
                .env("SUVIDHA_LOG_LEVEL")
                .global(true)
                .action(ArgAction::Count)
                .value_parser(validator_log_level()),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .help("Emit logs as JSON lines")
                .env("SUVIDHA_LOG_JSON")
                .global(true)
                .action(ArgAction::SetTrue),
        )
}
