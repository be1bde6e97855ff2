use crate::signup::{service::MAX_WINDOW_SECONDS, SignupConfig};
use clap::{Arg, ArgMatches, Command};

pub const ARG_CODE_TTL_SECONDS: &str = "code-ttl-seconds";
pub const ARG_RESEND_COOLDOWN_SECONDS: &str = "resend-cooldown-seconds";
pub const ARG_MAX_ATTEMPTS: &str = "max-attempts";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_CODE_TTL_SECONDS)
                .long(ARG_CODE_TTL_SECONDS)
                .help("Verification code lifetime in seconds")
                .env("EARLYSTART_CODE_TTL_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(u64).range(1..=MAX_WINDOW_SECONDS)),
        )
        .arg(
            Arg::new(ARG_RESEND_COOLDOWN_SECONDS)
                .long(ARG_RESEND_COOLDOWN_SECONDS)
                .help("Minimum seconds between code requests for the same email")
                .env("EARLYSTART_RESEND_COOLDOWN_SECONDS")
                .default_value("60")
                .value_parser(clap::value_parser!(u64).range(..=MAX_WINDOW_SECONDS)),
        )
        .arg(
            Arg::new(ARG_MAX_ATTEMPTS)
                .long(ARG_MAX_ATTEMPTS)
                .help("Wrong codes allowed before a new code must be requested")
                .env("EARLYSTART_MAX_ATTEMPTS")
                .default_value("5")
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
}

#[must_use]
pub fn parse(matches: &ArgMatches) -> SignupConfig {
    let mut config = SignupConfig::new();
    if let Some(ttl) = matches.get_one::<u64>(ARG_CODE_TTL_SECONDS) {
        config = config.with_code_ttl_seconds(*ttl);
    }
    if let Some(cooldown) = matches.get_one::<u64>(ARG_RESEND_COOLDOWN_SECONDS) {
        config = config.with_resend_cooldown_seconds(*cooldown);
    }
    if let Some(max_attempts) = matches.get_one::<u32>(ARG_MAX_ATTEMPTS) {
        config = config.with_max_attempts(*max_attempts);
    }
    config
}
