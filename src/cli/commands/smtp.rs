use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;
use std::time::Duration;

pub const ARG_SMTP_HOST: &str = "smtp-host";
pub const ARG_SMTP_PORT: &str = "smtp-port";
pub const ARG_SMTP_USERNAME: &str = "smtp-username";
pub const ARG_SMTP_PASSWORD: &str = "smtp-password";
pub const ARG_SMTP_TIMEOUT_SECONDS: &str = "smtp-timeout-seconds";
pub const ARG_FROM_EMAIL: &str = "from-email";
pub const ARG_FROM_NAME: &str = "from-name";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SMTP_HOST)
                .long(ARG_SMTP_HOST)
                .help("SMTP relay host")
                .env("EARLYSTART_SMTP_HOST")
                .default_value("smtp.gmail.com"),
        )
        .arg(
            Arg::new(ARG_SMTP_PORT)
                .long(ARG_SMTP_PORT)
                .help("SMTP relay port (465 uses implicit TLS, anything else STARTTLS)")
                .env("EARLYSTART_SMTP_PORT")
                .default_value("587")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_SMTP_USERNAME)
                .long(ARG_SMTP_USERNAME)
                .help("SMTP username")
                .env("EARLYSTART_SMTP_USERNAME"),
        )
        .arg(
            Arg::new(ARG_SMTP_PASSWORD)
                .long(ARG_SMTP_PASSWORD)
                .help("SMTP password")
                .env("EARLYSTART_SMTP_PASSWORD")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_SMTP_TIMEOUT_SECONDS)
                .long(ARG_SMTP_TIMEOUT_SECONDS)
                .help("Timeout for a single SMTP submission")
                .env("EARLYSTART_SMTP_TIMEOUT_SECONDS")
                .default_value("10")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_FROM_EMAIL)
                .long(ARG_FROM_EMAIL)
                .help("Sender address for verification emails")
                .env("EARLYSTART_FROM_EMAIL"),
        )
        .arg(
            Arg::new(ARG_FROM_NAME)
                .long(ARG_FROM_NAME)
                .help("Sender display name, also used as the brand in emails")
                .env("EARLYSTART_FROM_NAME")
                .default_value("Earlystart"),
        )
}

#[derive(Debug)]
pub struct Options {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub timeout: Duration,
    pub from_email: Option<String>,
    pub from_name: String,
}

impl Options {
    /// # Errors
    /// Returns an error if a defaulted argument is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        Ok(Self {
            host: matches
                .get_one::<String>(ARG_SMTP_HOST)
                .cloned()
                .context("missing required argument: --smtp-host")?,
            port: matches.get_one::<u16>(ARG_SMTP_PORT).copied().unwrap_or(587),
            username: matches.get_one::<String>(ARG_SMTP_USERNAME).cloned(),
            password: matches
                .get_one::<String>(ARG_SMTP_PASSWORD)
                .map(|password| SecretString::from(password.clone())),
            timeout: Duration::from_secs(
                matches
                    .get_one::<u64>(ARG_SMTP_TIMEOUT_SECONDS)
                    .copied()
                    .unwrap_or(10),
            ),
            from_email: matches.get_one::<String>(ARG_FROM_EMAIL).cloned(),
            from_name: matches
                .get_one::<String>(ARG_FROM_NAME)
                .cloned()
                .unwrap_or_else(|| "Earlystart".to_string()),
        })
    }
}
