use crate::api::Environment;
use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_ENVIRONMENT: &str = "environment";
pub const ARG_PORT: &str = "port";
pub const ARG_FRONTEND_URL: &str = "frontend-url";
pub const ARG_BACKEND_URL: &str = "backend-url";
pub const ARG_ADMIN_TOKEN: &str = "admin-token";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_ENVIRONMENT)
                .short('e')
                .long(ARG_ENVIRONMENT)
                .help("Deployment environment: development or production")
                .env("EARLYSTART_ENVIRONMENT")
                .default_value("development")
                .value_parser(clap::value_parser!(Environment)),
        )
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long(ARG_PORT)
                .help("Port to listen on")
                .default_value("8080")
                .env("EARLYSTART_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_FRONTEND_URL)
                .long(ARG_FRONTEND_URL)
                .help("Frontend URL allowed by CORS")
                .env("EARLYSTART_FRONTEND_URL")
                .default_value("http://localhost:3000"),
        )
        .arg(
            Arg::new(ARG_BACKEND_URL)
                .long(ARG_BACKEND_URL)
                .help("Public base URL of this service, used for the tracking pixel")
                .env("EARLYSTART_BACKEND_URL")
                .default_value("http://localhost:8080"),
        )
        .arg(
            Arg::new(ARG_ADMIN_TOKEN)
                .long(ARG_ADMIN_TOKEN)
                .help("Bearer token required by /admin/list")
                .long_help(
                    "Bearer token required by /admin/list. Required in production; when unset in development the listing is open.",
                )
                .env("EARLYSTART_ADMIN_TOKEN")
                .hide_env_values(true),
        )
}

#[derive(Debug)]
pub struct Options {
    pub environment: Environment,
    pub port: u16,
    pub frontend_url: String,
    pub backend_url: String,
    pub admin_token: Option<SecretString>,
}

impl Options {
    /// # Errors
    /// Returns an error if a defaulted argument is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        Ok(Self {
            environment: matches
                .get_one::<Environment>(ARG_ENVIRONMENT)
                .copied()
                .unwrap_or_default(),
            port: matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080),
            frontend_url: matches
                .get_one::<String>(ARG_FRONTEND_URL)
                .cloned()
                .context("missing required argument: --frontend-url")?,
            backend_url: matches
                .get_one::<String>(ARG_BACKEND_URL)
                .cloned()
                .context("missing required argument: --backend-url")?,
            admin_token: matches
                .get_one::<String>(ARG_ADMIN_TOKEN)
                .map(|token| SecretString::from(token.clone())),
        })
    }
}
