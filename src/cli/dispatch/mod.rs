//! Map validated CLI arguments to an action.
//!
//! Production startup refuses to continue while any required setting is
//! missing; development only warns about insecure defaults.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{database, server, signup, smtp};
use anyhow::{anyhow, Result};
use secrecy::{ExposeSecret, SecretString};
use tracing::{info, warn};
use url::Url;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing, or if production
/// configuration is incomplete.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let server_opts = server::Options::parse(matches)?;
    let database_opts = database::Options::parse(matches)?;
    let smtp_opts = smtp::Options::parse(matches)?;

    let args = Args {
        environment: server_opts.environment,
        port: server_opts.port,
        dsn: database_opts.dsn,
        frontend_url: server_opts.frontend_url,
        backend_url: server_opts.backend_url,
        admin_token: server_opts.admin_token,
        smtp_host: smtp_opts.host,
        smtp_port: smtp_opts.port,
        smtp_username: smtp_opts.username,
        smtp_password: smtp_opts.password,
        smtp_timeout: smtp_opts.timeout,
        from_email: smtp_opts.from_email,
        from_name: smtp_opts.from_name,
        signup: signup::parse(matches),
    };

    if weak_database_password(&args.dsn) {
        warn!("Using default or empty database password; set EARLYSTART_DSN for production");
    }

    if args.environment.is_production() {
        let missing = missing_production_settings(&args);
        if !missing.is_empty() {
            return Err(anyhow!(
                "missing required environment variables for production: {}",
                missing.join(", ")
            ));
        }
        info!("Production environment validation passed");
    }

    Ok(Action::Server(args))
}

fn weak_database_password(dsn: &SecretString) -> bool {
    Url::parse(dsn.expose_secret())
        .ok()
        .and_then(|url| url.password().map(str::to_string))
        .is_none_or(|password| password.is_empty() || password == "postgres")
}

fn blank(value: Option<&str>) -> bool {
    value.is_none_or(|value| value.trim().is_empty())
}

/// Environment variables that must be set before serving production traffic.
pub(crate) fn missing_production_settings(args: &Args) -> Vec<&'static str> {
    let mut missing = Vec::new();

    if weak_database_password(&args.dsn) {
        missing.push("EARLYSTART_DSN");
    }
    if blank(Some(args.frontend_url.as_str())) {
        missing.push("EARLYSTART_FRONTEND_URL");
    }
    if blank(Some(args.backend_url.as_str())) {
        missing.push("EARLYSTART_BACKEND_URL");
    }
    if blank(Some(args.smtp_host.as_str())) {
        missing.push("EARLYSTART_SMTP_HOST");
    }
    if args.smtp_port == 0 {
        missing.push("EARLYSTART_SMTP_PORT");
    }
    if blank(args.smtp_username.as_deref()) {
        missing.push("EARLYSTART_SMTP_USERNAME");
    }
    if blank(args.smtp_password.as_ref().map(|password| password.expose_secret())) {
        missing.push("EARLYSTART_SMTP_PASSWORD");
    }
    if blank(args.from_email.as_deref()) {
        missing.push("EARLYSTART_FROM_EMAIL");
    }
    if blank(args.admin_token.as_ref().map(|token| token.expose_secret())) {
        missing.push("EARLYSTART_ADMIN_TOKEN");
    }

    missing
}
