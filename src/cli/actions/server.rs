use crate::{
    api::{self, email::SmtpConfig, Environment, ServerOptions},
    signup::SignupConfig,
};
use anyhow::Result;
use secrecy::SecretString;
use std::time::Duration;
use tracing::debug;

#[derive(Debug)]
pub struct Args {
    pub environment: Environment,
    pub port: u16,
    pub dsn: SecretString,
    pub frontend_url: String,
    pub backend_url: String,
    pub admin_token: Option<SecretString>,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<SecretString>,
    pub smtp_timeout: Duration,
    pub from_email: Option<String>,
    pub from_name: String,
    pub signup: SignupConfig,
}

impl Args {
    fn into_options(self) -> ServerOptions {
        let smtp = SmtpConfig {
            host: self.smtp_host,
            port: self.smtp_port,
            username: self.smtp_username,
            password: self.smtp_password,
            from_email: self.from_email,
            from_name: self.from_name,
            timeout: self.smtp_timeout,
            backend_url: self.backend_url,
        };

        ServerOptions {
            port: self.port,
            dsn: self.dsn,
            environment: self.environment,
            frontend_url: self.frontend_url,
            admin_token: self.admin_token,
            smtp,
            signup: self.signup,
        }
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database bootstrap, email sender, or server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    debug!(
        environment = %args.environment,
        port = args.port,
        smtp_host = %args.smtp_host,
        "starting server"
    );

    api::new(args.into_options()).await
}
