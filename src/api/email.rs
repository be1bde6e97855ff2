//! Verification email composition and SMTP delivery.
//!
//! Delivery is synchronous and best effort: the signup handler awaits the send
//! inline (bounded by the SMTP transport timeout) and records the outcome as
//! `email_sent`. There is no retry queue.
//!
//! `SmtpEmailSender` submits over STARTTLS (or implicit TLS on port 465) with
//! credentials. When no credentials are configured, `DisabledEmailSender` is used
//! instead; it logs and reports failure so signups are stored as not dispatched.
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::TimeDelta;
use lettre::{
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
    Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use secrecy::{ExposeSecret, SecretString};
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};

use crate::APP_USER_AGENT;

const IMPLICIT_TLS_PORT: u16 = 465;

/// Delivery abstraction for verification emails.
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Deliver the code to `to`, embedding `tracking_token` in the open pixel.
    /// `valid_for` is the code lifetime stated in the message.
    async fn send_verification_email(
        &self,
        to: &str,
        code: &str,
        tracking_token: &str,
        valid_for: TimeDelta,
    ) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationEmail {
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// URL of the 1x1 open-tracking pixel for a token.
#[must_use]
pub fn pixel_url(backend_url: &str, tracking_token: &str) -> String {
    let base = backend_url.trim_end_matches('/');
    format!("{base}/engagement/{tracking_token}.png")
}

/// Human wording for a code lifetime, rounded up to whole minutes past one minute.
#[must_use]
pub fn describe_lifetime(valid_for: TimeDelta) -> String {
    let seconds = valid_for.num_seconds().max(1);
    if seconds < 60 {
        return plural(seconds, "second");
    }
    let minutes = (seconds + 59) / 60;
    if minutes % 60 == 0 {
        plural(minutes / 60, "hour")
    } else {
        plural(minutes, "minute")
    }
}

fn plural(count: i64, unit: &str) -> String {
    if count == 1 {
        format!("1 {unit}")
    } else {
        format!("{count} {unit}s")
    }
}

/// Build the HTML and plain-text bodies for a verification code.
#[must_use]
pub fn compose_verification_email(
    brand: &str,
    backend_url: &str,
    code: &str,
    tracking_token: &str,
    valid_for: TimeDelta,
) -> VerificationEmail {
    let pixel = pixel_url(backend_url, tracking_token);
    let lifetime = describe_lifetime(valid_for);

    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta http-equiv="Content-Type" content="text/html; charset=utf-8">
</head>
<body>
<div style='font-family: "system-ui",-apple-system,BlinkMacSystemFont,Segoe UI,Roboto,sans-serif; max-width: 600px; margin: 0 auto; padding: 1rem;'>
  <p>Hi there,</p>
  <p>Thanks for signing up for early access to {brand}! Please use the verification code below to complete your signup:</p>
  <pre style="text-align: center; background-color: #ebebeb; font-size: 1.5em; border-radius: 4px; padding: 8px 0;"><b>{code}</b></pre>
  <p>This code will expire in {lifetime}.</p>
  <p>Tip: you can triple-click the box to copy-paste the whole thing.</p>
  <p>- The {brand} Team</p>
</div>
<div style="height:1px;background:url('{pixel}')"></div>
</body>
</html>"#
    );

    let text = format!(
        "Hi there,\n\nThanks for signing up for early access to {brand}! Please use the verification code below to complete your signup:\n\n{code}\n\nThis code will expire in {lifetime}.\n\n- The {brand} Team"
    );

    VerificationEmail {
        subject: format!("Your {brand} Verification Code"),
        html,
        text,
    }
}

#[derive(Clone, Debug)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub from_email: Option<String>,
    pub from_name: String,
    pub timeout: Duration,
    pub backend_url: String,
}

impl SmtpConfig {
    /// Both username and a non-empty password are present.
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        let username = self.username.as_deref().is_some_and(|u| !u.is_empty());
        let password = self
            .password
            .as_ref()
            .is_some_and(|p| !p.expose_secret().is_empty());
        username && password
    }
}

pub struct SmtpEmailSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    brand: String,
    backend_url: String,
}

impl SmtpEmailSender {
    /// Build an authenticated, TLS-only SMTP sender.
    ///
    /// # Errors
    /// Returns an error if the sender address is missing or invalid, credentials are
    /// missing, or the relay cannot be configured.
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let from_email = config
            .from_email
            .as_deref()
            .filter(|email| !email.is_empty())
            .ok_or_else(|| anyhow!("missing sender address"))?;
        let address: Address = from_email
            .parse()
            .with_context(|| format!("invalid sender address: {from_email}"))?;
        let from = Mailbox::new(Some(config.from_name.clone()), address);

        let (Some(username), Some(password)) = (&config.username, &config.password) else {
            return Err(anyhow!("SMTP username and password are required"));
        };
        let credentials = Credentials::new(
            username.clone(),
            password.expose_secret().to_string(),
        );

        let relay = if config.port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
        };
        let builder =
            relay.with_context(|| format!("failed to configure SMTP relay {}", config.host))?;

        let transport = builder
            .port(config.port)
            .credentials(credentials)
            .timeout(Some(config.timeout))
            .build();

        Ok(Self {
            transport,
            from,
            brand: config.from_name.clone(),
            backend_url: config.backend_url.clone(),
        })
    }
}

#[async_trait]
impl EmailSender for SmtpEmailSender {
    async fn send_verification_email(
        &self,
        to: &str,
        code: &str,
        tracking_token: &str,
        valid_for: TimeDelta,
    ) -> Result<()> {
        let to_mailbox: Mailbox = to
            .parse()
            .with_context(|| format!("invalid recipient address: {to}"))?;
        let email = compose_verification_email(
            &self.brand,
            &self.backend_url,
            code,
            tracking_token,
            valid_for,
        );

        let message = Message::builder()
            .from(self.from.clone())
            .to(to_mailbox)
            .subject(email.subject.as_str())
            .user_agent(APP_USER_AGENT.to_string())
            .multipart(MultiPart::alternative_plain_html(email.text, email.html))
            .context("failed to build verification email")?;

        self.transport
            .send(message)
            .await
            .context("failed to send verification email")?;

        info!(to = %to, subject = %email.subject, "verification email sent");
        Ok(())
    }
}

/// Stand-in used when SMTP credentials are not configured.
#[derive(Clone, Debug)]
pub struct DisabledEmailSender;

#[async_trait]
impl EmailSender for DisabledEmailSender {
    async fn send_verification_email(
        &self,
        to: &str,
        _code: &str,
        _tracking_token: &str,
        _valid_for: TimeDelta,
    ) -> Result<()> {
        warn!(to = %to, "skipping verification email: SMTP not configured");
        Err(anyhow!("email delivery is not configured"))
    }
}

/// Pick the sender for the given configuration.
///
/// # Errors
/// Returns an error if credentials are present but the SMTP sender cannot be built.
pub fn sender_from_config(config: &SmtpConfig) -> Result<Arc<dyn EmailSender>> {
    if !config.has_credentials() {
        info!("SMTP credentials not configured, email delivery disabled");
        return Ok(Arc::new(DisabledEmailSender));
    }
    Ok(Arc::new(SmtpEmailSender::new(config)?))
}
