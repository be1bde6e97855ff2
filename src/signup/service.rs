use anyhow::anyhow;
use chrono::{DateTime, TimeDelta, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::api::email::EmailSender;

use super::codes::{generate_code, generate_tracking_token, normalize_code};
use super::error::SignupError;
use super::models::{EmailOpen, PendingSignup, SignupCounts, SignupPage, SignupSummary};
use super::repo::SignupStore;

const MAX_EMAIL_LEN: usize = 255;
const MAX_NAME_LEN: usize = 100;
const MAX_IP_LEN: usize = 45;
const MAX_CLIENT_LEN: usize = 500;
const MAX_TOKEN_LEN: usize = 64;

/// Upper bound for the code lifetime and the resend cooldown.
pub const MAX_WINDOW_SECONDS: u64 = 86_400;

pub const DEFAULT_PAGE_LIMIT: u32 = 50;
pub const MAX_PAGE_LIMIT: u32 = 100;

static EMAIL_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok());

/// Basic email format check.
pub(crate) fn valid_email(email: &str) -> bool {
    email.len() <= MAX_EMAIL_LEN
        && EMAIL_RE
            .as_ref()
            .is_some_and(|regex| regex.is_match(email))
}

fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}

/// Source of "now" for expiry and cooldown checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct SignupConfig {
    code_ttl: TimeDelta,
    resend_cooldown: TimeDelta,
    max_attempts: i32,
}

impl SignupConfig {
    /// Defaults: codes live 15 minutes, 60 second resend cooldown, 5 attempts.
    #[must_use]
    pub fn new() -> Self {
        Self {
            code_ttl: TimeDelta::minutes(15),
            resend_cooldown: TimeDelta::seconds(60),
            max_attempts: 5,
        }
    }

    /// Clamped to `1..=MAX_WINDOW_SECONDS`.
    #[must_use]
    pub fn with_code_ttl_seconds(mut self, seconds: u64) -> Self {
        self.code_ttl = window(seconds.max(1));
        self
    }

    /// Clamped to `MAX_WINDOW_SECONDS`.
    #[must_use]
    pub fn with_resend_cooldown_seconds(mut self, seconds: u64) -> Self {
        self.resend_cooldown = window(seconds);
        self
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = i32::try_from(max_attempts).unwrap_or(i32::MAX).max(1);
        self
    }

    #[must_use]
    pub fn code_ttl(&self) -> TimeDelta {
        self.code_ttl
    }

    #[must_use]
    pub fn resend_cooldown(&self) -> TimeDelta {
        self.resend_cooldown
    }

    #[must_use]
    pub fn max_attempts(&self) -> i32 {
        self.max_attempts
    }
}

fn window(seconds: u64) -> TimeDelta {
    i64::try_from(seconds.min(MAX_WINDOW_SECONDS))
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or_else(|| TimeDelta::days(1))
}

impl Default for SignupConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SignupRequest {
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Internal result of a signup; callers answer every variant with the same message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignupOutcome {
    Issued { email_sent: bool },
    AlreadyVerified,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyOutcome {
    pub email: String,
    pub already_verified: bool,
    pub verified_at: Option<DateTime<Utc>>,
}

/// Signup, verification and engagement workflow over injected collaborators.
#[derive(Clone)]
pub struct SignupService {
    store: Arc<dyn SignupStore>,
    mailer: Arc<dyn EmailSender>,
    clock: Arc<dyn Clock>,
    config: SignupConfig,
}

impl SignupService {
    #[must_use]
    pub fn new(
        store: Arc<dyn SignupStore>,
        mailer: Arc<dyn EmailSender>,
        clock: Arc<dyn Clock>,
        config: SignupConfig,
    ) -> Self {
        Self {
            store,
            mailer,
            clock,
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &SignupConfig {
        &self.config
    }

    /// Start (or restart) verification for an email.
    ///
    /// # Errors
    /// `InvalidInput` for malformed input, `RateLimited` inside the resend cooldown,
    /// `RandomSource`/`ServiceUnavailable` for infrastructure failures. A failed
    /// email send is not an error.
    #[instrument(skip(self, request), fields(email = %request.email.trim()))]
    pub async fn signup(
        &self,
        request: SignupRequest,
        client_ip: Option<&str>,
    ) -> Result<SignupOutcome, SignupError> {
        let email = request.email.trim();
        if !valid_email(email) {
            return Err(SignupError::invalid_input("Invalid email address"));
        }

        let first_name = request.first_name.as_deref().unwrap_or_default().trim();
        let last_name = request.last_name.as_deref().unwrap_or_default().trim();
        if first_name.chars().count() > MAX_NAME_LEN || last_name.chars().count() > MAX_NAME_LEN {
            return Err(SignupError::invalid_input("Name is too long"));
        }

        let now = self.clock.now();
        let expires_at = now.checked_add_signed(self.config.code_ttl).ok_or_else(|| {
            SignupError::ServiceUnavailable(anyhow!("code expiry out of range at {now}"))
        })?;

        if let Some(existing) = self.store.find_by_email(email).await? {
            if existing.is_verified {
                debug!("signup for verified email ignored");
                return Ok(SignupOutcome::AlreadyVerified);
            }
            if let Some(last_attempt) = existing.otp_last_attempt_at {
                if now - last_attempt < self.config.resend_cooldown {
                    return Err(SignupError::RateLimited);
                }
            }
        }

        let code = generate_code()?;
        let engagement_token = generate_tracking_token()?;

        let email_sent = match self
            .mailer
            .send_verification_email(email, &code, &engagement_token, self.config.code_ttl)
            .await
        {
            Ok(()) => true,
            Err(err) => {
                warn!("verification email not sent: {err:#}");
                false
            }
        };

        let pending = PendingSignup {
            email: email.to_string(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            ip_address: truncate_chars(client_ip.unwrap_or_default(), MAX_IP_LEN),
            otp_code: code,
            otp_expires_at: expires_at,
            issued_at: now,
            email_sent,
            engagement_token,
        };

        if !self.store.upsert_pending(&pending).await? {
            debug!("signup verified concurrently, record left unchanged");
            return Ok(SignupOutcome::AlreadyVerified);
        }

        info!(email_sent, "verification code issued");

        Ok(SignupOutcome::Issued { email_sent })
    }

    /// Check a submitted code.
    ///
    /// # Errors
    /// `InvalidInput`, `InvalidCode`, `CodeExpired`, `TooManyAttempts`, or
    /// `ServiceUnavailable` when the store fails.
    #[instrument(skip(self, submitted_code))]
    pub async fn verify(
        &self,
        email: &str,
        submitted_code: &str,
    ) -> Result<VerifyOutcome, SignupError> {
        let code = normalize_code(submitted_code)?;
        let email = email.trim();
        if !valid_email(email) {
            return Err(SignupError::invalid_input("Invalid request"));
        }

        let Some(record) = self.store.find_by_email(email).await? else {
            return Err(SignupError::InvalidCode);
        };

        if record.is_verified {
            return Ok(VerifyOutcome {
                email: record.email,
                already_verified: true,
                verified_at: record.otp_verified_at,
            });
        }

        let now = self.clock.now();

        match record.otp_expires_at {
            Some(expires_at) if expires_at > now => {}
            _ => return Err(SignupError::CodeExpired),
        }

        if record.otp_attempts >= self.config.max_attempts {
            return Err(SignupError::TooManyAttempts);
        }

        if record.otp_code.as_deref() != Some(code.as_str()) {
            self.store.record_failed_attempt(record.id, now).await?;
            debug!(attempts = record.otp_attempts + 1, "verification code mismatch");
            return Err(SignupError::InvalidCode);
        }

        // A concurrent resend may have replaced the code since the read above.
        if !self.store.mark_verified(record.id, &code, now).await? {
            return Err(SignupError::InvalidCode);
        }

        info!("email verified");

        Ok(VerifyOutcome {
            email: record.email,
            already_verified: false,
            verified_at: Some(now),
        })
    }

    /// Total and verified signup counts.
    ///
    /// # Errors
    /// `ServiceUnavailable` when the store fails.
    pub async fn count(&self) -> Result<SignupCounts, SignupError> {
        Ok(self.store.counts().await?)
    }

    /// One page of signups, newest first.
    ///
    /// # Errors
    /// `ServiceUnavailable` when the store fails.
    pub async fn list(
        &self,
        page: Option<u32>,
        limit: Option<u32>,
    ) -> Result<SignupPage, SignupError> {
        let page = page.unwrap_or(1).max(1);
        let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT);
        let offset = i64::from(page - 1) * i64::from(limit);

        let records = self.store.list(offset, i64::from(limit)).await?;
        let total = self.store.counts().await?.total;

        Ok(SignupPage {
            users: records.into_iter().map(SignupSummary::from).collect(),
            total,
            page,
            limit,
        })
    }

    /// Record a tracking pixel fetch. Returns whether the token matched a signup.
    ///
    /// # Errors
    /// `ServiceUnavailable` when the store fails.
    pub async fn record_open(
        &self,
        token: &str,
        reader_ip: Option<&str>,
        reader_client: Option<&str>,
    ) -> Result<bool, SignupError> {
        let token = token.trim();
        if token.is_empty() || token.len() > MAX_TOKEN_LEN {
            return Ok(false);
        }

        let open = EmailOpen {
            opened_at: self.clock.now(),
            reader_ip: reader_ip.map(|ip| truncate_chars(ip, MAX_IP_LEN)),
            reader_client: reader_client.map(|client| truncate_chars(client, MAX_CLIENT_LEN)),
        };

        Ok(self.store.record_open(token, &open).await?)
    }

    /// Store reachability for health checks.
    ///
    /// # Errors
    /// Returns the store error when it cannot be reached.
    pub async fn ping(&self) -> anyhow::Result<()> {
        self.store.ping().await
    }
}

#[cfg(test)]
mod tests;
