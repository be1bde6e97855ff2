use super::*;
use crate::signup::testing::Harness;
use anyhow::{anyhow, Result};

fn request(email: &str) -> SignupRequest {
    SignupRequest {
        email: email.to_string(),
        first_name: Some("Ada".to_string()),
        last_name: Some("Lovelace".to_string()),
    }
}

async fn signup_and_code(harness: &Harness, email: &str) -> Result<String> {
    harness
        .service
        .signup(request(email), Some("203.0.113.7"))
        .await?;
    harness
        .sender
        .last()
        .map(|sent| sent.code)
        .ok_or_else(|| anyhow!("no email sent"))
}

fn wrong_code(code: &str) -> String {
    if code == "AAAAAA" {
        "BBBBBB".to_string()
    } else {
        "AAAAAA".to_string()
    }
}

#[test]
fn valid_email_checks_shape_and_length() {
    assert!(valid_email("a@x.com"));
    assert!(!valid_email("a@x"));
    assert!(!valid_email("no spaces@x.com"));
    assert!(!valid_email(&format!("{}@x.com", "a".repeat(250))));
}

#[test]
fn config_builders_override_defaults() {
    let config = SignupConfig::new()
        .with_code_ttl_seconds(60)
        .with_resend_cooldown_seconds(5)
        .with_max_attempts(0);
    assert_eq!(config.code_ttl(), TimeDelta::seconds(60));
    assert_eq!(config.resend_cooldown(), TimeDelta::seconds(5));
    assert_eq!(config.max_attempts(), 1);

    let clamped = SignupConfig::new()
        .with_code_ttl_seconds(9_000_000_000_000_000)
        .with_resend_cooldown_seconds(u64::MAX);
    assert_eq!(clamped.code_ttl(), TimeDelta::days(1));
    assert_eq!(clamped.resend_cooldown(), TimeDelta::days(1));

    let defaults = SignupConfig::default();
    assert_eq!(defaults.code_ttl(), TimeDelta::minutes(15));
    assert_eq!(defaults.resend_cooldown(), TimeDelta::seconds(60));
    assert_eq!(defaults.max_attempts(), 5);
}

#[tokio::test]
async fn signup_email_carries_configured_lifetime() -> Result<()> {
    let harness = Harness::with_config(SignupConfig::new().with_code_ttl_seconds(120));
    harness.service.signup(request("a@x.com"), None).await?;

    let sent = harness.sender.last().ok_or_else(|| anyhow!("no email sent"))?;
    assert_eq!(sent.valid_for, TimeDelta::minutes(2));

    let record = harness.store.get("a@x.com").ok_or_else(|| anyhow!("missing"))?;
    assert_eq!(
        record.otp_expires_at,
        Some(harness.clock.now() + TimeDelta::minutes(2))
    );
    Ok(())
}

#[tokio::test]
async fn signup_fails_cleanly_when_expiry_overflows_clock() -> Result<()> {
    let harness = Harness::new();
    harness
        .clock
        .set(DateTime::<Utc>::MAX_UTC - TimeDelta::minutes(1));

    let result = harness.service.signup(request("a@x.com"), None).await;
    assert!(matches!(result, Err(SignupError::ServiceUnavailable(_))));
    assert_eq!(harness.sender.count(), 0);
    assert!(harness.store.get("a@x.com").is_none());
    Ok(())
}

#[tokio::test]
async fn signup_then_verify_succeeds() -> Result<()> {
    let harness = Harness::new();
    let code = signup_and_code(&harness, "a@x.com").await?;

    let record = harness.store.get("a@x.com").ok_or_else(|| anyhow!("missing"))?;
    assert!(!record.is_verified);
    assert!(record.email_sent);
    assert_eq!(record.ip_address, "203.0.113.7");
    assert_eq!(record.first_name, "Ada");
    assert_eq!(record.otp_attempts, 0);
    assert_eq!(
        record.otp_expires_at,
        Some(harness.clock.now() + TimeDelta::minutes(15))
    );

    harness.clock.advance(14 * 60);
    let outcome = harness.service.verify("a@x.com", &code).await?;
    assert!(!outcome.already_verified);
    assert_eq!(outcome.email, "a@x.com");
    assert_eq!(outcome.verified_at, Some(harness.clock.now()));

    let record = harness.store.get("a@x.com").ok_or_else(|| anyhow!("missing"))?;
    assert!(record.is_verified);
    assert_eq!(record.otp_code, None);
    assert_eq!(record.otp_expires_at, None);
    assert_eq!(record.otp_attempts, 0);
    Ok(())
}

#[tokio::test]
async fn verify_is_idempotent_once_verified() -> Result<()> {
    let harness = Harness::new();
    let code = signup_and_code(&harness, "a@x.com").await?;

    let first = harness.service.verify("a@x.com", &code).await?;
    let second = harness.service.verify("a@x.com", &code).await?;
    assert!(!first.already_verified);
    assert!(second.already_verified);
    assert_eq!(second.verified_at, first.verified_at);
    Ok(())
}

#[tokio::test]
async fn verify_normalizes_lowercase_code() -> Result<()> {
    let harness = Harness::new();
    let code = signup_and_code(&harness, "a@x.com").await?;

    let outcome = harness
        .service
        .verify("a@x.com", &format!("  {}  ", code.to_lowercase()))
        .await?;
    assert!(!outcome.already_verified);
    Ok(())
}

#[tokio::test]
async fn verify_after_expiry_fails_even_with_correct_code() -> Result<()> {
    let harness = Harness::new();
    let code = signup_and_code(&harness, "a@x.com").await?;

    harness.clock.advance(15 * 60);
    let result = harness.service.verify("a@x.com", &code).await;
    assert!(matches!(result, Err(SignupError::CodeExpired)));

    let record = harness.store.get("a@x.com").ok_or_else(|| anyhow!("missing"))?;
    assert!(!record.is_verified);
    assert_eq!(record.otp_attempts, 0);
    Ok(())
}

#[tokio::test]
async fn five_mismatches_lock_the_code() -> Result<()> {
    let harness = Harness::new();
    let code = signup_and_code(&harness, "a@x.com").await?;
    let wrong = wrong_code(&code);

    for _ in 0..5 {
        let result = harness.service.verify("a@x.com", &wrong).await;
        assert!(matches!(result, Err(SignupError::InvalidCode)));
    }

    let record = harness.store.get("a@x.com").ok_or_else(|| anyhow!("missing"))?;
    assert_eq!(record.otp_attempts, 5);

    let result = harness.service.verify("a@x.com", &code).await;
    assert!(matches!(result, Err(SignupError::TooManyAttempts)));
    Ok(())
}

#[tokio::test]
async fn unknown_email_is_invalid_code() {
    let harness = Harness::new();
    let result = harness.service.verify("nobody@x.com", "AB3D9X").await;
    assert!(matches!(result, Err(SignupError::InvalidCode)));
}

#[tokio::test]
async fn verify_rejects_malformed_input() {
    let harness = Harness::new();
    let result = harness.service.verify("a@x.com", "ABC").await;
    assert!(matches!(result, Err(SignupError::InvalidInput(_))));

    let result = harness.service.verify("not-an-email", "AB3D9X").await;
    assert!(matches!(result, Err(SignupError::InvalidInput(_))));
}

#[tokio::test]
async fn resend_within_cooldown_is_rate_limited() -> Result<()> {
    let harness = Harness::new();
    signup_and_code(&harness, "a@x.com").await?;

    harness.clock.advance(59);
    let result = harness.service.signup(request("a@x.com"), None).await;
    assert!(matches!(result, Err(SignupError::RateLimited)));
    assert_eq!(harness.sender.count(), 1);
    Ok(())
}

#[tokio::test]
async fn resend_after_cooldown_invalidates_previous_code() -> Result<()> {
    let harness = Harness::new();
    let first_code = signup_and_code(&harness, "a@x.com").await?;
    let first_token = harness
        .store
        .get("a@x.com")
        .map(|r| r.engagement_token)
        .ok_or_else(|| anyhow!("missing"))?;

    harness.clock.advance(60);
    let second_code = signup_and_code(&harness, "a@x.com").await?;
    let record = harness.store.get("a@x.com").ok_or_else(|| anyhow!("missing"))?;
    assert_ne!(record.engagement_token, first_token);
    assert_eq!(harness.sender.count(), 2);

    if first_code != second_code {
        let result = harness.service.verify("a@x.com", &first_code).await;
        assert!(matches!(result, Err(SignupError::InvalidCode)));
    }
    let outcome = harness.service.verify("a@x.com", &second_code).await?;
    assert!(!outcome.already_verified);
    Ok(())
}

#[tokio::test]
async fn resend_resets_attempts_and_engagement() -> Result<()> {
    let harness = Harness::new();
    let code = signup_and_code(&harness, "a@x.com").await?;
    let token = harness
        .sender
        .last()
        .map(|sent| sent.tracking_token)
        .ok_or_else(|| anyhow!("no email sent"))?;

    harness.service.verify("a@x.com", &wrong_code(&code)).await.ok();
    harness
        .service
        .record_open(&token, Some("198.51.100.1"), Some("Mail/1.0"))
        .await?;

    harness.clock.advance(61);
    harness
        .service
        .signup(request("a@x.com"), Some("192.0.2.99"))
        .await?;

    let record = harness.store.get("a@x.com").ok_or_else(|| anyhow!("missing"))?;
    assert_eq!(record.otp_attempts, 0);
    assert_eq!(record.read_count, 0);
    assert_eq!(record.read_at, None);
    assert_eq!(record.reader_ip, None);
    assert_eq!(record.ip_address, "203.0.113.7");
    Ok(())
}

#[tokio::test]
async fn failed_attempt_restarts_the_cooldown() -> Result<()> {
    let harness = Harness::new();
    let code = signup_and_code(&harness, "a@x.com").await?;

    harness.clock.advance(50);
    harness.service.verify("a@x.com", &wrong_code(&code)).await.ok();
    harness.clock.advance(30);

    let result = harness.service.signup(request("a@x.com"), None).await;
    assert!(matches!(result, Err(SignupError::RateLimited)));
    Ok(())
}

#[tokio::test]
async fn signup_for_verified_email_is_silent() -> Result<()> {
    let harness = Harness::new();
    let code = signup_and_code(&harness, "a@x.com").await?;
    harness.service.verify("a@x.com", &code).await?;

    let outcome = harness.service.signup(request("a@x.com"), None).await?;
    assert_eq!(outcome, SignupOutcome::AlreadyVerified);
    assert_eq!(harness.sender.count(), 1);

    let record = harness.store.get("a@x.com").ok_or_else(|| anyhow!("missing"))?;
    assert!(record.is_verified);
    assert_eq!(record.otp_code, None);
    Ok(())
}

#[tokio::test]
async fn failed_send_still_stores_signup() -> Result<()> {
    let harness = Harness::new();
    harness.sender.set_failing(true);

    let outcome = harness.service.signup(request("a@x.com"), None).await?;
    assert_eq!(outcome, SignupOutcome::Issued { email_sent: false });

    let record = harness.store.get("a@x.com").ok_or_else(|| anyhow!("missing"))?;
    assert!(!record.email_sent);
    assert!(record.otp_code.is_some());
    Ok(())
}

#[tokio::test]
async fn signup_rejects_invalid_input() {
    let harness = Harness::new();
    let result = harness.service.signup(request("nope"), None).await;
    assert!(matches!(result, Err(SignupError::InvalidInput(_))));

    let long_name = SignupRequest {
        email: "a@x.com".to_string(),
        first_name: Some("x".repeat(101)),
        last_name: None,
    };
    let result = harness.service.signup(long_name, None).await;
    assert!(matches!(result, Err(SignupError::InvalidInput(_))));
    assert_eq!(harness.sender.count(), 0);
}

#[tokio::test]
async fn store_failure_is_service_unavailable() {
    let harness = Harness::new();
    harness.store.set_offline(true);

    let result = harness.service.signup(request("a@x.com"), None).await;
    assert!(matches!(result, Err(SignupError::ServiceUnavailable(_))));

    let result = harness.service.count().await;
    assert!(matches!(result, Err(SignupError::ServiceUnavailable(_))));
}

#[tokio::test]
async fn record_open_tracks_first_and_repeat_opens() -> Result<()> {
    let harness = Harness::new();
    signup_and_code(&harness, "a@x.com").await?;
    let token = harness
        .sender
        .last()
        .map(|sent| sent.tracking_token)
        .ok_or_else(|| anyhow!("no email sent"))?;
    let first_open = harness.clock.now();

    assert!(
        harness
            .service
            .record_open(&token, Some("198.51.100.1"), Some("Mail/1.0"))
            .await?
    );
    harness.clock.advance(300);
    assert!(
        harness
            .service
            .record_open(&token, Some("198.51.100.2"), Some("Other/2.0"))
            .await?
    );

    let record = harness.store.get("a@x.com").ok_or_else(|| anyhow!("missing"))?;
    assert_eq!(record.read_count, 2);
    assert_eq!(record.read_at, Some(first_open));
    assert_eq!(record.last_read_at, Some(harness.clock.now()));
    assert_eq!(record.reader_ip.as_deref(), Some("198.51.100.1"));
    assert_eq!(record.reader_client.as_deref(), Some("Mail/1.0"));
    Ok(())
}

#[tokio::test]
async fn record_open_ignores_unknown_tokens() -> Result<()> {
    let harness = Harness::new();
    assert!(!harness.service.record_open("missing", None, None).await?);
    assert!(!harness.service.record_open("", None, None).await?);
    assert!(!harness.service.record_open(&"x".repeat(65), None, None).await?);
    Ok(())
}

#[tokio::test]
async fn count_and_list_are_reads() -> Result<()> {
    let harness = Harness::new();
    let code = signup_and_code(&harness, "a@x.com").await?;
    harness.service.verify("a@x.com", &code).await?;
    harness.clock.advance(1);
    signup_and_code(&harness, "b@x.com").await?;
    harness.clock.advance(1);
    signup_and_code(&harness, "c@x.com").await?;

    let counts = harness.service.count().await?;
    assert_eq!(counts, SignupCounts { total: 3, verified: 1 });

    let page = harness.service.list(None, None).await?;
    assert_eq!(page.page, 1);
    assert_eq!(page.limit, DEFAULT_PAGE_LIMIT);
    assert_eq!(page.total, 3);
    let emails: Vec<_> = page.users.iter().map(|u| u.email.as_str()).collect();
    assert_eq!(emails, ["c@x.com", "b@x.com", "a@x.com"]);

    let page = harness.service.list(Some(2), Some(2)).await?;
    assert_eq!(page.users.len(), 1);
    assert_eq!(page.users[0].email, "a@x.com");

    let page = harness.service.list(Some(0), Some(1_000)).await?;
    assert_eq!(page.page, 1);
    assert_eq!(page.limit, MAX_PAGE_LIMIT);

    assert_eq!(harness.service.count().await?, counts);
    Ok(())
}
