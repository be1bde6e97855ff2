//! Persistence for signup records.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Connection, PgPool, Row};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, info_span, Instrument, Span};
use uuid::Uuid;

use super::models::{EmailOpen, PendingSignup, SignupCounts, SignupRecord};

/// Schema applied at startup; every statement is idempotent.
pub const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

/// Storage seam for the verification workflow.
///
/// Writes are single statements so concurrent requests for the same email race at
/// the row level only.
#[async_trait]
pub trait SignupStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<SignupRecord>>;

    /// Insert a new pending signup or overwrite the code fields of an unverified one.
    /// Returns `false` when the existing row is already verified and was left alone.
    async fn upsert_pending(&self, pending: &PendingSignup) -> Result<bool>;

    async fn record_failed_attempt(&self, id: Uuid, at: DateTime<Utc>) -> Result<()>;

    /// Mark the signup verified if `code` is still the active code.
    async fn mark_verified(&self, id: Uuid, code: &str, at: DateTime<Utc>) -> Result<bool>;

    /// Count an email open; returns `false` for unknown tokens.
    async fn record_open(&self, token: &str, open: &EmailOpen) -> Result<bool>;

    async fn counts(&self) -> Result<SignupCounts>;

    /// Newest first.
    async fn list(&self, offset: i64, limit: i64) -> Result<Vec<SignupRecord>>;

    async fn ping(&self) -> Result<()>;
}

fn query_span(operation: &str, statement: &str) -> Span {
    info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

/// Postgres store. The schema is applied at most once per process, on the
/// first successful `migrate` or on first use, whichever comes first.
#[derive(Clone, Debug)]
pub struct PgSignupRepo {
    pool: PgPool,
    schema: Arc<OnceCell<()>>,
}

impl PgSignupRepo {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            schema: Arc::new(OnceCell::new()),
        }
    }

    /// Apply `sql/schema.sql` unless it was already applied. A failure leaves the
    /// repo unmigrated so the next call retries.
    ///
    /// # Errors
    /// Returns an error if any schema statement fails.
    pub async fn migrate(&self) -> Result<()> {
        self.schema
            .get_or_try_init(|| async {
                sqlx::raw_sql(SCHEMA_SQL)
                    .execute(&self.pool)
                    .instrument(query_span("MIGRATE", "sql/schema.sql"))
                    .await
                    .context("failed to apply signup schema")?;
                info!("Database schema is up to date");
                Ok::<(), anyhow::Error>(())
            })
            .await?;
        Ok(())
    }

    #[must_use]
    pub fn is_migrated(&self) -> bool {
        self.schema.initialized()
    }
}

#[async_trait]
impl SignupStore for PgSignupRepo {
    async fn find_by_email(&self, email: &str) -> Result<Option<SignupRecord>> {
        self.migrate().await?;

        let query = "SELECT * FROM early_start_signups WHERE email = $1";
        sqlx::query_as::<_, SignupRecord>(query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .context("failed to lookup signup by email")
    }

    async fn upsert_pending(&self, pending: &PendingSignup) -> Result<bool> {
        self.migrate().await?;

        // Resend resets the code, attempts and engagement fields but keeps the
        // originating IP from the first signup.
        let query = r"
            INSERT INTO early_start_signups
                (id, email, first_name, last_name, ip_address,
                 otp_code, otp_expires_at, otp_attempts, otp_last_attempt_at,
                 is_verified, email_sent, engagement_token, read_count,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 0, $8, FALSE, $9, $10, 0, $8, $8)
            ON CONFLICT (email) DO UPDATE SET
                first_name = EXCLUDED.first_name,
                last_name = EXCLUDED.last_name,
                otp_code = EXCLUDED.otp_code,
                otp_expires_at = EXCLUDED.otp_expires_at,
                otp_attempts = 0,
                otp_last_attempt_at = EXCLUDED.otp_last_attempt_at,
                email_sent = EXCLUDED.email_sent,
                engagement_token = EXCLUDED.engagement_token,
                read_count = 0,
                read_at = NULL,
                last_read_at = NULL,
                reader_ip = NULL,
                reader_client = NULL,
                updated_at = EXCLUDED.updated_at
            WHERE early_start_signups.is_verified = FALSE
        ";
        let result = sqlx::query(query)
            .bind(Uuid::new_v4())
            .bind(&pending.email)
            .bind(&pending.first_name)
            .bind(&pending.last_name)
            .bind(&pending.ip_address)
            .bind(&pending.otp_code)
            .bind(pending.otp_expires_at)
            .bind(pending.issued_at)
            .bind(pending.email_sent)
            .bind(&pending.engagement_token)
            .execute(&self.pool)
            .instrument(query_span("INSERT", query))
            .await
            .context("failed to upsert pending signup")?;

        Ok(result.rows_affected() == 1)
    }

    async fn record_failed_attempt(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        self.migrate().await?;

        let query = r"
            UPDATE early_start_signups
            SET otp_attempts = otp_attempts + 1,
                otp_last_attempt_at = $2,
                updated_at = $2
            WHERE id = $1
        ";
        sqlx::query(query)
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .context("failed to record failed verification attempt")?;
        Ok(())
    }

    async fn mark_verified(&self, id: Uuid, code: &str, at: DateTime<Utc>) -> Result<bool> {
        self.migrate().await?;

        let query = r"
            UPDATE early_start_signups
            SET is_verified = TRUE,
                otp_verified_at = $3,
                otp_code = NULL,
                otp_expires_at = NULL,
                otp_attempts = 0,
                otp_last_attempt_at = NULL,
                updated_at = $3
            WHERE id = $1
              AND otp_code = $2
              AND is_verified = FALSE
        ";
        let result = sqlx::query(query)
            .bind(id)
            .bind(code)
            .bind(at)
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .context("failed to mark signup verified")?;
        Ok(result.rows_affected() == 1)
    }

    async fn record_open(&self, token: &str, open: &EmailOpen) -> Result<bool> {
        self.migrate().await?;

        // Right-hand sides see the pre-update row, so `read_at IS NULL` means first open.
        let query = r"
            UPDATE early_start_signups
            SET read_count = read_count + 1,
                last_read_at = $2,
                read_at = COALESCE(read_at, $2),
                reader_ip = CASE WHEN read_at IS NULL THEN $3 ELSE reader_ip END,
                reader_client = CASE WHEN read_at IS NULL THEN $4 ELSE reader_client END,
                updated_at = $2
            WHERE engagement_token = $1
        ";
        let result = sqlx::query(query)
            .bind(token)
            .bind(open.opened_at)
            .bind(open.reader_ip.as_deref())
            .bind(open.reader_client.as_deref())
            .execute(&self.pool)
            .instrument(query_span("UPDATE", query))
            .await
            .context("failed to record email open")?;
        Ok(result.rows_affected() > 0)
    }

    async fn counts(&self) -> Result<SignupCounts> {
        self.migrate().await?;

        let query = r"
            SELECT COUNT(*) AS total,
                   COUNT(*) FILTER (WHERE is_verified) AS verified
            FROM early_start_signups
        ";
        let row = sqlx::query(query)
            .fetch_one(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .context("failed to count signups")?;

        Ok(SignupCounts {
            total: row.try_get("total")?,
            verified: row.try_get("verified")?,
        })
    }

    async fn list(&self, offset: i64, limit: i64) -> Result<Vec<SignupRecord>> {
        self.migrate().await?;

        let query = r"
            SELECT * FROM early_start_signups
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
        ";
        sqlx::query_as::<_, SignupRecord>(query)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .context("failed to list signups")
    }

    async fn ping(&self) -> Result<()> {
        let acquire_span = info_span!(
            "db.acquire",
            db.system = "postgresql",
            db.operation = "ACQUIRE"
        );
        let mut conn = self
            .pool
            .acquire()
            .instrument(acquire_span)
            .await
            .context("failed to acquire database connection")?;

        let ping_span = info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        conn.ping()
            .instrument(ping_span)
            .await
            .context("failed to ping database")?;
        drop(conn);

        self.migrate().await
    }
}
