use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// One row of `early_start_signups`; exactly one per email.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct SignupRecord {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub ip_address: String,
    pub otp_code: Option<String>,
    pub otp_expires_at: Option<DateTime<Utc>>,
    pub otp_verified_at: Option<DateTime<Utc>>,
    pub otp_attempts: i32,
    pub otp_last_attempt_at: Option<DateTime<Utc>>,
    pub is_verified: bool,
    pub email_sent: bool,
    pub engagement_token: String,
    pub read_at: Option<DateTime<Utc>>,
    pub read_count: i32,
    pub last_read_at: Option<DateTime<Utc>>,
    pub reader_ip: Option<String>,
    pub reader_client: Option<String>,
}

/// Fields written when a code is issued, either on first signup or on resend.
#[derive(Debug, Clone)]
pub struct PendingSignup {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub ip_address: String,
    pub otp_code: String,
    pub otp_expires_at: DateTime<Utc>,
    pub issued_at: DateTime<Utc>,
    pub email_sent: bool,
    pub engagement_token: String,
}

/// A pixel fetch for an engagement token.
#[derive(Debug, Clone)]
pub struct EmailOpen {
    pub opened_at: DateTime<Utc>,
    pub reader_ip: Option<String>,
    pub reader_client: Option<String>,
}

/// Public view of a signup used by the admin listing.
///
/// Codes, attempt counters, tracking tokens and reader details stay server-side.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SignupSummary {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub email: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub first_name: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub last_name: String,
    pub ip_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otp_verified_at: Option<DateTime<Utc>>,
    pub is_verified: bool,
    pub email_sent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_at: Option<DateTime<Utc>>,
    pub read_count: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_read_at: Option<DateTime<Utc>>,
}

impl From<SignupRecord> for SignupSummary {
    fn from(record: SignupRecord) -> Self {
        Self {
            id: record.id,
            created_at: record.created_at,
            updated_at: record.updated_at,
            email: record.email,
            first_name: record.first_name,
            last_name: record.last_name,
            ip_address: record.ip_address,
            otp_verified_at: record.otp_verified_at,
            is_verified: record.is_verified,
            email_sent: record.email_sent,
            read_at: record.read_at,
            read_count: record.read_count,
            last_read_at: record.last_read_at,
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignupCounts {
    pub total: i64,
    pub verified: i64,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SignupPage {
    pub users: Vec<SignupSummary>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
}
