//! In-memory collaborators for workflow and router tests.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};
use uuid::Uuid;

use super::models::{EmailOpen, PendingSignup, SignupCounts, SignupRecord};
use super::repo::SignupStore;
use super::service::{Clock, SignupConfig, SignupService};
use crate::api::email::EmailSender;

#[derive(Default)]
pub(crate) struct MemoryStore {
    records: Mutex<Vec<SignupRecord>>,
    offline: AtomicBool,
}

impl MemoryStore {
    pub(crate) fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub(crate) fn get(&self, email: &str) -> Option<SignupRecord> {
        self.lock()
            .ok()
            .and_then(|records| records.iter().find(|r| r.email == email).cloned())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<SignupRecord>>> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(anyhow!("store offline"));
        }
        self.records.lock().map_err(|_| anyhow!("store poisoned"))
    }
}

#[async_trait]
impl SignupStore for MemoryStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<SignupRecord>> {
        Ok(self.lock()?.iter().find(|r| r.email == email).cloned())
    }

    async fn upsert_pending(&self, pending: &PendingSignup) -> Result<bool> {
        let mut records = self.lock()?;
        if let Some(record) = records.iter_mut().find(|r| r.email == pending.email) {
            if record.is_verified {
                return Ok(false);
            }
            record.first_name.clone_from(&pending.first_name);
            record.last_name.clone_from(&pending.last_name);
            record.otp_code = Some(pending.otp_code.clone());
            record.otp_expires_at = Some(pending.otp_expires_at);
            record.otp_attempts = 0;
            record.otp_last_attempt_at = Some(pending.issued_at);
            record.email_sent = pending.email_sent;
            record.engagement_token.clone_from(&pending.engagement_token);
            record.read_count = 0;
            record.read_at = None;
            record.last_read_at = None;
            record.reader_ip = None;
            record.reader_client = None;
            record.updated_at = pending.issued_at;
            return Ok(true);
        }

        records.push(SignupRecord {
            id: Uuid::new_v4(),
            created_at: pending.issued_at,
            updated_at: pending.issued_at,
            email: pending.email.clone(),
            first_name: pending.first_name.clone(),
            last_name: pending.last_name.clone(),
            ip_address: pending.ip_address.clone(),
            otp_code: Some(pending.otp_code.clone()),
            otp_expires_at: Some(pending.otp_expires_at),
            otp_verified_at: None,
            otp_attempts: 0,
            otp_last_attempt_at: Some(pending.issued_at),
            is_verified: false,
            email_sent: pending.email_sent,
            engagement_token: pending.engagement_token.clone(),
            read_at: None,
            read_count: 0,
            last_read_at: None,
            reader_ip: None,
            reader_client: None,
        });
        Ok(true)
    }

    async fn record_failed_attempt(&self, id: Uuid, at: DateTime<Utc>) -> Result<()> {
        let mut records = self.lock()?;
        if let Some(record) = records.iter_mut().find(|r| r.id == id) {
            record.otp_attempts += 1;
            record.otp_last_attempt_at = Some(at);
            record.updated_at = at;
        }
        Ok(())
    }

    async fn mark_verified(&self, id: Uuid, code: &str, at: DateTime<Utc>) -> Result<bool> {
        let mut records = self.lock()?;
        let Some(record) = records
            .iter_mut()
            .find(|r| r.id == id && !r.is_verified && r.otp_code.as_deref() == Some(code))
        else {
            return Ok(false);
        };
        record.is_verified = true;
        record.otp_verified_at = Some(at);
        record.otp_code = None;
        record.otp_expires_at = None;
        record.otp_attempts = 0;
        record.otp_last_attempt_at = None;
        record.updated_at = at;
        Ok(true)
    }

    async fn record_open(&self, token: &str, open: &EmailOpen) -> Result<bool> {
        let mut records = self.lock()?;
        let Some(record) = records.iter_mut().find(|r| r.engagement_token == token) else {
            return Ok(false);
        };
        if record.read_at.is_none() {
            record.read_at = Some(open.opened_at);
            record.reader_ip.clone_from(&open.reader_ip);
            record.reader_client.clone_from(&open.reader_client);
        }
        record.read_count += 1;
        record.last_read_at = Some(open.opened_at);
        record.updated_at = open.opened_at;
        Ok(true)
    }

    async fn counts(&self) -> Result<SignupCounts> {
        let records = self.lock()?;
        let total = i64::try_from(records.len())?;
        let verified = i64::try_from(records.iter().filter(|r| r.is_verified).count())?;
        Ok(SignupCounts { total, verified })
    }

    async fn list(&self, offset: i64, limit: i64) -> Result<Vec<SignupRecord>> {
        let mut records = self.lock()?.clone();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records
            .into_iter()
            .skip(usize::try_from(offset)?)
            .take(usize::try_from(limit)?)
            .collect())
    }

    async fn ping(&self) -> Result<()> {
        self.lock().map(|_| ())
    }
}

/// Clock that only moves when told to.
pub(crate) struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub(crate) fn new() -> Self {
        let start = Utc
            .with_ymd_and_hms(2026, 1, 1, 12, 0, 0)
            .single()
            .unwrap_or_else(Utc::now);
        Self {
            now: Mutex::new(start),
        }
    }

    pub(crate) fn set(&self, at: DateTime<Utc>) {
        if let Ok(mut now) = self.now.lock() {
            *now = at;
        }
    }

    pub(crate) fn advance(&self, seconds: i64) {
        if let Ok(mut now) = self.now.lock() {
            *now += TimeDelta::seconds(seconds);
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.lock().map_or_else(|_| Utc::now(), |now| *now)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SentEmail {
    pub(crate) to: String,
    pub(crate) code: String,
    pub(crate) tracking_token: String,
    pub(crate) valid_for: TimeDelta,
}

/// Records every send; can be switched to fail.
#[derive(Default)]
pub(crate) struct RecordingSender {
    sent: Mutex<Vec<SentEmail>>,
    failing: AtomicBool,
}

impl RecordingSender {
    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub(crate) fn last(&self) -> Option<SentEmail> {
        self.sent.lock().ok().and_then(|sent| sent.last().cloned())
    }

    pub(crate) fn count(&self) -> usize {
        self.sent.lock().map_or(0, |sent| sent.len())
    }
}

#[async_trait]
impl EmailSender for RecordingSender {
    async fn send_verification_email(
        &self,
        to: &str,
        code: &str,
        tracking_token: &str,
        valid_for: TimeDelta,
    ) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("smtp unavailable"));
        }
        self.sent
            .lock()
            .map_err(|_| anyhow!("sender poisoned"))?
            .push(SentEmail {
                to: to.to_string(),
                code: code.to_string(),
                tracking_token: tracking_token.to_string(),
                valid_for,
            });
        Ok(())
    }
}

pub(crate) struct Harness {
    pub(crate) store: Arc<MemoryStore>,
    pub(crate) sender: Arc<RecordingSender>,
    pub(crate) clock: Arc<ManualClock>,
    pub(crate) service: SignupService,
}

impl Harness {
    pub(crate) fn new() -> Self {
        Self::with_config(SignupConfig::new())
    }

    pub(crate) fn with_config(config: SignupConfig) -> Self {
        let store = Arc::new(MemoryStore::default());
        let sender = Arc::new(RecordingSender::default());
        let clock = Arc::new(ManualClock::new());
        let service = SignupService::new(
            store.clone(),
            sender.clone(),
            clock.clone(),
            config,
        );
        Self {
            store,
            sender,
            clock,
            service,
        }
    }
}
