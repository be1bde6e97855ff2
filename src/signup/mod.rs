//! Early access signup and email verification.

pub mod codes;
pub mod error;
pub mod models;
pub mod repo;
pub mod service;

#[cfg(test)]
pub(crate) mod testing;

pub use error::SignupError;
pub use models::{SignupCounts, SignupPage, SignupRecord, SignupSummary};
pub use repo::{PgSignupRepo, SignupStore};
pub use service::{
    Clock, SignupConfig, SignupOutcome, SignupRequest, SignupService, SystemClock, VerifyOutcome,
};
