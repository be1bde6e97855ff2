//! # Earlystart (early access signups)
//!
//! `earlystart` collects early-access signups, verifies the signer's email with a
//! one-time code and records whether the verification email was opened.
//!
//! ## Verification flow
//!
//! A signup moves through `NoRecord -> PendingVerification -> Verified`. Each signup
//! (or resend) issues a 6 character code, valid for 15 minutes by default, and a
//! fresh tracking token embedded as a 1x1 pixel in the email.
//!
//! - **Anti-enumeration:** signup always answers with the same generic message, and
//!   verification never distinguishes "unknown email" from "wrong code".
//! - **Cooldown:** a pending signup cannot request a new code within 60 seconds of
//!   the previous attempt.
//! - **Attempt limit:** after 5 wrong codes the current code is locked; a resend
//!   issues a new one.
//!
//! ## Email delivery
//!
//! The verification email is sent inline over SMTP (STARTTLS + auth). Delivery is
//! best effort: a failed send is recorded as `email_sent = false` and never fails
//! the signup.

pub mod api;
pub mod cli;
pub mod signup;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
