use thiserror::Error;

/// Failures surfaced by the signup workflow.
///
/// `InvalidCode` deliberately covers both "wrong code" and "no such signup" so
/// callers cannot probe which emails are registered.
#[derive(Debug, Error)]
pub enum SignupError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("Please wait before requesting a new code")]
    RateLimited,
    #[error("Verification code has expired. Please request a new one.")]
    CodeExpired,
    #[error("Too many failed attempts. Please request a new code.")]
    TooManyAttempts,
    #[error("Invalid verification code")]
    InvalidCode,
    #[error("failed to read from the random source")]
    RandomSource(#[source] rand::Error),
    #[error("service unavailable")]
    ServiceUnavailable(#[source] anyhow::Error),
}

impl SignupError {
    pub(crate) fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}

impl From<anyhow::Error> for SignupError {
    fn from(err: anyhow::Error) -> Self {
        Self::ServiceUnavailable(err)
    }
}
