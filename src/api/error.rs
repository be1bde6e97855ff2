use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::ToSchema;

use crate::signup::SignupError;

const UNAVAILABLE_MESSAGE: &str = "Service temporarily unavailable";

/// JSON error body returned by every endpoint.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

/// Build a `{"error": ...}` response with the given status.
pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorBody::new(message))).into_response()
}

#[must_use]
pub const fn status_code(err: &SignupError) -> StatusCode {
    match err {
        SignupError::InvalidInput(_) | SignupError::CodeExpired | SignupError::InvalidCode => {
            StatusCode::BAD_REQUEST
        }
        SignupError::RateLimited | SignupError::TooManyAttempts => StatusCode::TOO_MANY_REQUESTS,
        SignupError::RandomSource(_) | SignupError::ServiceUnavailable(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for SignupError {
    fn into_response(self) -> Response {
        let status = status_code(&self);
        let message = match &self {
            Self::ServiceUnavailable(err) => {
                error!("Signup store failure: {err:#}");
                UNAVAILABLE_MESSAGE.to_string()
            }
            Self::RandomSource(err) => {
                error!("Random source failure: {err}");
                UNAVAILABLE_MESSAGE.to_string()
            }
            other => other.to_string(),
        };
        error_response(status, message)
    }
}
