//! Public signup, verification and count endpoints.

use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, Extension},
    http::HeaderMap,
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tracing::debug;
use utoipa::ToSchema;

use super::extract_client_ip;
use crate::api::error::ErrorBody;
use crate::signup::{SignupError, SignupRequest, SignupService};

/// Same answer for new, resent and already verified emails.
pub const SIGNUP_MESSAGE: &str =
    "If this email is valid, a verification code has been sent. Please check your email.";
pub const COUNT_MESSAGE: &str = "early start signups";

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SignupBody {
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone)]
pub struct VerifyBody {
    pub email: String,
    pub otp: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub message: String,
    pub email: String,
    pub is_verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otp_verified_at: Option<DateTime<Utc>>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CountResponse {
    pub total: i64,
    pub verified: i64,
    pub message: String,
}

fn invalid_request(rejection: &JsonRejection) -> SignupError {
    debug!("Rejected request body: {rejection}");
    SignupError::InvalidInput("Invalid request".to_string())
}

#[utoipa::path(
    post,
    path = "/signup",
    request_body = SignupBody,
    responses(
        (status = 200, description = "Signup accepted", body = MessageResponse),
        (status = 400, description = "Invalid input", body = ErrorBody),
        (status = 429, description = "Resend cooldown active", body = ErrorBody),
        (status = 500, description = "Service temporarily unavailable", body = ErrorBody)
    ),
    tag = "signup"
)]
pub async fn signup(
    headers: HeaderMap,
    connect_info: Option<Extension<ConnectInfo<SocketAddr>>>,
    service: Extension<SignupService>,
    payload: Result<Json<SignupBody>, JsonRejection>,
) -> Result<Json<MessageResponse>, SignupError> {
    let Json(body) = payload.map_err(|rejection| invalid_request(&rejection))?;
    let client_ip = extract_client_ip(&headers, connect_info.as_ref());

    let request = SignupRequest {
        email: body.email,
        first_name: body.first_name,
        last_name: body.last_name,
    };

    service.signup(request, client_ip.as_deref()).await?;

    Ok(Json(MessageResponse {
        message: SIGNUP_MESSAGE.to_string(),
    }))
}

#[utoipa::path(
    post,
    path = "/verify",
    request_body = VerifyBody,
    responses(
        (status = 200, description = "Email verified", body = VerifyResponse),
        (status = 400, description = "Invalid or expired code", body = ErrorBody),
        (status = 429, description = "Too many failed attempts", body = ErrorBody),
        (status = 500, description = "Service temporarily unavailable", body = ErrorBody)
    ),
    tag = "signup"
)]
pub async fn verify(
    service: Extension<SignupService>,
    payload: Result<Json<VerifyBody>, JsonRejection>,
) -> Result<Json<VerifyResponse>, SignupError> {
    let Json(body) = payload.map_err(|rejection| invalid_request(&rejection))?;

    let outcome = service.verify(&body.email, &body.otp).await?;

    let message = if outcome.already_verified {
        "Email already verified"
    } else {
        "Email verified successfully!"
    };

    Ok(Json(VerifyResponse {
        message: message.to_string(),
        email: outcome.email,
        is_verified: true,
        otp_verified_at: outcome.verified_at,
    }))
}

#[utoipa::path(
    get,
    path = "/count",
    responses(
        (status = 200, description = "Signup totals", body = CountResponse),
        (status = 500, description = "Service temporarily unavailable", body = ErrorBody)
    ),
    tag = "signup"
)]
pub async fn count(service: Extension<SignupService>) -> Result<Json<CountResponse>, SignupError> {
    let counts = service.count().await?;
    Ok(Json(CountResponse {
        total: counts.total,
        verified: counts.verified,
        message: COUNT_MESSAGE.to_string(),
    }))
}
