//! Route handlers and the request helpers they share.
//!
//! Handlers receive the `SignupService` and `AdminAuth` through `Extension`
//! layers installed by `api::app`.

pub mod admin;
pub mod engagement;
pub mod health;
pub mod root;
pub mod signup;

use axum::{
    extract::{ConnectInfo, Extension},
    http::{header::AUTHORIZATION, HeaderMap},
};
use secrecy::{ExposeSecret, SecretString};
use std::net::SocketAddr;
use subtle::ConstantTimeEq;

/// Client address: first `x-forwarded-for` hop, then `x-real-ip`, then the peer.
pub(crate) fn extract_client_ip(
    headers: &HeaderMap,
    connect_info: Option<&Extension<ConnectInfo<SocketAddr>>>,
) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if forwarded.is_some() {
        return forwarded.map(str::to_string);
    }
    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .or_else(|| connect_info.map(|Extension(ConnectInfo(addr))| addr.ip().to_string()))
}

/// Static bearer token guarding the admin listing.
#[derive(Clone, Debug, Default)]
pub struct AdminAuth {
    token: Option<SecretString>,
}

impl AdminAuth {
    #[must_use]
    pub fn new(token: Option<SecretString>) -> Self {
        let token = token.filter(|token| !token.expose_secret().is_empty());
        Self { token }
    }

    /// No token configured; the listing is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.token.is_none()
    }

    #[must_use]
    pub fn authorize(&self, headers: &HeaderMap) -> bool {
        let Some(expected) = &self.token else {
            return true;
        };

        let Some(value) = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
        else {
            return false;
        };

        let presented = value
            .trim()
            .strip_prefix("Bearer ")
            .or_else(|| value.trim().strip_prefix("bearer "))
            .map(str::trim);

        presented.is_some_and(|token| {
            bool::from(token.as_bytes().ct_eq(expected.expose_secret().as_bytes()))
        })
    }
}
