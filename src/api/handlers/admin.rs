use axum::{
    extract::{rejection::QueryRejection, Extension, Query},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use tracing::warn;
use utoipa::IntoParams;

use super::AdminAuth;
use crate::api::error::{error_response, ErrorBody};
use crate::signup::{SignupPage, SignupService};

#[derive(Deserialize, IntoParams, Debug, Default)]
#[into_params(parameter_in = Query)]
pub struct ListParams {
    /// 1-based page number (default 1).
    pub page: Option<u32>,
    /// Page size, clamped to 1..=100 (default 50).
    pub limit: Option<u32>,
}

/// Paginated signups, newest first.
#[utoipa::path(
    get,
    path = "/admin/list",
    params(ListParams),
    responses(
        (status = 200, description = "One page of signups", body = SignupPage),
        (status = 400, description = "Invalid query", body = ErrorBody),
        (status = 401, description = "Missing or invalid admin token", body = ErrorBody),
        (status = 500, description = "Service temporarily unavailable", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn list(
    headers: HeaderMap,
    admin: Extension<AdminAuth>,
    service: Extension<SignupService>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Response {
    if !admin.authorize(&headers) {
        warn!("Rejected admin listing request");
        return error_response(StatusCode::UNAUTHORIZED, "Unauthorized");
    }

    let Ok(Query(params)) = params else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid request");
    };

    match service.list(params.page, params.limit).await {
        Ok(page) => Json(page).into_response(),
        Err(err) => err.into_response(),
    }
}
