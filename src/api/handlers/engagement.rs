use axum::{
    extract::{ConnectInfo, Extension, Path},
    http::{
        header::{CACHE_CONTROL, CONTENT_TYPE, USER_AGENT},
        HeaderMap,
    },
    response::IntoResponse,
};
use std::net::SocketAddr;
use tracing::{debug, warn};

use super::extract_client_ip;
use crate::signup::SignupService;

/// 1x1 transparent PNG served for every pixel request.
pub const TRACKING_PIXEL: [u8; 67] = [
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4,
    0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00,
    0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE,
    0x42, 0x60, 0x82,
];

#[utoipa::path(
    get,
    path = "/engagement/{filename}",
    params(
        ("filename" = String, Path, description = "Tracking token followed by `.png`")
    ),
    responses(
        (status = 200, description = "Transparent 1x1 PNG, identical for known and unknown tokens", content_type = "image/png")
    ),
    tag = "engagement"
)]
pub async fn pixel(
    Path(filename): Path<String>,
    headers: HeaderMap,
    connect_info: Option<Extension<ConnectInfo<SocketAddr>>>,
    service: Extension<SignupService>,
) -> impl IntoResponse {
    let token = filename.strip_suffix(".png").unwrap_or(&filename);
    let reader_ip = extract_client_ip(&headers, connect_info.as_ref());
    let reader_client = headers
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok());

    match service
        .record_open(token, reader_ip.as_deref(), reader_client)
        .await
    {
        Ok(true) => debug!("Email open recorded"),
        Ok(false) => debug!("Pixel requested for unknown token"),
        Err(err) => warn!("Failed to record email open: {err}"),
    }

    (
        [
            (CONTENT_TYPE, "image/png"),
            (CACHE_CONTROL, "no-store, no-cache, must-revalidate"),
        ],
        TRACKING_PIXEL,
    )
}
