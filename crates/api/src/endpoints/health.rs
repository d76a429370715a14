//! Liveness endpoint.

use axum::{Router, routing::get};
use mediateam_common::AppResult;
use serde::Serialize;

use crate::{middleware::AppState, response::ApiResponse};

/// Health response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

async fn health() -> AppResult<ApiResponse<HealthResponse>> {
    Ok(ApiResponse::ok(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    }))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
