//! Administrator dashboard endpoints.

use axum::{Router, extract::State, routing::get};
use mediateam_common::AppResult;
use mediateam_core::DashboardStats;

use crate::{extractors::AdminUser, middleware::AppState, response::ApiResponse};

/// Headline numbers for the admin dashboard.
async fn stats(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<DashboardStats>> {
    let stats = state.dashboard_service.stats().await?;
    Ok(ApiResponse::ok(stats))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/stats", get(stats))
}
