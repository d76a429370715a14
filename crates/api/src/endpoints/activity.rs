//! Activity log endpoints.

use axum::{Router, extract::State, routing::get};
use mediateam_common::AppResult;
use mediateam_db::{
    entities::activity_log::{self, ActivityAction},
    repositories::ActivityFilter,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    extractors::{AdminUser, ApiQuery},
    middleware::AppState,
    response::{ApiResponse, Page},
};

/// Log entry as shown to administrators.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityResponse {
    pub id: String,
    pub actor_id: Option<String>,
    pub action: ActivityAction,
    pub subject_type: String,
    pub subject_id: String,
    pub description: String,
    pub metadata: Value,
    pub ip_address: Option<String>,
    pub created_at: String,
}

impl From<activity_log::Model> for ActivityResponse {
    fn from(entry: activity_log::Model) -> Self {
        Self {
            id: entry.id,
            actor_id: entry.actor_id,
            action: entry.action,
            subject_type: entry.subject_type,
            subject_id: entry.subject_id,
            description: entry.description,
            metadata: entry.metadata,
            ip_address: entry.ip_address,
            created_at: entry.created_at.to_rfc3339(),
        }
    }
}

/// Activity log query.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityQuery {
    pub actor_id: Option<String>,
    pub action: Option<ActivityAction>,
    pub subject_type: Option<String>,
    pub subject_id: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
}

const fn default_limit() -> u64 {
    50
}

async fn list(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ActivityQuery>,
) -> AppResult<ApiResponse<Page<ActivityResponse>>> {
    let filter = ActivityFilter {
        actor_id: query.actor_id,
        action: query.action,
        subject_type: query.subject_type,
        subject_id: query.subject_id,
    };
    let limit = query.limit.clamp(1, 100);
    let (entries, total) = state
        .activity_log_service
        .list(&filter, limit, query.offset)
        .await?;

    Ok(ApiResponse::ok(Page::from_models(
        entries,
        total,
        limit,
        query.offset,
    )))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list))
}
