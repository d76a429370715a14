//! Meeting minutes endpoints.

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use mediateam_common::AppResult;
use mediateam_core::{CreateMinutesInput, UpdateMinutesInput};
use mediateam_db::entities::meeting_minutes;
use serde::{Deserialize, Serialize};

use crate::{
    extractors::{AdminUser, ApiJson, ApiQuery, ClientIp, MemberUser},
    middleware::AppState,
    response::{ApiResponse, Page, no_content},
};

/// Minutes as shown to members.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MinutesResponse {
    pub id: String,
    pub title: String,
    pub meeting_date: String,
    pub event_id: Option<String>,
    pub summary: Option<String>,
    pub attendees: Vec<String>,
    pub document_url: Option<String>,
    pub created_by: Option<String>,
    pub created_at: String,
    pub updated_at: Option<String>,
}

impl From<meeting_minutes::Model> for MinutesResponse {
    fn from(minutes: meeting_minutes::Model) -> Self {
        let attendees = minutes.attendee_names();
        Self {
            id: minutes.id,
            title: minutes.title,
            meeting_date: minutes.meeting_date.to_rfc3339(),
            event_id: minutes.event_id,
            summary: minutes.summary,
            attendees,
            document_url: minutes.document_url,
            created_by: minutes.created_by,
            created_at: minutes.created_at.to_rfc3339(),
            updated_at: minutes.updated_at.map(|t| t.to_rfc3339()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMinutesQuery {
    pub event_id: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
}

const fn default_limit() -> u64 {
    20
}

async fn list_minutes(
    MemberUser(_user): MemberUser,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListMinutesQuery>,
) -> AppResult<ApiResponse<Page<MinutesResponse>>> {
    let limit = query.limit.clamp(1, 100);
    let (minutes, total) = state
        .minutes_service
        .list(query.event_id.as_deref(), limit, query.offset)
        .await?;

    Ok(ApiResponse::ok(Page::from_models(
        minutes,
        total,
        limit,
        query.offset,
    )))
}

async fn get_minutes(
    MemberUser(_user): MemberUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<MinutesResponse>> {
    let minutes = state.minutes_service.get(&id).await?;
    Ok(ApiResponse::ok(minutes.into()))
}

async fn create_minutes(
    AdminUser(admin): AdminUser,
    ClientIp(ip): ClientIp,
    State(state): State<AppState>,
    ApiJson(input): ApiJson<CreateMinutesInput>,
) -> AppResult<ApiResponse<MinutesResponse>> {
    let minutes = state.minutes_service.create(input, &admin.id, ip).await?;
    Ok(ApiResponse::created(minutes.into()))
}

async fn update_minutes(
    AdminUser(admin): AdminUser,
    ClientIp(ip): ClientIp,
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<UpdateMinutesInput>,
) -> AppResult<ApiResponse<MinutesResponse>> {
    let minutes = state
        .minutes_service
        .update(&id, input, &admin.id, ip)
        .await?;
    Ok(ApiResponse::ok(minutes.into()))
}

async fn delete_minutes(
    AdminUser(admin): AdminUser,
    ClientIp(ip): ClientIp,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state.minutes_service.delete(&id, &admin.id, ip).await?;
    Ok(no_content())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_minutes).post(create_minutes))
        .route(
            "/{id}",
            get(get_minutes).patch(update_minutes).delete(delete_minutes),
        )
}
