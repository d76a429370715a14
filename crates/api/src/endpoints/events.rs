//! Calendar endpoints.

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use chrono::{DateTime, Utc};
use mediateam_common::AppResult;
use mediateam_core::{CreateEventInput, UpdateEventInput};
use mediateam_db::entities::event::{self, EventType};
use serde::{Deserialize, Serialize};

use crate::{
    extractors::{AdminUser, ApiJson, ApiQuery, ClientIp, MemberUser},
    middleware::AppState,
    response::{ApiResponse, no_content},
};

/// Event as shown to clients.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventResponse {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub event_type: EventType,
    pub starts_at: String,
    pub ends_at: String,
    pub created_by: Option<String>,
    pub created_at: String,
    pub updated_at: Option<String>,
}

impl From<event::Model> for EventResponse {
    fn from(event: event::Model) -> Self {
        Self {
            id: event.id,
            title: event.title,
            description: event.description,
            location: event.location,
            event_type: event.event_type,
            starts_at: event.starts_at.to_rfc3339(),
            ends_at: event.ends_at.to_rfc3339(),
            created_by: event.created_by,
            created_at: event.created_at.to_rfc3339(),
            updated_at: event.updated_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// Calendar window query.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEventsQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

const fn default_limit() -> u64 {
    50
}

async fn list_events(
    MemberUser(_user): MemberUser,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListEventsQuery>,
) -> AppResult<ApiResponse<Vec<EventResponse>>> {
    let events = state
        .event_service
        .list(query.from, query.to, query.limit)
        .await?;
    Ok(ApiResponse::ok(events.into_iter().map(Into::into).collect()))
}

async fn get_event(
    MemberUser(_user): MemberUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<EventResponse>> {
    let event = state.event_service.get(&id).await?;
    Ok(ApiResponse::ok(event.into()))
}

async fn create_event(
    AdminUser(admin): AdminUser,
    ClientIp(ip): ClientIp,
    State(state): State<AppState>,
    ApiJson(input): ApiJson<CreateEventInput>,
) -> AppResult<ApiResponse<EventResponse>> {
    let event = state.event_service.create(input, &admin.id, ip).await?;
    Ok(ApiResponse::created(event.into()))
}

async fn update_event(
    AdminUser(admin): AdminUser,
    ClientIp(ip): ClientIp,
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<UpdateEventInput>,
) -> AppResult<ApiResponse<EventResponse>> {
    let event = state
        .event_service
        .update(&id, input, &admin.id, ip)
        .await?;
    Ok(ApiResponse::ok(event.into()))
}

async fn delete_event(
    AdminUser(admin): AdminUser,
    ClientIp(ip): ClientIp,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state.event_service.delete(&id, &admin.id, ip).await?;
    Ok(no_content())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_events).post(create_event))
        .route(
            "/{id}",
            get(get_event).patch(update_event).delete(delete_event),
        )
}
