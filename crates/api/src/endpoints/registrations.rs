//! Volunteer registration endpoints.

use axum::{
    Router,
    body::Bytes,
    extract::{Path, State},
    http::{
        StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    },
    response::IntoResponse,
    routing::{get, patch},
};
use mediateam_common::{AppError, AppResult};
use mediateam_core::{ApprovalOutcome, RegistrationStats, SubmitRegistrationInput};
use mediateam_db::{
    entities::registration::{self, Gender, RegistrationStatus},
    repositories::RegistrationFilter,
};
use serde::{Deserialize, Serialize};

use crate::{
    endpoints::UserResponse,
    extractors::{AdminUser, ApiJson, ApiQuery, ClientIp},
    middleware::AppState,
    response::{ApiResponse, Page, no_content},
};

/// Registration as shown to administrators.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResponse {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub gender: Gender,
    pub address: Option<String>,
    pub preferred_roles: Vec<String>,
    pub skills: Vec<String>,
    pub availability: Vec<String>,
    pub has_experience: bool,
    pub experience_details: Option<String>,
    pub emergency_contact_name: String,
    pub emergency_contact_phone: String,
    pub motivation: Option<String>,
    pub status: RegistrationStatus,
    pub user_id: Option<String>,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<String>,
    pub rejection_reason: Option<String>,
    pub created_at: String,
    pub updated_at: Option<String>,
}

impl From<registration::Model> for RegistrationResponse {
    fn from(r: registration::Model) -> Self {
        let preferred_roles = r.preferred_role_names();
        let skills = r.skill_names();
        let availability = r.availability_slots();
        Self {
            id: r.id,
            full_name: r.full_name,
            email: r.email,
            phone: r.phone,
            gender: r.gender,
            address: r.address,
            preferred_roles,
            skills,
            availability,
            has_experience: r.has_experience,
            experience_details: r.experience_details,
            emergency_contact_name: r.emergency_contact_name,
            emergency_contact_phone: r.emergency_contact_phone,
            motivation: r.motivation,
            status: r.status,
            user_id: r.user_id,
            reviewed_by: r.reviewed_by,
            reviewed_at: r.reviewed_at.map(|t| t.to_rfc3339()),
            rejection_reason: r.rejection_reason,
            created_at: r.created_at.to_rfc3339(),
            updated_at: r.updated_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// Receipt returned to the applicant.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedResponse {
    pub id: String,
    pub status: RegistrationStatus,
    pub created_at: String,
}

/// Submit a registration. Public.
async fn submit(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<SubmitRegistrationInput>,
) -> AppResult<ApiResponse<SubmittedResponse>> {
    let created = state.registration_service.submit(input).await?;

    Ok(ApiResponse::created(SubmittedResponse {
        id: created.id,
        status: created.status,
        created_at: created.created_at.to_rfc3339(),
    }))
}

/// List registrations query.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRegistrationsQuery {
    pub status: Option<RegistrationStatus>,
    pub search: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
}

const fn default_limit() -> u64 {
    20
}

async fn list(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListRegistrationsQuery>,
) -> AppResult<ApiResponse<Page<RegistrationResponse>>> {
    let filter = RegistrationFilter {
        status: query.status,
        search: query.search,
    };
    let limit = query.limit.clamp(1, 100);
    let (registrations, total) = state
        .registration_service
        .list(&filter, limit, query.offset)
        .await?;

    Ok(ApiResponse::ok(Page::from_models(
        registrations,
        total,
        limit,
        query.offset,
    )))
}

/// Export query: the listing filters without paging.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportQuery {
    pub status: Option<RegistrationStatus>,
    pub search: Option<String>,
}

/// Download matching registrations as a CSV file.
async fn export(
    AdminUser(admin): AdminUser,
    ClientIp(ip): ClientIp,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ExportQuery>,
) -> AppResult<impl IntoResponse> {
    let filter = RegistrationFilter {
        status: query.status,
        search: query.search,
    };
    let csv = state
        .registration_service
        .export_csv(&filter, &admin.id, ip)
        .await?;

    Ok((
        [
            (CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                CONTENT_DISPOSITION,
                "attachment; filename=\"registrations.csv\"",
            ),
        ],
        csv,
    ))
}

async fn stats(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<RegistrationStats>> {
    let stats = state.registration_service.stats().await?;
    Ok(ApiResponse::ok(stats))
}

async fn get_registration(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<RegistrationResponse>> {
    let registration = state.registration_service.get(&id).await?;
    Ok(ApiResponse::ok(registration.into()))
}

/// Approved registration with the account created for it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalResponse {
    pub registration: RegistrationResponse,
    pub user: UserResponse,
}

impl From<ApprovalOutcome> for ApprovalResponse {
    fn from(outcome: ApprovalOutcome) -> Self {
        Self {
            registration: outcome.registration.into(),
            user: outcome.user.into(),
        }
    }
}

/// Approve a pending registration and create the member account.
async fn approve(
    AdminUser(admin): AdminUser,
    ClientIp(ip): ClientIp,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<ApprovalResponse>> {
    let outcome = state
        .registration_service
        .approve(&id, &admin.id, ip)
        .await?;

    Ok(ApiResponse::ok(outcome.into()))
}

/// Reject request. The body itself is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectRequest {
    pub reason: Option<String>,
}

impl RejectRequest {
    fn from_body(body: &[u8]) -> AppResult<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body)
            .map_err(|e| AppError::Validation(format!("Invalid request body: {e}")))
    }
}

/// Reject a pending registration.
async fn reject(
    AdminUser(admin): AdminUser,
    ClientIp(ip): ClientIp,
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> AppResult<ApiResponse<RegistrationResponse>> {
    let req = RejectRequest::from_body(&body)?;

    let rejected = state
        .registration_service
        .reject(&id, &admin.id, req.reason, ip)
        .await?;

    Ok(ApiResponse::ok(rejected.into()))
}

/// Delete a registration in any status.
async fn delete_registration(
    AdminUser(admin): AdminUser,
    ClientIp(ip): ClientIp,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state
        .registration_service
        .delete(&id, &admin.id, ip)
        .await?;
    Ok(no_content())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(submit))
        .route("/stats", get(stats))
        .route("/export", get(export))
        .route("/{id}", get(get_registration).delete(delete_registration))
        .route("/{id}/approve", patch(approve))
        .route("/{id}/reject", patch(reject))
}
