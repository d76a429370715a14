//! Member account endpoints.

use axum::{
    Router,
    extract::{Path, State},
    routing::{get, patch},
};
use mediateam_common::{AppError, AppResult};
use mediateam_core::AssignedRole;
use mediateam_db::{entities::user, repositories::UserFilter};
use serde::{Deserialize, Serialize};

use crate::{
    endpoints::roles::RoleResponse,
    extractors::{AdminUser, ApiQuery, ClientIp, MemberUser},
    middleware::AppState,
    response::{ApiResponse, Page},
};

/// Account as shown to clients. Never carries credentials.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub is_admin: bool,
    pub is_active: bool,
    pub must_change_password: bool,
    pub registration_id: Option<String>,
    pub last_login_at: Option<String>,
    pub created_at: String,
}

impl From<user::Model> for UserResponse {
    fn from(user: user::Model) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            full_name: user.full_name,
            phone: user.phone,
            is_admin: user.is_admin,
            is_active: user.is_active,
            must_change_password: user.must_change_password,
            registration_id: user.registration_id,
            last_login_at: user.last_login_at.map(|t| t.to_rfc3339()),
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

/// Role held by a user.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignedRoleResponse {
    pub role: RoleResponse,
    pub assigned_by: Option<String>,
    pub notes: Option<String>,
    pub assigned_at: String,
}

impl From<AssignedRole> for AssignedRoleResponse {
    fn from(assigned: AssignedRole) -> Self {
        Self {
            role: assigned.role.into(),
            assigned_by: assigned.assigned_by,
            notes: assigned.notes,
            assigned_at: assigned.assigned_at.to_rfc3339(),
        }
    }
}

/// List users query.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListUsersQuery {
    pub active: Option<bool>,
    pub search: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
}

const fn default_limit() -> u64 {
    20
}

/// List accounts.
async fn list_users(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListUsersQuery>,
) -> AppResult<ApiResponse<Page<UserResponse>>> {
    let filter = UserFilter {
        active: query.active,
        search: query.search,
    };
    let limit = query.limit.clamp(1, 100);
    let (users, total) = state
        .user_service
        .list(&filter, limit, query.offset)
        .await?;

    Ok(ApiResponse::ok(Page::from_models(
        users,
        total,
        limit,
        query.offset,
    )))
}

/// Get one account.
async fn get_user(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<UserResponse>> {
    let user = state.user_service.get(&id).await?;
    Ok(ApiResponse::ok(user.into()))
}

/// Deactivate an account.
async fn deactivate_user(
    AdminUser(admin): AdminUser,
    ClientIp(ip): ClientIp,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<UserResponse>> {
    let user = state
        .user_service
        .set_active(&id, false, &admin.id, ip)
        .await?;
    Ok(ApiResponse::ok(user.into()))
}

/// Reactivate an account.
async fn reactivate_user(
    AdminUser(admin): AdminUser,
    ClientIp(ip): ClientIp,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<UserResponse>> {
    let user = state
        .user_service
        .set_active(&id, true, &admin.id, ip)
        .await?;
    Ok(ApiResponse::ok(user.into()))
}

/// Roles held by an account. Members may only look at their own.
async fn user_roles(
    MemberUser(viewer): MemberUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<Vec<AssignedRoleResponse>>> {
    if viewer.id != id && !viewer.is_admin {
        return Err(AppError::Forbidden(
            "You can only view your own roles".to_string(),
        ));
    }

    let roles = state.role_service.roles_for_user(&id).await?;
    Ok(ApiResponse::ok(roles.into_iter().map(Into::into).collect()))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users))
        .route("/{id}", get(get_user))
        .route("/{id}/deactivate", patch(deactivate_user))
        .route("/{id}/reactivate", patch(reactivate_user))
        .route("/{id}/roles", get(user_roles))
}
