//! Ministry role endpoints.

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
};
use mediateam_common::AppResult;
use mediateam_core::{CreateRoleInput, RoleMember, RoleSummary, UpdateRoleInput};
use mediateam_db::entities::{role, user_role};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    extractors::{AdminUser, ApiJson, ApiQuery, ClientIp, MemberUser},
    middleware::AppState,
    response::{ApiResponse, no_content},
};

/// Role as shown to clients.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleResponse {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub responsibilities: Option<String>,
    pub permissions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member_count: Option<u64>,
    pub created_at: String,
    pub updated_at: Option<String>,
}

impl From<role::Model> for RoleResponse {
    fn from(role: role::Model) -> Self {
        Self {
            id: role.id,
            name: role.name,
            description: role.description,
            responsibilities: role.responsibilities,
            permissions: role.permissions,
            member_count: None,
            created_at: role.created_at.to_rfc3339(),
            updated_at: role.updated_at.map(|t| t.to_rfc3339()),
        }
    }
}

impl From<RoleSummary> for RoleResponse {
    fn from(summary: RoleSummary) -> Self {
        Self {
            member_count: Some(summary.member_count),
            ..summary.role.into()
        }
    }
}

/// Member holding a role.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleMemberResponse {
    pub user_id: String,
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub is_active: bool,
    pub assigned_by: Option<String>,
    pub notes: Option<String>,
    pub assigned_at: String,
}

impl From<RoleMember> for RoleMemberResponse {
    fn from(member: RoleMember) -> Self {
        Self {
            user_id: member.user_id,
            username: member.username,
            full_name: member.full_name,
            email: member.email,
            is_active: member.is_active,
            assigned_by: member.assigned_by,
            notes: member.notes,
            assigned_at: member.assigned_at.to_rfc3339(),
        }
    }
}

/// Assignment record.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentResponse {
    pub id: String,
    pub user_id: String,
    pub role_id: String,
    pub assigned_by: Option<String>,
    pub notes: Option<String>,
    pub assigned_at: String,
}

impl From<user_role::Model> for AssignmentResponse {
    fn from(assignment: user_role::Model) -> Self {
        Self {
            id: assignment.id,
            user_id: assignment.user_id,
            role_id: assignment.role_id,
            assigned_by: assignment.assigned_by,
            notes: assignment.notes,
            assigned_at: assignment.assigned_at.to_rfc3339(),
        }
    }
}

async fn list_roles(
    MemberUser(_user): MemberUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<RoleResponse>>> {
    let roles = state.role_service.list().await?;
    Ok(ApiResponse::ok(roles.into_iter().map(Into::into).collect()))
}

async fn get_role(
    MemberUser(_user): MemberUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<RoleResponse>> {
    let role = state.role_service.get(&id).await?;
    Ok(ApiResponse::ok(role.into()))
}

async fn create_role(
    AdminUser(admin): AdminUser,
    ClientIp(ip): ClientIp,
    State(state): State<AppState>,
    ApiJson(input): ApiJson<CreateRoleInput>,
) -> AppResult<ApiResponse<RoleResponse>> {
    let role = state.role_service.create(input, &admin.id, ip).await?;
    Ok(ApiResponse::created(role.into()))
}

async fn update_role(
    AdminUser(admin): AdminUser,
    ClientIp(ip): ClientIp,
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(input): ApiJson<UpdateRoleInput>,
) -> AppResult<ApiResponse<RoleResponse>> {
    let role = state.role_service.update(&id, input, &admin.id, ip).await?;
    Ok(ApiResponse::ok(role.into()))
}

async fn delete_role(
    AdminUser(admin): AdminUser,
    ClientIp(ip): ClientIp,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state.role_service.delete(&id, &admin.id, ip).await?;
    Ok(no_content())
}

/// Members listing query.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembersQuery {
    #[serde(default = "default_limit")]
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
}

const fn default_limit() -> u64 {
    50
}

async fn list_members(
    AdminUser(_admin): AdminUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiQuery(query): ApiQuery<MembersQuery>,
) -> AppResult<ApiResponse<Vec<RoleMemberResponse>>> {
    let members = state
        .role_service
        .members_of_role(&id, query.limit, query.offset)
        .await?;
    Ok(ApiResponse::ok(members.into_iter().map(Into::into).collect()))
}

/// Assign request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    #[validate(length(min = 1, max = 64))]
    pub user_id: String,

    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

async fn assign_member(
    AdminUser(admin): AdminUser,
    ClientIp(ip): ClientIp,
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<AssignRequest>,
) -> AppResult<ApiResponse<AssignmentResponse>> {
    req.validate()?;

    let assignment = state
        .role_service
        .assign(&id, &req.user_id, &admin.id, req.notes, ip)
        .await?;

    Ok(ApiResponse::created(assignment.into()))
}

async fn unassign_member(
    AdminUser(admin): AdminUser,
    ClientIp(ip): ClientIp,
    State(state): State<AppState>,
    Path((id, user_id)): Path<(String, String)>,
) -> AppResult<StatusCode> {
    state
        .role_service
        .unassign(&id, &user_id, &admin.id, ip)
        .await?;
    Ok(no_content())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_roles).post(create_role))
        .route(
            "/{id}",
            get(get_role).patch(update_role).delete(delete_role),
        )
        .route("/{id}/members", get(list_members).post(assign_member))
        .route("/{id}/members/{user_id}", delete(unassign_member))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn role() -> role::Model {
        role::Model {
            id: "role1".to_string(),
            name: "Camera".to_string(),
            description: None,
            responsibilities: None,
            permissions: None,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    #[test]
    fn test_member_count_only_on_listing() {
        let plain = serde_json::to_value(RoleResponse::from(role())).unwrap_or_default();
        assert!(plain.get("memberCount").is_none());

        let summary = serde_json::to_value(RoleResponse::from(RoleSummary {
            role: role(),
            member_count: 3,
        }))
        .unwrap_or_default();
        assert_eq!(summary["memberCount"], 3);
        assert_eq!(summary["name"], "Camera");
    }
}
