//! Role catalogue and role assignment service.

use chrono::{DateTime, FixedOffset, Utc};
use mediateam_common::{AppError, AppResult, IdGenerator};
use mediateam_db::{
    entities::{activity_log::ActivityAction, notification::NotificationType, role, user_role},
    repositories::{RoleRepository, UserRepository},
};
use sea_orm::Set;
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use validator::Validate;

use crate::services::{
    activity_log::ActivityEntry,
    dispatch::{DispatcherService, dispatch_and_log},
    email::EmailJob,
    notification::NotifyJob,
};

/// Maximum page size for listing role members.
const MAX_LIMIT: u64 = 100;

/// Input for creating a role.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoleInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,

    #[validate(length(max = 2000))]
    pub description: Option<String>,

    #[validate(length(max = 4000))]
    pub responsibilities: Option<String>,

    #[validate(length(max = 4000))]
    pub permissions: Option<String>,
}

/// Input for updating a role. Absent fields are left unchanged; `null` clears a
/// text field.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRoleInput {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    pub responsibilities: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    pub permissions: Option<Option<String>>,
}

fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

/// A role with its member count.
#[derive(Debug, Clone)]
pub struct RoleSummary {
    pub role: role::Model,
    pub member_count: u64,
}

/// A role held by a user.
#[derive(Debug, Clone)]
pub struct AssignedRole {
    pub role: role::Model,
    pub assigned_by: Option<String>,
    pub notes: Option<String>,
    pub assigned_at: DateTime<FixedOffset>,
}

/// A user holding a role.
#[derive(Debug, Clone)]
pub struct RoleMember {
    pub user_id: String,
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub is_active: bool,
    pub assigned_by: Option<String>,
    pub notes: Option<String>,
    pub assigned_at: DateTime<FixedOffset>,
}

/// Role service.
#[derive(Clone)]
pub struct RoleService {
    role_repo: RoleRepository,
    user_repo: UserRepository,
    dispatcher: DispatcherService,
    id_gen: IdGenerator,
}

impl RoleService {
    /// Create a new role service.
    #[must_use]
    pub const fn new(
        role_repo: RoleRepository,
        user_repo: UserRepository,
        dispatcher: DispatcherService,
    ) -> Self {
        Self {
            role_repo,
            user_repo,
            dispatcher,
            id_gen: IdGenerator::new(),
        }
    }

    /// All roles with member counts.
    pub async fn list(&self) -> AppResult<Vec<RoleSummary>> {
        let roles = self.role_repo.list().await?;
        let mut summaries = Vec::with_capacity(roles.len());
        for role in roles {
            let member_count = self.role_repo.count_members(&role.id).await?;
            summaries.push(RoleSummary { role, member_count });
        }
        Ok(summaries)
    }

    /// Get a role by ID.
    pub async fn get(&self, id: &str) -> AppResult<role::Model> {
        self.role_repo.get_by_id(id).await
    }

    /// Create a role. Names are unique.
    pub async fn create(
        &self,
        input: CreateRoleInput,
        admin_id: &str,
        ip_address: Option<String>,
    ) -> AppResult<role::Model> {
        input.validate()?;
        let name = input.name.trim().to_string();
        self.ensure_name_free(&name, None).await?;

        let model = role::ActiveModel {
            id: Set(self.id_gen.generate()),
            name: Set(name),
            description: Set(non_empty(input.description)),
            responsibilities: Set(non_empty(input.responsibilities)),
            permissions: Set(non_empty(input.permissions)),
            created_at: Set(Utc::now().into()),
            updated_at: Set(None),
        };
        let role = self.role_repo.create(model).await?;

        dispatch_and_log(
            self.dispatcher.as_ref(),
            ActivityEntry::new(
                ActivityAction::RoleCreated,
                "role",
                &role.id,
                format!("Created role {}", role.name),
            )
            .by(admin_id)
            .from_ip(ip_address),
        )
        .await;

        info!(role_id = %role.id, name = %role.name, "Role created");

        Ok(role)
    }

    /// Update a role.
    pub async fn update(
        &self,
        id: &str,
        input: UpdateRoleInput,
        admin_id: &str,
        ip_address: Option<String>,
    ) -> AppResult<role::Model> {
        input.validate()?;
        let role = self.role_repo.get_by_id(id).await?;

        let mut model: role::ActiveModel = role.into();
        if let Some(name) = input.name {
            let name = name.trim().to_string();
            self.ensure_name_free(&name, Some(id)).await?;
            model.name = Set(name);
        }
        if let Some(description) = input.description {
            model.description = Set(non_empty(description));
        }
        if let Some(responsibilities) = input.responsibilities {
            model.responsibilities = Set(non_empty(responsibilities));
        }
        if let Some(permissions) = input.permissions {
            model.permissions = Set(non_empty(permissions));
        }
        model.updated_at = Set(Some(Utc::now().into()));

        let updated = self.role_repo.update(model).await?;

        dispatch_and_log(
            self.dispatcher.as_ref(),
            ActivityEntry::new(
                ActivityAction::RoleUpdated,
                "role",
                &updated.id,
                format!("Updated role {}", updated.name),
            )
            .by(admin_id)
            .from_ip(ip_address),
        )
        .await;

        Ok(updated)
    }

    /// Delete a role and its assignments.
    pub async fn delete(
        &self,
        id: &str,
        admin_id: &str,
        ip_address: Option<String>,
    ) -> AppResult<()> {
        let role = self.role_repo.get_by_id(id).await?;
        let role_id = role.id.clone();
        let name = role.name.clone();
        self.role_repo.delete(role).await?;

        dispatch_and_log(
            self.dispatcher.as_ref(),
            ActivityEntry::new(
                ActivityAction::RoleDeleted,
                "role",
                &role_id,
                format!("Deleted role {name}"),
            )
            .by(admin_id)
            .from_ip(ip_address),
        )
        .await;

        info!(role_id = %role_id, name = %name, "Role deleted");

        Ok(())
    }

    /// Give a role to a user. A user holds each role at most once.
    pub async fn assign(
        &self,
        role_id: &str,
        user_id: &str,
        admin_id: &str,
        notes: Option<String>,
        ip_address: Option<String>,
    ) -> AppResult<user_role::Model> {
        let role = self.role_repo.get_by_id(role_id).await?;
        let user = self.user_repo.get_by_id(user_id).await?;
        if !user.is_active {
            return Err(AppError::BadRequest(format!(
                "User {} is deactivated",
                user.username
            )));
        }

        if self
            .role_repo
            .find_assignment(user_id, role_id)
            .await?
            .is_some()
        {
            return Err(AppError::DuplicateAssignment(format!(
                "{} already holds the {} role",
                user.username, role.name
            )));
        }

        let notes = non_empty(notes);
        let model = user_role::ActiveModel {
            id: Set(self.id_gen.generate()),
            user_id: Set(user.id.clone()),
            role_id: Set(role.id.clone()),
            assigned_by: Set(Some(admin_id.to_string())),
            notes: Set(notes.clone()),
            assigned_at: Set(Utc::now().into()),
        };

        // A concurrent assignment of the same pair trips the unique index.
        let assignment = self.role_repo.assign(model).await.map_err(|e| match e {
            AppError::Database(message) if is_unique_violation(&message) => {
                AppError::DuplicateAssignment(format!(
                    "{} already holds the {} role",
                    user.username, role.name
                ))
            }
            other => other,
        })?;

        dispatch_and_log(
            self.dispatcher.as_ref(),
            EmailJob::RoleAssigned {
                to: user.email.clone(),
                full_name: user.full_name.clone(),
                role_name: role.name.clone(),
                notes,
            },
        )
        .await;
        dispatch_and_log(
            self.dispatcher.as_ref(),
            NotifyJob::new(
                vec![user.id.clone()],
                NotificationType::RoleAssigned,
                "New role assigned",
                format!("You have been assigned the {} role.", role.name),
            )
            .with_link(format!("/roles/{}", role.id))
            .with_metadata(json!({ "roleId": role.id })),
        )
        .await;
        dispatch_and_log(
            self.dispatcher.as_ref(),
            ActivityEntry::new(
                ActivityAction::RoleAssigned,
                "user",
                &user.id,
                format!("Assigned {} to {}", role.name, user.username),
            )
            .by(admin_id)
            .from_ip(ip_address)
            .with_metadata(json!({ "roleId": role.id, "roleName": role.name })),
        )
        .await;

        info!(role_id = %role.id, user_id = %user.id, admin_id = %admin_id, "Role assigned");

        Ok(assignment)
    }

    /// Take a role away from a user.
    pub async fn unassign(
        &self,
        role_id: &str,
        user_id: &str,
        admin_id: &str,
        ip_address: Option<String>,
    ) -> AppResult<()> {
        let role = self.role_repo.get_by_id(role_id).await?;
        if !self.role_repo.unassign(user_id, role_id).await? {
            return Err(AppError::NotFound(format!(
                "Assignment of role {role_id} to user {user_id}"
            )));
        }

        dispatch_and_log(
            self.dispatcher.as_ref(),
            NotifyJob::new(
                vec![user_id.to_string()],
                NotificationType::RoleRemoved,
                "Role removed",
                format!("You no longer hold the {} role.", role.name),
            )
            .with_metadata(json!({ "roleId": role.id })),
        )
        .await;
        dispatch_and_log(
            self.dispatcher.as_ref(),
            ActivityEntry::new(
                ActivityAction::RoleUnassigned,
                "user",
                user_id,
                format!("Removed {} from user {user_id}", role.name),
            )
            .by(admin_id)
            .from_ip(ip_address)
            .with_metadata(json!({ "roleId": role.id, "roleName": role.name })),
        )
        .await;

        Ok(())
    }

    /// Roles held by a user.
    pub async fn roles_for_user(&self, user_id: &str) -> AppResult<Vec<AssignedRole>> {
        self.user_repo.get_by_id(user_id).await?;

        let rows = self.role_repo.roles_for_user(user_id).await?;
        Ok(rows
            .into_iter()
            .filter_map(|(assignment, role)| {
                role.map(|role| AssignedRole {
                    role,
                    assigned_by: assignment.assigned_by,
                    notes: assignment.notes,
                    assigned_at: assignment.assigned_at,
                })
            })
            .collect())
    }

    /// Users holding a role.
    pub async fn members_of_role(
        &self,
        role_id: &str,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<RoleMember>> {
        self.role_repo.get_by_id(role_id).await?;

        let limit = limit.clamp(1, MAX_LIMIT);
        let rows = self.role_repo.members_of_role(role_id, limit, offset).await?;
        Ok(rows
            .into_iter()
            .filter_map(|(assignment, user)| {
                user.map(|user| RoleMember {
                    user_id: user.id,
                    username: user.username,
                    full_name: user.full_name,
                    email: user.email,
                    is_active: user.is_active,
                    assigned_by: assignment.assigned_by,
                    notes: assignment.notes,
                    assigned_at: assignment.assigned_at,
                })
            })
            .collect())
    }

    async fn ensure_name_free(&self, name: &str, except_id: Option<&str>) -> AppResult<()> {
        if let Some(existing) = self.role_repo.find_by_name(name).await?
            && Some(existing.id.as_str()) != except_id
        {
            return Err(AppError::Conflict(format!("Role {name} already exists")));
        }
        Ok(())
    }
}

fn is_unique_violation(message: &str) -> bool {
    message.contains("duplicate key") || message.contains("UNIQUE constraint")
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
