//! Role and role-assignment repository.

use std::sync::Arc;

use crate::entities::{Role, User, UserRole, role, user, user_role};
use mediateam_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect,
};

/// Role repository for database operations.
#[derive(Clone)]
pub struct RoleRepository {
    db: Arc<DatabaseConnection>,
}

impl RoleRepository {
    /// Create a new role repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a role by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<role::Model>> {
        Role::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a role by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<role::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Role {id}")))
    }

    /// Find a role by exact name.
    pub async fn find_by_name(&self, name: &str) -> AppResult<Option<role::Model>> {
        Role::find()
            .filter(role::Column::Name.eq(name))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// All roles, by name.
    pub async fn list(&self) -> AppResult<Vec<role::Model>> {
        Role::find()
            .order_by_asc(role::Column::Name)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Total number of roles.
    pub async fn count(&self) -> AppResult<u64> {
        Role::find()
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new role.
    pub async fn create(&self, model: role::ActiveModel) -> AppResult<role::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a role.
    pub async fn update(&self, model: role::ActiveModel) -> AppResult<role::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a role. Assignments cascade.
    pub async fn delete(&self, model: role::Model) -> AppResult<()> {
        model
            .delete(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Find the assignment of a role to a user.
    pub async fn find_assignment(
        &self,
        user_id: &str,
        role_id: &str,
    ) -> AppResult<Option<user_role::Model>> {
        UserRole::find()
            .filter(user_role::Column::UserId.eq(user_id))
            .filter(user_role::Column::RoleId.eq(role_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create an assignment.
    pub async fn assign(&self, model: user_role::ActiveModel) -> AppResult<user_role::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Remove an assignment. Returns whether a row was removed.
    pub async fn unassign(&self, user_id: &str, role_id: &str) -> AppResult<bool> {
        let result = UserRole::delete_many()
            .filter(user_role::Column::UserId.eq(user_id))
            .filter(user_role::Column::RoleId.eq(role_id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected > 0)
    }

    /// Number of members holding a role.
    pub async fn count_members(&self, role_id: &str) -> AppResult<u64> {
        UserRole::find()
            .filter(user_role::Column::RoleId.eq(role_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Roles held by a user, with the assignment rows.
    pub async fn roles_for_user(
        &self,
        user_id: &str,
    ) -> AppResult<Vec<(user_role::Model, Option<role::Model>)>> {
        UserRole::find()
            .filter(user_role::Column::UserId.eq(user_id))
            .order_by_asc(user_role::Column::AssignedAt)
            .find_also_related(Role)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Members holding a role, with the assignment rows.
    pub async fn members_of_role(
        &self,
        role_id: &str,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<(user_role::Model, Option<user::Model>)>> {
        UserRole::find()
            .filter(user_role::Column::RoleId.eq(role_id))
            .order_by_asc(user_role::Column::AssignedAt)
            .offset(offset)
            .limit(limit)
            .find_also_related(User)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn create_test_role(id: &str, name: &str) -> role::Model {
        role::Model {
            id: id.to_string(),
            name: name.to_string(),
            description: Some("Operates the main camera".to_string()),
            responsibilities: None,
            permissions: None,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    fn create_test_assignment(user_id: &str, role_id: &str) -> user_role::Model {
        user_role::Model {
            id: format!("{user_id}-{role_id}"),
            user_id: user_id.to_string(),
            role_id: role_id.to_string(),
            assigned_by: Some("admin1".to_string()),
            notes: None,
            assigned_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_get_by_id_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<role::Model>::new()])
                .into_connection(),
        );

        let repo = RoleRepository::new(db);
        assert!(matches!(
            repo.get_by_id("missing").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_roles() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[
                    create_test_role("r1", "Camera"),
                    create_test_role("r2", "Projection"),
                ]])
                .into_connection(),
        );

        let repo = RoleRepository::new(db);
        let roles = repo.list().await.unwrap();

        assert_eq!(roles.len(), 2);
        assert_eq!(roles[0].name, "Camera");
    }

    #[tokio::test]
    async fn test_find_assignment() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_assignment("user1", "r1")]])
                .into_connection(),
        );

        let repo = RoleRepository::new(db);
        let found = repo.find_assignment("user1", "r1").await.unwrap();

        assert_eq!(found.unwrap().role_id, "r1");
    }

    #[tokio::test]
    async fn test_unassign_missing_returns_false() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                }])
                .into_connection(),
        );

        let repo = RoleRepository::new(db);
        assert!(!repo.unassign("user1", "r1").await.unwrap());
    }

    #[tokio::test]
    async fn test_count_members() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[maplit::btreemap! {
                    "num_items" => sea_orm::Value::BigInt(Some(4))
                }]])
                .into_connection(),
        );

        let repo = RoleRepository::new(db);
        assert_eq!(repo.count_members("r1").await.unwrap(), 4);
    }
}
