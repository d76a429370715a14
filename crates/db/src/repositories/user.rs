//! User repository.

use std::sync::Arc;

use super::escape_like;
use crate::entities::{User, user};
use chrono::{DateTime, Utc};
use mediateam_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, sea_query::Expr,
};

/// Filter for listing users.
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    /// Only active (`true`) or deactivated (`false`) accounts.
    pub active: Option<bool>,
    /// Case-insensitive substring over username, full name and email.
    pub search: Option<String>,
}

impl UserFilter {
    fn condition(&self) -> Condition {
        let mut condition = Condition::all();

        if let Some(active) = self.active {
            condition = condition.add(user::Column::IsActive.eq(active));
        }

        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", escape_like(&search.to_lowercase()));
            condition = condition.add(
                Condition::any()
                    .add(user::Column::Username.like(pattern.clone()))
                    .add(user::Column::Email.like(pattern.clone()))
                    .add(
                        Expr::expr(sea_orm::sea_query::Func::lower(Expr::col(
                            user::Column::FullName,
                        )))
                        .like(pattern),
                    ),
            );
        }

        condition
    }
}

/// User repository for database operations.
#[derive(Clone)]
pub struct UserRepository {
    db: Arc<DatabaseConnection>,
}

impl UserRepository {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a user by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<user::Model>> {
        User::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a user by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<user::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {id}")))
    }

    /// Find a user by username (exact, lower-case).
    pub async fn find_by_username(&self, username: &str) -> AppResult<Option<user::Model>> {
        User::find()
            .filter(user::Column::Username.eq(username.to_lowercase()))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a user by email (lower-case).
    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<user::Model>> {
        User::find()
            .filter(user::Column::Email.eq(email.trim().to_lowercase()))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find the account created from a registration.
    pub async fn find_by_registration_id(
        &self,
        registration_id: &str,
    ) -> AppResult<Option<user::Model>> {
        User::find()
            .filter(user::Column::RegistrationId.eq(registration_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a user by the digest of an unexpired password reset token.
    pub async fn find_by_reset_token_hash(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<user::Model>> {
        User::find()
            .filter(user::Column::ResetTokenHash.eq(token_hash))
            .filter(user::Column::ResetTokenExpiresAt.gt(now))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Usernames starting with a prefix, used to pick a free login name.
    pub async fn find_usernames_with_prefix(&self, prefix: &str) -> AppResult<Vec<String>> {
        let pattern = format!("{}%", escape_like(prefix));
        User::find()
            .filter(user::Column::Username.like(pattern))
            .select_only()
            .column(user::Column::Username)
            .into_tuple::<String>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// IDs of every active account.
    pub async fn find_active_ids(&self) -> AppResult<Vec<String>> {
        User::find()
            .filter(user::Column::IsActive.eq(true))
            .select_only()
            .column(user::Column::Id)
            .into_tuple::<String>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Number of active administrator accounts.
    pub async fn count_active_admins(&self) -> AppResult<u64> {
        User::find()
            .filter(user::Column::IsAdmin.eq(true))
            .filter(user::Column::IsActive.eq(true))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new user.
    pub async fn create(&self, model: user::ActiveModel) -> AppResult<user::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a user.
    pub async fn update(&self, model: user::ActiveModel) -> AppResult<user::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Record a successful login (single UPDATE query, no fetch).
    pub async fn touch_last_login(&self, user_id: &str, at: DateTime<Utc>) -> AppResult<()> {
        User::update_many()
            .col_expr(user::Column::LastLoginAt, Expr::value(at))
            .filter(user::Column::Id.eq(user_id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Clear expired reset tokens. Returns the number of accounts touched.
    pub async fn clear_expired_reset_tokens(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let result = User::update_many()
            .col_expr(user::Column::ResetTokenHash, Expr::value(Option::<String>::None))
            .col_expr(
                user::Column::ResetTokenExpiresAt,
                Expr::value(Option::<DateTime<Utc>>::None),
            )
            .filter(user::Column::ResetTokenExpiresAt.lte(now))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected)
    }

    /// List users (paginated), newest first.
    pub async fn list(
        &self,
        filter: &UserFilter,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<user::Model>> {
        User::find()
            .filter(filter.condition())
            .order_by_desc(user::Column::CreatedAt)
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count users matching a filter.
    pub async fn count(&self, filter: &UserFilter) -> AppResult<u64> {
        User::find()
            .filter(filter.condition())
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Set};

    fn create_test_user(id: &str, username: &str) -> user::Model {
        user::Model {
            id: id.to_string(),
            username: username.to_string(),
            email: format!("{username}@example.com"),
            password_hash: "$argon2id$hash".to_string(),
            full_name: "Test User".to_string(),
            phone: None,
            is_admin: false,
            is_active: true,
            must_change_password: false,
            registration_id: None,
            reset_token_hash: None,
            reset_token_expires_at: None,
            last_login_at: None,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_find_by_id_found() {
        let user = create_test_user("user1", "testuser");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[user.clone()]])
                .into_connection(),
        );

        let repo = UserRepository::new(db);
        let found = repo.find_by_id("user1").await.unwrap().unwrap();

        assert_eq!(found.id, "user1");
        assert_eq!(found.username, "testuser");
    }

    #[tokio::test]
    async fn test_get_by_id_not_found_returns_error() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<user::Model>::new()])
                .into_connection(),
        );

        let repo = UserRepository::new(db);
        let result = repo.get_by_id("nonexistent").await;

        match result {
            Err(AppError::NotFound(msg)) => assert!(msg.contains("nonexistent")),
            _ => panic!("Expected NotFound error"),
        }
    }

    #[tokio::test]
    async fn test_find_by_email() {
        let user = create_test_user("user1", "ada");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[user.clone()]])
                .into_connection(),
        );

        let repo = UserRepository::new(db);
        let result = repo.find_by_email(" Ada@Example.com ").await.unwrap();

        assert_eq!(result.unwrap().email, "ada@example.com");
    }

    #[tokio::test]
    async fn test_find_usernames_with_prefix() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[
                    maplit::btreemap! { "username" => sea_orm::Value::from("ada") },
                    maplit::btreemap! { "username" => sea_orm::Value::from("ada2") },
                ]])
                .into_connection(),
        );

        let repo = UserRepository::new(db);
        let names = repo.find_usernames_with_prefix("ada").await.unwrap();

        assert_eq!(names, vec!["ada".to_string(), "ada2".to_string()]);
    }

    #[tokio::test]
    async fn test_create_user() {
        let user = create_test_user("user1", "newuser");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[user.clone()]])
                .into_connection(),
        );

        let repo = UserRepository::new(db);

        let active = user::ActiveModel {
            id: Set("user1".to_string()),
            username: Set("newuser".to_string()),
            ..Default::default()
        };

        let created = repo.create(active).await.unwrap();
        assert_eq!(created.username, "newuser");
    }

    #[tokio::test]
    async fn test_clear_expired_reset_tokens() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 2,
                }])
                .into_connection(),
        );

        let repo = UserRepository::new(db);
        let cleared = repo.clear_expired_reset_tokens(Utc::now()).await.unwrap();

        assert_eq!(cleared, 2);
    }

    #[tokio::test]
    async fn test_count_active() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[maplit::btreemap! {
                    "num_items" => sea_orm::Value::BigInt(Some(7))
                }]])
                .into_connection(),
        );

        let repo = UserRepository::new(db);
        let filter = UserFilter {
            active: Some(true),
            search: None,
        };

        assert_eq!(repo.count(&filter).await.unwrap(), 7);
    }
}
