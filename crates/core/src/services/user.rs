//! User service.

use std::collections::HashSet;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Utc;
use mediateam_common::{AppError, AppResult, IdGenerator, config::BootstrapAdminConfig};
use mediateam_db::{
    entities::{activity_log::ActivityAction, notification::NotificationType, user},
    repositories::{UserFilter, UserRepository},
};
use sea_orm::Set;
use tracing::info;

use crate::services::{
    activity_log::ActivityEntry,
    dispatch::{DispatcherService, dispatch_and_log},
    notification::NotifyJob,
};

/// Minimum accepted password length.
pub(crate) const MIN_PASSWORD_LEN: usize = 8;

/// Maximum accepted password length.
pub(crate) const MAX_PASSWORD_LEN: usize = 128;

/// Longest username derived from an email address.
const MAX_USERNAME_LEN: usize = 32;

/// Fallback when an email local part has no usable characters.
const FALLBACK_USERNAME: &str = "member";

/// Maximum page size for listing users.
const MAX_LIMIT: u64 = 100;

/// User service for business logic.
#[derive(Clone)]
pub struct UserService {
    user_repo: UserRepository,
    dispatcher: DispatcherService,
    id_gen: IdGenerator,
}

impl UserService {
    /// Create a new user service.
    #[must_use]
    pub const fn new(user_repo: UserRepository, dispatcher: DispatcherService) -> Self {
        Self {
            user_repo,
            dispatcher,
            id_gen: IdGenerator::new(),
        }
    }

    /// Get a user by ID.
    pub async fn get(&self, id: &str) -> AppResult<user::Model> {
        self.user_repo.get_by_id(id).await
    }

    /// List users, newest first, with the total match count.
    pub async fn list(
        &self,
        filter: &UserFilter,
        limit: u64,
        offset: u64,
    ) -> AppResult<(Vec<user::Model>, u64)> {
        let limit = limit.clamp(1, MAX_LIMIT);
        let users = self.user_repo.list(filter, limit, offset).await?;
        let total = self.user_repo.count(filter).await?;
        Ok((users, total))
    }

    /// Activate or deactivate an account.
    pub async fn set_active(
        &self,
        id: &str,
        active: bool,
        admin_id: &str,
        ip_address: Option<String>,
    ) -> AppResult<user::Model> {
        if id == admin_id && !active {
            return Err(AppError::BadRequest(
                "You cannot deactivate your own account".to_string(),
            ));
        }

        let user = self.user_repo.get_by_id(id).await?;
        if user.is_active == active {
            return Ok(user);
        }

        let mut model: user::ActiveModel = user.into();
        model.is_active = Set(active);
        model.updated_at = Set(Some(Utc::now().into()));
        let updated = self.user_repo.update(model).await?;

        let (action, verb) = if active {
            (ActivityAction::UserReactivated, "reactivated")
        } else {
            (ActivityAction::UserDeactivated, "deactivated")
        };

        dispatch_and_log(
            self.dispatcher.as_ref(),
            NotifyJob::new(
                vec![updated.id.clone()],
                NotificationType::AccountStatus,
                format!("Account {verb}"),
                format!("Your account was {verb} by an administrator."),
            ),
        )
        .await;
        dispatch_and_log(
            self.dispatcher.as_ref(),
            ActivityEntry::new(
                action,
                "user",
                &updated.id,
                format!("{} account {verb}", updated.username),
            )
            .by(admin_id)
            .from_ip(ip_address),
        )
        .await;

        info!(user_id = %updated.id, active, admin_id = %admin_id, "Account status changed");

        Ok(updated)
    }

    /// Pick a free username for an email address.
    ///
    /// The base name is the sanitised local part; if it is taken, the first free
    /// numeric suffix starting at 2 is appended.
    pub async fn available_username(&self, email: &str) -> AppResult<String> {
        let base = username_from_email(email);
        let taken = self.user_repo.find_usernames_with_prefix(&base).await?;
        Ok(first_free_username(&base, &taken))
    }

    /// Create the configured administrator when no active administrator exists.
    ///
    /// An existing account with the configured username is promoted instead.
    pub async fn ensure_admin(
        &self,
        bootstrap: &BootstrapAdminConfig,
    ) -> AppResult<Option<user::Model>> {
        if self.user_repo.count_active_admins().await? > 0 {
            return Ok(None);
        }

        if let Some(existing) = self.user_repo.find_by_username(&bootstrap.username).await? {
            let mut model: user::ActiveModel = existing.into();
            model.is_admin = Set(true);
            model.is_active = Set(true);
            model.updated_at = Set(Some(Utc::now().into()));
            let promoted = self.user_repo.update(model).await?;
            info!(user_id = %promoted.id, username = %promoted.username, "Promoted bootstrap administrator");
            return Ok(Some(promoted));
        }

        validate_new_password(&bootstrap.password)?;

        let model = user::ActiveModel {
            id: Set(self.id_gen.generate()),
            username: Set(bootstrap.username.trim().to_lowercase()),
            email: Set(bootstrap.email.trim().to_lowercase()),
            password_hash: Set(hash_password(&bootstrap.password)?),
            full_name: Set(bootstrap.full_name.clone()),
            phone: Set(None),
            is_admin: Set(true),
            is_active: Set(true),
            must_change_password: Set(true),
            registration_id: Set(None),
            reset_token_hash: Set(None),
            reset_token_expires_at: Set(None),
            last_login_at: Set(None),
            created_at: Set(Utc::now().into()),
            updated_at: Set(None),
        };

        let admin = self.user_repo.create(model).await?;
        info!(user_id = %admin.id, username = %admin.username, "Created bootstrap administrator");

        Ok(Some(admin))
    }
}

/// Derive a login name from an email address: the lower-cased local part restricted
/// to `[a-z0-9._-]`.
#[must_use]
pub fn username_from_email(email: &str) -> String {
    let local = email.trim().split('@').next().unwrap_or_default();
    let name: String = local
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-'))
        .take(MAX_USERNAME_LEN)
        .collect();

    if name.is_empty() {
        FALLBACK_USERNAME.to_string()
    } else {
        name
    }
}

/// First of `base`, `base2`, `base3`, … not present in `taken`.
fn first_free_username(base: &str, taken: &[String]) -> String {
    let taken: HashSet<&str> = taken.iter().map(String::as_str).collect();
    if !taken.contains(base) {
        return base.to_string();
    }

    (2u32..)
        .map(|n| format!("{base}{n}"))
        .find(|candidate| !taken.contains(candidate.as_str()))
        .unwrap_or_else(|| base.to_string())
}

/// Reject passwords outside the accepted length range.
pub(crate) fn validate_new_password(password: &str) -> AppResult<()> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if len > MAX_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at most {MAX_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Hash a password using Argon2.
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {e}")))
}

/// Verify a password against an Argon2 hash.
pub fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("Invalid password hash: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::dispatch::RecordingDispatcher;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;

    fn create_test_user(id: &str, username: &str) -> user::Model {
        user::Model {
            id: id.to_string(),
            username: username.to_string(),
            email: format!("{username}@example.org"),
            password_hash: hash_password("temporary-password").unwrap(),
            full_name: "Jane Doe".to_string(),
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

    fn create_test_service(
        db: sea_orm::DatabaseConnection,
    ) -> (UserService, Arc<RecordingDispatcher>) {
        let recorder = Arc::new(RecordingDispatcher::new());
        let service = UserService::new(UserRepository::new(Arc::new(db)), recorder.clone());
        (service, recorder)
    }

    #[test]
    fn test_hash_password() {
        let hash = hash_password("test_password_123").unwrap();

        assert!(hash.starts_with("$argon2"));
        assert!(hash.len() > 50);
    }

    #[test]
    fn test_verify_password() {
        let hash = hash_password("test_password_123").unwrap();

        assert!(verify_password("test_password_123", &hash).unwrap());
        assert!(!verify_password("wrong_password", &hash).unwrap());
    }

    #[test]
    fn test_verify_password_invalid_hash() {
        assert!(verify_password("test", "invalid_hash").is_err());
    }

    #[test]
    fn test_username_from_email() {
        assert_eq!(username_from_email("jane@x.org"), "jane");
        assert_eq!(username_from_email(" Jane.Doe@X.org "), "jane.doe");
        assert_eq!(username_from_email("j+media@x.org"), "jmedia");
        assert_eq!(username_from_email("o'neil_k-1@x.org"), "oneil_k-1");
        assert_eq!(username_from_email("+++@x.org"), FALLBACK_USERNAME);
    }

    #[test]
    fn test_first_free_username() {
        assert_eq!(first_free_username("jane", &[]), "jane");
        assert_eq!(
            first_free_username("jane", &["janet".to_string()]),
            "jane"
        );
        assert_eq!(
            first_free_username("jane", &["jane".to_string(), "jane2".to_string()]),
            "jane3"
        );
        assert_eq!(
            first_free_username("jane", &["jane".to_string(), "jane3".to_string()]),
            "jane2"
        );
    }

    #[test]
    fn test_validate_new_password_bounds() {
        assert!(validate_new_password("short").is_err());
        assert!(validate_new_password("long enough").is_ok());
        assert!(validate_new_password(&"x".repeat(MAX_PASSWORD_LEN + 1)).is_err());
    }

    #[tokio::test]
    async fn test_available_username_skips_taken() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[
                maplit::btreemap! { "username" => sea_orm::Value::from("jane") },
                maplit::btreemap! { "username" => sea_orm::Value::from("jane2") },
            ]])
            .into_connection();

        let (service, _) = create_test_service(db);
        assert_eq!(
            service.available_username("Jane@x.org").await.unwrap(),
            "jane3"
        );
    }

    #[tokio::test]
    async fn test_cannot_deactivate_self() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let (service, _) = create_test_service(db);

        assert!(matches!(
            service.set_active("admin1", false, "admin1", None).await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_deactivate_notifies_and_logs() {
        let user = create_test_user("user1", "jane");
        let mut deactivated = user.clone();
        deactivated.is_active = false;

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[user]])
            .append_query_results([[deactivated]])
            .into_connection();

        let (service, recorder) = create_test_service(db);
        let updated = service
            .set_active("user1", false, "admin1", Some("203.0.113.9".to_string()))
            .await
            .unwrap();

        assert!(!updated.is_active);
        let notifications = recorder.notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(
            notifications[0].notification_type,
            NotificationType::AccountStatus
        );
        let activities = recorder.activities();
        assert_eq!(activities[0].action, ActivityAction::UserDeactivated);
        assert_eq!(activities[0].actor_id.as_deref(), Some("admin1"));
    }

    #[tokio::test]
    async fn test_set_active_unchanged_is_silent() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_user("user1", "jane")]])
            .into_connection();

        let (service, recorder) = create_test_service(db);
        let user = service
            .set_active("user1", true, "admin1", None)
            .await
            .unwrap();

        assert!(user.is_active);
        assert!(recorder.effects().is_empty());
    }

    #[tokio::test]
    async fn test_ensure_admin_skips_when_admin_exists() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[maplit::btreemap! {
                "num_items" => sea_orm::Value::BigInt(Some(1))
            }]])
            .into_connection();

        let (service, _) = create_test_service(db);
        let bootstrap = BootstrapAdminConfig {
            username: "admin".to_string(),
            email: "admin@example.org".to_string(),
            password: "change-me-now".to_string(),
            full_name: "Administrator".to_string(),
        };

        assert!(service.ensure_admin(&bootstrap).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ensure_admin_creates_account() {
        let mut admin = create_test_user("admin-id", "admin");
        admin.is_admin = true;
        admin.must_change_password = true;

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[maplit::btreemap! {
                "num_items" => sea_orm::Value::BigInt(Some(0))
            }]])
            .append_query_results([Vec::<user::Model>::new()])
            .append_query_results([[admin]])
            .into_connection();

        let (service, _) = create_test_service(db);
        let bootstrap = BootstrapAdminConfig {
            username: "admin".to_string(),
            email: "admin@example.org".to_string(),
            password: "change-me-now".to_string(),
            full_name: "Administrator".to_string(),
        };

        let created = service.ensure_admin(&bootstrap).await.unwrap().unwrap();
        assert!(created.is_admin);
        assert!(created.must_change_password);
    }
}
