//! Authentication service: sessions, password changes and password reset.

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use mediateam_common::{AppError, AppResult, IdGenerator, config::AuthConfig, hash_secret};
use mediateam_db::{entities::user, repositories::UserRepository};
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::services::{
    dispatch::{DispatcherService, dispatch_and_log},
    email::{Credential, EmailJob},
    user::{hash_password, validate_new_password, verify_password},
};

/// Random bytes in a password reset token.
const RESET_TOKEN_BYTES: usize = 32;

/// Session token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User ID.
    pub sub: String,
    /// Whether the user is an administrator.
    pub adm: bool,
    /// Whether the user must rotate their password before doing anything else.
    pub rot: bool,
    /// Issued at (unix seconds).
    pub iat: i64,
    /// Expiry (unix seconds).
    pub exp: i64,
}

/// A signed session for a user.
#[derive(Debug, Clone)]
pub struct LoginResult {
    pub token: String,
    pub user: user::Model,
}

/// Authentication service.
#[derive(Clone)]
pub struct AuthService {
    user_repo: UserRepository,
    dispatcher: DispatcherService,
    id_gen: IdGenerator,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_ttl: Duration,
    reset_ttl_minutes: i64,
}

impl AuthService {
    /// Create a new authentication service.
    #[must_use]
    pub fn new(user_repo: UserRepository, dispatcher: DispatcherService, config: &AuthConfig) -> Self {
        Self {
            user_repo,
            dispatcher,
            id_gen: IdGenerator::new(),
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            token_ttl: Duration::hours(config.token_ttl_hours),
            reset_ttl_minutes: config.reset_token_ttl_minutes,
        }
    }

    /// Sign a session token for a user.
    pub fn issue_token(&self, user: &user::Model) -> AppResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.clone(),
            adm: user.is_admin,
            rot: user.must_change_password,
            iat: now.timestamp(),
            exp: (now + self.token_ttl).timestamp(),
        };

        Ok(encode(&Header::default(), &claims, &self.encoding_key)?)
    }

    /// Verify a session token and return its claims.
    pub fn verify_token(&self, token: &str) -> AppResult<Claims> {
        let data = decode::<Claims>(token, &self.decoding_key, &Validation::new(Algorithm::HS256))?;
        Ok(data.claims)
    }

    /// Log in by username or email.
    pub async fn authenticate(&self, login: &str, password: &str) -> AppResult<LoginResult> {
        let login = login.trim();
        let user = if login.contains('@') {
            self.user_repo.find_by_email(login).await?
        } else {
            self.user_repo.find_by_username(login).await?
        }
        .ok_or(AppError::Unauthorized)?;

        if !verify_password(password, &user.password_hash)? {
            debug!(user_id = %user.id, "Login rejected: wrong password");
            return Err(AppError::Unauthorized);
        }

        if !user.is_active {
            return Err(AppError::Forbidden("Account is deactivated".to_string()));
        }

        self.user_repo.touch_last_login(&user.id, Utc::now()).await?;
        let token = self.issue_token(&user)?;

        info!(user_id = %user.id, "User logged in");

        Ok(LoginResult { token, user })
    }

    /// Load the active account behind a verified token.
    pub async fn current_user(&self, claims: &Claims) -> AppResult<user::Model> {
        let user = self
            .user_repo
            .find_by_id(&claims.sub)
            .await?
            .ok_or(AppError::Unauthorized)?;

        if !user.is_active {
            return Err(AppError::Unauthorized);
        }

        Ok(user)
    }

    /// Replace a password after checking the current one. Clears a pending rotation.
    pub async fn change_password(
        &self,
        user_id: &str,
        current_password: &str,
        new_password: &str,
    ) -> AppResult<LoginResult> {
        let user = self.user_repo.get_by_id(user_id).await?;

        if !verify_password(current_password, &user.password_hash)? {
            return Err(AppError::Validation(
                "Current password is incorrect".to_string(),
            ));
        }
        validate_new_password(new_password)?;
        if new_password == current_password {
            return Err(AppError::Validation(
                "New password must differ from the current password".to_string(),
            ));
        }

        let updated = self.store_password(user, new_password).await?;
        let token = self.issue_token(&updated)?;

        info!(user_id = %updated.id, "Password changed");

        Ok(LoginResult {
            token,
            user: updated,
        })
    }

    /// Start a password reset. Unknown or inactive addresses succeed silently.
    pub async fn request_password_reset(&self, email: &str) -> AppResult<()> {
        let Some(user) = self.user_repo.find_by_email(email).await? else {
            debug!("Password reset requested for an unknown address");
            return Ok(());
        };
        if !user.is_active {
            debug!(user_id = %user.id, "Password reset requested for an inactive account");
            return Ok(());
        }

        let token = self.id_gen.generate_secret(RESET_TOKEN_BYTES);
        let expires_at = Utc::now() + Duration::minutes(self.reset_ttl_minutes);

        let to = user.email.clone();
        let full_name = user.full_name.clone();
        let user_id = user.id.clone();

        let mut model: user::ActiveModel = user.into();
        model.reset_token_hash = Set(Some(hash_secret(&token)));
        model.reset_token_expires_at = Set(Some(expires_at.into()));
        self.user_repo.update(model).await?;

        dispatch_and_log(
            self.dispatcher.as_ref(),
            EmailJob::PasswordReset {
                to,
                full_name,
                token: Credential::new(token),
                expires_in_minutes: self.reset_ttl_minutes,
            },
        )
        .await;

        info!(user_id = %user_id, "Password reset requested");

        Ok(())
    }

    /// Finish a password reset with the emailed token.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> AppResult<()> {
        validate_new_password(new_password)?;

        let user = self
            .user_repo
            .find_by_reset_token_hash(&hash_secret(token.trim()), Utc::now())
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(|| AppError::BadRequest("Invalid or expired reset token".to_string()))?;

        let updated = self.store_password(user, new_password).await?;

        info!(user_id = %updated.id, "Password reset completed");

        Ok(())
    }

    async fn store_password(&self, user: user::Model, password: &str) -> AppResult<user::Model> {
        let mut model: user::ActiveModel = user.into();
        model.password_hash = Set(hash_password(password)?);
        model.must_change_password = Set(false);
        model.reset_token_hash = Set(None);
        model.reset_token_expires_at = Set(None);
        model.updated_at = Set(Some(Utc::now().into()));
        self.user_repo.update(model).await
    }
}
