//! Authentication endpoints.

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use mediateam_common::AppResult;
use mediateam_core::LoginResult;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    endpoints::UserResponse,
    extractors::{ApiJson, AuthUser},
    middleware::AppState,
    response::{ApiResponse, no_content},
};

/// Login request. `login` is a username or an email address.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 320))]
    pub login: String,

    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

/// Signed session.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub must_change_password: bool,
    pub user: UserResponse,
}

impl From<LoginResult> for LoginResponse {
    fn from(result: LoginResult) -> Self {
        Self {
            token: result.token,
            must_change_password: result.user.must_change_password,
            user: result.user.into(),
        }
    }
}

/// Sign in.
async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> AppResult<ApiResponse<LoginResponse>> {
    req.validate()?;

    let result = state
        .auth_service
        .authenticate(req.login.trim(), &req.password)
        .await?;

    Ok(ApiResponse::ok(result.into()))
}

/// Current account. Reachable while a password rotation is pending.
async fn me(AuthUser(user): AuthUser) -> AppResult<ApiResponse<UserResponse>> {
    Ok(ApiResponse::ok(user.into()))
}

/// Change password request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, max = 128))]
    pub current_password: String,

    #[validate(length(min = 1, max = 128))]
    pub new_password: String,
}

/// Change the signed-in user's password and issue a fresh token.
async fn change_password(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ChangePasswordRequest>,
) -> AppResult<ApiResponse<LoginResponse>> {
    req.validate()?;

    let result = state
        .auth_service
        .change_password(&user.id, &req.current_password, &req.new_password)
        .await?;

    Ok(ApiResponse::ok(result.into()))
}

/// Forgotten password request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordRequest {
    #[validate(email)]
    pub email: String,
}

/// Acknowledgement that never reveals whether the address is known.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgotPasswordResponse {
    pub message: &'static str,
}

/// Start a password reset.
async fn forgot_password(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ForgotPasswordRequest>,
) -> AppResult<ApiResponse<ForgotPasswordResponse>> {
    req.validate()?;

    state
        .auth_service
        .request_password_reset(req.email.trim())
        .await?;

    Ok(ApiResponse::accepted(ForgotPasswordResponse {
        message: "If that address belongs to an active account, a reset link is on its way",
    }))
}

/// Password reset request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1, max = 256))]
    pub token: String,

    #[validate(length(min = 1, max = 128))]
    pub new_password: String,
}

/// Finish a password reset.
async fn reset_password(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ResetPasswordRequest>,
) -> AppResult<StatusCode> {
    req.validate()?;

    state
        .auth_service
        .reset_password(req.token.trim(), &req.new_password)
        .await?;

    Ok(no_content())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/me", get(me))
        .route("/password/change", post(change_password))
        .route("/password/forgot", post(forgot_password))
        .route("/password/reset", post(reset_password))
}
