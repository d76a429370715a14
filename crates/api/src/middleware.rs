//! API middleware.

#![allow(missing_docs)]

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Request, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use mediateam_common::Config;
use mediateam_core::{
    ActivityLogService, AuthService, DashboardService, DispatcherService, EventService,
    MinutesService, NotificationService, RegistrationService, RoleService, UserService,
};
use mediateam_db::repositories::{
    ActivityLogRepository, EventRepository, MeetingMinutesRepository, NotificationRepository,
    RegistrationRepository, RoleRepository, UserRepository,
};
use sea_orm::DatabaseConnection;
use tracing::debug;

use crate::rate_limit::RateLimiterState;

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub auth_service: AuthService,
    pub user_service: UserService,
    pub registration_service: RegistrationService,
    pub role_service: RoleService,
    pub event_service: EventService,
    pub minutes_service: MinutesService,
    pub notification_service: NotificationService,
    pub activity_log_service: ActivityLogService,
    pub dashboard_service: DashboardService,
    pub rate_limiter: RateLimiterState,
}

impl AppState {
    /// Wire every service over one connection pool and side-effect dispatcher.
    #[must_use]
    pub fn new(db: Arc<DatabaseConnection>, dispatcher: DispatcherService, config: &Config) -> Self {
        let user_repo = UserRepository::new(db.clone());
        let registration_repo = RegistrationRepository::new(db.clone());
        let role_repo = RoleRepository::new(db.clone());
        let event_repo = EventRepository::new(db.clone());
        let minutes_repo = MeetingMinutesRepository::new(db.clone());
        let notification_repo = NotificationRepository::new(db.clone());
        let activity_log_repo = ActivityLogRepository::new(db);

        let registration_service = RegistrationService::new(
            registration_repo,
            user_repo.clone(),
            dispatcher.clone(),
            config.mail.admin_address.clone(),
        );

        Self {
            auth_service: AuthService::new(user_repo.clone(), dispatcher.clone(), &config.auth),
            user_service: UserService::new(user_repo.clone(), dispatcher.clone()),
            dashboard_service: DashboardService::new(
                registration_service.clone(),
                user_repo.clone(),
                role_repo.clone(),
                event_repo.clone(),
            ),
            registration_service,
            role_service: RoleService::new(role_repo, user_repo.clone(), dispatcher.clone()),
            minutes_service: MinutesService::new(minutes_repo, event_repo.clone(), dispatcher.clone()),
            event_service: EventService::new(event_repo, user_repo, dispatcher),
            notification_service: NotificationService::new(notification_repo),
            activity_log_service: ActivityLogService::new(activity_log_repo),
            rate_limiter: RateLimiterState::new(),
        }
    }
}

/// Authentication middleware.
///
/// Resolves a bearer token to its account and stores it in the request
/// extensions. Requests without a valid token pass through anonymously; the
/// extractors decide whether a route needs a user.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(auth_header) = req.headers().get(AUTHORIZATION)
        && let Ok(auth_str) = auth_header.to_str()
        && let Some(token) = auth_str.strip_prefix("Bearer ")
    {
        match state.auth_service.verify_token(token.trim()) {
            Ok(claims) => match state.auth_service.current_user(&claims).await {
                Ok(user) => {
                    req.extensions_mut().insert(user);
                }
                Err(e) => debug!(user_id = %claims.sub, error = %e, "Token owner rejected"),
            },
            Err(e) => debug!(error = %e, "Invalid bearer token"),
        }
    }

    next.run(req).await
}
