//! API endpoints.

mod activity;
mod admin;
mod auth;
mod events;
mod health;
mod minutes;
mod notifications;
mod registrations;
mod roles;
mod users;

use axum::Router;

use crate::middleware::AppState;

pub use users::UserResponse;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .nest("/auth", auth::router())
        .nest("/registrations", registrations::router())
        .nest("/users", users::router())
        .nest("/roles", roles::router())
        .nest("/events", events::router())
        .nest("/minutes", minutes::router())
        .nest("/notifications", notifications::router())
        .nest("/activity", activity::router())
        .nest("/admin", admin::router())
}
