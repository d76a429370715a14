//! HTTP API layer for mediateam.
//!
//! This crate provides the JSON API mounted under `/api`:
//!
//! - **Endpoints**: registrations, authentication, users, roles, events,
//!   notifications, activity log and dashboard
//! - **Extractors**: authentication tiers, client IP, JSON and query bodies
//! - **Middleware**: bearer-token authentication, rate limiting
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod rate_limit;
pub mod response;

pub use endpoints::router;
pub use middleware::AppState;
pub use rate_limit::{ApiRateLimiter, RateLimitConfig, RateLimiterState};
