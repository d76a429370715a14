//! Repository layer.

mod activity_log;
mod event;
mod meeting_minutes;
mod notification;
mod registration;
mod role;
mod user;

pub use activity_log::{ActivityFilter, ActivityLogRepository};
pub use event::EventRepository;
pub use meeting_minutes::MeetingMinutesRepository;
pub use notification::NotificationRepository;
pub use registration::{
    DeletedRegistration, RegistrationFilter, RegistrationRepository, StatusTransition,
};
pub use role::RoleRepository;
pub use user::{UserFilter, UserRepository};

/// Escape `LIKE` wildcards so `value` matches literally.
fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
