//! Database entities.

pub mod activity_log;
pub mod event;
pub mod meeting_minutes;
pub mod notification;
pub mod registration;
pub mod role;
pub mod user;
pub mod user_role;

pub use activity_log::Entity as ActivityLog;
pub use event::Entity as Event;
pub use meeting_minutes::Entity as MeetingMinutes;
pub use notification::Entity as Notification;
pub use registration::Entity as Registration;
pub use role::Entity as Role;
pub use user::Entity as User;
pub use user_role::Entity as UserRole;
