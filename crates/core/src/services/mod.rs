//! Business logic services.

#![allow(missing_docs)]

pub mod activity_log;
pub mod auth;
pub mod dispatch;
pub mod email;
pub mod event;
pub mod export;
pub mod jobs;
pub mod minutes;
pub mod notification;
pub mod registration;
pub mod retry;
pub mod role;
pub mod stats;
pub mod user;

pub use activity_log::{ActivityEntry, ActivityLogService};
pub use auth::{AuthService, Claims, LoginResult};
pub use dispatch::{
    DispatcherService, NoOpDispatcher, RecordingDispatcher, SideEffect, SideEffectDispatcher,
    dispatch_and_log,
};
pub use email::{
    Credential, EmailJob, EmailMessage, EmailService, LogMailTransport, MailTransport,
    SmtpMailTransport,
};
pub use event::{CreateEventInput, EventService, UpdateEventInput};
pub use export::registrations_to_csv;
pub use jobs::{
    CleanupTask, Job, JobSender, JobService, JobWorkerContext, SideEffectExecutor,
};
pub use minutes::{CreateMinutesInput, MinutesService, UpdateMinutesInput};
pub use notification::{NotificationService, NotifyJob};
pub use registration::{
    ApprovalOutcome, RegistrationService, RegistrationStats, SubmitRegistrationInput,
};
pub use retry::RetryConfig;
pub use role::{AssignedRole, CreateRoleInput, RoleMember, RoleService, RoleSummary, UpdateRoleInput};
pub use stats::{DashboardService, DashboardStats};
pub use user::{UserService, hash_password, username_from_email, verify_password};
