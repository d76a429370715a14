//! Registration lifecycle service.
//!
//! A registration moves `pending → account_created` on approval and
//! `pending → rejected` on rejection. Both transitions are conditional updates in
//! the repository, so a decided registration is never decided again and concurrent
//! approvals create exactly one account. Emails, notifications and audit entries are
//! dispatched after the write commits and never fail the operation.

use chrono::Utc;
use mediateam_common::{AppError, AppResult, IdGenerator};
use mediateam_db::{
    entities::{
        activity_log::ActivityAction,
        notification::NotificationType,
        registration::{self, Gender, RegistrationStatus},
        user,
    },
    repositories::{RegistrationFilter, RegistrationRepository, StatusTransition, UserRepository},
};
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};
use validator::{Validate, ValidationError};

use crate::services::{
    activity_log::ActivityEntry,
    dispatch::{DispatcherService, dispatch_and_log},
    email::{Credential, EmailJob},
    export::registrations_to_csv,
    notification::NotifyJob,
    user::{UserService, hash_password},
};

/// Random bytes in a temporary password.
const TEMPORARY_PASSWORD_BYTES: usize = 16;

/// Longest accepted rejection reason.
const MAX_REASON_LEN: usize = 2000;

/// Longest address the user and registration tables hold.
const MAX_EMAIL_LEN: u64 = 254;

/// Longest accepted entry in a list field.
const MAX_LIST_ENTRY_LEN: usize = 100;

/// Maximum page size for listing registrations.
const MAX_LIMIT: u64 = 100;

/// Most rows a single export returns.
const MAX_EXPORT_ROWS: u64 = 10_000;

/// Input for submitting the public registration form.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRegistrationInput {
    #[validate(length(min = 1, max = 256), custom(function = "not_blank"))]
    pub full_name: String,

    #[validate(email, length(max = MAX_EMAIL_LEN))]
    pub email: String,

    #[validate(length(min = 5, max = 64), custom(function = "not_blank"))]
    pub phone: String,

    pub gender: Gender,

    #[validate(length(max = 1024))]
    pub address: Option<String>,

    #[serde(default)]
    #[validate(length(max = 20), custom(function = "bounded_entries"))]
    pub preferred_roles: Vec<String>,

    #[serde(default)]
    #[validate(length(max = 50), custom(function = "bounded_entries"))]
    pub skills: Vec<String>,

    #[serde(default)]
    #[validate(length(max = 20), custom(function = "bounded_entries"))]
    pub availability: Vec<String>,

    pub has_experience: bool,

    #[validate(length(max = 4000))]
    pub experience_details: Option<String>,

    #[validate(length(min = 1, max = 256), custom(function = "not_blank"))]
    pub emergency_contact_name: String,

    #[validate(length(min = 5, max = 64), custom(function = "not_blank"))]
    pub emergency_contact_phone: String,

    #[validate(length(max = 4000))]
    pub motivation: Option<String>,

    #[validate(custom(function = "must_agree"))]
    pub agrees_to_terms: bool,
}

impl SubmitRegistrationInput {
    /// Trim every text field, lower-case the email and drop blank list entries.
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            full_name: self.full_name.trim().to_string(),
            email: self.email.trim().to_lowercase(),
            phone: self.phone.trim().to_string(),
            address: non_empty(self.address),
            preferred_roles: clean_list(self.preferred_roles),
            skills: clean_list(self.skills),
            availability: clean_list(self.availability),
            experience_details: non_empty(self.experience_details),
            emergency_contact_name: self.emergency_contact_name.trim().to_string(),
            emergency_contact_phone: self.emergency_contact_phone.trim().to_string(),
            motivation: non_empty(self.motivation),
            ..self
        }
    }
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

fn bounded_entries(values: &[String]) -> Result<(), ValidationError> {
    if values
        .iter()
        .any(|v| v.trim().is_empty() || v.chars().count() > MAX_LIST_ENTRY_LEN)
    {
        return Err(ValidationError::new("entry_length"));
    }
    Ok(())
}

fn must_agree(value: &bool) -> Result<(), ValidationError> {
    if !*value {
        return Err(ValidationError::new("terms_not_accepted"));
    }
    Ok(())
}

/// Result of approving a registration.
#[derive(Debug, Clone)]
pub struct ApprovalOutcome {
    pub registration: registration::Model,
    pub user: user::Model,
}

/// Registration counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationStats {
    pub pending: u64,
    pub approved: u64,
    pub rejected: u64,
    pub account_created: u64,
    pub total: u64,
}

/// Registration lifecycle service.
#[derive(Clone)]
pub struct RegistrationService {
    registration_repo: RegistrationRepository,
    user_repo: UserRepository,
    user_service: UserService,
    dispatcher: DispatcherService,
    id_gen: IdGenerator,
    admin_alert_address: Option<String>,
}

impl RegistrationService {
    /// Create a new registration service.
    #[must_use]
    pub fn new(
        registration_repo: RegistrationRepository,
        user_repo: UserRepository,
        dispatcher: DispatcherService,
        admin_alert_address: Option<String>,
    ) -> Self {
        Self {
            registration_repo,
            user_service: UserService::new(user_repo.clone(), dispatcher.clone()),
            user_repo,
            dispatcher,
            id_gen: IdGenerator::new(),
            admin_alert_address,
        }
    }

    /// Record a new application in `pending` status.
    pub async fn submit(&self, input: SubmitRegistrationInput) -> AppResult<registration::Model> {
        let input = input.normalized();
        input.validate()?;

        let model = registration::ActiveModel {
            id: Set(self.id_gen.generate()),
            full_name: Set(input.full_name),
            email: Set(input.email),
            phone: Set(input.phone),
            gender: Set(input.gender),
            address: Set(input.address),
            preferred_roles: Set(json!(input.preferred_roles)),
            skills: Set(json!(input.skills)),
            availability: Set(json!(input.availability)),
            has_experience: Set(input.has_experience),
            experience_details: Set(input.experience_details),
            emergency_contact_name: Set(input.emergency_contact_name),
            emergency_contact_phone: Set(input.emergency_contact_phone),
            motivation: Set(input.motivation),
            status: Set(RegistrationStatus::Pending),
            user_id: Set(None),
            reviewed_by: Set(None),
            reviewed_at: Set(None),
            rejection_reason: Set(None),
            created_at: Set(Utc::now().into()),
            updated_at: Set(None),
        };

        let created = self.registration_repo.create(model).await?;

        dispatch_and_log(
            self.dispatcher.as_ref(),
            EmailJob::RegistrationConfirmation {
                to: created.email.clone(),
                full_name: created.full_name.clone(),
            },
        )
        .await;

        if let Some(admin_address) = &self.admin_alert_address {
            dispatch_and_log(
                self.dispatcher.as_ref(),
                EmailJob::AdminAlert {
                    to: admin_address.clone(),
                    registration_id: created.id.clone(),
                    applicant_name: created.full_name.clone(),
                    applicant_email: created.email.clone(),
                    preferred_roles: created.preferred_role_names(),
                },
            )
            .await;
        } else {
            debug!(registration_id = %created.id, "No admin alert address configured");
        }

        info!(registration_id = %created.id, "Registration submitted");

        Ok(created)
    }

    /// Get a registration by ID.
    pub async fn get(&self, id: &str) -> AppResult<registration::Model> {
        self.registration_repo.get_by_id(id).await
    }

    /// List registrations, newest first, with the total match count.
    pub async fn list(
        &self,
        filter: &RegistrationFilter,
        limit: u64,
        offset: u64,
    ) -> AppResult<(Vec<registration::Model>, u64)> {
        let limit = limit.clamp(1, MAX_LIMIT);
        let registrations = self.registration_repo.list(filter, limit, offset).await?;
        let total = self.registration_repo.count(filter).await?;
        Ok((registrations, total))
    }

    /// Count registrations per status.
    pub async fn stats(&self) -> AppResult<RegistrationStats> {
        let pending = self
            .registration_repo
            .count_by_status(RegistrationStatus::Pending)
            .await?;
        let approved = self
            .registration_repo
            .count_by_status(RegistrationStatus::Approved)
            .await?;
        let rejected = self
            .registration_repo
            .count_by_status(RegistrationStatus::Rejected)
            .await?;
        let account_created = self
            .registration_repo
            .count_by_status(RegistrationStatus::AccountCreated)
            .await?;

        Ok(RegistrationStats {
            pending,
            approved,
            rejected,
            account_created,
            total: pending + approved + rejected + account_created,
        })
    }

    /// Export matching registrations as CSV, newest first.
    pub async fn export_csv(
        &self,
        filter: &RegistrationFilter,
        admin_id: &str,
        ip_address: Option<String>,
    ) -> AppResult<String> {
        let registrations = self
            .registration_repo
            .list(filter, MAX_EXPORT_ROWS, 0)
            .await?;

        dispatch_and_log(
            self.dispatcher.as_ref(),
            ActivityEntry::new(
                ActivityAction::RegistrationsExported,
                "registration",
                "*",
                format!("Exported {} registrations", registrations.len()),
            )
            .by(admin_id)
            .from_ip(ip_address)
            .with_metadata(json!({
                "count": registrations.len(),
                "status": filter.status,
                "search": filter.search,
            })),
        )
        .await;

        info!(admin_id = %admin_id, rows = registrations.len(), "Registrations exported");

        Ok(registrations_to_csv(&registrations))
    }

    /// Approve a pending registration and create its member account.
    pub async fn approve(
        &self,
        id: &str,
        admin_id: &str,
        ip_address: Option<String>,
    ) -> AppResult<ApprovalOutcome> {
        let registration = self.registration_repo.get_by_id(id).await?;
        if !registration.status.is_reviewable() {
            return Err(AppError::invalid_transition(
                registration.status,
                RegistrationStatus::Pending,
            ));
        }

        if self
            .user_repo
            .find_by_email(&registration.email)
            .await?
            .is_some()
        {
            return Err(AppError::AccountCreationFailed(format!(
                "an account with email {} already exists",
                registration.email
            )));
        }

        let username = self.user_service.available_username(&registration.email).await?;
        let temporary_password = self.id_gen.generate_secret(TEMPORARY_PASSWORD_BYTES);
        let user_id = self.id_gen.generate();
        let now = Utc::now();

        let account = user::ActiveModel {
            id: Set(user_id.clone()),
            username: Set(username),
            email: Set(registration.email.clone()),
            password_hash: Set(hash_password(&temporary_password)?),
            full_name: Set(registration.full_name.clone()),
            phone: Set(Some(registration.phone.clone())),
            is_admin: Set(false),
            is_active: Set(true),
            must_change_password: Set(true),
            registration_id: Set(Some(registration.id.clone())),
            reset_token_hash: Set(None),
            reset_token_expires_at: Set(None),
            last_login_at: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(None),
        };

        let user = match self
            .registration_repo
            .approve_with_account(id, admin_id, now, account)
            .await?
        {
            StatusTransition::Applied(user) => user,
            StatusTransition::Stale(Some(current)) => {
                return Err(AppError::invalid_transition(
                    current,
                    RegistrationStatus::Pending,
                ));
            }
            StatusTransition::Stale(None) => {
                return Err(AppError::NotFound(format!("Registration {id}")));
            }
        };

        let registration = registration::Model {
            status: RegistrationStatus::AccountCreated,
            user_id: Some(user.id.clone()),
            reviewed_by: Some(admin_id.to_string()),
            reviewed_at: Some(now.into()),
            updated_at: Some(now.into()),
            ..registration
        };

        dispatch_and_log(
            self.dispatcher.as_ref(),
            EmailJob::Welcome {
                to: user.email.clone(),
                full_name: user.full_name.clone(),
                username: user.username.clone(),
                temporary_password: Credential::new(temporary_password),
            },
        )
        .await;
        dispatch_and_log(
            self.dispatcher.as_ref(),
            NotifyJob::new(
                vec![user.id.clone()],
                NotificationType::Welcome,
                "Welcome to the team",
                format!(
                    "Your application was approved. You can sign in as {}.",
                    user.username
                ),
            )
            .with_link("/profile"),
        )
        .await;
        dispatch_and_log(
            self.dispatcher.as_ref(),
            ActivityEntry::new(
                ActivityAction::RegistrationApproved,
                "registration",
                &registration.id,
                format!("Approved registration of {}", registration.full_name),
            )
            .by(admin_id)
            .from_ip(ip_address)
            .with_metadata(json!({
                "userId": user.id,
                "username": user.username,
                "email": user.email,
            })),
        )
        .await;

        info!(
            registration_id = %registration.id,
            user_id = %user.id,
            admin_id = %admin_id,
            "Registration approved"
        );

        Ok(ApprovalOutcome { registration, user })
    }

    /// Reject a pending registration.
    pub async fn reject(
        &self,
        id: &str,
        admin_id: &str,
        reason: Option<String>,
        ip_address: Option<String>,
    ) -> AppResult<registration::Model> {
        let reason = non_empty(reason);
        if reason
            .as_deref()
            .is_some_and(|r| r.chars().count() > MAX_REASON_LEN)
        {
            return Err(AppError::Validation(format!(
                "Rejection reason must be at most {MAX_REASON_LEN} characters"
            )));
        }

        let registration = self.registration_repo.get_by_id(id).await?;
        if !registration.status.is_reviewable() {
            return Err(AppError::invalid_transition(
                registration.status,
                RegistrationStatus::Pending,
            ));
        }

        let now = Utc::now();
        match self
            .registration_repo
            .reject(id, admin_id, reason.clone(), now)
            .await?
        {
            StatusTransition::Applied(()) => {}
            StatusTransition::Stale(Some(current)) => {
                return Err(AppError::invalid_transition(
                    current,
                    RegistrationStatus::Pending,
                ));
            }
            StatusTransition::Stale(None) => {
                return Err(AppError::NotFound(format!("Registration {id}")));
            }
        }

        let registration = registration::Model {
            status: RegistrationStatus::Rejected,
            rejection_reason: reason,
            reviewed_by: Some(admin_id.to_string()),
            reviewed_at: Some(now.into()),
            updated_at: Some(now.into()),
            ..registration
        };

        dispatch_and_log(
            self.dispatcher.as_ref(),
            EmailJob::RegistrationRejected {
                to: registration.email.clone(),
                full_name: registration.full_name.clone(),
                reason: registration.rejection_reason.clone(),
            },
        )
        .await;
        dispatch_and_log(
            self.dispatcher.as_ref(),
            ActivityEntry::new(
                ActivityAction::RegistrationRejected,
                "registration",
                &registration.id,
                format!("Rejected registration of {}", registration.full_name),
            )
            .by(admin_id)
            .from_ip(ip_address)
            .with_metadata(json!({ "reason": registration.rejection_reason })),
        )
        .await;

        info!(registration_id = %registration.id, admin_id = %admin_id, "Registration rejected");

        Ok(registration)
    }

    /// Delete a registration in any status, deactivating the account created from it.
    pub async fn delete(
        &self,
        id: &str,
        admin_id: &str,
        ip_address: Option<String>,
    ) -> AppResult<()> {
        let deleted = self
            .registration_repo
            .delete_and_deactivate(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Registration {id}")))?;

        let registration = &deleted.registration;
        dispatch_and_log(
            self.dispatcher.as_ref(),
            ActivityEntry::new(
                ActivityAction::RegistrationDeleted,
                "registration",
                &registration.id,
                format!("Deleted registration of {}", registration.full_name),
            )
            .by(admin_id)
            .from_ip(ip_address)
            .with_metadata(json!({
                "status": registration.status,
                "email": registration.email,
                "deactivatedUserId": deleted.deactivated_user_id,
            })),
        )
        .await;

        info!(
            registration_id = %registration.id,
            deactivated_user_id = ?deleted.deactivated_user_id,
            admin_id = %admin_id,
            "Registration deleted"
        );

        Ok(())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn clean_list(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::dispatch::{RecordingDispatcher, SideEffect, SideEffectDispatcher};
    use async_trait::async_trait;
    use sea_orm::{DatabaseBackend, DatabaseConnection, DbErr, MockDatabase, MockExecResult};
    use std::sync::Arc;

    struct FailingDispatcher;

    #[async_trait]
    impl SideEffectDispatcher for FailingDispatcher {
        async fn dispatch(&self, _effect: SideEffect) -> AppResult<()> {
            Err(AppError::ExternalService("smtp down".to_string()))
        }
    }

    fn submission() -> SubmitRegistrationInput {
        serde_json::from_value(json!({
            "fullName": "Jane Doe",
            "email": " Jane@X.org ",
            "phone": "+2348000000000",
            "gender": "female",
            "preferredRoles": ["Camera", " "],
            "skills": ["Editing"],
            "availability": ["Sunday"],
            "hasExperience": true,
            "experienceDetails": "Two years on the projection desk",
            "emergencyContactName": "John Doe",
            "emergencyContactPhone": "+2348000000001",
            "agreesToTerms": true
        }))
        .unwrap()
    }

    fn create_test_registration(id: &str, status: RegistrationStatus) -> registration::Model {
        registration::Model {
            id: id.to_string(),
            full_name: "Jane Doe".to_string(),
            email: "jane@x.org".to_string(),
            phone: "+2348000000000".to_string(),
            gender: Gender::Female,
            address: None,
            preferred_roles: json!(["Camera"]),
            skills: json!([]),
            availability: json!(["Sunday"]),
            has_experience: false,
            experience_details: None,
            emergency_contact_name: "John Doe".to_string(),
            emergency_contact_phone: "+2348000000001".to_string(),
            motivation: None,
            status,
            user_id: None,
            reviewed_by: None,
            reviewed_at: None,
            rejection_reason: None,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    fn create_test_account(id: &str, username: &str, registration_id: &str) -> user::Model {
        user::Model {
            id: id.to_string(),
            username: username.to_string(),
            email: "jane@x.org".to_string(),
            password_hash: "$argon2id$stored".to_string(),
            full_name: "Jane Doe".to_string(),
            phone: Some("+2348000000000".to_string()),
            is_admin: false,
            is_active: true,
            must_change_password: true,
            registration_id: Some(registration_id.to_string()),
            reset_token_hash: None,
            reset_token_expires_at: None,
            last_login_at: None,
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    fn exec(rows_affected: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected,
        }
    }

    fn create_test_service(
        registration_db: DatabaseConnection,
        user_db: DatabaseConnection,
        dispatcher: DispatcherService,
    ) -> RegistrationService {
        RegistrationService::new(
            RegistrationRepository::new(Arc::new(registration_db)),
            UserRepository::new(Arc::new(user_db)),
            dispatcher,
            Some("admins@example.org".to_string()),
        )
    }

    fn create_shared_service(
        registration_db: &Arc<DatabaseConnection>,
        user_db: DatabaseConnection,
        dispatcher: DispatcherService,
    ) -> RegistrationService {
        RegistrationService::new(
            RegistrationRepository::new(Arc::clone(registration_db)),
            UserRepository::new(Arc::new(user_db)),
            dispatcher,
            None,
        )
    }

    /// SQL issued against a mock connection, once no repository holds it.
    fn issued_sql(db: Arc<DatabaseConnection>) -> Vec<(String, String)> {
        Arc::try_unwrap(db)
            .unwrap()
            .into_transaction_log()
            .iter()
            .flat_map(|txn| txn.statements().to_vec())
            .map(|stmt| (stmt.sql.clone(), format!("{:?}", stmt.values)))
            .collect()
    }

    fn empty_db() -> DatabaseConnection {
        MockDatabase::new(DatabaseBackend::Postgres).into_connection()
    }

    #[test]
    fn test_submission_requires_terms() {
        let mut input = submission();
        input.agrees_to_terms = false;
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_submission_rejects_blank_name_and_bad_email() {
        let mut input = submission();
        input.full_name = "   ".to_string();
        assert!(input.validate().is_err());

        let mut input = submission();
        input.email = "not-an-email".to_string();
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_submission_requires_boolean_flags() {
        let result: Result<SubmitRegistrationInput, _> = serde_json::from_value(json!({
            "fullName": "Jane Doe",
            "email": "jane@x.org",
            "phone": "+2348000000000",
            "gender": "female",
            "emergencyContactName": "John Doe",
            "emergencyContactPhone": "+2348000000001",
            "agreesToTerms": true
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_submission_rejects_unknown_gender() {
        let mut value = json!({
            "fullName": "Jane Doe",
            "email": "jane@x.org",
            "phone": "+2348000000000",
            "gender": "other",
            "hasExperience": false,
            "emergencyContactName": "John Doe",
            "emergencyContactPhone": "+2348000000001",
            "agreesToTerms": true
        });
        assert!(serde_json::from_value::<SubmitRegistrationInput>(value.clone()).is_err());

        value["gender"] = json!("male");
        assert!(serde_json::from_value::<SubmitRegistrationInput>(value).is_ok());
    }

    #[tokio::test]
    async fn test_submit_persists_pending_and_sends_two_emails() {
        let registration_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_registration(
                "reg1",
                RegistrationStatus::Pending,
            )]])
            .into_connection();
        let recorder = Arc::new(RecordingDispatcher::new());

        let service = create_test_service(registration_db, empty_db(), recorder.clone());
        let created = service.submit(submission()).await.unwrap();

        assert_eq!(created.status, RegistrationStatus::Pending);
        let emails = recorder.emails();
        assert_eq!(emails.len(), 2);
        assert_eq!(emails[0].template(), "registration_confirmation");
        assert_eq!(emails[0].recipient(), "jane@x.org");
        assert_eq!(emails[1].template(), "admin_alert");
        assert_eq!(emails[1].recipient(), "admins@example.org");
    }

    #[tokio::test]
    async fn test_submit_succeeds_when_every_dispatch_fails() {
        let registration_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_registration(
                "reg1",
                RegistrationStatus::Pending,
            )]])
            .into_connection();

        let service = create_test_service(registration_db, empty_db(), Arc::new(FailingDispatcher));
        let created = service.submit(submission()).await.unwrap();

        assert_eq!(created.id, "reg1");
        assert_eq!(created.status, RegistrationStatus::Pending);
    }

    #[tokio::test]
    async fn test_approve_creates_linked_account() {
        let registration_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_registration(
                "reg1",
                RegistrationStatus::Pending,
            )]])
            .append_exec_results([exec(1)])
            .append_query_results([[create_test_account("user1", "jane", "reg1")]])
            .into_connection();
        let user_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<user::Model>::new()])
            .append_query_results([Vec::<user::Model>::new()])
            .into_connection();
        let recorder = Arc::new(RecordingDispatcher::new());

        let service = create_test_service(registration_db, user_db, recorder.clone());
        let outcome = service
            .approve("reg1", "admin1", Some("203.0.113.9".to_string()))
            .await
            .unwrap();

        assert_eq!(outcome.user.username, "jane");
        assert_eq!(
            outcome.registration.status,
            RegistrationStatus::AccountCreated
        );
        assert_eq!(
            outcome.registration.user_id.as_deref(),
            Some(outcome.user.id.as_str())
        );
        assert_eq!(outcome.user.email, "jane@x.org");
        assert_eq!(outcome.registration.reviewed_by.as_deref(), Some("admin1"));

        let emails = recorder.emails();
        assert_eq!(emails.len(), 1);
        match &emails[0] {
            EmailJob::Welcome {
                username,
                temporary_password,
                ..
            } => {
                assert_eq!(username, "jane");
                assert_eq!(temporary_password.expose().len(), 32);
                assert!(
                    temporary_password
                        .expose()
                        .chars()
                        .all(|c| c.is_ascii_hexdigit())
                );
            }
            other => panic!("unexpected email {other:?}"),
        }
        assert_eq!(
            recorder.notifications()[0].notification_type,
            NotificationType::Welcome
        );
        let activities = recorder.activities();
        assert_eq!(activities[0].action, ActivityAction::RegistrationApproved);
        assert_eq!(activities[0].ip_address.as_deref(), Some("203.0.113.9"));
    }

    #[tokio::test]
    async fn test_approve_rejected_registration_fails_without_writes() {
        let registration_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_registration(
                "reg1",
                RegistrationStatus::Rejected,
            )]])
            .into_connection();
        let recorder = Arc::new(RecordingDispatcher::new());

        let service = create_test_service(registration_db, empty_db(), recorder.clone());
        let err = service.approve("reg1", "admin1", None).await.unwrap_err();

        assert!(matches!(err, AppError::InvalidStateTransition { .. }));
        assert!(err.public_message().contains("rejected"));
        assert!(recorder.effects().is_empty());
    }

    #[test]
    fn test_submission_is_normalized_before_validation() {
        let input = submission().normalized();

        assert_eq!(input.email, "jane@x.org");
        assert_eq!(input.preferred_roles, vec!["Camera".to_string()]);
        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_submission_rejects_email_longer_than_columns() {
        let domain = vec!["a".repeat(49); 4].join(".");
        let mut input = submission();
        input.email = format!("{}@{domain}.org", "j".repeat(60));
        assert!(input.email.len() > 254);
        assert!(input.normalized().validate().is_err());

        let mut input = submission();
        input.email = format!("{}@{domain}.org", "j".repeat(40));
        assert!(input.normalized().validate().is_ok());
    }

    #[tokio::test]
    async fn test_submit_then_approve_keeps_normalized_email() {
        let registration_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_registration(
                    "reg1",
                    RegistrationStatus::Pending,
                )]])
                .append_query_results([[create_test_registration(
                    "reg1",
                    RegistrationStatus::Pending,
                )]])
                .append_exec_results([exec(1)])
                .append_query_results([[create_test_account("user1", "jane", "reg1")]])
                .into_connection(),
        );
        let user_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<user::Model>::new()])
            .append_query_results([Vec::<user::Model>::new()])
            .into_connection();

        let service = create_shared_service(
            &registration_db,
            user_db,
            Arc::new(RecordingDispatcher::new()),
        );
        let created = service.submit(submission()).await.unwrap();
        let outcome = service.approve(&created.id, "admin1", None).await.unwrap();
        assert_eq!(outcome.user.email, created.email);
        drop(service);

        let sql = issued_sql(registration_db);
        let (_, registration_values) = sql
            .iter()
            .find(|(stmt, _)| stmt.starts_with(r#"INSERT INTO "registration""#))
            .unwrap();
        assert!(registration_values.contains(r#""jane@x.org""#));
        assert!(!registration_values.contains("Jane@X.org"));

        let (_, user_values) = sql
            .iter()
            .find(|(stmt, _)| stmt.starts_with(r#"INSERT INTO "user""#))
            .unwrap();
        assert!(user_values.contains(r#""jane@x.org""#));
    }

    #[tokio::test]
    async fn test_decided_registration_is_never_written() {
        for status in [RegistrationStatus::Rejected, RegistrationStatus::AccountCreated] {
            let registration_db = Arc::new(
                MockDatabase::new(DatabaseBackend::Postgres)
                    .append_query_results([[create_test_registration("reg1", status)]])
                    .append_query_results([[create_test_registration("reg1", status)]])
                    .into_connection(),
            );
            let recorder = Arc::new(RecordingDispatcher::new());

            let service = create_shared_service(&registration_db, empty_db(), recorder.clone());
            assert!(service.approve("reg1", "admin1", None).await.is_err());
            assert!(service.reject("reg1", "admin1", None, None).await.is_err());
            drop(service);

            let sql = issued_sql(registration_db);
            assert_eq!(sql.len(), 2);
            assert!(sql.iter().all(|(stmt, _)| stmt.starts_with("SELECT")));
            assert!(recorder.effects().is_empty());
        }
    }

    #[tokio::test]
    async fn test_approve_losing_race_reports_current_status() {
        let registration_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_registration(
                "reg1",
                RegistrationStatus::Pending,
            )]])
            .append_exec_results([exec(0)])
            .append_query_results([[create_test_registration(
                "reg1",
                RegistrationStatus::AccountCreated,
            )]])
            .into_connection();
        let user_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<user::Model>::new()])
            .append_query_results([Vec::<user::Model>::new()])
            .into_connection();
        let recorder = Arc::new(RecordingDispatcher::new());

        let service = create_test_service(registration_db, user_db, recorder.clone());
        let err = service.approve("reg1", "admin2", None).await.unwrap_err();

        match err {
            AppError::InvalidStateTransition { current, required } => {
                assert_eq!(current, "account_created");
                assert_eq!(required, "pending");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(recorder.effects().is_empty());
    }

    #[tokio::test]
    async fn test_approve_surfaces_account_creation_failure() {
        let registration_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_registration(
                "reg1",
                RegistrationStatus::Pending,
            )]])
            .append_exec_results([exec(1)])
            .append_query_errors([DbErr::Custom("duplicate key value".to_string())])
            .into_connection();
        let user_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<user::Model>::new()])
            .append_query_results([Vec::<user::Model>::new()])
            .into_connection();
        let recorder = Arc::new(RecordingDispatcher::new());

        let service = create_test_service(registration_db, user_db, recorder.clone());
        let err = service.approve("reg1", "admin1", None).await.unwrap_err();

        assert!(matches!(err, AppError::AccountCreationFailed(_)));
        assert!(recorder.effects().is_empty());
    }

    #[tokio::test]
    async fn test_approve_conflicting_email_is_refused() {
        let registration_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_registration(
                "reg1",
                RegistrationStatus::Pending,
            )]])
            .into_connection();
        let user_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_account("other", "jane", "reg0")]])
            .into_connection();

        let service =
            create_test_service(registration_db, user_db, Arc::new(RecordingDispatcher::new()));

        assert!(matches!(
            service.approve("reg1", "admin1", None).await,
            Err(AppError::AccountCreationFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_approve_missing_registration() {
        let registration_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<registration::Model>::new()])
            .into_connection();

        let service = create_test_service(
            registration_db,
            empty_db(),
            Arc::new(RecordingDispatcher::new()),
        );

        assert!(matches!(
            service.approve("missing", "admin1", None).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_reject_records_reason() {
        let registration_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_registration(
                "reg1",
                RegistrationStatus::Pending,
            )]])
            .append_exec_results([exec(1)])
            .into_connection();
        let recorder = Arc::new(RecordingDispatcher::new());

        let service = create_test_service(registration_db, empty_db(), recorder.clone());
        let rejected = service
            .reject(
                "reg1",
                "admin1",
                Some(" incomplete application ".to_string()),
                None,
            )
            .await
            .unwrap();

        assert_eq!(rejected.status, RegistrationStatus::Rejected);
        assert_eq!(
            rejected.rejection_reason.as_deref(),
            Some("incomplete application")
        );
        assert_eq!(recorder.emails()[0].template(), "registration_rejected");
        assert_eq!(
            recorder.activities()[0].action,
            ActivityAction::RegistrationRejected
        );
    }

    #[tokio::test]
    async fn test_reject_decided_registration_fails() {
        let registration_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_registration(
                "reg1",
                RegistrationStatus::AccountCreated,
            )]])
            .into_connection();

        let service = create_test_service(
            registration_db,
            empty_db(),
            Arc::new(RecordingDispatcher::new()),
        );

        let err = service.reject("reg1", "admin1", None, None).await.unwrap_err();
        assert!(err.public_message().contains("account_created"));
    }

    #[tokio::test]
    async fn test_reject_overlong_reason() {
        let service = create_test_service(
            empty_db(),
            empty_db(),
            Arc::new(RecordingDispatcher::new()),
        );

        assert!(matches!(
            service
                .reject("reg1", "admin1", Some("x".repeat(MAX_REASON_LEN + 1)), None)
                .await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_logs_deactivated_account() {
        let mut approved = create_test_registration("reg1", RegistrationStatus::AccountCreated);
        approved.user_id = Some("user1".to_string());

        let registration_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[approved]])
            .append_exec_results([exec(1), exec(1)])
            .into_connection();
        let recorder = Arc::new(RecordingDispatcher::new());

        let service = create_test_service(registration_db, empty_db(), recorder.clone());
        service.delete("reg1", "admin1", None).await.unwrap();

        let activities = recorder.activities();
        assert_eq!(activities[0].action, ActivityAction::RegistrationDeleted);
        assert_eq!(activities[0].metadata["deactivatedUserId"], "user1");
    }

    #[tokio::test]
    async fn test_delete_missing_registration() {
        let registration_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<registration::Model>::new()])
            .into_connection();

        let service = create_test_service(
            registration_db,
            empty_db(),
            Arc::new(RecordingDispatcher::new()),
        );

        assert!(matches!(
            service.delete("missing", "admin1", None).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_export_renders_rows_and_logs() {
        let registration_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[
                create_test_registration("reg2", RegistrationStatus::Pending),
                create_test_registration("reg1", RegistrationStatus::Pending),
            ]])
            .into_connection();
        let recorder = Arc::new(RecordingDispatcher::new());

        let service = create_test_service(registration_db, empty_db(), recorder.clone());
        let filter = RegistrationFilter {
            status: Some(RegistrationStatus::Pending),
            search: None,
        };
        let csv = service.export_csv(&filter, "admin1", None).await.unwrap();

        let rows: Vec<&str> = csv.split_terminator("\r\n").collect();
        assert_eq!(rows.len(), 3);
        assert!(rows[0].starts_with("id,full_name,email"));
        assert!(rows[1].starts_with("reg2,Jane Doe,jane@x.org"));

        let activities = recorder.activities();
        assert_eq!(activities[0].action, ActivityAction::RegistrationsExported);
        assert_eq!(activities[0].metadata["count"], 2);
        assert_eq!(activities[0].metadata["status"], "pending");
        assert!(recorder.emails().is_empty());
    }

    #[tokio::test]
    async fn test_stats_totals_statuses() {
        let count = |n: i64| {
            [maplit::btreemap! {
                "num_items" => sea_orm::Value::BigInt(Some(n))
            }]
        };
        let registration_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([count(3)])
            .append_query_results([count(0)])
            .append_query_results([count(2)])
            .append_query_results([count(5)])
            .into_connection();

        let service = create_test_service(
            registration_db,
            empty_db(),
            Arc::new(RecordingDispatcher::new()),
        );
        let stats = service.stats().await.unwrap();

        assert_eq!(stats.pending, 3);
        assert_eq!(stats.rejected, 2);
        assert_eq!(stats.account_created, 5);
        assert_eq!(stats.total, 10);
    }
}
