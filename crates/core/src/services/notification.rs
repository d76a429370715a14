//! Notification service.

use chrono::{DateTime, Utc};
use mediateam_common::{AppError, AppResult, IdGenerator};
use mediateam_db::{
    entities::notification::{self, NotificationType},
    repositories::NotificationRepository,
};
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// Maximum page size for listing notifications.
const MAX_LIMIT: u64 = 100;

/// A notification to fan out to a set of users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyJob {
    pub recipients: Vec<String>,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub link: Option<String>,
    pub metadata: Option<Value>,
}

impl NotifyJob {
    /// Create a notification for the given recipients.
    pub fn new(
        recipients: Vec<String>,
        notification_type: NotificationType,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            recipients,
            notification_type,
            title: title.into(),
            message: message.into(),
            link: None,
            metadata: None,
        }
    }

    /// Point the notification at a portal path.
    #[must_use]
    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    /// Attach structured details.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Notification service for business logic.
#[derive(Clone)]
pub struct NotificationService {
    notification_repo: NotificationRepository,
    id_gen: IdGenerator,
}

impl NotificationService {
    /// Create a new notification service.
    #[must_use]
    pub const fn new(notification_repo: NotificationRepository) -> Self {
        Self {
            notification_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Create one notification per recipient. All rows are written or none.
    pub async fn notify(&self, job: &NotifyJob) -> AppResult<Vec<notification::Model>> {
        if job.recipients.is_empty() {
            return Ok(Vec::new());
        }

        let now = Utc::now();
        let models = job
            .recipients
            .iter()
            .map(|user_id| notification::ActiveModel {
                id: Set(self.id_gen.generate()),
                user_id: Set(user_id.clone()),
                notification_type: Set(job.notification_type),
                title: Set(job.title.clone()),
                message: Set(job.message.clone()),
                link: Set(job.link.clone()),
                metadata: Set(job.metadata.clone()),
                is_read: Set(false),
                created_at: Set(now.into()),
            })
            .collect();

        let created = self.notification_repo.create_many(models).await?;

        debug!(
            notification_type = ?job.notification_type,
            count = created.len(),
            "Notifications created"
        );

        Ok(created)
    }

    /// Get notifications for a user, newest first.
    pub async fn list(
        &self,
        user_id: &str,
        limit: u64,
        until_id: Option<&str>,
        unread_only: bool,
    ) -> AppResult<Vec<notification::Model>> {
        let limit = limit.clamp(1, MAX_LIMIT);
        self.notification_repo
            .find_by_user(user_id, limit, until_id, unread_only)
            .await
    }

    /// Count unread notifications for a user.
    pub async fn unread_count(&self, user_id: &str) -> AppResult<u64> {
        self.notification_repo.count_unread(user_id).await
    }

    /// Mark one of the user's notifications as read.
    pub async fn mark_read(&self, id: &str, user_id: &str) -> AppResult<notification::Model> {
        let notification = self
            .notification_repo
            .find_owned(id, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Notification {id}")))?;

        self.notification_repo.mark_as_read(notification).await
    }

    /// Mark all of the user's notifications as read.
    pub async fn mark_all_read(&self, user_id: &str) -> AppResult<u64> {
        self.notification_repo.mark_all_as_read(user_id).await
    }

    /// Delete one of the user's notifications.
    pub async fn delete(&self, id: &str, user_id: &str) -> AppResult<()> {
        if self.notification_repo.delete_owned(id, user_id).await? {
            Ok(())
        } else {
            Err(AppError::NotFound(format!("Notification {id}")))
        }
    }

    /// Delete read notifications older than the cutoff.
    pub async fn purge_read_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        self.notification_repo.delete_read_before(cutoff).await
    }
}
