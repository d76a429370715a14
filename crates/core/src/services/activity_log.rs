//! Activity log service.

use chrono::Utc;
use mediateam_common::{AppResult, IdGenerator};
use mediateam_db::{
    entities::activity_log::{self, ActivityAction},
    repositories::{ActivityFilter, ActivityLogRepository},
};
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::error;

/// One audit entry, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub actor_id: Option<String>,
    pub action: ActivityAction,
    pub subject_type: String,
    pub subject_id: String,
    pub description: String,
    pub metadata: Value,
    pub ip_address: Option<String>,
}

impl ActivityEntry {
    /// Start an entry about one record.
    pub fn new(
        action: ActivityAction,
        subject_type: &str,
        subject_id: &str,
        description: impl Into<String>,
    ) -> Self {
        Self {
            actor_id: None,
            action,
            subject_type: subject_type.to_string(),
            subject_id: subject_id.to_string(),
            description: description.into(),
            metadata: Value::Object(serde_json::Map::new()),
            ip_address: None,
        }
    }

    /// Set the acting user.
    #[must_use]
    pub fn by(mut self, actor_id: &str) -> Self {
        self.actor_id = Some(actor_id.to_string());
        self
    }

    /// Set the client address the action came from.
    #[must_use]
    pub fn from_ip(mut self, ip_address: Option<String>) -> Self {
        self.ip_address = ip_address;
        self
    }

    /// Attach structured details.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Activity log service.
#[derive(Clone)]
pub struct ActivityLogService {
    repo: ActivityLogRepository,
    id_gen: IdGenerator,
}

impl ActivityLogService {
    /// Create a new activity log service.
    #[must_use]
    pub const fn new(repo: ActivityLogRepository) -> Self {
        Self {
            repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Write an entry, surfacing storage errors.
    pub async fn record(&self, entry: ActivityEntry) -> AppResult<activity_log::Model> {
        let model = activity_log::ActiveModel {
            id: Set(self.id_gen.generate()),
            actor_id: Set(entry.actor_id),
            action: Set(entry.action),
            subject_type: Set(entry.subject_type),
            subject_id: Set(entry.subject_id),
            description: Set(entry.description),
            metadata: Set(entry.metadata),
            ip_address: Set(entry.ip_address),
            created_at: Set(Utc::now().into()),
        };

        self.repo.create(model).await
    }

    /// Write an entry. Failures only reach the operational log.
    pub async fn log(&self, entry: ActivityEntry) {
        let action = entry.action;
        let subject_id = entry.subject_id.clone();

        if let Err(e) = self.record(entry).await {
            error!(
                action = ?action,
                subject_id = %subject_id,
                error = %e,
                "Failed to write activity log entry"
            );
        }
    }

    /// Browse the log, newest first, with the total match count.
    pub async fn list(
        &self,
        filter: &ActivityFilter,
        limit: u64,
        offset: u64,
    ) -> AppResult<(Vec<activity_log::Model>, u64)> {
        let entries = self.repo.list(filter, limit, offset).await?;
        let total = self.repo.count(filter).await?;
        Ok((entries, total))
    }
}
