//! Activity log repository.

use std::sync::Arc;

use crate::entities::{ActivityLog, activity_log, activity_log::ActivityAction};
use mediateam_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect,
};

/// Filter for browsing the activity log.
#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
    /// Only entries by this actor.
    pub actor_id: Option<String>,
    /// Only entries of this action.
    pub action: Option<ActivityAction>,
    /// Only entries touching this kind of record.
    pub subject_type: Option<String>,
    /// Only entries touching this record.
    pub subject_id: Option<String>,
}

impl ActivityFilter {
    fn condition(&self) -> Condition {
        let mut condition = Condition::all();
        if let Some(actor_id) = &self.actor_id {
            condition = condition.add(activity_log::Column::ActorId.eq(actor_id.as_str()));
        }
        if let Some(action) = self.action {
            condition = condition.add(activity_log::Column::Action.eq(action));
        }
        if let Some(subject_type) = &self.subject_type {
            condition = condition.add(activity_log::Column::SubjectType.eq(subject_type.as_str()));
        }
        if let Some(subject_id) = &self.subject_id {
            condition = condition.add(activity_log::Column::SubjectId.eq(subject_id.as_str()));
        }
        condition
    }
}

/// Activity log repository for database operations.
#[derive(Clone)]
pub struct ActivityLogRepository {
    db: Arc<DatabaseConnection>,
}

impl ActivityLogRepository {
    /// Create a new activity log repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Append an entry.
    pub async fn create(&self, model: activity_log::ActiveModel) -> AppResult<activity_log::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List entries, newest first.
    pub async fn list(
        &self,
        filter: &ActivityFilter,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<activity_log::Model>> {
        ActivityLog::find()
            .filter(filter.condition())
            .order_by_desc(activity_log::Column::CreatedAt)
            .order_by_desc(activity_log::Column::Id)
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count entries matching a filter.
    pub async fn count(&self, filter: &ActivityFilter) -> AppResult<u64> {
        ActivityLog::find()
            .filter(filter.condition())
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
