//! Meeting minutes repository.

use std::sync::Arc;

use crate::entities::{MeetingMinutes, meeting_minutes};
use mediateam_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, ModelTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
};

/// Meeting minutes repository for database operations.
#[derive(Clone)]
pub struct MeetingMinutesRepository {
    db: Arc<DatabaseConnection>,
}

impl MeetingMinutesRepository {
    /// Create a new meeting minutes repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find minutes by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<meeting_minutes::Model>> {
        MeetingMinutes::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find minutes by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<meeting_minutes::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Meeting minutes {id}")))
    }

    pub async fn create(
        &self,
        model: meeting_minutes::ActiveModel,
    ) -> AppResult<meeting_minutes::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn update(
        &self,
        model: meeting_minutes::ActiveModel,
    ) -> AppResult<meeting_minutes::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn delete(&self, model: meeting_minutes::Model) -> AppResult<()> {
        model
            .delete(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Minutes, newest meeting first, optionally only those of one event.
    pub async fn list(
        &self,
        event_id: Option<&str>,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<meeting_minutes::Model>> {
        MeetingMinutes::find()
            .filter(Self::condition(event_id))
            .order_by_desc(meeting_minutes::Column::MeetingDate)
            .order_by_desc(meeting_minutes::Column::Id)
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count minutes, optionally only those of one event.
    pub async fn count(&self, event_id: Option<&str>) -> AppResult<u64> {
        MeetingMinutes::find()
            .filter(Self::condition(event_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    fn condition(event_id: Option<&str>) -> Condition {
        let mut condition = Condition::all();
        if let Some(event_id) = event_id {
            condition = condition.add(meeting_minutes::Column::EventId.eq(event_id));
        }
        condition
    }
}
