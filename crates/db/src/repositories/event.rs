//! Calendar event repository.

use std::sync::Arc;

use crate::entities::{Event, event};
use chrono::{DateTime, Utc};
use mediateam_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect,
};

/// Event repository for database operations.
#[derive(Clone)]
pub struct EventRepository {
    db: Arc<DatabaseConnection>,
}

impl EventRepository {
    /// Create a new event repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find an event by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<event::Model>> {
        Event::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find an event by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<event::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Event {id}")))
    }

    /// Create a new event.
    pub async fn create(&self, model: event::ActiveModel) -> AppResult<event::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update an event.
    pub async fn update(&self, model: event::ActiveModel) -> AppResult<event::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete an event.
    pub async fn delete(&self, model: event::Model) -> AppResult<()> {
        model
            .delete(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Events starting within an optional window, ordered by start.
    pub async fn list(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: u64,
    ) -> AppResult<Vec<event::Model>> {
        let mut query = Event::find().order_by_asc(event::Column::StartsAt);

        if let Some(from) = from {
            query = query.filter(event::Column::StartsAt.gte(from));
        }
        if let Some(to) = to {
            query = query.filter(event::Column::StartsAt.lt(to));
        }

        query
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count events starting within a window.
    pub async fn count_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> AppResult<u64> {
        Event::find()
            .filter(event::Column::StartsAt.gte(from))
            .filter(event::Column::StartsAt.lt(to))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::entities::event::EventType;
    use chrono::Duration;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn create_test_event(id: &str) -> event::Model {
        let start = Utc::now() + Duration::days(3);
        event::Model {
            id: id.to_string(),
            title: "Sunday service".to_string(),
            description: None,
            location: Some("Main auditorium".to_string()),
            event_type: EventType::Service,
            starts_at: start.into(),
            ends_at: (start + Duration::hours(2)).into(),
            created_by: Some("admin1".to_string()),
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_list_window() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_event("e1"), create_test_event("e2")]])
                .into_connection(),
        );

        let repo = EventRepository::new(db);
        let now = Utc::now();
        let events = repo
            .list(Some(now), Some(now + Duration::days(30)), 50)
            .await
            .unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, EventType::Service);
    }

    #[tokio::test]
    async fn test_get_by_id_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<event::Model>::new()])
                .into_connection(),
        );

        let repo = EventRepository::new(db);
        assert!(matches!(
            repo.get_by_id("missing").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_count_between() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[maplit::btreemap! {
                    "num_items" => sea_orm::Value::BigInt(Some(6))
                }]])
                .into_connection(),
        );

        let repo = EventRepository::new(db);
        let now = Utc::now();
        assert_eq!(
            repo.count_between(now, now + Duration::days(30))
                .await
                .unwrap(),
            6
        );
    }
}
