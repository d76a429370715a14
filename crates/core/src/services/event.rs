//! Calendar event service.

use chrono::{DateTime, Utc};
use mediateam_common::{AppError, AppResult, IdGenerator};
use mediateam_db::{
    entities::{
        activity_log::ActivityAction,
        event::{self, EventType},
        notification::NotificationType,
    },
    repositories::{EventRepository, UserRepository},
};
use sea_orm::Set;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use validator::Validate;

use crate::services::{
    activity_log::ActivityEntry,
    dispatch::{DispatcherService, dispatch_and_log},
    notification::NotifyJob,
};

const MAX_LIMIT: u64 = 200;

/// Input for creating an event.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventInput {
    #[validate(length(min = 1, max = 200))]
    pub title: String,

    #[validate(length(max = 4000))]
    pub description: Option<String>,

    #[validate(length(max = 200))]
    pub location: Option<String>,

    pub event_type: EventType,

    pub starts_at: DateTime<Utc>,

    pub ends_at: DateTime<Utc>,
}

/// Input for updating an event. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEventInput {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,

    #[validate(length(max = 4000))]
    pub description: Option<String>,

    #[validate(length(max = 200))]
    pub location: Option<String>,

    pub event_type: Option<EventType>,

    pub starts_at: Option<DateTime<Utc>>,

    pub ends_at: Option<DateTime<Utc>>,
}

/// Event service.
#[derive(Clone)]
pub struct EventService {
    event_repo: EventRepository,
    user_repo: UserRepository,
    dispatcher: DispatcherService,
    id_gen: IdGenerator,
}

impl EventService {
    /// Create a new event service.
    #[must_use]
    pub const fn new(
        event_repo: EventRepository,
        user_repo: UserRepository,
        dispatcher: DispatcherService,
    ) -> Self {
        Self {
            event_repo,
            user_repo,
            dispatcher,
            id_gen: IdGenerator::new(),
        }
    }

    /// Get an event by ID.
    pub async fn get(&self, id: &str) -> AppResult<event::Model> {
        self.event_repo.get_by_id(id).await
    }

    /// Events starting inside `[from, to)`, ordered by start time.
    pub async fn list(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: u64,
    ) -> AppResult<Vec<event::Model>> {
        let limit = limit.clamp(1, MAX_LIMIT);
        self.event_repo.list(from, to, limit).await
    }

    /// Create an event and announce it to every active member.
    pub async fn create(
        &self,
        input: CreateEventInput,
        admin_id: &str,
        ip_address: Option<String>,
    ) -> AppResult<event::Model> {
        input.validate()?;
        ensure_ordered(input.starts_at, input.ends_at)?;

        let model = event::ActiveModel {
            id: Set(self.id_gen.generate()),
            title: Set(input.title.trim().to_string()),
            description: Set(non_empty(input.description)),
            location: Set(non_empty(input.location)),
            event_type: Set(input.event_type),
            starts_at: Set(input.starts_at.into()),
            ends_at: Set(input.ends_at.into()),
            created_by: Set(Some(admin_id.to_string())),
            created_at: Set(Utc::now().into()),
            updated_at: Set(None),
        };
        let event = self.event_repo.create(model).await?;

        self.announce(
            &event,
            NotificationType::EventCreated,
            "New event",
            format!(
                "{} on {}",
                event.title,
                event.starts_at.format("%A %-d %B at %H:%M")
            ),
        )
        .await;
        dispatch_and_log(
            self.dispatcher.as_ref(),
            ActivityEntry::new(
                ActivityAction::EventCreated,
                "event",
                &event.id,
                format!("Created event {}", event.title),
            )
            .by(admin_id)
            .from_ip(ip_address),
        )
        .await;

        info!(event_id = %event.id, title = %event.title, "Event created");

        Ok(event)
    }

    /// Update an event and tell members about the change.
    pub async fn update(
        &self,
        id: &str,
        input: UpdateEventInput,
        admin_id: &str,
        ip_address: Option<String>,
    ) -> AppResult<event::Model> {
        input.validate()?;
        let current = self.event_repo.get_by_id(id).await?;

        let starts_at = input
            .starts_at
            .unwrap_or_else(|| current.starts_at.with_timezone(&Utc));
        let ends_at = input
            .ends_at
            .unwrap_or_else(|| current.ends_at.with_timezone(&Utc));
        ensure_ordered(starts_at, ends_at)?;

        let mut model: event::ActiveModel = current.into();
        if let Some(title) = input.title {
            model.title = Set(title.trim().to_string());
        }
        if input.description.is_some() {
            model.description = Set(non_empty(input.description));
        }
        if input.location.is_some() {
            model.location = Set(non_empty(input.location));
        }
        if let Some(event_type) = input.event_type {
            model.event_type = Set(event_type);
        }
        model.starts_at = Set(starts_at.into());
        model.ends_at = Set(ends_at.into());
        model.updated_at = Set(Some(Utc::now().into()));

        let event = self.event_repo.update(model).await?;

        self.announce(
            &event,
            NotificationType::EventUpdated,
            "Event updated",
            format!("{} has been updated.", event.title),
        )
        .await;
        dispatch_and_log(
            self.dispatcher.as_ref(),
            ActivityEntry::new(
                ActivityAction::EventUpdated,
                "event",
                &event.id,
                format!("Updated event {}", event.title),
            )
            .by(admin_id)
            .from_ip(ip_address),
        )
        .await;

        Ok(event)
    }

    /// Delete an event.
    pub async fn delete(
        &self,
        id: &str,
        admin_id: &str,
        ip_address: Option<String>,
    ) -> AppResult<()> {
        let event = self.event_repo.get_by_id(id).await?;
        let event_id = event.id.clone();
        let title = event.title.clone();
        self.event_repo.delete(event).await?;

        dispatch_and_log(
            self.dispatcher.as_ref(),
            ActivityEntry::new(
                ActivityAction::EventDeleted,
                "event",
                &event_id,
                format!("Deleted event {title}"),
            )
            .by(admin_id)
            .from_ip(ip_address),
        )
        .await;

        info!(event_id = %event_id, "Event deleted");

        Ok(())
    }

    async fn announce(
        &self,
        event: &event::Model,
        notification_type: NotificationType,
        title: &str,
        message: String,
    ) {
        let recipients = match self.user_repo.find_active_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(event_id = %event.id, error = %e, "Failed to load event recipients");
                return;
            }
        };
        if recipients.is_empty() {
            return;
        }

        dispatch_and_log(
            self.dispatcher.as_ref(),
            NotifyJob::new(recipients, notification_type, title, message)
                .with_link(format!("/events/{}", event.id))
                .with_metadata(json!({ "eventId": event.id })),
        )
        .await;
    }
}

fn ensure_ordered(starts_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> AppResult<()> {
    if ends_at <= starts_at {
        return Err(AppError::Validation(
            "endsAt: must be after startsAt".to_string(),
        ));
    }
    Ok(())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::dispatch::RecordingDispatcher;
    use chrono::Duration;
    use mediateam_db::entities::user;
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase};
    use std::sync::Arc;

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

    fn create_input(hours: i64) -> CreateEventInput {
        let start = Utc::now() + Duration::days(3);
        CreateEventInput {
            title: "Sunday service".to_string(),
            description: None,
            location: Some("Main auditorium".to_string()),
            event_type: EventType::Service,
            starts_at: start,
            ends_at: start + Duration::hours(hours),
        }
    }

    fn create_test_service(
        event_db: DatabaseConnection,
        user_db: DatabaseConnection,
    ) -> (EventService, Arc<RecordingDispatcher>) {
        let recorder = Arc::new(RecordingDispatcher::new());
        let service = EventService::new(
            EventRepository::new(Arc::new(event_db)),
            UserRepository::new(Arc::new(user_db)),
            recorder.clone(),
        );
        (service, recorder)
    }

    #[tokio::test]
    async fn test_create_notifies_active_members() {
        let event_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_event("e1")]])
            .into_connection();
        let user_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[
                maplit::btreemap! { "id" => sea_orm::Value::from("user1") },
                maplit::btreemap! { "id" => sea_orm::Value::from("user2") },
            ]])
            .into_connection();

        let (service, recorder) = create_test_service(event_db, user_db);
        let event = service.create(create_input(2), "admin1", None).await.unwrap();

        assert_eq!(event.id, "e1");
        let notifications = recorder.notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].recipients, vec!["user1", "user2"]);
        assert_eq!(
            notifications[0].notification_type,
            NotificationType::EventCreated
        );
        assert_eq!(recorder.activities()[0].action, ActivityAction::EventCreated);
    }

    #[tokio::test]
    async fn test_create_rejects_inverted_times() {
        let event_db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let user_db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();

        let (service, recorder) = create_test_service(event_db, user_db);
        let result = service.create(create_input(0), "admin1", None).await;

        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(recorder.effects().is_empty());
    }

    #[tokio::test]
    async fn test_update_checks_against_stored_times() {
        let event_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_event("e1")]])
            .into_connection();
        let user_db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();

        let (service, _) = create_test_service(event_db, user_db);
        let input = UpdateEventInput {
            ends_at: Some(Utc::now()),
            ..Default::default()
        };

        assert!(matches!(
            service.update("e1", input, "admin1", None).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_create_without_members_skips_notification() {
        let event_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_event("e1")]])
            .into_connection();
        let user_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<user::Model>::new()])
            .into_connection();

        let (service, recorder) = create_test_service(event_db, user_db);
        service.create(create_input(2), "admin1", None).await.unwrap();

        assert!(recorder.notifications().is_empty());
        assert_eq!(recorder.activities().len(), 1);
    }
}
