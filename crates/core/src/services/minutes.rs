//! Meeting minutes service.
//!
//! Keeps the metadata of each meeting's minutes. Uploading and serving the
//! document happens elsewhere; only its URL is recorded.

use chrono::{DateTime, Utc};
use mediateam_common::{AppResult, IdGenerator};
use mediateam_db::{
    entities::{activity_log::ActivityAction, meeting_minutes},
    repositories::{EventRepository, MeetingMinutesRepository},
};
use sea_orm::Set;
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use validator::{Validate, ValidationError};

use crate::services::{
    activity_log::ActivityEntry,
    dispatch::{DispatcherService, dispatch_and_log},
};

const MAX_LIMIT: u64 = 100;

/// Input for recording meeting minutes.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateMinutesInput {
    #[validate(length(min = 1, max = 256))]
    pub title: String,

    pub meeting_date: DateTime<Utc>,

    pub event_id: Option<String>,

    #[validate(length(max = 20000))]
    pub summary: Option<String>,

    #[serde(default)]
    #[validate(length(max = 200), custom(function = "attendee_names"))]
    pub attendees: Vec<String>,

    #[validate(url, length(max = 1024))]
    pub document_url: Option<String>,
}

/// Input for updating minutes. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMinutesInput {
    #[validate(length(min = 1, max = 256))]
    pub title: Option<String>,

    pub meeting_date: Option<DateTime<Utc>>,

    pub event_id: Option<String>,

    #[validate(length(max = 20000))]
    pub summary: Option<String>,

    #[validate(length(max = 200), custom(function = "attendee_names"))]
    pub attendees: Option<Vec<String>>,

    #[validate(url, length(max = 1024))]
    pub document_url: Option<String>,
}

fn attendee_names(values: &[String]) -> Result<(), ValidationError> {
    if values.iter().any(|v| v.chars().count() > 256) {
        return Err(ValidationError::new("entry_length"));
    }
    Ok(())
}

/// Meeting minutes service.
#[derive(Clone)]
pub struct MinutesService {
    minutes_repo: MeetingMinutesRepository,
    event_repo: EventRepository,
    dispatcher: DispatcherService,
    id_gen: IdGenerator,
}

impl MinutesService {
    #[must_use]
    pub const fn new(
        minutes_repo: MeetingMinutesRepository,
        event_repo: EventRepository,
        dispatcher: DispatcherService,
    ) -> Self {
        Self {
            minutes_repo,
            event_repo,
            dispatcher,
            id_gen: IdGenerator::new(),
        }
    }

    pub async fn get(&self, id: &str) -> AppResult<meeting_minutes::Model> {
        self.minutes_repo.get_by_id(id).await
    }

    /// Minutes, newest meeting first, with the total match count.
    pub async fn list(
        &self,
        event_id: Option<&str>,
        limit: u64,
        offset: u64,
    ) -> AppResult<(Vec<meeting_minutes::Model>, u64)> {
        let limit = limit.clamp(1, MAX_LIMIT);
        let minutes = self.minutes_repo.list(event_id, limit, offset).await?;
        let total = self.minutes_repo.count(event_id).await?;
        Ok((minutes, total))
    }

    /// Record minutes for a meeting.
    pub async fn create(
        &self,
        input: CreateMinutesInput,
        admin_id: &str,
        ip_address: Option<String>,
    ) -> AppResult<meeting_minutes::Model> {
        input.validate()?;
        let event_id = non_empty(input.event_id);
        if let Some(event_id) = &event_id {
            self.event_repo.get_by_id(event_id).await?;
        }

        let model = meeting_minutes::ActiveModel {
            id: Set(self.id_gen.generate()),
            title: Set(input.title.trim().to_string()),
            meeting_date: Set(input.meeting_date.into()),
            event_id: Set(event_id),
            summary: Set(non_empty(input.summary)),
            attendees: Set(json!(clean_names(input.attendees))),
            document_url: Set(non_empty(input.document_url)),
            created_by: Set(Some(admin_id.to_string())),
            created_at: Set(Utc::now().into()),
            updated_at: Set(None),
        };
        let minutes = self.minutes_repo.create(model).await?;

        self.record(
            ActivityAction::MinutesCreated,
            &minutes,
            format!("Recorded minutes for {}", minutes.title),
            admin_id,
            ip_address,
        )
        .await;

        info!(minutes_id = %minutes.id, title = %minutes.title, "Meeting minutes recorded");

        Ok(minutes)
    }

    /// Update recorded minutes.
    pub async fn update(
        &self,
        id: &str,
        input: UpdateMinutesInput,
        admin_id: &str,
        ip_address: Option<String>,
    ) -> AppResult<meeting_minutes::Model> {
        input.validate()?;
        let current = self.minutes_repo.get_by_id(id).await?;

        let mut model: meeting_minutes::ActiveModel = current.into();
        if let Some(title) = input.title {
            model.title = Set(title.trim().to_string());
        }
        if let Some(meeting_date) = input.meeting_date {
            model.meeting_date = Set(meeting_date.into());
        }
        if input.event_id.is_some() {
            let event_id = non_empty(input.event_id);
            if let Some(event_id) = &event_id {
                self.event_repo.get_by_id(event_id).await?;
            }
            model.event_id = Set(event_id);
        }
        if input.summary.is_some() {
            model.summary = Set(non_empty(input.summary));
        }
        if let Some(attendees) = input.attendees {
            model.attendees = Set(json!(clean_names(attendees)));
        }
        if input.document_url.is_some() {
            model.document_url = Set(non_empty(input.document_url));
        }
        model.updated_at = Set(Some(Utc::now().into()));

        let minutes = self.minutes_repo.update(model).await?;

        self.record(
            ActivityAction::MinutesUpdated,
            &minutes,
            format!("Updated minutes for {}", minutes.title),
            admin_id,
            ip_address,
        )
        .await;

        Ok(minutes)
    }

    /// Delete recorded minutes. The stored document is not touched.
    pub async fn delete(
        &self,
        id: &str,
        admin_id: &str,
        ip_address: Option<String>,
    ) -> AppResult<()> {
        let minutes = self.minutes_repo.get_by_id(id).await?;
        self.minutes_repo.delete(minutes.clone()).await?;

        self.record(
            ActivityAction::MinutesDeleted,
            &minutes,
            format!("Deleted minutes for {}", minutes.title),
            admin_id,
            ip_address,
        )
        .await;

        info!(minutes_id = %minutes.id, "Meeting minutes deleted");

        Ok(())
    }

    async fn record(
        &self,
        action: ActivityAction,
        minutes: &meeting_minutes::Model,
        description: String,
        admin_id: &str,
        ip_address: Option<String>,
    ) {
        dispatch_and_log(
            self.dispatcher.as_ref(),
            ActivityEntry::new(action, "minutes", &minutes.id, description)
                .by(admin_id)
                .from_ip(ip_address)
                .with_metadata(json!({
                    "eventId": minutes.event_id,
                    "meetingDate": minutes.meeting_date.to_rfc3339(),
                })),
        )
        .await;
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn clean_names(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}
