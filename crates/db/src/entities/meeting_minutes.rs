//! Meeting minutes entity.
//!
//! Holds the record of a team meeting. The minutes document itself lives in
//! external storage; only its link is kept here.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "meeting_minutes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub title: String,

    pub meeting_date: DateTimeWithTimeZone,

    /// Calendar entry the meeting belongs to
    #[sea_orm(nullable)]
    pub event_id: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub summary: Option<String>,

    /// JSON array of attendee names
    #[sea_orm(column_type = "JsonBinary")]
    pub attendees: Json,

    #[sea_orm(nullable)]
    pub document_url: Option<String>,

    #[sea_orm(nullable)]
    pub created_by: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

impl Model {
    /// Attendee names.
    #[must_use]
    pub fn attendee_names(&self) -> Vec<String> {
        serde_json::from_value(self.attendees.clone()).unwrap_or_default()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::event::Entity",
        from = "Column::EventId",
        to = "super::event::Column::Id",
        on_delete = "SetNull"
    )]
    Event,
}

impl Related<super::event::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Event.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_attendee_names_tolerate_bad_json() {
        let mut minutes = Model {
            id: "m1".to_string(),
            title: "Planning".to_string(),
            meeting_date: Utc::now().into(),
            event_id: None,
            summary: None,
            attendees: serde_json::json!(["Ada", "Tobi"]),
            document_url: None,
            created_by: None,
            created_at: Utc::now().into(),
            updated_at: None,
        };
        assert_eq!(minutes.attendee_names(), vec!["Ada", "Tobi"]);

        minutes.attendees = serde_json::json!({ "not": "a list" });
        assert!(minutes.attendee_names().is_empty());
    }
}
