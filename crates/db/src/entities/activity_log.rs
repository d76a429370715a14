//! Activity log entity: append-only audit trail of privileged actions.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Audited action kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(40))")]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    #[sea_orm(string_value = "registration_approved")]
    RegistrationApproved,
    #[sea_orm(string_value = "registration_rejected")]
    RegistrationRejected,
    #[sea_orm(string_value = "registration_deleted")]
    RegistrationDeleted,
    #[sea_orm(string_value = "registrations_exported")]
    RegistrationsExported,
    #[sea_orm(string_value = "user_deactivated")]
    UserDeactivated,
    #[sea_orm(string_value = "user_reactivated")]
    UserReactivated,
    #[sea_orm(string_value = "role_created")]
    RoleCreated,
    #[sea_orm(string_value = "role_updated")]
    RoleUpdated,
    #[sea_orm(string_value = "role_deleted")]
    RoleDeleted,
    #[sea_orm(string_value = "role_assigned")]
    RoleAssigned,
    #[sea_orm(string_value = "role_unassigned")]
    RoleUnassigned,
    #[sea_orm(string_value = "event_created")]
    EventCreated,
    #[sea_orm(string_value = "event_updated")]
    EventUpdated,
    #[sea_orm(string_value = "event_deleted")]
    EventDeleted,
    #[sea_orm(string_value = "minutes_created")]
    MinutesCreated,
    #[sea_orm(string_value = "minutes_updated")]
    MinutesUpdated,
    #[sea_orm(string_value = "minutes_deleted")]
    MinutesDeleted,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "activity_log")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Acting administrator (None for system actions)
    #[sea_orm(nullable)]
    pub actor_id: Option<String>,

    pub action: ActivityAction,

    /// Kind of record the action touched ("registration", "user", "role", "event", "minutes")
    pub subject_type: String,

    pub subject_id: String,

    #[sea_orm(column_type = "Text")]
    pub description: String,

    #[sea_orm(column_type = "JsonBinary")]
    pub metadata: Json,

    #[sea_orm(nullable)]
    pub ip_address: Option<String>,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
