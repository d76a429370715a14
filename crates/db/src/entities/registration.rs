//! Registration entity: one volunteer application.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a registration.
///
/// Stored as the exact strings `pending`, `approved`, `rejected` and `account_created`.
/// `Approved` is only read from legacy data; approval moves a registration straight to
/// `AccountCreated`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
#[derive(Default)]
pub enum RegistrationStatus {
    #[sea_orm(string_value = "pending")]
    #[default]
    Pending,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
    #[sea_orm(string_value = "account_created")]
    AccountCreated,
}

impl RegistrationStatus {
    /// Stored string value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::AccountCreated => "account_created",
        }
    }

    /// Whether the registration can still be approved or rejected.
    #[must_use]
    pub const fn is_reviewable(self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Parse a stored string value.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "account_created" => Some(Self::AccountCreated),
            _ => None,
        }
    }
}

impl std::fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Applicant gender, as collected by the registration form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    #[sea_orm(string_value = "male")]
    Male,
    #[sea_orm(string_value = "female")]
    Female,
}

impl Gender {
    /// Stored string value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
        }
    }
}

/// Volunteer application.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "registration")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub full_name: String,

    /// Lower-cased contact email
    pub email: String,

    pub phone: String,

    pub gender: Gender,

    #[sea_orm(column_type = "Text", nullable)]
    pub address: Option<String>,

    /// Ministry roles the applicant wants to serve in (JSON array of strings)
    #[sea_orm(column_type = "JsonBinary")]
    pub preferred_roles: Json,

    /// Self-reported skills (JSON array of strings)
    #[sea_orm(column_type = "JsonBinary")]
    pub skills: Json,

    /// Services/days the applicant is available for (JSON array of strings)
    #[sea_orm(column_type = "JsonBinary")]
    pub availability: Json,

    pub has_experience: bool,

    #[sea_orm(column_type = "Text", nullable)]
    pub experience_details: Option<String>,

    pub emergency_contact_name: String,

    pub emergency_contact_phone: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub motivation: Option<String>,

    pub status: RegistrationStatus,

    /// Account created when the registration was approved
    #[sea_orm(nullable)]
    pub user_id: Option<String>,

    /// Administrator who approved or rejected the registration
    #[sea_orm(nullable)]
    pub reviewed_by: Option<String>,

    #[sea_orm(nullable)]
    pub reviewed_at: Option<DateTimeWithTimeZone>,

    #[sea_orm(column_type = "Text", nullable)]
    pub rejection_reason: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

impl Model {
    /// Preferred roles as plain strings.
    #[must_use]
    pub fn preferred_role_names(&self) -> Vec<String> {
        json_strings(&self.preferred_roles)
    }

    /// Skills as plain strings.
    #[must_use]
    pub fn skill_names(&self) -> Vec<String> {
        json_strings(&self.skills)
    }

    /// Availability entries as plain strings.
    #[must_use]
    pub fn availability_slots(&self) -> Vec<String> {
        json_strings(&self.availability)
    }
}

fn json_strings(value: &Json) -> Vec<String> {
    serde_json::from_value(value.clone()).unwrap_or_default()
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::user::Entity")]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_strings_round_trip() {
        for status in [
            RegistrationStatus::Pending,
            RegistrationStatus::Approved,
            RegistrationStatus::Rejected,
            RegistrationStatus::AccountCreated,
        ] {
            assert_eq!(RegistrationStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(RegistrationStatus::parse("archived"), None);
    }

    #[test]
    fn test_only_pending_is_reviewable() {
        assert!(RegistrationStatus::Pending.is_reviewable());
        assert!(!RegistrationStatus::Approved.is_reviewable());
        assert!(!RegistrationStatus::Rejected.is_reviewable());
        assert!(!RegistrationStatus::AccountCreated.is_reviewable());
    }

    #[test]
    fn test_status_serializes_as_snake_case() {
        let json = serde_json::to_string(&RegistrationStatus::AccountCreated).unwrap();
        assert_eq!(json, "\"account_created\"");
    }
}
