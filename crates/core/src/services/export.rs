//! CSV rendering of registrations for offline reporting.

use mediateam_db::entities::registration;

const HEADER: &str = "id,full_name,email,phone,gender,preferred_roles,skills,availability,\
has_experience,emergency_contact_name,emergency_contact_phone,status,created_at,reviewed_at,\
rejection_reason";

/// Render registrations as CSV, one row per registration after a header row.
///
/// List fields are joined with `;`.
#[must_use]
pub fn registrations_to_csv(registrations: &[registration::Model]) -> String {
    let mut csv = String::with_capacity(HEADER.len() + 1 + registrations.len() * 256);
    csv.push_str(HEADER);
    csv.push_str("\r\n");

    for r in registrations {
        let fields = [
            r.id.clone(),
            r.full_name.clone(),
            r.email.clone(),
            r.phone.clone(),
            r.gender.as_str().to_string(),
            r.preferred_role_names().join(";"),
            r.skill_names().join(";"),
            r.availability_slots().join(";"),
            r.has_experience.to_string(),
            r.emergency_contact_name.clone(),
            r.emergency_contact_phone.clone(),
            r.status.as_str().to_string(),
            r.created_at.to_rfc3339(),
            r.reviewed_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
            r.rejection_reason.clone().unwrap_or_default(),
        ];

        for (i, field) in fields.iter().enumerate() {
            if i > 0 {
                csv.push(',');
            }
            csv.push_str(&escape_field(field));
        }
        csv.push_str("\r\n");
    }

    csv
}

fn escape_field(value: &str) -> std::borrow::Cow<'_, str> {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\"")).into()
    } else {
        value.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mediateam_db::entities::registration::{Gender, RegistrationStatus};
    use serde_json::json;

    fn create_test_registration() -> registration::Model {
        registration::Model {
            id: "reg1".to_string(),
            full_name: "Doe, Jane".to_string(),
            email: "jane@x.org".to_string(),
            phone: "+2348000000000".to_string(),
            gender: Gender::Female,
            address: None,
            preferred_roles: json!(["Camera", "Sound"]),
            skills: json!([]),
            availability: json!(["Sunday"]),
            has_experience: true,
            experience_details: None,
            emergency_contact_name: "John Doe".to_string(),
            emergency_contact_phone: "+2348000000001".to_string(),
            motivation: None,
            status: RegistrationStatus::Rejected,
            user_id: None,
            reviewed_by: Some("admin1".to_string()),
            reviewed_at: Some(Utc::now().into()),
            rejection_reason: Some("Said \"maybe\"\nlater".to_string()),
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    #[test]
    fn test_header_only_when_empty() {
        let csv = registrations_to_csv(&[]);
        assert_eq!(csv, format!("{HEADER}\r\n"));
        assert_eq!(HEADER.split(',').count(), 15);
    }

    #[test]
    fn test_row_quotes_special_characters() {
        let csv = registrations_to_csv(&[create_test_registration()]);
        let row = csv.split_once("\r\n").map(|(_, rest)| rest).unwrap_or_default();

        assert!(row.starts_with(
            "reg1,\"Doe, Jane\",jane@x.org,+2348000000000,female,Camera;Sound,,Sunday,true,"
        ));
        assert!(row.contains(",rejected,"));
        assert!(row.ends_with(",\"Said \"\"maybe\"\"\nlater\"\r\n"));
    }

    #[test]
    fn test_plain_fields_are_not_quoted() {
        assert_eq!(escape_field("Camera"), "Camera");
        assert_eq!(escape_field("a,b"), "\"a,b\"");
    }
}
