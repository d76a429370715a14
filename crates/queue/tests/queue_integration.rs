//! Queue integration tests that run without external services.

#![allow(clippy::unwrap_used)]

use mediateam_core::{
    ActivityEntry, CleanupTask, EmailJob, JobService, SideEffect, SideEffectDispatcher,
};
use mediateam_queue::{MaintenanceQueue, SchedulerConfig, SideEffectJob};
use serde_json::json;

fn welcome_effect() -> SideEffect {
    EmailJob::RegistrationConfirmation {
        to: "jane@x.org".to_string(),
        full_name: "Jane Doe".to_string(),
    }
    .into()
}

#[test]
fn test_side_effect_job_wire_format() {
    let job = SideEffectJob::new(welcome_effect());
    let value = serde_json::to_value(&job).unwrap();

    assert_eq!(value["effect"]["kind"], "email");
    assert_eq!(value["effect"]["payload"]["to"], "jane@x.org");
    assert!(value["enqueued_at"].is_string());

    let back: SideEffectJob = serde_json::from_value(value).unwrap();
    assert_eq!(back, job);
}

#[test]
fn test_activity_job_keeps_metadata() {
    let entry = assignment_entry().with_metadata(json!({ "roleId": "r1" }));
    let job = SideEffectJob::new(entry.into());
    let value = serde_json::to_value(&job).unwrap();

    assert_eq!(value["effect"]["kind"], "activity");
    assert_eq!(value["effect"]["payload"]["metadata"]["roleId"], "r1");
}

fn assignment_entry() -> ActivityEntry {
    serde_json::from_value(json!({
        "actor_id": "admin1",
        "action": "role_assigned",
        "subject_type": "user",
        "subject_id": "user1",
        "description": "Assigned Camera to jane",
        "metadata": {},
        "ip_address": null
    }))
    .unwrap()
}

#[tokio::test]
async fn test_job_sender_accepts_scheduled_tasks() {
    let service = JobService::new();
    let sender = service.sender();

    for task in SchedulerConfig::default().tasks() {
        sender.submit(task).unwrap();
    }
    sender.dispatch(welcome_effect()).await.unwrap();

    assert!(matches!(
        SchedulerConfig::default().tasks()[1],
        CleanupTask::ExpiredResetTokens
    ));
}
