//! Administrator dashboard statistics.

use chrono::{Duration, Utc};
use mediateam_common::AppResult;
use mediateam_db::repositories::{EventRepository, RoleRepository, UserFilter, UserRepository};
use serde::Serialize;

use crate::services::registration::{RegistrationService, RegistrationStats};

/// Window for the upcoming-events count.
const UPCOMING_WINDOW_DAYS: i64 = 30;

/// Dashboard figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub registrations: RegistrationStats,
    pub active_users: u64,
    pub inactive_users: u64,
    pub roles: u64,
    pub upcoming_events: u64,
}

/// Dashboard service.
#[derive(Clone)]
pub struct DashboardService {
    registrations: RegistrationService,
    user_repo: UserRepository,
    role_repo: RoleRepository,
    event_repo: EventRepository,
}

impl DashboardService {
    /// Create a new dashboard service.
    #[must_use]
    pub const fn new(
        registrations: RegistrationService,
        user_repo: UserRepository,
        role_repo: RoleRepository,
        event_repo: EventRepository,
    ) -> Self {
        Self {
            registrations,
            user_repo,
            role_repo,
            event_repo,
        }
    }

    /// Collect the dashboard figures.
    pub async fn stats(&self) -> AppResult<DashboardStats> {
        let registrations = self.registrations.stats().await?;
        let active_users = self
            .user_repo
            .count(&UserFilter {
                active: Some(true),
                search: None,
            })
            .await?;
        let inactive_users = self
            .user_repo
            .count(&UserFilter {
                active: Some(false),
                search: None,
            })
            .await?;
        let roles = self.role_repo.count().await?;

        let now = Utc::now();
        let upcoming_events = self
            .event_repo
            .count_between(now, now + Duration::days(UPCOMING_WINDOW_DAYS))
            .await?;

        Ok(DashboardStats {
            registrations,
            active_users,
            inactive_users,
            roles,
            upcoming_events,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::dispatch::NoOpDispatcher;
    use mediateam_db::repositories::RegistrationRepository;
    use sea_orm::{DatabaseBackend, MockDatabase, Value};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn count_row(n: i64) -> Vec<BTreeMap<&'static str, Value>> {
        vec![maplit::btreemap! { "num_items" => Value::BigInt(Some(n)) }]
    }

    #[tokio::test]
    async fn test_stats_collects_every_figure() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([
                    count_row(3),
                    count_row(1),
                    count_row(2),
                    count_row(7),
                    count_row(8),
                    count_row(1),
                    count_row(5),
                    count_row(4),
                ])
                .into_connection(),
        );

        let registrations = RegistrationService::new(
            RegistrationRepository::new(db.clone()),
            UserRepository::new(db.clone()),
            Arc::new(NoOpDispatcher),
            None,
        );
        let service = DashboardService::new(
            registrations,
            UserRepository::new(db.clone()),
            RoleRepository::new(db.clone()),
            EventRepository::new(db),
        );

        let stats = service.stats().await.unwrap();

        assert_eq!(stats.registrations.pending, 3);
        assert_eq!(stats.registrations.total, 13);
        assert_eq!(stats.active_users, 8);
        assert_eq!(stats.inactive_users, 1);
        assert_eq!(stats.roles, 5);
        assert_eq!(stats.upcoming_events, 4);

        let value = serde_json::to_value(stats).unwrap();
        assert_eq!(value["registrations"]["accountCreated"], 7);
        assert_eq!(value["upcomingEvents"], 4);
    }
}
