//! Scheduled jobs for periodic maintenance tasks.

use std::sync::Arc;
use std::time::Duration;

use mediateam_common::{AppResult, config::JobsConfig};
use mediateam_core::{CleanupTask, JobSender};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Interval between maintenance runs (default: 1 hour).
    pub cleanup_interval: Duration,
    /// Retention period for read notifications in days.
    pub notification_retention_days: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cleanup_interval: Duration::from_secs(3600),
            notification_retention_days: 90,
        }
    }
}

impl From<&JobsConfig> for SchedulerConfig {
    fn from(config: &JobsConfig) -> Self {
        Self {
            cleanup_interval: Duration::from_secs(config.cleanup_interval_secs.max(1)),
            notification_retention_days: config.notification_retention_days,
        }
    }
}

impl SchedulerConfig {
    /// Tasks submitted on every run.
    #[must_use]
    pub const fn tasks(&self) -> [CleanupTask; 2] {
        [
            CleanupTask::ReadNotifications {
                retention_days: self.notification_retention_days,
            },
            CleanupTask::ExpiredResetTokens,
        ]
    }
}

/// Accepts maintenance tasks from the scheduler.
pub trait MaintenanceQueue: Send + Sync {
    /// Submit one maintenance task.
    fn submit(&self, task: CleanupTask) -> AppResult<()>;
}

impl MaintenanceQueue for JobSender {
    fn submit(&self, task: CleanupTask) -> AppResult<()> {
        self.cleanup(task)
    }
}

/// Run the scheduler with the given configuration and queue.
pub fn run_scheduler<Q: MaintenanceQueue + 'static>(
    config: SchedulerConfig,
    queue: Arc<Q>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = interval(config.cleanup_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            for task in config.tasks() {
                if let Err(e) = queue.submit(task) {
                    tracing::error!(task = ?task, error = %e, "Failed to schedule cleanup");
                }
            }
            tracing::debug!("Scheduled maintenance tasks");
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingQueue {
        tasks: Mutex<Vec<CleanupTask>>,
    }

    impl MaintenanceQueue for RecordingQueue {
        fn submit(&self, task: CleanupTask) -> AppResult<()> {
            self.tasks.lock().unwrap().push(task);
            Ok(())
        }
    }

    #[test]
    fn test_scheduler_config_from_jobs_config() {
        let config = SchedulerConfig::from(&JobsConfig {
            max_retries: 5,
            notification_retention_days: 14,
            cleanup_interval_secs: 0,
        });

        assert_eq!(config.cleanup_interval, Duration::from_secs(1));
        assert_eq!(
            config.tasks()[0],
            CleanupTask::ReadNotifications { retention_days: 14 }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_submits_every_interval() {
        let queue = Arc::new(RecordingQueue::default());
        let handle = run_scheduler(
            SchedulerConfig {
                cleanup_interval: Duration::from_secs(60),
                notification_retention_days: 30,
            },
            queue.clone(),
        );

        // First tick fires immediately, second after one interval.
        tokio::time::sleep(Duration::from_secs(90)).await;
        handle.abort();

        let tasks = queue.tasks.lock().unwrap().clone();
        assert_eq!(tasks.len(), 4);
        assert_eq!(tasks[1], CleanupTask::ExpiredResetTokens);
    }
}
