//! In-process job queue for side effects and maintenance tasks.
//!
//! Jobs go through a bounded channel to a semaphore-limited pool of workers.
//! Failed side effects are retried with exponential backoff; a worker gives its
//! slot back while it waits, so a slow SMTP server cannot stall the pool.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use mediateam_common::{AppError, AppResult};
use mediateam_db::repositories::UserRepository;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc};
use tracing::{debug, error, info, warn};

use crate::services::{
    activity_log::ActivityLogService,
    dispatch::{SideEffect, SideEffectDispatcher},
    email::EmailService,
    notification::NotificationService,
    retry::RetryConfig,
};

/// Maximum number of concurrent job workers.
const MAX_WORKERS: usize = 4;

/// Channel buffer size for jobs.
const JOB_BUFFER_SIZE: usize = 1000;

/// Job types that can be processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "job", rename_all = "snake_case")]
pub enum Job {
    /// Execute a side effect.
    SideEffect { effect: SideEffect },
    /// Run a maintenance task.
    Cleanup { task: CleanupTask },
}

/// Maintenance tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum CleanupTask {
    /// Delete read notifications older than the retention window.
    ReadNotifications { retention_days: i64 },
    /// Clear password-reset tokens past their expiry.
    ExpiredResetTokens,
}

/// Job sender for enqueueing jobs.
#[derive(Clone)]
pub struct JobSender {
    sender: mpsc::Sender<Job>,
}

impl JobSender {
    /// Enqueue a job for processing. Never waits for room in the queue.
    pub fn enqueue(&self, job: Job) -> AppResult<()> {
        self.sender.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => AppError::Queue("Job queue is full".to_string()),
            mpsc::error::TrySendError::Closed(_) => {
                AppError::Queue("Job queue is closed".to_string())
            }
        })
    }

    /// Enqueue a side effect.
    pub fn side_effect(&self, effect: SideEffect) -> AppResult<()> {
        self.enqueue(Job::SideEffect { effect })
    }

    /// Enqueue a cleanup job.
    pub fn cleanup(&self, task: CleanupTask) -> AppResult<()> {
        self.enqueue(Job::Cleanup { task })
    }
}

#[async_trait]
impl SideEffectDispatcher for JobSender {
    async fn dispatch(&self, effect: SideEffect) -> AppResult<()> {
        self.side_effect(effect)
    }
}

/// Runs one side effect against the delivery services.
#[derive(Clone)]
pub struct SideEffectExecutor {
    email: EmailService,
    notifications: NotificationService,
    activity: ActivityLogService,
}

impl SideEffectExecutor {
    /// Create a new executor.
    #[must_use]
    pub const fn new(
        email: EmailService,
        notifications: NotificationService,
        activity: ActivityLogService,
    ) -> Self {
        Self {
            email,
            notifications,
            activity,
        }
    }

    /// Execute one side effect, once.
    pub async fn execute(&self, effect: &SideEffect) -> AppResult<()> {
        match effect {
            SideEffect::Email(job) => self.email.send(job).await,
            SideEffect::Notify(job) => self.notifications.notify(job).await.map(|_| ()),
            SideEffect::Activity(entry) => self.activity.record(entry.clone()).await.map(|_| ()),
        }
    }
}

/// Job worker context containing services needed for job processing.
#[derive(Clone)]
pub struct JobWorkerContext {
    pub executor: SideEffectExecutor,
    pub notifications: NotificationService,
    pub users: UserRepository,
    pub retry: RetryConfig,
}

/// Job processing service.
pub struct JobService {
    sender: mpsc::Sender<Job>,
    receiver: mpsc::Receiver<Job>,
}

impl JobService {
    /// Create a new job service.
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel(JOB_BUFFER_SIZE);
        Self { sender, receiver }
    }

    /// Get a job sender for enqueueing jobs.
    #[must_use]
    pub fn sender(&self) -> JobSender {
        JobSender {
            sender: self.sender.clone(),
        }
    }

    /// Start the job processor with the given context.
    ///
    /// The processor stops once every [`JobSender`] has been dropped and the
    /// queue is drained.
    pub fn start(self, context: JobWorkerContext) -> tokio::task::JoinHandle<()> {
        let Self { sender, receiver } = self;
        drop(sender);
        let context = Arc::new(context);

        tokio::spawn(async move {
            info!("Job worker starting with {} workers", MAX_WORKERS);
            run_job_processor(receiver, context).await;
            info!("Job worker stopped");
        })
    }
}

impl Default for JobService {
    fn default() -> Self {
        Self::new()
    }
}

/// Run the job processor.
async fn run_job_processor(mut receiver: mpsc::Receiver<Job>, context: Arc<JobWorkerContext>) {
    let semaphore = Arc::new(Semaphore::new(MAX_WORKERS));

    while let Some(job) = receiver.recv().await {
        let Ok(permit) = semaphore.clone().acquire_owned().await else {
            break;
        };
        let ctx = context.clone();
        let semaphore = semaphore.clone();

        tokio::spawn(async move {
            process_job(job, &ctx, &semaphore, permit).await;
        });
    }
}

/// Process a single job.
async fn process_job(
    job: Job,
    context: &JobWorkerContext,
    semaphore: &Arc<Semaphore>,
    permit: OwnedSemaphorePermit,
) {
    match job {
        Job::SideEffect { effect } => {
            process_side_effect(context, semaphore, permit, &effect).await;
        }
        Job::Cleanup { task } => {
            process_cleanup(context, task).await;
        }
    }
}

/// Execute a side effect, retrying server-side failures with backoff.
async fn process_side_effect(
    context: &JobWorkerContext,
    semaphore: &Arc<Semaphore>,
    mut permit: OwnedSemaphorePermit,
    effect: &SideEffect,
) {
    let mut attempt = 0;

    loop {
        match context.executor.execute(effect).await {
            Ok(()) => {
                debug!(kind = effect.kind(), attempt, "Side effect completed");
                return;
            }
            Err(e) if e.is_server_error() && context.retry.should_retry(attempt) => {
                let delay = context.retry.delay_for_attempt(attempt);
                warn!(
                    kind = effect.kind(),
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Side effect failed, will retry"
                );
                drop(permit);
                tokio::time::sleep(delay).await;
                permit = match semaphore.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return,
                };
                attempt += 1;
            }
            Err(e) => {
                error!(
                    kind = effect.kind(),
                    attempt,
                    error = %e,
                    effect = ?effect,
                    "Side effect dropped"
                );
                return;
            }
        }
    }
}

/// Process a cleanup job.
async fn process_cleanup(context: &JobWorkerContext, task: CleanupTask) {
    let now = Utc::now();

    let result = match task {
        CleanupTask::ReadNotifications { retention_days } => {
            context
                .notifications
                .purge_read_before(now - ChronoDuration::days(retention_days))
                .await
        }
        CleanupTask::ExpiredResetTokens => context.users.clear_expired_reset_tokens(now).await,
    };

    match result {
        Ok(count) => debug!(task = ?task, count, "Cleanup finished"),
        Err(e) => error!(task = ?task, error = %e, "Cleanup failed"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::email::{EmailJob, EmailMessage, MailTransport};
    use mediateam_common::config::TeamConfig;
    use mediateam_db::repositories::{ActivityLogRepository, NotificationRepository};
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Fails with the given error until `failures` sends have been refused.
    struct FlakyTransport {
        failures: u32,
        calls: AtomicU32,
        error: fn() -> AppError,
    }

    #[async_trait]
    impl MailTransport for FlakyTransport {
        async fn send(&self, _message: &EmailMessage) -> AppResult<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err((self.error)())
            } else {
                Ok(())
            }
        }

        fn name(&self) -> &'static str {
            "flaky"
        }
    }

    fn create_test_context(transport: Arc<FlakyTransport>) -> JobWorkerContext {
        let team = TeamConfig {
            name: "Media Team".to_string(),
            portal_url: "https://media.example.org".to_string(),
        };
        let mock = || Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let notifications = NotificationService::new(NotificationRepository::new(mock()));

        JobWorkerContext {
            executor: SideEffectExecutor::new(
                EmailService::new(transport, &team),
                notifications.clone(),
                ActivityLogService::new(ActivityLogRepository::new(mock())),
            ),
            notifications,
            users: UserRepository::new(mock()),
            retry: RetryConfig {
                max_retries: 3,
                initial_delay: Duration::from_millis(5),
                max_delay: Duration::from_millis(20),
                multiplier: 2.0,
            },
        }
    }

    fn confirmation() -> SideEffect {
        EmailJob::RegistrationConfirmation {
            to: "jane@x.org".to_string(),
            full_name: "Jane Doe".to_string(),
        }
        .into()
    }

    async fn run_to_completion(context: JobWorkerContext, jobs: Vec<Job>) {
        let service = JobService::new();
        let sender = service.sender();
        let handle = service.start(context);

        for job in jobs {
            sender.enqueue(job).unwrap();
        }
        drop(sender);

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        // Workers run detached from the processor; give them a moment to finish.
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let transport = Arc::new(FlakyTransport {
            failures: 2,
            calls: AtomicU32::new(0),
            error: || AppError::ExternalService("connection reset".to_string()),
        });

        run_to_completion(
            create_test_context(transport.clone()),
            vec![Job::SideEffect {
                effect: confirmation(),
            }],
        )
        .await;

        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retries_stop_after_limit() {
        let transport = Arc::new(FlakyTransport {
            failures: u32::MAX,
            calls: AtomicU32::new(0),
            error: || AppError::ExternalService("connection refused".to_string()),
        });

        run_to_completion(
            create_test_context(transport.clone()),
            vec![Job::SideEffect {
                effect: confirmation(),
            }],
        )
        .await;

        // One attempt plus three retries.
        assert_eq!(transport.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let transport = Arc::new(FlakyTransport {
            failures: u32::MAX,
            calls: AtomicU32::new(0),
            error: || AppError::Validation("invalid recipient".to_string()),
        });

        run_to_completion(
            create_test_context(transport.clone()),
            vec![Job::SideEffect {
                effect: confirmation(),
            }],
        )
        .await;

        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_sender_dispatches_side_effects() {
        let service = JobService::new();
        let sender = service.sender();

        sender.dispatch(confirmation()).await.unwrap();
        sender.cleanup(CleanupTask::ExpiredResetTokens).unwrap();

        let JobService { mut receiver, .. } = service;
        assert_eq!(
            receiver.recv().await,
            Some(Job::SideEffect {
                effect: confirmation()
            })
        );
        assert_eq!(
            receiver.recv().await,
            Some(Job::Cleanup {
                task: CleanupTask::ExpiredResetTokens
            })
        );
    }

    #[tokio::test]
    async fn test_closed_queue_is_reported() {
        let service = JobService::new();
        let sender = service.sender();
        drop(service);

        assert!(matches!(
            sender.side_effect(confirmation()),
            Err(AppError::Queue(_))
        ));
    }

    #[test]
    fn test_job_wire_format() {
        let job = Job::Cleanup {
            task: CleanupTask::ReadNotifications { retention_days: 30 },
        };
        let value = serde_json::to_value(&job).unwrap();

        assert_eq!(value["job"], "cleanup");
        assert_eq!(value["task"]["task"], "read_notifications");
        assert_eq!(value["task"]["retention_days"], 30);
    }
}
