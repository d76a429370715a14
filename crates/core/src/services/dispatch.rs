//! Side-effect dispatch.
//!
//! Emails, in-app notifications and audit entries that follow a committed write are
//! described as [`SideEffect`] values and handed to a [`SideEffectDispatcher`]. The
//! concrete dispatcher is either the in-process job queue or the Redis-backed queue
//! from the queue crate; services only see the trait.

use async_trait::async_trait;
use mediateam_common::AppResult;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use crate::services::{activity_log::ActivityEntry, email::EmailJob, notification::NotifyJob};

/// Work that follows a committed write and may fail independently of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum SideEffect {
    /// Send an email.
    Email(EmailJob),
    /// Create in-app notifications.
    Notify(NotifyJob),
    /// Append to the activity log.
    Activity(ActivityEntry),
}

impl SideEffect {
    /// Effect kind, for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Email(_) => "email",
            Self::Notify(_) => "notify",
            Self::Activity(_) => "activity",
        }
    }
}

impl From<EmailJob> for SideEffect {
    fn from(job: EmailJob) -> Self {
        Self::Email(job)
    }
}

impl From<NotifyJob> for SideEffect {
    fn from(job: NotifyJob) -> Self {
        Self::Notify(job)
    }
}

impl From<ActivityEntry> for SideEffect {
    fn from(entry: ActivityEntry) -> Self {
        Self::Activity(entry)
    }
}

/// Accepts side effects for later execution.
///
/// `dispatch` returns once the effect is queued; it never waits for delivery.
#[async_trait]
pub trait SideEffectDispatcher: Send + Sync {
    /// Queue one side effect.
    async fn dispatch(&self, effect: SideEffect) -> AppResult<()>;
}

/// Type alias for the shared dispatcher.
pub type DispatcherService = Arc<dyn SideEffectDispatcher>;

/// Queue a side effect. A refused enqueue is logged and otherwise ignored.
pub async fn dispatch_and_log(dispatcher: &dyn SideEffectDispatcher, effect: impl Into<SideEffect>) {
    let effect = effect.into();
    let kind = effect.kind();

    match dispatcher.dispatch(effect).await {
        Ok(()) => debug!(kind, "Side effect queued"),
        Err(e) => warn!(kind, error = %e, "Failed to queue side effect"),
    }
}

/// Dispatcher that drops every effect.
#[derive(Debug, Clone, Default)]
pub struct NoOpDispatcher;

#[async_trait]
impl SideEffectDispatcher for NoOpDispatcher {
    async fn dispatch(&self, effect: SideEffect) -> AppResult<()> {
        debug!(kind = effect.kind(), "Side effect dropped (no dispatcher configured)");
        Ok(())
    }
}

/// Dispatcher that keeps every effect in memory, for tests and dry runs.
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    effects: Mutex<Vec<SideEffect>>,
}

impl RecordingDispatcher {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Effects dispatched so far, in order.
    #[must_use]
    pub fn effects(&self) -> Vec<SideEffect> {
        self.effects
            .lock()
            .map(|effects| effects.clone())
            .unwrap_or_default()
    }

    /// Emails dispatched so far.
    #[must_use]
    pub fn emails(&self) -> Vec<EmailJob> {
        self.effects()
            .into_iter()
            .filter_map(|effect| match effect {
                SideEffect::Email(job) => Some(job),
                _ => None,
            })
            .collect()
    }

    /// Notifications dispatched so far.
    #[must_use]
    pub fn notifications(&self) -> Vec<NotifyJob> {
        self.effects()
            .into_iter()
            .filter_map(|effect| match effect {
                SideEffect::Notify(job) => Some(job),
                _ => None,
            })
            .collect()
    }

    /// Activity entries dispatched so far.
    #[must_use]
    pub fn activities(&self) -> Vec<ActivityEntry> {
        self.effects()
            .into_iter()
            .filter_map(|effect| match effect {
                SideEffect::Activity(entry) => Some(entry),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl SideEffectDispatcher for RecordingDispatcher {
    async fn dispatch(&self, effect: SideEffect) -> AppResult<()> {
        if let Ok(mut effects) = self.effects.lock() {
            effects.push(effect);
        }
        Ok(())
    }
}
