//! Redis-backed side-effect dispatch.
//!
//! Queues side effects to apalis-redis storage for the side-effect worker. Jobs
//! survive a process restart and are delivered at least once.

use apalis::prelude::*;
use apalis_redis::RedisStorage;
use async_trait::async_trait;
use mediateam_common::{AppError, AppResult};
use mediateam_core::{SideEffect, SideEffectDispatcher};
use tracing::debug;

use crate::jobs::SideEffectJob;

/// Open a Redis connection and wrap it in job storage.
pub async fn connect_storage(url: &str) -> AppResult<RedisStorage<SideEffectJob>> {
    let client = redis::Client::open(url)
        .map_err(|e| AppError::Config(format!("Invalid Redis URL: {e}")))?;
    let conn = redis::aio::ConnectionManager::new(client)
        .await
        .map_err(|e| AppError::Queue(format!("Failed to connect to Redis: {e}")))?;
    Ok(RedisStorage::new(conn))
}

/// Redis-backed side-effect queue.
#[derive(Clone)]
pub struct RedisSideEffectQueue {
    storage: RedisStorage<SideEffectJob>,
}

impl RedisSideEffectQueue {
    /// Create a new queue over existing storage.
    #[must_use]
    pub const fn new(storage: RedisStorage<SideEffectJob>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl SideEffectDispatcher for RedisSideEffectQueue {
    async fn dispatch(&self, effect: SideEffect) -> AppResult<()> {
        let kind = effect.kind();

        self.storage
            .clone()
            .push(SideEffectJob::new(effect))
            .await
            .map_err(|e| AppError::Queue(format!("Failed to queue job: {e}")))?;

        debug!(kind, "Queued side-effect job");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_is_shareable() {
        fn assert_send_sync<T: Send + Sync + 'static>() {}
        assert_send_sync::<RedisSideEffectQueue>();
    }

    #[tokio::test]
    async fn test_connect_rejects_bad_url() {
        assert!(matches!(
            connect_storage("not a url").await,
            Err(AppError::Config(_))
        ));
    }
}
