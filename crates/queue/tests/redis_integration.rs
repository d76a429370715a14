//! Redis integration tests.
//!
//! These tests require a running Redis instance.
//! Run with: `cargo test --test redis_integration -- --ignored`
//!
//! Set `REDIS_URL` environment variable to point to your Redis instance.
//! Default: <redis://localhost:6379>

use mediateam_core::{EmailJob, SideEffectDispatcher};
use mediateam_queue::{RedisSideEffectQueue, connect_storage};

fn get_redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
}

/// Test that we can connect to Redis.
#[tokio::test]
#[ignore = "requires running Redis instance"]
async fn test_redis_connection() {
    let storage = connect_storage(&get_redis_url()).await;
    assert!(storage.is_ok(), "Failed to connect to Redis: {:?}", storage.err());
}

/// Test queueing a side effect.
#[tokio::test]
#[ignore = "requires running Redis instance"]
async fn test_dispatch_side_effect() {
    let storage = connect_storage(&get_redis_url())
        .await
        .expect("Failed to connect to Redis");
    let queue = RedisSideEffectQueue::new(storage);

    let result = queue
        .dispatch(
            EmailJob::RegistrationConfirmation {
                to: "jane@x.org".to_string(),
                full_name: "Jane Doe".to_string(),
            }
            .into(),
        )
        .await;

    assert!(result.is_ok(), "Failed to queue side effect: {:?}", result.err());
}
