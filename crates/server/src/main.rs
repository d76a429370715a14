//! Mediateam server entry point.

use std::sync::Arc;
use std::time::Duration;

use apalis::layers::retry::RetryPolicy;
use apalis::prelude::*;
use axum::{Router, http::StatusCode, middleware};
use mediateam_api::{AppState, RateLimiterState, router as api_router};
use mediateam_common::{
    AppError, Config,
    config::{LogConfig, RedisConfig},
};
use mediateam_core::{
    ActivityLogService, DispatcherService, EmailService, JobSender, JobService, JobWorkerContext,
    NotificationService, RetryConfig, SideEffectExecutor, UserService,
};
use mediateam_db::repositories::{ActivityLogRepository, NotificationRepository, UserRepository};
use mediateam_queue::{
    RedisSideEffectQueue, SchedulerConfig, connect_storage, run_scheduler, side_effect_worker,
};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Largest accepted request body.
const MAX_BODY_BYTES: usize = 256 * 1024;

/// Interval between rate limiter sweeps.
const RATE_LIMIT_SWEEP: Duration = Duration::from_secs(300);

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

fn init_tracing(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "mediateam=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    if log.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Start the durable Redis queue and its worker. Returns the dispatcher to
/// hand to the services.
async fn start_redis_queue(
    redis: &RedisConfig,
    executor: SideEffectExecutor,
    max_retries: u32,
) -> Result<DispatcherService, AppError> {
    info!("Connecting to Redis...");
    let storage = connect_storage(&redis.url).await?;
    info!("Connected to Redis job queue");

    let queue: DispatcherService = Arc::new(RedisSideEffectQueue::new(storage.clone()));

    tokio::spawn(async move {
        let monitor = Monitor::new().register(
            WorkerBuilder::new("side-effects")
                .retry(RetryPolicy::retries(max_retries as usize))
                .data(executor)
                .backend(storage)
                .build_fn(side_effect_worker),
        );

        if let Err(e) = monitor.run().await {
            error!(error = %e, "Side-effect worker failed");
        }
    });
    info!("Side-effect worker started");

    Ok(queue)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    init_tracing(&config.log);

    info!("Starting mediateam server...");

    // Connect to database
    let db = mediateam_db::init(&config).await?;
    info!("Connected to database");

    info!("Running database migrations...");
    mediateam_db::migrate(&db).await?;
    info!("Migrations completed");

    let db = Arc::new(db);
    let user_repo = UserRepository::new(Arc::clone(&db));
    let notification_service =
        NotificationService::new(NotificationRepository::new(Arc::clone(&db)));
    let activity_log_service = ActivityLogService::new(ActivityLogRepository::new(Arc::clone(&db)));
    let email_service = EmailService::from_config(&config.mail, &config.team)?;
    if !config.mail.enabled {
        warn!("SMTP delivery disabled; outgoing mail is only logged");
    }

    let executor = SideEffectExecutor::new(
        email_service,
        notification_service.clone(),
        activity_log_service,
    );

    // In-process queue: side effects when Redis is absent, maintenance always
    let job_service = JobService::new();
    let job_sender: JobSender = job_service.sender();
    let _job_worker = job_service.start(JobWorkerContext {
        executor: executor.clone(),
        notifications: notification_service,
        users: user_repo.clone(),
        retry: RetryConfig {
            max_retries: config.jobs.max_retries,
            ..RetryConfig::default()
        },
    });

    let dispatcher: DispatcherService = match &config.redis {
        Some(redis) => start_redis_queue(redis, executor, config.jobs.max_retries).await?,
        None => {
            info!("Redis not configured; side effects run on the in-process queue");
            let local: DispatcherService = Arc::new(job_sender.clone());
            local
        }
    };

    let _scheduler = run_scheduler(SchedulerConfig::from(&config.jobs), Arc::new(job_sender));

    if let Some(bootstrap) = &config.bootstrap_admin {
        let users = UserService::new(user_repo, dispatcher.clone());
        if let Some(admin) = users.ensure_admin(bootstrap).await? {
            info!(user_id = %admin.id, username = %admin.username, "Bootstrap administrator ready");
        }
    }

    let state = AppState::new(db, dispatcher, &config);
    let rate_limiter: RateLimiterState = state.rate_limiter.clone();

    let sweeper = rate_limiter.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(RATE_LIMIT_SWEEP);
        loop {
            interval.tick().await;
            sweeper.cleanup().await;
        }
    });

    // Build router
    let app = Router::new()
        .nest("/api", api_router())
        .layer(middleware::from_fn_with_state(
            rate_limiter,
            mediateam_api::rate_limit::rate_limit_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            mediateam_api::middleware::auth_middleware,
        ))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::GATEWAY_TIMEOUT,
            Duration::from_secs(config.server.request_timeout_secs),
        ))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server with graceful shutdown
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
