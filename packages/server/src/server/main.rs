use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use server_core::common::utils::ExpoPushService;
use server_core::config::Config;
use server_core::domains::processing;
use server_core::kernel::deps::ServerDeps;
use server_core::kernel::extraction::HttpExtractionService;
use server_core::kernel::jobs::{
    InMemoryJobStore, JobRegistry, PostgresJobStore, WorkerPool, WorkerPoolConfig,
};
use server_core::kernel::notifications::NotificationDispatcher;
use server_core::kernel::sessions::BroadcastGateway;
use server_core::kernel::traits::{BaseJobStore, BaseUserLookup};
use server_core::kernel::users::{NullUserLookup, PostgresUserLookup};
use server_core::server::{build_router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;

    let (store, user_lookup): (Arc<dyn BaseJobStore>, Arc<dyn BaseUserLookup>) =
        match &config.database_url {
            Some(url) => {
                let pool = sqlx::PgPool::connect(url)
                    .await
                    .context("failed to connect to postgres")?;
                info!("using postgres job store");
                (
                    Arc::new(PostgresJobStore::new(pool.clone())),
                    Arc::new(PostgresUserLookup::new(pool)),
                )
            }
            None => {
                info!("DATABASE_URL unset; using in-memory job store");
                (Arc::new(InMemoryJobStore::new()), Arc::new(NullUserLookup))
            }
        };

    let deps = ServerDeps::builder()
        .job_store(Arc::clone(&store))
        .user_lookup(user_lookup)
        .push_service(Arc::new(ExpoPushService::new(
            config.expo_access_token.clone(),
        )))
        .extraction(Arc::new(HttpExtractionService::new(
            config.extraction_url.clone(),
        )))
        .build();

    let mut registry = JobRegistry::new();
    processing::register_handlers(&mut registry, &deps);

    let worker = Arc::new(WorkerPool::with_config(
        Arc::clone(&deps.job_store),
        Arc::new(registry),
        deps.job_events.clone(),
        WorkerPoolConfig {
            max_concurrent: config.max_concurrent_jobs,
            poll_interval: config.job_poll_interval,
            job_timeout: config.job_timeout,
            ..WorkerPoolConfig::default()
        },
    ));

    let gateway = BroadcastGateway::new(
        Arc::clone(&deps.job_store),
        deps.sessions.clone(),
        deps.job_events.clone(),
    );
    let dispatcher = NotificationDispatcher::new(
        Arc::clone(&deps.user_lookup),
        Arc::clone(&deps.push_service),
        deps.job_events.clone(),
    );

    let shutdown = CancellationToken::new();
    let worker_task = tokio::spawn(Arc::clone(&worker).run(shutdown.clone()));
    let gateway_task = tokio::spawn(gateway.clone().run(shutdown.clone()));
    let dispatcher_task = tokio::spawn(dispatcher.run(shutdown.clone()));
    let cleanup_task = processing::cleanup::spawn_schedule(
        Arc::clone(&deps.job_store),
        config.cleanup_interval,
        shutdown.clone(),
    );
    let session_reaper = deps
        .sessions
        .spawn_cleanup(config.cleanup_interval, shutdown.clone());

    let state = AppState {
        store: Arc::clone(&deps.job_store),
        sessions: deps.sessions.clone(),
        gateway,
        worker,
    };
    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(addr = %addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;

    shutdown.cancel();
    let _ = worker_task.await;
    let _ = gateway_task.await;
    let _ = dispatcher_task.await;
    let _ = cleanup_task.await;
    let _ = session_reaper.await;
    info!("shutdown complete");
    Ok(())
}
