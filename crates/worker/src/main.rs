use std::sync::Arc;

use applaude_pipeline::artifacts::LocalArtifactStore;
use applaude_pipeline::notify::PgNotifier;
use applaude_pipeline::queue::PgTaskQueue;
use applaude_pipeline::store::PgProjectStore;
use applaude_pipeline::{GeminiGateway, LlmConfig, Orchestrator, StageDeps};
use applaude_worker::{WorkerConfig, WorkerPool};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "applaude_worker=debug,applaude_pipeline=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = WorkerConfig::from_env();
    let llm = LlmConfig::from_env();
    tracing::info!(
        concurrency = config.concurrency,
        soft_limit_secs = config.time_limits.soft.as_secs(),
        hard_limit_secs = config.time_limits.hard.as_secs(),
        model = %llm.model,
        "Loaded worker configuration",
    );
    if llm.api_key.is_none() {
        tracing::warn!(
            "GEMINI_API_KEY is not set; generation stages will fail and QA/deployment run simulated"
        );
    }

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = applaude_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    applaude_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    applaude_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database ready");

    // --- Pipeline ---
    let gateway = GeminiGateway::new(&llm).expect("Failed to build LLM HTTP client");
    let deps = StageDeps {
        store: Arc::new(PgProjectStore::new(pool.clone())),
        gateway: Arc::new(gateway),
        notifier: Arc::new(PgNotifier::new(pool.clone())),
        artifacts: Arc::new(LocalArtifactStore::new(&config.artifact_dir)),
        retry: llm.retry,
    };
    let orchestrator = Orchestrator::new(deps, Arc::new(PgTaskQueue::new(pool.clone())))
        .with_time_limits(config.time_limits)
        .with_retry_policy(config.queue_retry);

    // --- Worker pool ---
    let cancel = CancellationToken::new();
    let worker_pool = WorkerPool::new(Arc::new(orchestrator), &config);
    let pool_handle = tokio::spawn(worker_pool.run(cancel.clone()));

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, draining in-flight tasks");
    cancel.cancel();

    if tokio::time::timeout(config.shutdown_timeout, pool_handle)
        .await
        .is_err()
    {
        tracing::warn!("Worker pool did not stop in time; unfinished tasks will be redelivered");
    }

    pool.close().await;
    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
