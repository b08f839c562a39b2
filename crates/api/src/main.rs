use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use applaude_api::config::ServerConfig;
use applaude_api::router::build_app_router;
use applaude_api::state::AppState;
use applaude_api::ws::{self, StatusForwarder};
use applaude_events::{EventBus, PgRelay};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "applaude_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = applaude_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    applaude_db::health_check(&pool)
        .await
        .expect("Database health check failed");

    applaude_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Status events ---
    let event_bus = Arc::new(EventBus::default());
    let relay_cancel = CancellationToken::new();
    let relay_handle = tokio::spawn(PgRelay::run(
        pool.clone(),
        Arc::clone(&event_bus),
        relay_cancel.clone(),
    ));

    let state = AppState::new(pool.clone(), config.clone());
    let forwarder_handle = tokio::spawn(
        StatusForwarder::new(Arc::clone(&state.ws_manager)).run(event_bus.subscribe()),
    );
    let heartbeat_handle = ws::start_heartbeat(Arc::clone(&state.ws_manager));
    let ws_manager = Arc::clone(&state.ws_manager);
    tracing::info!("Status relay, forwarder and heartbeat started");

    // --- HTTP server ---
    let app = build_app_router(state, &config);

    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Server stopped accepting connections, cleaning up");

    // --- Shutdown ---
    let grace = Duration::from_secs(config.shutdown_timeout_secs);

    relay_cancel.cancel();
    let _ = tokio::time::timeout(grace, relay_handle).await;
    drop(event_bus);
    let _ = tokio::time::timeout(grace, forwarder_handle).await;
    tracing::info!("Status services stopped");

    ws_manager.shutdown_all().await;
    heartbeat_handle.abort();

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
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
