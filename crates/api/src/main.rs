use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hourglass_core::catalog::CatalogIndex;
use hourglass_events::{ProcessLauncher, TaskRegistry};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hourglass_api::background;
use hourglass_api::config::ServerConfig;
use hourglass_api::router::build_app_router;
use hourglass_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "hourglass_api=debug,hourglass_events=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    std::fs::create_dir_all(&config.bakes_dir).expect("Failed to create bakes directory");

    // --- Task registry ---
    let launcher = ProcessLauncher::new(config.worker_bin.clone())
        .with_args(["--out-dir".to_string(), config.bakes_dir.display().to_string()]);
    tracing::info!(worker = %launcher.program().display(), "Worker launcher configured");
    let registry = Arc::new(TaskRegistry::new(Arc::new(launcher)));

    // Spawn the retention sweeper.
    let retention_cancel = tokio_util::sync::CancellationToken::new();
    let retention_handle = tokio::spawn(background::task_retention::run(
        Arc::clone(&registry),
        Duration::from_secs(config.task_retention_secs),
        retention_cancel.clone(),
    ));

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        registry: Arc::clone(&registry),
        catalog: Arc::new(CatalogIndex::in_dir(&config.bakes_dir)),
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
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

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    retention_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), retention_handle).await;
    tracing::info!("Task retention job stopped");

    let tasks = registry.task_count().await;
    tracing::info!(tasks, "Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
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
        () = ctrl_c => tracing::info!("Received Ctrl-C, starting graceful shutdown"),
        () = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}
