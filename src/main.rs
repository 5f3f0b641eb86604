use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::signal;

use user_sync_service::config::Settings;
use user_sync_service::server::{create_app, AppState};
use user_sync_service::shutdown::GracefulShutdown;
use user_sync_service::tasks::HeartbeatTask;
use user_sync_service::telemetry::init_telemetry;
use user_sync_service::users::seed_sample_users;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first; it decides the log format
    let settings = Settings::new()?;

    // Initialize tracing
    let _telemetry = init_telemetry(&settings.logging, &settings.otel)?;
    tracing::info!(run_mode = %Settings::run_mode(), "Configuration loaded");

    // Create application state
    let state = AppState::new(settings.clone());
    tracing::info!(store = state.store.backend_name(), "Application state initialized");

    if settings.store.seed_sample_users {
        let seeded = seed_sample_users(state.store.as_ref()).await?;
        tracing::info!(seeded = seeded, "Sample users created");
    }

    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    // Start heartbeat task in background
    let heartbeat_task = HeartbeatTask::new(
        settings.websocket.clone(),
        state.connection_manager.clone(),
        shutdown_tx.subscribe(),
    );
    let heartbeat_handle = tokio::spawn(async move {
        heartbeat_task.run().await;
    });

    let graceful_shutdown = Arc::new(GracefulShutdown::new(
        state.connection_manager.clone(),
        state.notifier.clone(),
        shutdown_tx,
    ));

    // Create Axum app
    let app = create_app(state);

    // Start server
    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_handler(graceful_shutdown))
        .await?;

    // Wait for background tasks to finish
    tracing::info!("Waiting for background tasks to finish...");
    let _ = heartbeat_handle.await;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal_handler(graceful_shutdown: Arc<GracefulShutdown>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let reason = tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
            "interrupt"
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
            "terminate"
        }
    };

    graceful_shutdown.execute(reason).await;
}
