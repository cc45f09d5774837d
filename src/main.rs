use anyhow::Result;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;

use farm_notification_store::config::Settings;
use farm_notification_store::listener::{spawn_listener, NotificationListener};
use farm_notification_store::server::{create_app, AppState};
use farm_notification_store::telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::new()?;

    // Initialize tracing
    telemetry::init_tracing(&settings.logging)?;
    tracing::info!("Configuration loaded");

    // Hydrate the store
    let state = AppState::new(settings.clone());
    tracing::info!(
        storage = state.store.storage_backend(),
        notifications = state.store.notifications().len(),
        unread = state.store.unread_count(),
        "Notification store ready"
    );

    // Start WebSocket listener in background
    let listener = if settings.listener.enabled {
        let listener = NotificationListener::new(&settings.listener, state.store.clone());
        Some(spawn_listener(listener))
    } else {
        tracing::info!("WebSocket listener disabled");
        None
    };

    // Create Axum app
    let app = create_app(state);

    // Start server
    let addr = settings.server_addr();
    let tcp = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    let listener_shutdown = listener.as_ref().map(|(tx, _)| tx.clone());

    // Run server with graceful shutdown
    axum::serve(tcp, app)
        .with_graceful_shutdown(shutdown_signal_handler(listener_shutdown))
        .await?;

    // Wait for the listener to finish
    if let Some((_, handle)) = listener {
        tracing::info!("Waiting for listener to stop...");
        let _ = handle.await;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal_handler(listener_shutdown: Option<broadcast::Sender<()>>) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }

    // Stop the listener, including any pending reconnect
    if let Some(tx) = listener_shutdown {
        let _ = tx.send(());
    }
}
