//! Health check endpoint.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::metrics::LISTENER_CONNECTED;
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub storage: StorageHealthResponse,
    pub listener: ListenerHealthResponse,
    pub notifications: NotificationHealthResponse,
}

#[derive(Debug, Serialize)]
pub struct StorageHealthResponse {
    pub backend: String,
}

#[derive(Debug, Serialize)]
pub struct ListenerHealthResponse {
    pub enabled: bool,
    pub connected: bool,
}

#[derive(Debug, Serialize)]
pub struct NotificationHealthResponse {
    pub total: usize,
    pub unread: usize,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let snapshot = state.store.snapshot();

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        storage: StorageHealthResponse {
            backend: state.store.storage_backend().to_string(),
        },
        listener: ListenerHealthResponse {
            enabled: state.settings.listener.enabled,
            connected: LISTENER_CONNECTED.get() == 1,
        },
        notifications: NotificationHealthResponse {
            total: snapshot.notifications.len(),
            unread: snapshot.unread_count,
        },
    })
}
