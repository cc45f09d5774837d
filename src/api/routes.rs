use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::server::AppState;

use super::{
    add_notification, clear_all, get_preferences, health, invoke_action, list_groups,
    list_notifications, mark_all_read, mark_read, prometheus_metrics, remove_notification,
    unread_count, update_preferences,
};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health & Metrics
        .route("/health", get(health))
        .route("/metrics", get(prometheus_metrics))
        .nest(
            "/api/v1",
            Router::new()
                // Notifications
                .route(
                    "/notifications",
                    get(list_notifications)
                        .post(add_notification)
                        .delete(clear_all),
                )
                .route("/notifications/groups", get(list_groups))
                .route("/notifications/unread-count", get(unread_count))
                .route("/notifications/read-all", post(mark_all_read))
                .route("/notifications/{id}", delete(remove_notification))
                .route("/notifications/{id}/read", post(mark_read))
                .route("/notifications/{id}/actions/{index}", post(invoke_action))
                // Preferences
                .route(
                    "/preferences",
                    get(get_preferences).patch(update_preferences),
                ),
        )
}
