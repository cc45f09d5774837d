//! API layer - HTTP endpoint handlers organized by domain.

mod health;
mod metrics;
mod notifications;
mod preferences;
mod routes;

pub use health::health;
pub use metrics::prometheus_metrics;
pub use notifications::{
    add_notification, clear_all, invoke_action, list_groups, list_notifications, mark_all_read,
    mark_read, remove_notification, unread_count,
};
pub use preferences::{get_preferences, update_preferences};
pub use routes::api_routes;
