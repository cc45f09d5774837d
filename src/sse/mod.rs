//! Server-Sent Events stream of store changes.
//!
//! Dashboard components subscribe here to re-render when the store changes.
//!
//! # Endpoint
//!
//! `GET /api/v1/stream`
//!
//! # Event Types
//!
//! - `connected` - Initial event with the current unread count
//! - `notification_added`, `notification_read`, `all_read`,
//!   `notification_removed`, `cleared`, `preferences_updated` - Store changes
//! - `resync` - The stream fell behind; reload the full state

mod handler;

pub use handler::{sse_handler, StreamEvent};
