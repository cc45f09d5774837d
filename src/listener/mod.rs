//! WebSocket listener feeding the notification store.
//!
//! The listener keeps one connection to the dashboard backend open and
//! forwards every `{"type": "notification", ...}` message into
//! `NotificationStore::add_notification`.
//!
//! # Reconnects
//!
//! When the connection closes or fails, the listener waits and reconnects
//! with no retry cap. The default policy waits a fixed 5 seconds; the
//! exponential policy grows the delay with jitter up to a configured bound
//! and resets after a successful connect. A shutdown signal interrupts both
//! the read loop and the reconnect wait.

mod backoff;
mod client;
mod message;

pub use backoff::{BackoffConfig, ExponentialBackoff, ReconnectPolicy};
pub use client::{spawn_listener, ListenerError, NotificationListener, DEFAULT_RECONNECT_DELAY};
pub use message::InboundMessage;
