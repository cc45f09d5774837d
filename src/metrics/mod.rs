//! Prometheus metrics for the notification store.
//!
//! - Store metrics (admissions, rejections, stored and unread gauges)
//! - Persistence and side-effect failures
//! - Listener connection and message metrics
//! - Stream subscriber gauge

use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, Encoder, IntCounter,
    IntCounterVec, IntGauge, TextEncoder,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "farm_notify";

lazy_static! {
    // ============================================================================
    // Store Metrics
    // ============================================================================

    /// Admitted notifications by category
    pub static ref NOTIFICATIONS_ADMITTED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_notifications_admitted_total", METRIC_PREFIX),
        "Total notifications admitted into the store",
        &["category"]
    ).unwrap();

    /// Rejected notifications by reason
    pub static ref NOTIFICATIONS_REJECTED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_notifications_rejected_total", METRIC_PREFIX),
        "Total notifications rejected by admission control",
        &["reason"]
    ).unwrap();

    /// Notifications currently held
    pub static ref NOTIFICATIONS_STORED: IntGauge = register_int_gauge!(
        format!("{}_notifications_stored", METRIC_PREFIX),
        "Number of notifications currently in the store"
    ).unwrap();

    /// Unread notifications currently held
    pub static ref NOTIFICATIONS_UNREAD: IntGauge = register_int_gauge!(
        format!("{}_notifications_unread", METRIC_PREFIX),
        "Number of unread notifications in the store"
    ).unwrap();

    /// Failed write-through saves
    pub static ref PERSIST_FAILURES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_persist_failures_total", METRIC_PREFIX),
        "Total failed attempts to persist store state"
    ).unwrap();

    /// Failed sound cues
    pub static ref SOUND_FAILURES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_sound_failures_total", METRIC_PREFIX),
        "Total sound cues that failed to play"
    ).unwrap();

    // ============================================================================
    // Listener Metrics
    // ============================================================================

    /// Listener connection status (1 = connected, 0 = disconnected)
    pub static ref LISTENER_CONNECTED: IntGauge = register_int_gauge!(
        format!("{}_listener_connected", METRIC_PREFIX),
        "WebSocket listener connection status (1=connected, 0=disconnected)"
    ).unwrap();

    /// Reconnect attempts
    pub static ref LISTENER_RECONNECTS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_listener_reconnects_total", METRIC_PREFIX),
        "Total WebSocket reconnect attempts"
    ).unwrap();

    /// Inbound messages by outcome
    pub static ref LISTENER_MESSAGES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_listener_messages_total", METRIC_PREFIX),
        "Total inbound WebSocket messages",
        &["outcome"]
    ).unwrap();

    // ============================================================================
    // Stream Metrics
    // ============================================================================

    /// Open change-event streams
    pub static ref STREAM_SUBSCRIBERS: IntGauge = register_int_gauge!(
        format!("{}_stream_subscribers", METRIC_PREFIX),
        "Number of open change-event streams"
    ).unwrap();
}

/// Encode all registered metrics in Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;

    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
