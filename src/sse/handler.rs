//! SSE handler implementation.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::Stream;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;

use crate::metrics::STREAM_SUBSCRIBERS;
use crate::notification::StoreEvent;
use crate::server::AppState;

/// Stream-level events not produced by the store
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    #[serde(rename_all = "camelCase")]
    Connected { unread_count: usize },
    Resync { skipped: u64 },
}

impl StreamEvent {
    fn name(&self) -> &'static str {
        match self {
            StreamEvent::Connected { .. } => "connected",
            StreamEvent::Resync { .. } => "resync",
        }
    }
}

/// GET /api/v1/stream
#[tracing::instrument(name = "sse.connect", skip(state))]
pub async fn sse_handler(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let keep_alive = Duration::from_secs(state.settings.server.keep_alive_interval);

    tracing::info!("Change stream opened");

    Sse::new(create_event_stream(state)).keep_alive(
        KeepAlive::new()
            .interval(keep_alive)
            .text("heartbeat"),
    )
}

fn create_event_stream(state: AppState) -> impl Stream<Item = Result<Event, Infallible>> {
    // Subscribe before reading the count so no change is missed in between
    let mut rx = state.store.subscribe();
    let connected = StreamEvent::Connected {
        unread_count: state.store.unread_count(),
    };

    async_stream::stream! {
        let _guard = SubscriberGuard::new();

        yield Ok(to_event(connected.name(), &connected));

        loop {
            match rx.recv().await {
                Ok(event) => yield Ok(to_event(event.name(), &event)),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped = skipped, "Change stream lagged, asking client to resync");
                    let resync = StreamEvent::Resync { skipped };
                    yield Ok(to_event(resync.name(), &resync));
                }
                Err(RecvError::Closed) => break,
            }
        }
    }
}

fn to_event<T: Serialize>(name: &str, payload: &T) -> Event {
    match serde_json::to_string(payload) {
        Ok(json) => Event::default().event(name).data(json),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize SSE event");
            Event::default()
                .event("error")
                .data(format!(r#"{{"code":"SERIALIZATION_ERROR","message":"{}"}}"#, e))
        }
    }
}

/// Tracks open streams; decremented when the client goes away
struct SubscriberGuard;

impl SubscriberGuard {
    fn new() -> Self {
        STREAM_SUBSCRIBERS.inc();
        Self
    }
}

impl Drop for SubscriberGuard {
    fn drop(&mut self) {
        STREAM_SUBSCRIBERS.dec();
        tracing::info!("Change stream closed");
    }
}
