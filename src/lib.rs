// Core store
pub mod notification;

// Shared infrastructure
pub mod config;
pub mod error;
pub mod metrics;
pub mod telemetry;

// Inbound WebSocket listener
pub mod listener;

// Application layer
pub mod api;
pub mod server;
pub mod sse;
