//! Reconnect delay policies for the WebSocket listener

use std::time::Duration;

use rand::Rng;

use crate::config::ListenerConfig;

/// Exponential backoff configuration
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Initial delay in milliseconds
    pub initial_delay_ms: u64,
    /// Maximum delay in milliseconds
    pub max_delay_ms: u64,
    /// Multiplier for exponential growth
    pub multiplier: f64,
    /// Jitter factor (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1_000,
            max_delay_ms: 60_000, // 1 minute
            multiplier: 2.0,
            jitter_factor: 0.1, // 10% jitter
        }
    }
}

/// Exponential backoff calculator with jitter
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    config: BackoffConfig,
    next_base_ms: f64,
    attempt: u32,
}

impl ExponentialBackoff {
    pub fn new(config: BackoffConfig) -> Self {
        let initial = config.initial_delay_ms as f64;
        Self {
            config,
            next_base_ms: initial,
            attempt: 0,
        }
    }

    /// Get the next delay duration. The first delay is the initial delay.
    pub fn next_delay(&mut self) -> Duration {
        self.attempt += 1;

        let capped = self.next_base_ms.min(self.config.max_delay_ms as f64);
        self.next_base_ms = capped * self.config.multiplier;

        let jitter_range = capped * self.config.jitter_factor;
        let delay = if jitter_range > 0.0 {
            let jitter = rand::rng().random_range(-jitter_range..jitter_range);
            (capped + jitter).max(1.0)
        } else {
            capped.max(1.0)
        };

        Duration::from_millis(delay as u64)
    }

    pub fn reset(&mut self) {
        self.next_base_ms = self.config.initial_delay_ms as f64;
        self.attempt = 0;
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

/// How long to wait before reconnecting
#[derive(Debug, Clone)]
pub enum ReconnectPolicy {
    /// Same delay every time, retried forever
    Fixed { delay: Duration, attempt: u32 },
    /// Growing delay with jitter, capped, retried forever
    Exponential(ExponentialBackoff),
}

impl ReconnectPolicy {
    pub fn fixed(delay: Duration) -> Self {
        Self::Fixed { delay, attempt: 0 }
    }

    pub fn exponential(config: BackoffConfig) -> Self {
        Self::Exponential(ExponentialBackoff::new(config))
    }

    /// Build from listener settings
    pub fn from_config(config: &ListenerConfig) -> Self {
        let delay_ms = config.reconnect_delay_seconds.saturating_mul(1_000);
        match config.backoff.as_str() {
            "exponential" => Self::exponential(BackoffConfig {
                initial_delay_ms: delay_ms,
                max_delay_ms: config
                    .max_reconnect_delay_seconds
                    .saturating_mul(1_000)
                    .max(delay_ms),
                ..Default::default()
            }),
            "fixed" => Self::fixed(Duration::from_millis(delay_ms)),
            other => {
                tracing::warn!(backoff = %other, "Unknown reconnect policy, using fixed delay");
                Self::fixed(Duration::from_millis(delay_ms))
            }
        }
    }

    pub fn next_delay(&mut self) -> Duration {
        match self {
            Self::Fixed { delay, attempt } => {
                *attempt += 1;
                *delay
            }
            Self::Exponential(backoff) => backoff.next_delay(),
        }
    }

    /// Called after a successful connection
    pub fn reset(&mut self) {
        match self {
            Self::Fixed { attempt, .. } => *attempt = 0,
            Self::Exponential(backoff) => backoff.reset(),
        }
    }

    /// Consecutive failed attempts since the last reset
    pub fn attempt(&self) -> u32 {
        match self {
            Self::Fixed { attempt, .. } => *attempt,
            Self::Exponential(backoff) => backoff.attempt(),
        }
    }
}
