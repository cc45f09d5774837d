//! Registry resolving persisted action descriptors to live handlers.

use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use uuid::Uuid;

use super::store::NotificationStore;
use super::types::{ActionDescriptor, Notification};

/// Errors raised while invoking a notification action
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("Notification {0} not found")]
    NotificationNotFound(Uuid),

    #[error("Notification {id} has no action at index {index}")]
    IndexOutOfRange { id: Uuid, index: usize },

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Notification {0} has no link to open")]
    MissingLink(Uuid),

    #[error("Action failed: {0}")]
    Failed(String),
}

/// Everything a handler can see while running
pub struct ActionContext<'a> {
    pub store: &'a NotificationStore,
    pub notification: Notification,
    pub descriptor: ActionDescriptor,
}

impl ActionContext<'_> {
    pub fn params(&self) -> &serde_json::Value {
        &self.descriptor.params
    }
}

pub type ActionHandler = Arc<dyn Fn(&ActionContext<'_>) -> Result<(), ActionError> + Send + Sync>;

/// Name → handler lookup table
pub struct ActionRegistry {
    handlers: DashMap<String, ActionHandler>,
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl ActionRegistry {
    /// Registry with no handlers
    pub fn empty() -> Self {
        Self {
            handlers: DashMap::new(),
        }
    }

    /// Registry with `mark_read`, `dismiss` and `open_link`
    pub fn with_builtins() -> Self {
        let registry = Self::empty();

        registry.register("mark_read", |ctx| {
            ctx.store.mark_as_read(ctx.notification.id);
            Ok(())
        });

        registry.register("dismiss", |ctx| {
            ctx.store.remove_notification(ctx.notification.id);
            Ok(())
        });

        registry.register("open_link", |ctx| {
            let target = ctx
                .params()
                .get("href")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .or_else(|| ctx.notification.link.clone())
                .ok_or(ActionError::MissingLink(ctx.notification.id))?;

            tracing::info!(
                notification_id = %ctx.notification.id,
                target = %target,
                "Navigation requested"
            );
            Ok(())
        });

        registry
    }

    /// Register or replace a handler
    pub fn register<F>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(&ActionContext<'_>) -> Result<(), ActionError> + Send + Sync + 'static,
    {
        self.handlers.insert(name.into(), Arc::new(handler));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Look up a handler; the map guard is released before returning
    pub fn resolve(&self, name: &str) -> Result<ActionHandler, ActionError> {
        self.handlers
            .get(name)
            .map(|h| h.value().clone())
            .ok_or_else(|| ActionError::UnknownAction(name.to_string()))
    }
}
