use serde::{Deserialize, Serialize};

use crate::notification::NewNotification;

/// Messages pushed by the dashboard backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InboundMessage {
    #[serde(rename = "notification")]
    Notification { notification: NewNotification },
    /// Any other message type; ignored by the listener
    #[serde(other)]
    Other,
}

impl InboundMessage {
    pub fn parse(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }

    pub fn notification(notification: NewNotification) -> Self {
        Self::Notification { notification }
    }
}
