use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Area of the farm a notification belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    System,
    Task,
    Livestock,
    Inventory,
    Order,
    Finance,
}

impl Category {
    /// Every category, in declaration order
    pub const ALL: [Category; 6] = [
        Category::System,
        Category::Task,
        Category::Livestock,
        Category::Inventory,
        Category::Order,
        Category::Finance,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::System => "system",
            Category::Task => "task",
            Category::Livestock => "livestock",
            Category::Inventory => "inventory",
            Category::Order => "order",
            Category::Finance => "finance",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Priority levels for notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Informational, can wait
    Low,
    /// Normal priority (default)
    #[default]
    Medium,
    /// Needs attention soon
    High,
    /// Always surfaced, even in do-not-disturb mode
    Urgent,
}

impl Priority {
    /// Get numeric value for priority comparison
    pub fn as_weight(&self) -> u8 {
        match self {
            Priority::Low => 1,
            Priority::Medium => 2,
            Priority::High => 3,
            Priority::Urgent => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }
}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Priority {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_weight().cmp(&other.as_weight())
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name of an audio clip played when a notification arrives.
///
/// Cues map to `/sounds/<cue>.mp3` under the configured assets directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SoundCue(String);

impl SoundCue {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    /// Relative asset path for this cue
    pub fn asset_path(&self) -> String {
        format!("sounds/{}.mp3", self.0)
    }
}

impl fmt::Display for SoundCue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Visual style of an action button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ActionVariant {
    #[default]
    Default,
    Primary,
    Destructive,
}

/// Serializable description of a user-triggerable action.
///
/// `action` names a handler in the [`ActionRegistry`](super::ActionRegistry);
/// the live callback is looked up when the action is invoked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    pub label: String,
    pub action: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub params: serde_json::Value,
    #[serde(default)]
    pub variant: ActionVariant,
}

impl ActionDescriptor {
    pub fn new(label: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: action.into(),
            params: serde_json::Value::Null,
            variant: ActionVariant::Default,
        }
    }

    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.params = params;
        self
    }

    pub fn with_variant(mut self, variant: ActionVariant) -> Self {
        self.variant = variant;
        self
    }
}

/// Notification payload before the store assigns id, timestamp and read state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewNotification {
    pub title: String,
    pub message: String,
    pub category: Category,
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<ActionDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound: Option<SoundCue>,
}

impl NewNotification {
    /// Create a builder for a notification payload
    pub fn builder(category: Category, title: impl Into<String>) -> NotificationBuilder {
        NotificationBuilder::new(category, title)
    }
}

/// A notification held by the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub title: String,
    pub message: String,
    pub category: Category,
    pub priority: Priority,
    pub timestamp: DateTime<Utc>,
    pub is_read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<ActionDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sound: Option<SoundCue>,
}

impl Notification {
    /// Stamp an incoming payload with a fresh id and the current time
    pub fn from_new(input: NewNotification) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: input.title,
            message: input.message,
            category: input.category,
            priority: input.priority,
            timestamp: Utc::now(),
            is_read: false,
            link: input.link,
            group_id: input.group_id,
            actions: input.actions,
            sound: input.sound,
        }
    }

    /// Group key, ignoring empty strings
    pub fn group_key(&self) -> Option<&str> {
        self.group_id.as_deref().filter(|g| !g.is_empty())
    }
}

/// Notifications sharing a `groupId`, computed from the current list
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationGroup {
    pub id: String,
    pub category: Category,
    pub timestamp: DateTime<Utc>,
    pub notifications: Vec<Notification>,
}

/// Builder for notification payloads
#[derive(Debug, Clone)]
pub struct NotificationBuilder {
    inner: NewNotification,
}

impl NotificationBuilder {
    pub fn new(category: Category, title: impl Into<String>) -> Self {
        Self {
            inner: NewNotification {
                title: title.into(),
                message: String::new(),
                category,
                priority: Priority::default(),
                link: None,
                group_id: None,
                actions: Vec::new(),
                sound: None,
            },
        }
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.inner.message = message.into();
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.inner.priority = priority;
        self
    }

    pub fn link(mut self, link: impl Into<String>) -> Self {
        self.inner.link = Some(link.into());
        self
    }

    pub fn group(mut self, group_id: impl Into<String>) -> Self {
        self.inner.group_id = Some(group_id.into());
        self
    }

    pub fn action(mut self, action: ActionDescriptor) -> Self {
        self.inner.actions.push(action);
        self
    }

    pub fn sound(mut self, cue: impl Into<String>) -> Self {
        self.inner.sound = Some(SoundCue::new(cue));
        self
    }

    pub fn build(self) -> NewNotification {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Urgent > Priority::High);
        assert!(Priority::High > Priority::Medium);
        assert!(Priority::Medium > Priority::Low);
    }

    #[test]
    fn test_builder() {
        let input = NewNotification::builder(Category::Livestock, "Calving alert")
            .message("Cow #112 is in labor")
            .priority(Priority::Urgent)
            .link("/livestock/112")
            .group("calving")
            .sound("alert")
            .build();

        assert_eq!(input.category, Category::Livestock);
        assert_eq!(input.priority, Priority::Urgent);
        assert_eq!(input.group_id.as_deref(), Some("calving"));
        assert_eq!(input.sound, Some(SoundCue::new("alert")));
    }

    #[test]
    fn test_wire_format_is_camel_case() {
        let input = NewNotification::builder(Category::Order, "New order")
            .group("orders-today")
            .build();
        let notification = Notification::from_new(input);

        let json = serde_json::to_value(&notification).unwrap();
        assert_eq!(json["category"], "order");
        assert_eq!(json["priority"], "medium");
        assert_eq!(json["isRead"], false);
        assert_eq!(json["groupId"], "orders-today");
        assert!(json.get("link").is_none());
    }

    #[test]
    fn test_payload_defaults() {
        let input: NewNotification = serde_json::from_str(
            r#"{"title":"Feed low","message":"Silo 2 below 10%","category":"inventory","priority":"low"}"#,
        )
        .unwrap();

        assert_eq!(input.priority, Priority::Low);
        assert!(input.actions.is_empty());
        assert!(input.group_id.is_none());
        assert!(input.sound.is_none());
    }

    #[test]
    fn test_payload_requires_priority() {
        let result: Result<NewNotification, _> = serde_json::from_str(
            r#"{"title":"Feed low","message":"Silo 2 below 10%","category":"inventory"}"#,
        );

        assert!(result.is_err());
    }

    #[test]
    fn test_empty_group_id_is_ungrouped() {
        let input = NewNotification::builder(Category::Task, "Shift").group("").build();
        let notification = Notification::from_new(input);
        assert!(notification.group_key().is_none());
    }

    #[test]
    fn test_sound_asset_path() {
        assert_eq!(SoundCue::new("chime").asset_path(), "sounds/chime.mp3");
    }
}
