//! Notification model, store, persistence and side effects.
//!
//! # Store Architecture
//!
//! `NotificationStore` is the single source of truth for in-app
//! notifications. It is built once with `NotificationStore::hydrate` and
//! shared explicitly; collaborators are injected:
//!
//! - `StateStorage`: durable state (`FileStorage`, `MemoryStorage`)
//! - `Effects`: sound playback and the email hook
//! - `ActionRegistry`: live handlers for persisted action descriptors
//!
//! Unread counts and groups are computed from the notification list on read.

mod actions;
mod effects;
mod preferences;
mod storage;
mod store;
mod types;

pub use actions::{ActionContext, ActionError, ActionHandler, ActionRegistry};
pub use effects::{
    CommandSoundPlayer, DeferredEmailHook, Effects, EmailHook, SilentSoundPlayer, SoundError,
    SoundPlayer,
};
pub use preferences::{CategoryPreference, NotificationPreferences, PreferencesPatch};
pub use storage::{
    create_storage, FileStorage, MemoryStorage, PersistedState, StateStorage, StorageError,
    STATE_VERSION,
};
pub use store::{
    group_notifications, unread_count, Admission, NotificationStore, RejectReason, StoreEvent,
    StoreSnapshot,
};
pub use types::{
    ActionDescriptor, ActionVariant, Category, NewNotification, Notification, NotificationBuilder,
    NotificationGroup, Priority, SoundCue,
};
