//! The notification store: admission control, read accounting, derived
//! views and write-through persistence.
//!
//! A single store is built per process with [`NotificationStore::hydrate`]
//! and shared as `Arc<NotificationStore>`. All mutations go through one
//! mutex. Persistence, side effects and change events run after it is
//! released, so readers never wait on disk I/O.
//!
//! Mutations still write through before they return and may block on the
//! file system. Async callers go through [`NotificationStore::run_blocking`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::metrics::{
    NOTIFICATIONS_ADMITTED_TOTAL, NOTIFICATIONS_REJECTED_TOTAL, NOTIFICATIONS_STORED,
    NOTIFICATIONS_UNREAD, PERSIST_FAILURES_TOTAL,
};

use super::actions::{ActionContext, ActionError, ActionRegistry};
use super::effects::Effects;
use super::preferences::{NotificationPreferences, PreferencesPatch};
use super::storage::{PersistedState, StateStorage};
use super::types::{NewNotification, Notification, NotificationGroup, Priority};

/// Capacity of the change-event channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Why admission control turned a notification away
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    CategoryDisabled,
    DoNotDisturb,
    BelowMinPriority,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::CategoryDisabled => "category_disabled",
            RejectReason::DoNotDisturb => "do_not_disturb",
            RejectReason::BelowMinPriority => "below_min_priority",
        }
    }
}

/// Outcome of [`NotificationStore::add_notification`]. Rejection is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted(Uuid),
    Rejected(RejectReason),
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted(_))
    }

    pub fn id(&self) -> Option<Uuid> {
        match self {
            Admission::Admitted(id) => Some(*id),
            Admission::Rejected(_) => None,
        }
    }
}

/// Change events published to subscribers
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreEvent {
    NotificationAdded { notification: Notification },
    NotificationRead { id: Uuid },
    AllRead,
    NotificationRemoved { id: Uuid },
    Cleared,
    PreferencesUpdated { preferences: NotificationPreferences },
}

impl StoreEvent {
    /// Event name used on the wire
    pub fn name(&self) -> &'static str {
        match self {
            StoreEvent::NotificationAdded { .. } => "notification_added",
            StoreEvent::NotificationRead { .. } => "notification_read",
            StoreEvent::AllRead => "all_read",
            StoreEvent::NotificationRemoved { .. } => "notification_removed",
            StoreEvent::Cleared => "cleared",
            StoreEvent::PreferencesUpdated { .. } => "preferences_updated",
        }
    }
}

/// Consistent view of the whole store
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    pub notifications: Vec<Notification>,
    pub unread_count: usize,
    pub groups: Vec<NotificationGroup>,
    pub preferences: NotificationPreferences,
}

/// State copied under the lock, written once the lock is released
struct PendingWrite {
    revision: u64,
    state: PersistedState,
}

pub struct NotificationStore {
    state: Mutex<PersistedState>,
    /// Bumped under `state` on every mutation
    revision: AtomicU64,
    /// Highest revision on disk; serializes writers
    written: Mutex<u64>,
    storage: Arc<dyn StateStorage>,
    effects: Effects,
    config: StoreConfig,
    actions: ActionRegistry,
    events: broadcast::Sender<StoreEvent>,
}

impl NotificationStore {
    /// Build a store from whatever the storage backend holds.
    ///
    /// A missing document starts empty with default preferences. An
    /// unreadable one is logged and also starts from defaults; it is left
    /// in place until the next mutation overwrites it.
    pub fn hydrate(storage: Arc<dyn StateStorage>, effects: Effects, config: StoreConfig) -> Self {
        let state = match storage.load() {
            Ok(Some(state)) => {
                tracing::info!(
                    backend = storage.backend_name(),
                    notifications = state.notifications.len(),
                    "Hydrated notification store"
                );
                PersistedState {
                    preferences: state.preferences.normalize(),
                    ..state
                }
            }
            Ok(None) => {
                tracing::info!(
                    backend = storage.backend_name(),
                    "No saved notification state, starting empty"
                );
                PersistedState::default()
            }
            Err(e) => {
                tracing::error!(
                    backend = storage.backend_name(),
                    error = %e,
                    "Failed to load notification state, starting empty"
                );
                PersistedState::default()
            }
        };

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let store = Self {
            state: Mutex::new(state),
            revision: AtomicU64::new(0),
            written: Mutex::new(0),
            storage,
            effects,
            config,
            actions: ActionRegistry::with_builtins(),
            events,
        };
        store.update_gauges(&store.lock());
        store
    }

    /// Action handlers available to [`invoke_action`](Self::invoke_action)
    pub fn actions(&self) -> &ActionRegistry {
        &self.actions
    }

    /// Subscribe to change events
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// Run `op` on the blocking thread pool.
    ///
    /// Mutations persist synchronously; this keeps them off async workers.
    pub async fn run_blocking<F, T>(self: &Arc<Self>, op: F) -> Result<T, tokio::task::JoinError>
    where
        F: FnOnce(&NotificationStore) -> T + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(self);
        tokio::task::spawn_blocking(move || op(&store)).await
    }

    /// Admit a notification if preferences allow it.
    ///
    /// Checks run in order: category disabled, then do-not-disturb (urgent
    /// bypasses it), then the category's `minPriority` when
    /// `enforce_min_priority` is set. A rejected notification leaves the
    /// store untouched and triggers no side effects.
    pub fn add_notification(&self, input: NewNotification) -> Admission {
        let (notification, preferences, pending) = {
            let mut state = self.lock();

            if let Some(reason) = self.admission_check(&state.preferences, &input) {
                NOTIFICATIONS_REJECTED_TOTAL
                    .with_label_values(&[reason.as_str()])
                    .inc();
                tracing::debug!(
                    category = %input.category,
                    priority = %input.priority,
                    reason = reason.as_str(),
                    "Notification rejected"
                );
                return Admission::Rejected(reason);
            }

            let notification = Notification::from_new(input);
            state.notifications.insert(0, notification.clone());
            self.update_gauges(&state);

            (notification, state.preferences.clone(), self.stage(&state))
        };
        self.persist(pending);

        NOTIFICATIONS_ADMITTED_TOTAL
            .with_label_values(&[notification.category.as_str()])
            .inc();
        tracing::debug!(
            notification_id = %notification.id,
            category = %notification.category,
            priority = %notification.priority,
            "Notification admitted"
        );

        if preferences.enable_sound {
            if let Some(cue) = &notification.sound {
                self.effects.play_sound(cue);
            }
        }

        if preferences.enable_email && preferences.category(notification.category).email {
            self.effects.email.dispatch(&notification);
        }

        let id = notification.id;
        self.publish(StoreEvent::NotificationAdded { notification });
        Admission::Admitted(id)
    }

    fn admission_check(
        &self,
        preferences: &NotificationPreferences,
        input: &NewNotification,
    ) -> Option<RejectReason> {
        let category = preferences.category(input.category);

        if !category.enabled {
            return Some(RejectReason::CategoryDisabled);
        }

        if preferences.do_not_disturb && input.priority != Priority::Urgent {
            return Some(RejectReason::DoNotDisturb);
        }

        if self.config.enforce_min_priority && input.priority < category.min_priority {
            return Some(RejectReason::BelowMinPriority);
        }

        None
    }

    /// Mark one notification read. Unknown ids and already-read
    /// notifications are ignored. Returns whether anything changed.
    pub fn mark_as_read(&self, id: Uuid) -> bool {
        let pending = {
            let mut state = self.lock();
            let Some(notification) = state
                .notifications
                .iter_mut()
                .find(|n| n.id == id && !n.is_read)
            else {
                return false;
            };

            notification.is_read = true;
            self.update_gauges(&state);
            self.stage(&state)
        };
        self.persist(pending);

        self.publish(StoreEvent::NotificationRead { id });
        true
    }

    /// Mark every notification read. Returns how many changed.
    pub fn mark_all_as_read(&self) -> usize {
        let (changed, pending) = {
            let mut state = self.lock();
            let mut changed = 0;
            for notification in state.notifications.iter_mut().filter(|n| !n.is_read) {
                notification.is_read = true;
                changed += 1;
            }

            if changed == 0 {
                return 0;
            }
            self.update_gauges(&state);
            (changed, self.stage(&state))
        };
        self.persist(pending);

        self.publish(StoreEvent::AllRead);
        changed
    }

    /// Remove a notification, returning it if it existed
    pub fn remove_notification(&self, id: Uuid) -> Option<Notification> {
        let (removed, pending) = {
            let mut state = self.lock();
            let index = state.notifications.iter().position(|n| n.id == id)?;
            let removed = state.notifications.remove(index);
            self.update_gauges(&state);
            (removed, self.stage(&state))
        };
        self.persist(pending);

        self.publish(StoreEvent::NotificationRemoved { id });
        Some(removed)
    }

    /// Drop every notification; preferences are kept
    pub fn clear_all(&self) {
        let pending = {
            let mut state = self.lock();
            state.notifications.clear();
            self.update_gauges(&state);
            self.stage(&state)
        };
        self.persist(pending);

        self.publish(StoreEvent::Cleared);
    }

    /// Shallow-merge a preferences patch and return the result
    pub fn update_preferences(&self, patch: PreferencesPatch) -> NotificationPreferences {
        let (preferences, pending) = {
            let mut state = self.lock();
            state.preferences.merge(patch);
            (state.preferences.clone(), self.stage(&state))
        };
        self.persist(pending);

        tracing::info!(
            do_not_disturb = preferences.do_not_disturb,
            enable_sound = preferences.enable_sound,
            enable_email = preferences.enable_email,
            "Notification preferences updated"
        );

        self.publish(StoreEvent::PreferencesUpdated {
            preferences: preferences.clone(),
        });
        preferences
    }

    /// Run the action at `index` on notification `id`
    pub fn invoke_action(&self, id: Uuid, index: usize) -> Result<(), ActionError> {
        let notification = self
            .get(id)
            .ok_or(ActionError::NotificationNotFound(id))?;
        let descriptor = notification
            .actions
            .get(index)
            .cloned()
            .ok_or(ActionError::IndexOutOfRange { id, index })?;
        let handler = self.actions.resolve(&descriptor.action)?;

        tracing::debug!(
            notification_id = %id,
            action = %descriptor.action,
            "Invoking notification action"
        );

        handler(&ActionContext {
            store: self,
            notification,
            descriptor,
        })
    }

    /// All notifications, newest first
    pub fn notifications(&self) -> Vec<Notification> {
        self.lock().notifications.clone()
    }

    pub fn get(&self, id: Uuid) -> Option<Notification> {
        self.lock().notifications.iter().find(|n| n.id == id).cloned()
    }

    /// Number of notifications not yet read
    pub fn unread_count(&self) -> usize {
        unread_count(&self.lock().notifications)
    }

    /// Groups derived from the current list
    pub fn grouped_notifications(&self) -> Vec<NotificationGroup> {
        group_notifications(&self.lock().notifications)
    }

    pub fn preferences(&self) -> NotificationPreferences {
        self.lock().preferences.clone()
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        let state = self.lock();
        StoreSnapshot {
            notifications: state.notifications.clone(),
            unread_count: unread_count(&state.notifications),
            groups: group_notifications(&state.notifications),
            preferences: state.preferences.clone(),
        }
    }

    /// Storage backend name
    pub fn storage_backend(&self) -> &'static str {
        self.storage.backend_name()
    }

    fn lock(&self) -> MutexGuard<'_, PersistedState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Copy the state for writing; call with the state lock held
    fn stage(&self, state: &PersistedState) -> PendingWrite {
        PendingWrite {
            revision: self.revision.fetch_add(1, Ordering::SeqCst) + 1,
            state: state.clone(),
        }
    }

    /// Write a staged state unless a newer revision already reached storage
    fn persist(&self, pending: PendingWrite) {
        let mut written = self.written.lock().unwrap_or_else(|e| e.into_inner());
        if *written >= pending.revision {
            tracing::trace!(revision = pending.revision, "Skipping superseded state write");
            return;
        }

        match self.storage.save(&pending.state) {
            Ok(()) => *written = pending.revision,
            Err(e) => {
                PERSIST_FAILURES_TOTAL.inc();
                tracing::error!(
                    backend = self.storage.backend_name(),
                    revision = pending.revision,
                    error = %e,
                    "Failed to persist notification state"
                );
            }
        }
    }

    fn update_gauges(&self, state: &PersistedState) {
        NOTIFICATIONS_STORED.set(state.notifications.len() as i64);
        NOTIFICATIONS_UNREAD.set(unread_count(&state.notifications) as i64);
    }

    fn publish(&self, event: StoreEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

/// Count of notifications with `is_read == false`
pub fn unread_count(notifications: &[Notification]) -> usize {
    notifications.iter().filter(|n| !n.is_read).count()
}

/// Bucket notifications by `group_id`, newest group first.
///
/// A group takes its category and timestamp from the first member seen in
/// `notifications`. Ungrouped notifications are left out.
pub fn group_notifications(notifications: &[Notification]) -> Vec<NotificationGroup> {
    let mut groups: Vec<NotificationGroup> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for notification in notifications {
        let Some(key) = notification.group_key() else {
            continue;
        };

        match index.get(key) {
            Some(&i) => groups[i].notifications.push(notification.clone()),
            None => {
                index.insert(key, groups.len());
                groups.push(NotificationGroup {
                    id: key.to_string(),
                    category: notification.category,
                    timestamp: notification.timestamp,
                    notifications: vec![notification.clone()],
                });
            }
        }
    }

    groups.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    groups
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration as StdDuration;

    use chrono::{Duration, Utc};

    use super::*;
    use crate::notification::effects::{EmailHook, SoundError, SoundPlayer};
    use crate::notification::preferences::CategoryPreference;
    use crate::notification::storage::{MemoryStorage, StorageError};
    use crate::notification::types::{ActionDescriptor, Category, SoundCue};

    #[derive(Default)]
    struct CountingSound {
        played: AtomicUsize,
        fail: bool,
    }

    impl SoundPlayer for CountingSound {
        fn play(&self, cue: &SoundCue) -> Result<(), SoundError> {
            self.played.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(SoundError::AssetNotFound(cue.asset_path().into()));
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingEmail {
        sent: AtomicUsize,
    }

    impl EmailHook for CountingEmail {
        fn dispatch(&self, _notification: &Notification) {
            self.sent.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn create_store() -> NotificationStore {
        NotificationStore::hydrate(
            Arc::new(MemoryStorage::new()),
            Effects::silent(),
            StoreConfig::default(),
        )
    }

    fn alert(category: Category, priority: Priority) -> NewNotification {
        NewNotification::builder(category, "Alert")
            .message("Something happened on the farm")
            .priority(priority)
            .build()
    }

    #[test]
    fn test_newest_first_ordering() {
        let store = create_store();

        let ids: Vec<Uuid> = (0..5)
            .map(|i| {
                store
                    .add_notification(
                        NewNotification::builder(Category::Task, format!("Task {}", i)).build(),
                    )
                    .id()
                    .unwrap()
            })
            .collect();

        let listed: Vec<Uuid> = store.notifications().iter().map(|n| n.id).collect();
        let expected: Vec<Uuid> = ids.into_iter().rev().collect();
        assert_eq!(listed, expected);
    }

    #[test]
    fn test_disabled_category_rejected() {
        let store = create_store();
        let mut categories = store.preferences().categories;
        categories.insert(
            Category::Inventory,
            CategoryPreference {
                enabled: false,
                email: false,
                min_priority: Priority::High,
            },
        );
        store.update_preferences(PreferencesPatch {
            categories: Some(categories),
            ..Default::default()
        });

        let result = store.add_notification(alert(Category::Inventory, Priority::Urgent));

        assert_eq!(result, Admission::Rejected(RejectReason::CategoryDisabled));
        assert!(store.notifications().is_empty());
        assert_eq!(store.unread_count(), 0);
    }

    #[test]
    fn test_do_not_disturb_bypassed_by_urgent() {
        let store = create_store();
        store.update_preferences(PreferencesPatch::do_not_disturb(true));

        let urgent = store.add_notification(alert(Category::Livestock, Priority::Urgent));
        let high = store.add_notification(alert(Category::Livestock, Priority::High));

        assert!(urgent.is_admitted());
        assert_eq!(high, Admission::Rejected(RejectReason::DoNotDisturb));
        assert_eq!(store.notifications().len(), 1);
        assert_eq!(store.notifications()[0].priority, Priority::Urgent);
    }

    #[test]
    fn test_min_priority_not_enforced_by_default() {
        let store = create_store();

        // Finance defaults to minPriority = high
        let result = store.add_notification(alert(Category::Finance, Priority::Low));
        assert!(result.is_admitted());
    }

    #[test]
    fn test_min_priority_enforced_when_configured() {
        let store = NotificationStore::hydrate(
            Arc::new(MemoryStorage::new()),
            Effects::silent(),
            StoreConfig {
                enforce_min_priority: true,
            },
        );

        let low = store.add_notification(alert(Category::Finance, Priority::Low));
        let high = store.add_notification(alert(Category::Finance, Priority::High));

        assert_eq!(low, Admission::Rejected(RejectReason::BelowMinPriority));
        assert!(high.is_admitted());
    }

    #[test]
    fn test_unread_accounting() {
        let store = create_store();
        for _ in 0..3 {
            store.add_notification(alert(Category::Order, Priority::Medium));
        }
        assert_eq!(store.unread_count(), 3);

        assert_eq!(store.mark_all_as_read(), 3);
        assert_eq!(store.unread_count(), 0);
        assert!(store.notifications().iter().all(|n| n.is_read));
    }

    #[test]
    fn test_grouping() {
        let store = create_store();
        store.add_notification(
            NewNotification::builder(Category::Livestock, "Vaccination due")
                .group("g1")
                .build(),
        );
        store.add_notification(
            NewNotification::builder(Category::Livestock, "Vaccination overdue")
                .group("g1")
                .build(),
        );
        let standalone = store
            .add_notification(NewNotification::builder(Category::System, "Backup done").build())
            .id()
            .unwrap();

        let groups = store.grouped_notifications();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].id, "g1");
        assert_eq!(groups[0].notifications.len(), 2);
        assert!(groups
            .iter()
            .flat_map(|g| &g.notifications)
            .all(|n| n.id != standalone));
        assert_eq!(store.notifications().len(), 3);
    }

    #[test]
    fn test_groups_sorted_newest_first() {
        let now = Utc::now();
        let make = |group: &str, category: Category, age_minutes: i64| {
            let mut n = Notification::from_new(
                NewNotification::builder(category, "n").group(group).build(),
            );
            n.timestamp = now - Duration::minutes(age_minutes);
            n
        };

        // Newest-first list, as the store keeps it
        let list = vec![
            make("orders", Category::Order, 1),
            make("herd", Category::Livestock, 5),
            make("orders", Category::Order, 10),
            make("payroll", Category::Finance, 20),
        ];

        let groups = group_notifications(&list);
        let ids: Vec<&str> = groups.iter().map(|g| g.id.as_str()).collect();
        assert_eq!(ids, vec!["orders", "herd", "payroll"]);
        assert_eq!(groups[0].timestamp, list[0].timestamp);
        assert_eq!(groups[0].category, Category::Order);
    }

    #[test]
    fn test_groups_follow_removal_and_clear() {
        let store = create_store();
        let id = store
            .add_notification(NewNotification::builder(Category::Task, "Milking").group("g").build())
            .id()
            .unwrap();
        assert_eq!(store.grouped_notifications().len(), 1);

        store.remove_notification(id);
        assert!(store.grouped_notifications().is_empty());

        store.add_notification(NewNotification::builder(Category::Task, "Milking").group("g").build());
        store.clear_all();
        assert!(store.grouped_notifications().is_empty());
        assert_eq!(store.unread_count(), 0);
    }

    #[test]
    fn test_removal_accounting() {
        let store = create_store();
        let id = store
            .add_notification(alert(Category::System, Priority::Low))
            .id()
            .unwrap();
        assert_eq!(store.unread_count(), 1);

        assert!(store.remove_notification(id).is_some());
        assert_eq!(store.unread_count(), 0);
        assert!(store.notifications().is_empty());

        // Stale id
        assert!(store.remove_notification(id).is_none());
        assert_eq!(store.unread_count(), 0);
    }

    #[test]
    fn test_removing_read_notification_keeps_count() {
        let store = create_store();
        let read = store.add_notification(alert(Category::Task, Priority::Low)).id().unwrap();
        store.add_notification(alert(Category::Task, Priority::Low));
        store.mark_as_read(read);
        assert_eq!(store.unread_count(), 1);

        store.remove_notification(read);
        assert_eq!(store.unread_count(), 1);
    }

    #[test]
    fn test_mark_as_read_twice_does_not_double_decrement() {
        let store = create_store();
        let first = store.add_notification(alert(Category::Task, Priority::Low)).id().unwrap();
        store.add_notification(alert(Category::Task, Priority::Low));

        assert!(store.mark_as_read(first));
        assert!(!store.mark_as_read(first));
        assert_eq!(store.unread_count(), 1);

        // Unknown id is ignored
        assert!(!store.mark_as_read(Uuid::new_v4()));
        assert_eq!(store.unread_count(), 1);
    }

    #[test]
    fn test_persistence_round_trip() {
        let storage = Arc::new(MemoryStorage::new());
        let store = NotificationStore::hydrate(storage.clone(), Effects::silent(), StoreConfig::default());

        let id = store
            .add_notification(
                NewNotification::builder(Category::Livestock, "Calving")
                    .priority(Priority::Urgent)
                    .group("calving")
                    .action(ActionDescriptor::new("Acknowledge", "mark_read"))
                    .build(),
            )
            .id()
            .unwrap();
        store.add_notification(alert(Category::Order, Priority::Medium));
        store.mark_as_read(id);
        store.update_preferences(PreferencesPatch {
            enable_sound: Some(false),
            ..Default::default()
        });

        let before = store.snapshot();
        drop(store);

        let rehydrated = NotificationStore::hydrate(storage, Effects::silent(), StoreConfig::default());
        let after = rehydrated.snapshot();

        assert_eq!(after.notifications, before.notifications);
        assert_eq!(after.preferences, before.preferences);
        assert_eq!(after.unread_count, 1);
    }

    #[test]
    fn test_corrupt_storage_starts_empty() {
        let storage = Arc::new(MemoryStorage::with_document("not json"));
        let store = NotificationStore::hydrate(storage, Effects::silent(), StoreConfig::default());

        assert!(store.notifications().is_empty());
        assert_eq!(store.preferences(), NotificationPreferences::default());
    }

    /// Storage whose first save parks until the test releases it
    struct GatedStorage {
        inner: MemoryStorage,
        entered: Mutex<Option<mpsc::Sender<()>>>,
        release: Mutex<Option<mpsc::Receiver<()>>>,
    }

    impl StateStorage for GatedStorage {
        fn load(&self) -> Result<Option<PersistedState>, StorageError> {
            self.inner.load()
        }

        fn save(&self, state: &PersistedState) -> Result<(), StorageError> {
            if let Some(entered) = self.entered.lock().unwrap().take() {
                entered.send(()).unwrap();
                if let Some(release) = self.release.lock().unwrap().take() {
                    release.recv().unwrap();
                }
            }
            self.inner.save(state)
        }

        fn backend_name(&self) -> &'static str {
            "gated"
        }
    }

    #[test]
    fn test_readers_not_blocked_by_slow_save() {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let storage = Arc::new(GatedStorage {
            inner: MemoryStorage::new(),
            entered: Mutex::new(Some(entered_tx)),
            release: Mutex::new(Some(release_rx)),
        });
        let store = Arc::new(NotificationStore::hydrate(
            storage.clone(),
            Effects::silent(),
            StoreConfig::default(),
        ));

        let writer = {
            let store = store.clone();
            thread::spawn(move || store.add_notification(alert(Category::Task, Priority::High)))
        };
        entered_rx
            .recv_timeout(StdDuration::from_secs(5))
            .expect("save never started");

        // The save is parked; reads must still go through
        let (read_tx, read_rx) = mpsc::channel();
        {
            let store = store.clone();
            thread::spawn(move || {
                let _ = read_tx.send((store.unread_count(), store.snapshot().notifications.len()));
            });
        }
        let (unread, stored) = read_rx
            .recv_timeout(StdDuration::from_secs(2))
            .expect("reader blocked behind save");
        assert_eq!((unread, stored), (1, 1));

        release_tx.send(()).unwrap();
        assert!(writer.join().unwrap().is_admitted());
        assert!(storage.inner.document().unwrap().contains("Alert"));
    }

    #[test]
    fn test_superseded_write_is_skipped() {
        let storage = Arc::new(MemoryStorage::new());
        let store = NotificationStore::hydrate(storage.clone(), Effects::silent(), StoreConfig::default());

        let stale = store.stage(&store.lock());
        store.add_notification(alert(Category::Order, Priority::Medium));
        store.persist(stale);

        let saved: PersistedState = serde_json::from_str(&storage.document().unwrap()).unwrap();
        assert_eq!(saved.notifications.len(), 1);
    }

    #[tokio::test]
    async fn test_run_blocking() {
        let store = Arc::new(create_store());

        let admission = store
            .run_blocking(|store| store.add_notification(alert(Category::System, Priority::Low)))
            .await
            .unwrap();

        assert!(admission.is_admitted());
        assert_eq!(store.unread_count(), 1);
    }

    #[test]
    fn test_rejection_is_not_persisted() {
        let storage = Arc::new(MemoryStorage::new());
        let store = NotificationStore::hydrate(storage.clone(), Effects::silent(), StoreConfig::default());
        store.update_preferences(PreferencesPatch::do_not_disturb(true));
        let saved = storage.document();

        store.add_notification(alert(Category::Task, Priority::High));
        assert_eq!(storage.document(), saved);
    }

    #[test]
    fn test_sound_and_email_side_effects() {
        let sound = Arc::new(CountingSound::default());
        let email = Arc::new(CountingEmail::default());
        let store = NotificationStore::hydrate(
            Arc::new(MemoryStorage::new()),
            Effects::new(sound.clone(), email.clone()),
            StoreConfig::default(),
        );

        // Inventory has email off by default
        store.add_notification(
            NewNotification::builder(Category::Inventory, "Feed low").sound("chime").build(),
        );
        // No sound cue
        store.add_notification(alert(Category::Finance, Priority::High));

        assert_eq!(sound.played.load(Ordering::SeqCst), 1);
        assert_eq!(email.sent.load(Ordering::SeqCst), 1);

        store.update_preferences(PreferencesPatch {
            enable_sound: Some(false),
            enable_email: Some(false),
            ..Default::default()
        });
        store.add_notification(
            NewNotification::builder(Category::System, "Update").sound("chime").build(),
        );
        assert_eq!(sound.played.load(Ordering::SeqCst), 1);
        assert_eq!(email.sent.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_sound_failure_does_not_block_admission() {
        let sound = Arc::new(CountingSound {
            fail: true,
            ..Default::default()
        });
        let store = NotificationStore::hydrate(
            Arc::new(MemoryStorage::new()),
            Effects::new(sound.clone(), Arc::new(CountingEmail::default())),
            StoreConfig::default(),
        );

        let result = store.add_notification(
            NewNotification::builder(Category::Livestock, "Gate open").sound("alarm").build(),
        );

        assert!(result.is_admitted());
        assert_eq!(sound.played.load(Ordering::SeqCst), 1);
        assert_eq!(store.unread_count(), 1);
    }

    #[test]
    fn test_rejected_notification_has_no_side_effects() {
        let sound = Arc::new(CountingSound::default());
        let email = Arc::new(CountingEmail::default());
        let store = NotificationStore::hydrate(
            Arc::new(MemoryStorage::new()),
            Effects::new(sound.clone(), email.clone()),
            StoreConfig::default(),
        );
        store.update_preferences(PreferencesPatch::do_not_disturb(true));

        store.add_notification(
            NewNotification::builder(Category::Task, "Shift swap")
                .priority(Priority::High)
                .sound("chime")
                .build(),
        );

        assert_eq!(sound.played.load(Ordering::SeqCst), 0);
        assert_eq!(email.sent.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_change_events() {
        let store = create_store();
        let mut rx = store.subscribe();

        let id = store.add_notification(alert(Category::Order, Priority::Low)).id().unwrap();
        store.mark_as_read(id);
        store.remove_notification(id);
        store.clear_all();

        let names: Vec<&str> = (0..4).map(|_| rx.try_recv().unwrap().name()).collect();
        assert_eq!(
            names,
            vec!["notification_added", "notification_read", "notification_removed", "cleared"]
        );
    }

    #[test]
    fn test_invoke_builtin_actions() {
        let store = create_store();
        let id = store
            .add_notification(
                NewNotification::builder(Category::Order, "Order #41 shipped")
                    .action(ActionDescriptor::new("Mark read", "mark_read"))
                    .action(ActionDescriptor::new("Dismiss", "dismiss"))
                    .build(),
            )
            .id()
            .unwrap();

        store.invoke_action(id, 0).unwrap();
        assert_eq!(store.unread_count(), 0);

        store.invoke_action(id, 1).unwrap();
        assert!(store.get(id).is_none());

        assert!(matches!(
            store.invoke_action(id, 0),
            Err(ActionError::NotificationNotFound(_))
        ));
    }

    #[test]
    fn test_invoke_action_errors() {
        let store = create_store();
        let id = store
            .add_notification(
                NewNotification::builder(Category::Task, "Fence check")
                    .action(ActionDescriptor::new("Repair", "schedule_repair"))
                    .build(),
            )
            .id()
            .unwrap();

        assert!(matches!(
            store.invoke_action(id, 0),
            Err(ActionError::UnknownAction(_))
        ));
        assert!(matches!(
            store.invoke_action(id, 3),
            Err(ActionError::IndexOutOfRange { index: 3, .. })
        ));

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        store.actions().register("schedule_repair", move |ctx| {
            assert_eq!(ctx.descriptor.label, "Repair");
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        store.invoke_action(id, 0).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
