use std::sync::Arc;

use crate::config::Settings;
use crate::notification::{create_storage, Effects, NotificationStore};

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub store: Arc<NotificationStore>,
    pub started_at: std::time::Instant,
}

impl AppState {
    /// Hydrate the store from configured storage and wire up effects
    pub fn new(settings: Settings) -> Self {
        let storage = create_storage(&settings.storage);
        let effects = Effects::from_config(&settings.sound);
        let store = Arc::new(NotificationStore::hydrate(
            storage,
            effects,
            settings.store.clone(),
        ));

        Self::with_store(settings, store)
    }

    /// Use an already-built store
    pub fn with_store(settings: Settings, store: Arc<NotificationStore>) -> Self {
        Self {
            settings: Arc::new(settings),
            store,
            started_at: std::time::Instant::now(),
        }
    }
}
