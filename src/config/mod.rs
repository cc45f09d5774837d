mod settings;

pub use settings::{
    ListenerConfig, LoggingConfig, ServerConfig, Settings, SoundConfig, StorageConfig, StoreConfig,
};
