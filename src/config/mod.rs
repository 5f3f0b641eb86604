mod settings;

pub use settings::{
    LoggingConfig, OtelConfig, ServerConfig, Settings, StoreConfig, WebSocketConfig,
};
