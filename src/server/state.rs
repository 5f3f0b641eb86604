use std::sync::Arc;
use std::time::Instant;

use crate::config::Settings;
use crate::connection_manager::ConnectionManager;
use crate::notification::ChangeNotifier;
use crate::users::{create_user_store, UserStore};

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub store: Arc<dyn UserStore>,
    pub connection_manager: Arc<ConnectionManager>,
    pub notifier: Arc<ChangeNotifier>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        Self::with_store(settings, create_user_store())
    }

    /// Build state around an existing user store
    pub fn with_store(settings: Settings, store: Arc<dyn UserStore>) -> Self {
        let connection_manager = Arc::new(ConnectionManager::new());
        let notifier = Arc::new(ChangeNotifier::from_config(&settings.websocket));

        Self {
            settings: Arc::new(settings),
            store,
            connection_manager,
            notifier,
            start_time: Instant::now(),
        }
    }
}
