use std::sync::Arc;

use common::config::Settings;
use common::publisher::Publisher;
use common::store::ArticleStore;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ArticleStore>,
    pub publisher: Arc<Publisher>,
    pub config: Arc<Settings>,
}

impl AppState {
    /// Create a new AppState instance
    pub fn new(store: Arc<dyn ArticleStore>, publisher: Arc<Publisher>, config: Settings) -> Self {
        Self {
            store,
            publisher,
            config: Arc::new(config),
        }
    }
}
