use std::sync::Arc;

use crate::config::AppConfig;
use crate::database::DataAccessor;

/// Shared by every handler and middleware.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DataAccessor>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(db: Arc<dyn DataAccessor>, config: AppConfig) -> Self {
        Self { db, config: Arc::new(config) }
    }
}
