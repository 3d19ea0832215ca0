pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

use std::sync::Arc;

use shared_config::AppConfig;

pub use models::*;
pub use services::*;

/// Shared state for the schedule routes.
#[derive(Clone)]
pub struct ScheduleContext {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn ScheduleStore>,
}

impl ScheduleContext {
    pub fn new(config: Arc<AppConfig>, store: Arc<dyn ScheduleStore>) -> Self {
        Self { config, store }
    }

    pub fn service(&self) -> ScheduleService {
        ScheduleService::new(Arc::clone(&self.store))
    }
}
