pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

use std::sync::Arc;

use schedule_cell::services::store::ScheduleStore;
use shared_config::AppConfig;
use shared_utils::clock::Clock;

pub use models::*;
pub use services::*;

/// Shared state for the availability and appointment routes.
#[derive(Clone)]
pub struct AppointmentContext {
    pub config: Arc<AppConfig>,
    pub appointments: Arc<dyn AppointmentStore>,
    pub schedules: Arc<dyn ScheduleStore>,
    pub notifier: NotificationDispatcher,
    pub clock: Arc<dyn Clock>,
    pub rules: AppointmentValidationRules,
}

impl AppointmentContext {
    pub fn new(
        config: Arc<AppConfig>,
        appointments: Arc<dyn AppointmentStore>,
        schedules: Arc<dyn ScheduleStore>,
        notifier: NotificationDispatcher,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            appointments,
            schedules,
            notifier,
            clock,
            rules: AppointmentValidationRules::default(),
        }
    }

    pub fn with_rules(mut self, rules: AppointmentValidationRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn resolver(&self) -> AvailabilityResolver {
        AvailabilityResolver::new(
            Arc::clone(&self.schedules),
            Arc::clone(&self.appointments),
            Arc::clone(&self.clock),
        )
    }

    pub fn booking(&self) -> AppointmentBookingService {
        AppointmentBookingService::new(
            Arc::clone(&self.appointments),
            AppointmentLifecycleService::new(self.rules.clone()),
            self.notifier.clone(),
            Arc::clone(&self.clock),
        )
    }

    pub fn changes(&self) -> RescheduleService {
        RescheduleService::new(
            Arc::clone(&self.appointments),
            AppointmentLifecycleService::new(self.rules.clone()),
            self.notifier.clone(),
            Arc::clone(&self.clock),
        )
    }
}
