pub mod availability;
pub mod booking;
pub mod lifecycle;
pub mod notification;
pub mod reschedule;
pub mod store;

pub use availability::AvailabilityResolver;
pub use booking::AppointmentBookingService;
pub use lifecycle::AppointmentLifecycleService;
pub use notification::{AppointmentNotifier, LogNotifier, NotificationDispatcher, WebhookNotifier};
pub use reschedule::RescheduleService;
pub use store::{AppointmentStore, InMemoryAppointmentStore, SupabaseAppointmentStore};
