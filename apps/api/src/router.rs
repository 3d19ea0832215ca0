use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use appointment_cell::router::{appointment_routes, availability_routes};
use appointment_cell::AppointmentContext;
use schedule_cell::router::schedule_routes;
use schedule_cell::ScheduleContext;

pub fn create_router(
    schedules: Arc<ScheduleContext>,
    appointments: Arc<AppointmentContext>,
) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic scheduling API is running!" }))
        .nest("/schedules", schedule_routes(schedules))
        .nest("/appointments", appointment_routes(appointments.clone()))
        .nest("/doctors", availability_routes(appointments))
}
