// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, patch},
    middleware,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::AppointmentContext;

pub fn appointment_routes(state: Arc<AppointmentContext>) -> Router {
    let protected_routes = Router::new()
        .route("/", post(handlers::book_appointment))
        .route("/mine", get(handlers::list_my_appointments))
        .route("/doctors/{doctor_id}", get(handlers::list_doctor_appointments))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .route("/{appointment_id}/reschedule", patch(handlers::reschedule_appointment))
        .route("/{appointment_id}/confirm", post(handlers::confirm_appointment))
        .route("/{appointment_id}/complete", post(handlers::complete_appointment))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}

/// Public availability lookups, mounted under `/doctors`.
pub fn availability_routes(state: Arc<AppointmentContext>) -> Router {
    Router::new()
        .route("/{doctor_id}/availability", get(handlers::get_doctor_availability))
        .with_state(state)
}
