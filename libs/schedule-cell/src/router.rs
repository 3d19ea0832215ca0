use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put, patch},
    middleware,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::ScheduleContext;

pub fn schedule_routes(state: Arc<ScheduleContext>) -> Router {
    let protected_routes = Router::new()
        .route("/", post(handlers::create_schedule))
        .route("/doctors/{doctor_id}", get(handlers::list_doctor_schedules))
        .route(
            "/{schedule_id}",
            get(handlers::get_schedule).delete(handlers::archive_schedule),
        )
        .route("/{schedule_id}/days/{weekday}", put(handlers::update_day_slots))
        .route("/{schedule_id}/status", patch(handlers::update_schedule_status))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
