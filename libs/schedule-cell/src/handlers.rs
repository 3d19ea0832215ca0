use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    CreateScheduleRequest, ScheduleError, UpdateDaySlotsRequest, UpdateScheduleStatusRequest, Weekday,
};
use crate::ScheduleContext;

fn map_schedule_error(e: ScheduleError) -> AppError {
    match e {
        ScheduleError::NotFound => AppError::NotFound("Schedule not found".to_string()),
        ScheduleError::Forbidden => AppError::Forbidden(e.to_string()),
        ScheduleError::Validation(msg) => AppError::ValidationError(msg),
        ScheduleError::Store(msg) => AppError::Database(msg),
    }
}

#[axum::debug_handler]
pub async fn create_schedule(
    State(ctx): State<Arc<ScheduleContext>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateScheduleRequest>,
) -> Result<Json<Value>, AppError> {
    let schedule = ctx.service().create_week(&user, request).await
        .map_err(map_schedule_error)?;

    Ok(Json(json!({
        "success": true,
        "schedule": schedule,
        "message": "Weekly schedule created"
    })))
}

#[axum::debug_handler]
pub async fn get_schedule(
    State(ctx): State<Arc<ScheduleContext>>,
    Path(schedule_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let schedule = ctx.service().get_schedule(schedule_id).await
        .map_err(map_schedule_error)?;

    Ok(Json(json!(schedule)))
}

#[axum::debug_handler]
pub async fn list_doctor_schedules(
    State(ctx): State<Arc<ScheduleContext>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let schedules = ctx.service().list_for_doctor(doctor_id).await
        .map_err(map_schedule_error)?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "schedules": schedules,
        "total": schedules.len()
    })))
}

#[axum::debug_handler]
pub async fn update_day_slots(
    State(ctx): State<Arc<ScheduleContext>>,
    Path((schedule_id, weekday)): Path<(Uuid, String)>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateDaySlotsRequest>,
) -> Result<Json<Value>, AppError> {
    let weekday: Weekday = weekday.parse().map_err(map_schedule_error)?;

    let schedule = ctx.service().set_day_slots(&user, schedule_id, weekday, request.slots).await
        .map_err(map_schedule_error)?;

    Ok(Json(json!({
        "success": true,
        "schedule": schedule,
        "message": format!("{} updated", weekday)
    })))
}

#[axum::debug_handler]
pub async fn update_schedule_status(
    State(ctx): State<Arc<ScheduleContext>>,
    Path(schedule_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateScheduleStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let schedule = ctx.service().set_status(&user, schedule_id, request.status).await
        .map_err(map_schedule_error)?;

    Ok(Json(json!({
        "success": true,
        "schedule": schedule
    })))
}

#[axum::debug_handler]
pub async fn archive_schedule(
    State(ctx): State<Arc<ScheduleContext>>,
    Path(schedule_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let schedule = ctx.service().archive(&user, schedule_id).await
        .map_err(map_schedule_error)?;

    Ok(Json(json!({
        "success": true,
        "schedule": schedule,
        "message": "Schedule archived"
    })))
}
