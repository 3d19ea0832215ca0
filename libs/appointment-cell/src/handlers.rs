// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::{Role, User};
use shared_models::error::AppError;

use crate::models::{
    AppointmentError, AvailabilityQuery, BookAppointmentRequest, DoctorAppointmentsQuery,
    RescheduleAppointmentRequest,
};
use crate::AppointmentContext;

fn map_appointment_error(e: AppointmentError) -> AppError {
    match e {
        AppointmentError::Validation(msg) => AppError::ValidationError(msg),
        AppointmentError::Conflict => AppError::Conflict(e.to_string()),
        AppointmentError::TooLate(msg) => AppError::TooLate(msg),
        AppointmentError::NotFound => AppError::NotFound("Appointment not found".to_string()),
        AppointmentError::InvalidStatusTransition { .. } => AppError::BadRequest(e.to_string()),
        AppointmentError::Store(msg) => AppError::Database(msg),
    }
}

fn actor_uuid(user: &User) -> Result<Uuid, AppError> {
    Uuid::parse_str(&user.id).map_err(|_| AppError::Auth("Token subject is not a valid user id".to_string()))
}

// ==============================================================================
// AVAILABILITY
// ==============================================================================

#[axum::debug_handler]
pub async fn get_doctor_availability(
    State(ctx): State<Arc<AppointmentContext>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Value>, AppError> {
    let availability = ctx.resolver().get_available_slots(doctor_id, query.date).await
        .map_err(map_appointment_error)?;

    Ok(Json(json!(availability)))
}

// ==============================================================================
// BOOKING AND LOOKUP
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(ctx): State<Arc<AppointmentContext>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let actor_id = actor_uuid(&user)?;

    let patient_id = match user.role {
        Role::Patient => match request.patient_id {
            Some(id) if id != actor_id => {
                return Err(AppError::Forbidden("Patients can only book for themselves".to_string()));
            }
            _ => actor_id,
        },
        Role::Admin => request.patient_id
            .ok_or_else(|| AppError::BadRequest("patient_id is required".to_string()))?,
        Role::Doctor if request.doctor_id == actor_id => request.patient_id
            .ok_or_else(|| AppError::BadRequest("patient_id is required".to_string()))?,
        _ => return Err(AppError::Forbidden("Not authorized to book this appointment".to_string())),
    };

    let appointment = ctx.booking().book_appointment(patient_id, request).await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment booked successfully"
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(ctx): State<Arc<AppointmentContext>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let appointment = ctx.booking().get_appointment(appointment_id, &user).await
        .map_err(map_appointment_error)?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn list_my_appointments(
    State(ctx): State<Arc<AppointmentContext>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor_id = actor_uuid(&user)?;

    let appointments = ctx.booking().list_for_patient(actor_id).await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn list_doctor_appointments(
    State(ctx): State<Arc<AppointmentContext>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<DoctorAppointmentsQuery>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let is_own = user.role == Role::Doctor && user.id == doctor_id.to_string();
    if !is_own && !user.role.is_admin() {
        return Err(AppError::Forbidden("Not authorized to view this doctor's appointments".to_string()));
    }

    let appointments = ctx.booking().list_for_doctor(doctor_id, query.date).await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "date": query.date,
        "appointments": appointments,
        "total": appointments.len()
    })))
}

// ==============================================================================
// CHANGES
// ==============================================================================

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(ctx): State<Arc<AppointmentContext>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let actor_id = actor_uuid(&user)?;

    let appointment = ctx.changes().cancel_appointment(appointment_id, actor_id).await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment cancelled"
    })))
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(ctx): State<Arc<AppointmentContext>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(request): Json<RescheduleAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = ctx.changes().reschedule_appointment(appointment_id, &user, request).await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment rescheduled"
    })))
}

#[axum::debug_handler]
pub async fn confirm_appointment(
    State(ctx): State<Arc<AppointmentContext>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let appointment = ctx.changes().confirm_appointment(appointment_id, &user).await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(ctx): State<Arc<AppointmentContext>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let appointment = ctx.changes().complete_appointment(appointment_id, &user).await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}
