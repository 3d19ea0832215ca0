// libs/appointment-cell/src/models.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::fmt;

use schedule_cell::models::{SessionType, Weekday};
use shared_database::StoreError;
use shared_utils::time;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub session_type: SessionType,
    pub status: AppointmentStatus,
    pub symptoms: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub is_emergency: bool,
    pub booking_date: DateTime<Utc>,
    pub reschedule_reason: Option<String>,
    pub rescheduled_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn slot_key(&self) -> SlotKey {
        SlotKey::new(self.doctor_id, self.appointment_date, &self.start_time, &self.end_time)
    }

    /// Date and start time combined in the clinic's local frame.
    pub fn starts_at(&self) -> Result<NaiveDateTime, AppointmentError> {
        let start = time::parse_time(&self.start_time)
            .map_err(|e| AppointmentError::Validation(e.to_string()))?;
        Ok(self.appointment_date.and_time(start))
    }

    /// Whether this row still holds its slot.
    pub fn holds_slot(&self) -> bool {
        self.status != AppointmentStatus::Cancelled
    }
}

/// Identity of a bookable slot. Times are normalised so `9:00 AM` and `09:00` collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SlotKey {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
}

impl SlotKey {
    pub fn new(doctor_id: Uuid, date: NaiveDate, start_time: &str, end_time: &str) -> Self {
        Self {
            doctor_id,
            date,
            start_time: normalize_or_raw(start_time),
            end_time: normalize_or_raw(end_time),
        }
    }
}

pub(crate) fn normalize_or_raw(value: &str) -> String {
    time::to_24_hour(value).unwrap_or_else(|_| value.trim().to_string())
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    /// `completed` and `cancelled` admit no further changes.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Completed | AppointmentStatus::Cancelled)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    /// Required when an admin or doctor books on a patient's behalf.
    pub patient_id: Option<Uuid>,
    pub doctor_id: Uuid,
    pub appointment_date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    #[serde(default = "placeholder_session")]
    pub session_type: SessionType,
    pub symptoms: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub is_emergency: bool,
}

fn placeholder_session() -> SessionType {
    SessionType::Available
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleAppointmentRequest {
    pub new_date: NaiveDate,
    pub new_start_time: String,
    pub new_end_time: String,
    pub reason: Option<String>,
    /// Explicit session type; placeholder or absent means derive from the new start time.
    pub session_type: Option<SessionType>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvailabilityQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DoctorAppointmentsQuery {
    pub date: Option<NaiveDate>,
}

// ==============================================================================
// AVAILABILITY MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SlotAvailability {
    pub start_time: String,
    pub end_time: String,
    pub session_type: SessionType,
    pub description: Option<String>,
    pub is_available: bool,
    /// True when a non-cancelled appointment occupies the slot.
    pub is_booked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DayAvailability {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub weekday: Weekday,
    pub schedule_id: Uuid,
    pub slots: Vec<SlotAvailability>,
    pub available_count: usize,
    pub total_count: usize,
}

impl DayAvailability {
    pub fn is_fully_booked(&self) -> bool {
        self.available_count == 0
    }

    pub fn find_slot(&self, start_time: &str, end_time: &str) -> Option<&SlotAvailability> {
        self.slots
            .iter()
            .find(|slot| slot.start_time == start_time && slot.end_time == end_time)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AvailabilityResult {
    /// No active schedule covers the date, or that weekday has no slots.
    NotScheduled {
        doctor_id: Uuid,
        date: NaiveDate,
        weekday: Weekday,
    },
    Scheduled(DayAvailability),
}

impl AvailabilityResult {
    pub fn day(&self) -> Option<&DayAvailability> {
        match self {
            AvailabilityResult::Scheduled(day) => Some(day),
            AvailabilityResult::NotScheduled { .. } => None,
        }
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AppointmentError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Appointment slot is already taken")]
    Conflict,

    #[error("{0}")]
    TooLate(String),

    #[error("Appointment not found")]
    NotFound,

    #[error("Appointment cannot move from {from} to {to}")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Store error: {0}")]
    Store(String),
}

impl From<StoreError> for AppointmentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(_) => AppointmentError::Conflict,
            StoreError::NotFound(_) => AppointmentError::NotFound,
            StoreError::Backend(msg) => AppointmentError::Store(msg),
        }
    }
}

// ==============================================================================
// VALIDATION RULES
// ==============================================================================

#[derive(Debug, Clone)]
pub struct AppointmentValidationRules {
    /// Minimum notice for patient cancellation and rescheduling.
    pub min_change_notice_minutes: i64,
    /// Local hour after which doctors can no longer edit the same day's appointments.
    pub doctor_same_day_cutoff_hour: u32,
}

impl Default for AppointmentValidationRules {
    fn default() -> Self {
        Self {
            min_change_notice_minutes: 120,
            doctor_same_day_cutoff_hour: 17,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(AppointmentStatus::Completed.is_terminal());
        assert!(AppointmentStatus::Cancelled.is_terminal());
        assert!(!AppointmentStatus::Scheduled.is_terminal());
        assert!(!AppointmentStatus::Confirmed.is_terminal());
    }

    #[test]
    fn slot_keys_ignore_time_format() {
        let doctor = Uuid::new_v4();
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        assert_eq!(
            SlotKey::new(doctor, date, "9:00 AM", "12:00 PM"),
            SlotKey::new(doctor, date, "09:00", "12:00")
        );
    }

    #[test]
    fn duplicate_rows_become_conflicts() {
        assert_eq!(
            AppointmentError::from(StoreError::Duplicate("idx".into())),
            AppointmentError::Conflict
        );
    }

    #[test]
    fn not_scheduled_serializes_with_status_tag() {
        let result = AvailabilityResult::NotScheduled {
            doctor_id: Uuid::nil(),
            date: NaiveDate::from_ymd_opt(2026, 3, 3).unwrap(),
            weekday: Weekday::Tuesday,
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["status"], "not_scheduled");
        assert_eq!(value["weekday"], "tuesday");
    }
}
