// libs/appointment-cell/src/services/lifecycle.rs
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use tracing::{debug, warn};

use schedule_cell::models::SessionType;
use shared_utils::time;

use crate::models::{Appointment, AppointmentError, AppointmentStatus, AppointmentValidationRules};

/// Pure appointment rules: status transitions, timing windows and session buckets.
pub struct AppointmentLifecycleService {
    rules: AppointmentValidationRules,
}

impl Default for AppointmentLifecycleService {
    fn default() -> Self {
        Self::new(AppointmentValidationRules::default())
    }
}

impl AppointmentLifecycleService {
    pub fn new(rules: AppointmentValidationRules) -> Self {
        Self { rules }
    }

    /// Validate that a status transition is allowed
    pub fn validate_status_transition(
        &self,
        current: AppointmentStatus,
        next: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        if !self.valid_transitions(current).contains(&next) {
            warn!("Invalid status transition attempted: {} -> {}", current, next);
            return Err(AppointmentError::InvalidStatusTransition { from: current, to: next });
        }

        debug!("Status transition validated: {} -> {}", current, next);
        Ok(())
    }

    pub fn valid_transitions(&self, current: AppointmentStatus) -> Vec<AppointmentStatus> {
        match current {
            AppointmentStatus::Scheduled => vec![
                AppointmentStatus::Confirmed,
                AppointmentStatus::Cancelled,
            ],
            AppointmentStatus::Confirmed => vec![
                AppointmentStatus::Completed,
                AppointmentStatus::Cancelled,
            ],
            AppointmentStatus::Completed | AppointmentStatus::Cancelled => vec![],
        }
    }

    /// Date and time rules shared by booking and rescheduling. Dates are
    /// compared date-only against the clinic's `today`; times must be strict
    /// 24-hour `HH:MM` with start before end.
    pub fn validate_slot_request(
        &self,
        today: NaiveDate,
        date: NaiveDate,
        start_time: &str,
        end_time: &str,
    ) -> Result<(), AppointmentError> {
        if date < today {
            return Err(AppointmentError::Validation(
                "Appointment date cannot be in the past".to_string(),
            ));
        }

        for value in [start_time, end_time] {
            if !time::is_valid_24_hour(value) {
                return Err(AppointmentError::Validation(format!(
                    "Invalid time '{}', expected HH:MM in 24-hour format",
                    value
                )));
            }
        }

        let span = time::span_minutes(start_time, end_time)
            .map_err(|e| AppointmentError::Validation(e.to_string()))?;
        if span <= 0 {
            return Err(AppointmentError::Validation(
                "Start time must be before end time".to_string(),
            ));
        }

        Ok(())
    }

    /// Session type stored on a booking. Placeholders are replaced by the
    /// bucket of the start hour: before 12:00 morning, before 17:00 afternoon,
    /// otherwise evening.
    pub fn booking_session_type(&self, requested: SessionType, start_time: &str) -> SessionType {
        if !requested.is_placeholder() {
            return requested;
        }
        Self::patient_bucket(start_time)
    }

    fn patient_bucket(start_time: &str) -> SessionType {
        match time::parse_time(start_time).map(|t| t.hour()).unwrap_or(0) {
            h if h < 12 => SessionType::MorningConsultations,
            h if h < 17 => SessionType::AfternoonProcedures,
            _ => SessionType::EveningConsultations,
        }
    }

    /// Clinic-hours bucketing used when a doctor moves an appointment.
    pub fn clinic_hours_session_type(&self, start_time: &str) -> SessionType {
        match time::parse_time(start_time).map(|t| t.hour()) {
            Ok(9..=11) => SessionType::MorningConsultations,
            Ok(12..=14) => SessionType::AfternoonProcedures,
            Ok(15..=16) => SessionType::ExtendedAfternoon,
            Ok(17..=19) => SessionType::EveningConsultations,
            _ => SessionType::Emergency,
        }
    }

    /// Session type after a reschedule. An explicit concrete type wins; otherwise
    /// patients get the booking bucket and doctors the clinic-hours bucket.
    pub fn rescheduled_session_type(
        &self,
        explicit: Option<SessionType>,
        start_time: &str,
        by_doctor: bool,
    ) -> SessionType {
        match explicit {
            Some(session) if !session.is_placeholder() => session,
            _ if by_doctor => self.clinic_hours_session_type(start_time),
            _ => Self::patient_bucket(start_time),
        }
    }

    /// Patients need at least the configured notice (2 hours) before the
    /// appointment starts. Exactly on the boundary is still allowed.
    pub fn ensure_change_notice(
        &self,
        appointment: &Appointment,
        now: NaiveDateTime,
        action: &str,
    ) -> Result<(), AppointmentError> {
        let starts_at = appointment.starts_at()?;
        let notice = Duration::minutes(self.rules.min_change_notice_minutes);

        if starts_at - now < notice {
            let hours = self.rules.min_change_notice_minutes as f64 / 60.0;
            return Err(AppointmentError::TooLate(format!(
                "Appointments can only be {} at least {} hours in advance; this one is less than {} hours away",
                action, hours, hours
            )));
        }
        Ok(())
    }

    /// Doctors cannot edit appointments on past dates, nor today's once the
    /// same-day cutoff has passed.
    pub fn ensure_doctor_can_edit(
        &self,
        appointment: &Appointment,
        now: NaiveDateTime,
    ) -> Result<(), AppointmentError> {
        let today = now.date();

        if appointment.appointment_date < today {
            return Err(AppointmentError::TooLate(
                "Cannot edit appointments on past dates".to_string(),
            ));
        }

        let cutoff = self.rules.doctor_same_day_cutoff_hour;
        if appointment.appointment_date == today && now.hour() >= cutoff {
            let label = NaiveTime::from_hms_opt(cutoff, 0, 0)
                .map(|t| t.format("%-I %p").to_string())
                .unwrap_or_else(|| format!("{}:00", cutoff));
            return Err(AppointmentError::TooLate(format!(
                "Cannot edit today's appointments after {}",
                label
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Utc;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn appointment_at(day: NaiveDate, start: &str, end: &str) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            appointment_date: day,
            start_time: start.to_string(),
            end_time: end.to_string(),
            session_type: SessionType::MorningConsultations,
            status: AppointmentStatus::Scheduled,
            symptoms: None,
            notes: None,
            is_emergency: false,
            booking_date: Utc::now(),
            reschedule_reason: None,
            rescheduled_at: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn terminal_states_have_no_exits() {
        let lifecycle = AppointmentLifecycleService::default();
        assert!(lifecycle.valid_transitions(AppointmentStatus::Completed).is_empty());
        assert_matches!(
            lifecycle.validate_status_transition(AppointmentStatus::Cancelled, AppointmentStatus::Scheduled),
            Err(AppointmentError::InvalidStatusTransition { .. })
        );
        assert!(lifecycle
            .validate_status_transition(AppointmentStatus::Scheduled, AppointmentStatus::Confirmed)
            .is_ok());
        assert_matches!(
            lifecycle.validate_status_transition(AppointmentStatus::Scheduled, AppointmentStatus::Completed),
            Err(AppointmentError::InvalidStatusTransition {
                from: AppointmentStatus::Scheduled,
                to: AppointmentStatus::Completed,
            })
        );
    }

    #[test]
    fn slot_requests_need_strict_times_in_order() {
        let lifecycle = AppointmentLifecycleService::default();
        let today = date(2026, 3, 2);

        assert!(lifecycle.validate_slot_request(today, today, "09:00", "09:30").is_ok());
        assert_matches!(
            lifecycle.validate_slot_request(today, date(2026, 3, 1), "09:00", "09:30"),
            Err(AppointmentError::Validation(_))
        );
        assert_matches!(
            lifecycle.validate_slot_request(today, today, "9:00", "09:30"),
            Err(AppointmentError::Validation(_))
        );
        assert_matches!(
            lifecycle.validate_slot_request(today, today, "10:00", "10:00"),
            Err(AppointmentError::Validation(_))
        );
    }

    #[test]
    fn placeholder_sessions_follow_start_hour() {
        let lifecycle = AppointmentLifecycleService::default();
        assert_eq!(lifecycle.booking_session_type(SessionType::Available, "11:59"), SessionType::MorningConsultations);
        assert_eq!(lifecycle.booking_session_type(SessionType::Available, "12:00"), SessionType::AfternoonProcedures);
        assert_eq!(lifecycle.booking_session_type(SessionType::Available, "17:00"), SessionType::EveningConsultations);
        assert_eq!(lifecycle.booking_session_type(SessionType::Surgery, "17:00"), SessionType::Surgery);
    }

    #[test]
    fn clinic_hours_buckets() {
        let lifecycle = AppointmentLifecycleService::default();
        assert_eq!(lifecycle.clinic_hours_session_type("08:30"), SessionType::Emergency);
        assert_eq!(lifecycle.clinic_hours_session_type("09:00"), SessionType::MorningConsultations);
        assert_eq!(lifecycle.clinic_hours_session_type("14:59"), SessionType::AfternoonProcedures);
        assert_eq!(lifecycle.clinic_hours_session_type("15:00"), SessionType::ExtendedAfternoon);
        assert_eq!(lifecycle.clinic_hours_session_type("19:30"), SessionType::EveningConsultations);
        assert_eq!(lifecycle.clinic_hours_session_type("20:00"), SessionType::Emergency);
    }

    #[test]
    fn notice_boundary_is_inclusive() {
        let lifecycle = AppointmentLifecycleService::default();
        let day = date(2026, 3, 2);
        let appointment = appointment_at(day, "14:00", "14:30");

        let exactly_two_hours = day.and_hms_opt(12, 0, 0).unwrap();
        assert!(lifecycle.ensure_change_notice(&appointment, exactly_two_hours, "cancelled").is_ok());

        let just_inside = day.and_hms_opt(12, 1, 0).unwrap();
        assert_matches!(
            lifecycle.ensure_change_notice(&appointment, just_inside, "cancelled"),
            Err(AppointmentError::TooLate(_))
        );
    }

    #[test]
    fn doctors_stop_editing_today_after_cutoff() {
        let lifecycle = AppointmentLifecycleService::default();
        let day = date(2026, 3, 2);
        let appointment = appointment_at(day, "18:00", "18:30");

        assert!(lifecycle.ensure_doctor_can_edit(&appointment, day.and_hms_opt(16, 59, 0).unwrap()).is_ok());
        assert_matches!(
            lifecycle.ensure_doctor_can_edit(&appointment, day.and_hms_opt(17, 0, 0).unwrap()),
            Err(AppointmentError::TooLate(msg)) if msg.contains("after 5 PM")
        );
        assert_matches!(
            lifecycle.ensure_doctor_can_edit(&appointment, date(2026, 3, 3).and_hms_opt(8, 0, 0).unwrap()),
            Err(AppointmentError::TooLate(_))
        );
    }
}
