use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use shared_models::auth::{Role, User};
use shared_utils::clock::Clock;

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, RescheduleAppointmentRequest, SlotKey,
};
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::notification::NotificationDispatcher;
use crate::services::store::AppointmentStore;

/// Changes to existing appointments: cancel, reschedule and the doctor-side
/// status moves (confirm, complete).
pub struct RescheduleService {
    store: Arc<dyn AppointmentStore>,
    lifecycle: AppointmentLifecycleService,
    notifier: NotificationDispatcher,
    clock: Arc<dyn Clock>,
}

impl RescheduleService {
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        lifecycle: AppointmentLifecycleService,
        notifier: NotificationDispatcher,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { store, lifecycle, notifier, clock }
    }

    /// Patient cancellation. Frees the slot immediately.
    pub async fn cancel_appointment(
        &self,
        appointment_id: Uuid,
        patient_id: Uuid,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Patient {} cancelling appointment {}", patient_id, appointment_id);

        let appointment = self.load(appointment_id).await?;
        if appointment.patient_id != patient_id {
            return Err(AppointmentError::NotFound);
        }

        if appointment.status.is_terminal() {
            return Err(AppointmentError::Validation(format!(
                "Cannot cancel a {} appointment",
                appointment.status
            )));
        }
        self.lifecycle.ensure_change_notice(&appointment, self.clock.now(), "cancelled")?;

        let mut cancelled = appointment;
        cancelled.status = AppointmentStatus::Cancelled;
        cancelled.updated_at = Utc::now();

        let cancelled = self.store.update(&cancelled).await?;
        info!("Appointment {} cancelled by patient {}", cancelled.id, patient_id);

        self.notifier.cancelled(cancelled.clone());
        Ok(cancelled)
    }

    /// Move an appointment to a new date and slot.
    ///
    /// Patients must give the usual notice and their appointment returns to
    /// `scheduled`. Doctors (and admins) are bound by the same-day cutoff
    /// instead and the status is left alone.
    pub async fn reschedule_appointment(
        &self,
        appointment_id: Uuid,
        actor: &User,
        request: RescheduleAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        debug!("{} {} rescheduling appointment {} to {} {}-{}",
               actor.role, actor.id, appointment_id,
               request.new_date, request.new_start_time, request.new_end_time);

        let original = self.load(appointment_id).await?;
        let by_doctor = Self::ensure_may_change(&original, actor)?;

        if original.status.is_terminal() {
            return Err(AppointmentError::Validation(format!(
                "Cannot reschedule a {} appointment",
                original.status
            )));
        }

        let now = self.clock.now();
        if by_doctor {
            self.lifecycle.ensure_doctor_can_edit(&original, now)?;
        } else {
            self.lifecycle.ensure_change_notice(&original, now, "rescheduled")?;
        }

        self.lifecycle.validate_slot_request(
            now.date(),
            request.new_date,
            &request.new_start_time,
            &request.new_end_time,
        )?;

        let slot = SlotKey::new(original.doctor_id, request.new_date, &request.new_start_time, &request.new_end_time);
        let clashing = self.store.find_active_in_slot(&slot, Some(original.id)).await?;
        if !clashing.is_empty() {
            info!("Cannot move appointment {}: slot {} {}-{} is taken",
                  original.id, slot.date, slot.start_time, slot.end_time);
            return Err(AppointmentError::Conflict);
        }

        let mut updated = original.clone();
        updated.appointment_date = request.new_date;
        updated.session_type = self.lifecycle.rescheduled_session_type(
            request.session_type,
            &request.new_start_time,
            by_doctor,
        );
        updated.start_time = request.new_start_time;
        updated.end_time = request.new_end_time;
        updated.reschedule_reason = request.reason;
        updated.rescheduled_at = Some(Utc::now());
        updated.updated_at = Utc::now();
        if !by_doctor {
            updated.status = AppointmentStatus::Scheduled;
        }

        let updated = self.store.update(&updated).await?;
        info!("Appointment {} moved from {} {} to {} {}",
              updated.id, original.appointment_date, original.start_time,
              updated.appointment_date, updated.start_time);

        self.notifier.rescheduled(original, updated.clone());
        Ok(updated)
    }

    pub async fn confirm_appointment(
        &self,
        appointment_id: Uuid,
        actor: &User,
    ) -> Result<Appointment, AppointmentError> {
        self.transition_by_doctor(appointment_id, actor, AppointmentStatus::Confirmed).await
    }

    pub async fn complete_appointment(
        &self,
        appointment_id: Uuid,
        actor: &User,
    ) -> Result<Appointment, AppointmentError> {
        self.transition_by_doctor(appointment_id, actor, AppointmentStatus::Completed).await
    }

    async fn transition_by_doctor(
        &self,
        appointment_id: Uuid,
        actor: &User,
        next: AppointmentStatus,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.load(appointment_id).await?;
        if !Self::ensure_may_change(&appointment, actor)? {
            return Err(AppointmentError::NotFound);
        }

        self.lifecycle.validate_status_transition(appointment.status, next)?;

        let mut changed = appointment;
        changed.status = next;
        changed.updated_at = Utc::now();

        let changed = self.store.update(&changed).await?;
        info!("Appointment {} is now {}", changed.id, changed.status);
        Ok(changed)
    }

    async fn load(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.store.get(appointment_id).await?.ok_or(AppointmentError::NotFound)
    }

    /// Returns whether the actor acts on the doctor side. Appointments the actor
    /// has no claim on are reported as missing.
    fn ensure_may_change(appointment: &Appointment, actor: &User) -> Result<bool, AppointmentError> {
        let actor_id = Uuid::parse_str(&actor.id).ok();
        match actor.role {
            Role::Admin => Ok(true),
            Role::Doctor if actor_id == Some(appointment.doctor_id) => Ok(true),
            Role::Patient if actor_id == Some(appointment.patient_id) => Ok(false),
            _ => Err(AppointmentError::NotFound),
        }
    }
}
