// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use shared_models::auth::{Role, User};
use shared_utils::clock::Clock;

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, BookAppointmentRequest, SlotKey,
};
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::notification::NotificationDispatcher;
use crate::services::store::AppointmentStore;

pub struct AppointmentBookingService {
    store: Arc<dyn AppointmentStore>,
    lifecycle: AppointmentLifecycleService,
    notifier: NotificationDispatcher,
    clock: Arc<dyn Clock>,
}

impl AppointmentBookingService {
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        lifecycle: AppointmentLifecycleService,
        notifier: NotificationDispatcher,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { store, lifecycle, notifier, clock }
    }

    /// Book a slot for a patient.
    ///
    /// The conflict query below only fails fast. Two concurrent bookings can
    /// both pass it; the store's uniqueness guarantee decides the winner and
    /// the loser gets [`AppointmentError::Conflict`].
    pub async fn book_appointment(
        &self,
        patient_id: Uuid,
        request: BookAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Booking appointment for patient {} with doctor {} on {} {}-{}",
               patient_id, request.doctor_id, request.appointment_date,
               request.start_time, request.end_time);

        self.lifecycle.validate_slot_request(
            self.clock.today(),
            request.appointment_date,
            &request.start_time,
            &request.end_time,
        )?;

        let session_type = self.lifecycle.booking_session_type(request.session_type, &request.start_time);

        let slot = SlotKey::new(request.doctor_id, request.appointment_date, &request.start_time, &request.end_time);
        let existing = self.store.find_active_in_slot(&slot, None).await?;
        if !existing.is_empty() {
            info!("Slot {} {}-{} for doctor {} already taken",
                  slot.date, slot.start_time, slot.end_time, slot.doctor_id);
            return Err(AppointmentError::Conflict);
        }

        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id,
            doctor_id: request.doctor_id,
            appointment_date: request.appointment_date,
            start_time: request.start_time,
            end_time: request.end_time,
            session_type,
            status: AppointmentStatus::Scheduled,
            symptoms: request.symptoms,
            notes: request.notes,
            is_emergency: request.is_emergency,
            booking_date: now,
            reschedule_reason: None,
            rescheduled_at: None,
            updated_at: now,
        };

        let created = match self.store.insert(appointment).await {
            Ok(created) => created,
            Err(e) => {
                let err = AppointmentError::from(e);
                if err == AppointmentError::Conflict {
                    info!("Lost booking race for doctor {} on {} {}-{}",
                          slot.doctor_id, slot.date, slot.start_time, slot.end_time);
                }
                return Err(err);
            }
        };

        info!("Appointment {} booked for patient {} with doctor {} ({})",
              created.id, created.patient_id, created.doctor_id, created.session_type);

        self.notifier.booked(created.clone());
        Ok(created)
    }

    /// Fetch one appointment if the caller is its patient, its doctor or an admin.
    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        actor: &User,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.store.get(appointment_id).await?
            .ok_or(AppointmentError::NotFound)?;

        let actor_id = Uuid::parse_str(&actor.id).ok();
        let visible = match actor.role {
            Role::Admin => true,
            Role::Patient => actor_id == Some(appointment.patient_id),
            Role::Doctor => actor_id == Some(appointment.doctor_id),
            Role::Pharmacist => false,
        };

        if !visible {
            return Err(AppointmentError::NotFound);
        }
        Ok(appointment)
    }

    pub async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, AppointmentError> {
        Ok(self.store.list_for_patient(patient_id).await?)
    }

    pub async fn list_for_doctor(
        &self,
        doctor_id: Uuid,
        date: Option<chrono::NaiveDate>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        Ok(self.store.list_for_doctor(doctor_id, date).await?)
    }
}
