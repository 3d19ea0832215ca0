use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info};
use uuid::Uuid;

use schedule_cell::models::{Weekday, WeeklySchedule};
use schedule_cell::services::store::ScheduleStore;
use shared_utils::clock::Clock;

use crate::models::{
    AppointmentError, AvailabilityResult, DayAvailability, SlotAvailability, SlotKey,
};
use crate::services::store::AppointmentStore;

/// Derives a doctor's bookable slots for one date from the active weekly
/// schedule and the appointments already holding slots.
pub struct AvailabilityResolver {
    schedules: Arc<dyn ScheduleStore>,
    appointments: Arc<dyn AppointmentStore>,
    clock: Arc<dyn Clock>,
}

impl AvailabilityResolver {
    pub fn new(
        schedules: Arc<dyn ScheduleStore>,
        appointments: Arc<dyn AppointmentStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { schedules, appointments, clock }
    }

    pub async fn get_available_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<AvailabilityResult, AppointmentError> {
        if date < self.clock.today() {
            return Err(AppointmentError::Validation(
                "Cannot check availability for past dates".to_string(),
            ));
        }

        let weekday = Weekday::from_date(date);
        debug!("Resolving availability for doctor {} on {} ({})", doctor_id, date, weekday);

        let Some(schedule) = self.covering_schedule(doctor_id, date).await? else {
            debug!("No active schedule covers {} for doctor {}", date, doctor_id);
            return Ok(AvailabilityResult::NotScheduled { doctor_id, date, weekday });
        };

        let day_slots: Vec<_> = schedule
            .slots_for(weekday)
            .iter()
            .filter(|slot| !slot.session_type.is_day_off())
            .collect();

        if day_slots.is_empty() {
            return Ok(AvailabilityResult::NotScheduled { doctor_id, date, weekday });
        }

        let booked: HashSet<SlotKey> = self
            .appointments
            .list_active_for_doctor_on(doctor_id, date)
            .await?
            .iter()
            .map(|appointment| appointment.slot_key())
            .collect();

        let slots: Vec<SlotAvailability> = day_slots
            .into_iter()
            .map(|slot| {
                let key = SlotKey::new(doctor_id, date, &slot.start_time, &slot.end_time);
                let is_booked = booked.contains(&key);
                SlotAvailability {
                    start_time: key.start_time,
                    end_time: key.end_time,
                    session_type: slot.session_type,
                    description: slot.description.clone(),
                    is_available: slot.is_available && !is_booked,
                    is_booked,
                }
            })
            .collect();

        let available_count = slots.iter().filter(|s| s.is_available).count();
        let total_count = slots.len();

        info!("Doctor {} has {}/{} slots open on {}", doctor_id, available_count, total_count, date);

        Ok(AvailabilityResult::Scheduled(DayAvailability {
            doctor_id,
            date,
            weekday,
            schedule_id: schedule.id,
            slots,
            available_count,
            total_count,
        }))
    }

    /// Newest-created active schedule whose week contains the date.
    async fn covering_schedule(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Option<WeeklySchedule>, AppointmentError> {
        let active = self.schedules.find_active_for_doctor(doctor_id).await?;
        Ok(active.into_iter().find(|schedule| schedule.covers(date)))
    }
}
