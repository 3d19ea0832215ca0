use std::sync::Arc;

use chrono::{Datelike, Duration, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_models::auth::User;
use shared_utils::time;

use crate::models::{
    empty_week, compute_total_hours, CreateScheduleRequest, ScheduleError, ScheduleSlot,
    ScheduleStatus, Weekday, WeeklySchedule,
};
use crate::services::store::ScheduleStore;

/// Doctor-facing management of weekly schedules.
pub struct ScheduleService {
    store: Arc<dyn ScheduleStore>,
}

impl ScheduleService {
    pub fn new(store: Arc<dyn ScheduleStore>) -> Self {
        Self { store }
    }

    /// Create a Monday to Sunday schedule for a doctor. New weeks are active unless a status is given.
    pub async fn create_week(
        &self,
        actor: &User,
        request: CreateScheduleRequest,
    ) -> Result<WeeklySchedule, ScheduleError> {
        debug!("Creating weekly schedule for doctor {} starting {}",
               request.doctor_id, request.week_start_date);

        Self::ensure_can_manage(actor, request.doctor_id)?;

        if request.week_start_date.weekday() != chrono::Weekday::Mon {
            return Err(ScheduleError::Validation(format!(
                "Week must start on a Monday, got {} ({})",
                request.week_start_date,
                request.week_start_date.weekday()
            )));
        }

        let status = request.status.unwrap_or(ScheduleStatus::Active);
        if status == ScheduleStatus::Archived {
            return Err(ScheduleError::Validation("Cannot create an archived schedule".to_string()));
        }

        let mut days = empty_week();
        for (weekday, slots) in request.days {
            days[weekday.index()] = normalize_slots(slots)?;
        }

        let now = Utc::now();
        let schedule = WeeklySchedule {
            id: Uuid::new_v4(),
            doctor_id: request.doctor_id,
            week_start_date: request.week_start_date,
            week_end_date: request.week_start_date + Duration::days(6),
            total_hours: compute_total_hours(&days),
            days,
            status,
            created_at: now,
            updated_at: now,
        };

        if status == ScheduleStatus::Active {
            self.warn_on_overlap(&schedule).await?;
        }

        let created = self.store.insert(schedule).await?;
        info!("Weekly schedule {} created for doctor {} ({} hours)",
              created.id, created.doctor_id, created.total_hours);
        Ok(created)
    }

    /// Replace the ordered slot list of one weekday.
    pub async fn set_day_slots(
        &self,
        actor: &User,
        schedule_id: Uuid,
        weekday: Weekday,
        slots: Vec<ScheduleSlot>,
    ) -> Result<WeeklySchedule, ScheduleError> {
        let mut schedule = self.load_managed(actor, schedule_id).await?;

        if schedule.status == ScheduleStatus::Archived {
            return Err(ScheduleError::Validation("Archived schedules cannot be edited".to_string()));
        }

        schedule.set_day(weekday, normalize_slots(slots)?);
        schedule.updated_at = Utc::now();

        let updated = self.store.update(&schedule).await?;
        info!("Schedule {} {} updated ({} slots, {} hours total)",
              schedule_id, weekday, updated.slots_for(weekday).len(), updated.total_hours);
        Ok(updated)
    }

    /// Move a schedule between draft and active. Archiving goes through [`Self::archive`].
    pub async fn set_status(
        &self,
        actor: &User,
        schedule_id: Uuid,
        status: ScheduleStatus,
    ) -> Result<WeeklySchedule, ScheduleError> {
        let mut schedule = self.load_managed(actor, schedule_id).await?;

        match (schedule.status, status) {
            (ScheduleStatus::Archived, _) => {
                return Err(ScheduleError::Validation("Archived schedules cannot change status".to_string()));
            }
            (_, ScheduleStatus::Archived) => return self.archive(actor, schedule_id).await,
            (current, requested) if current == requested => return Ok(schedule),
            _ => {}
        }

        schedule.status = status;
        schedule.updated_at = Utc::now();

        if status == ScheduleStatus::Active {
            self.warn_on_overlap(&schedule).await?;
        }

        let updated = self.store.update(&schedule).await?;
        info!("Schedule {} is now {}", schedule_id, updated.status);
        Ok(updated)
    }

    /// Retire a schedule. Rows are kept for history and drop out of availability.
    pub async fn archive(&self, actor: &User, schedule_id: Uuid) -> Result<WeeklySchedule, ScheduleError> {
        let mut schedule = self.load_managed(actor, schedule_id).await?;

        if schedule.status == ScheduleStatus::Archived {
            return Ok(schedule);
        }

        schedule.status = ScheduleStatus::Archived;
        schedule.updated_at = Utc::now();

        let archived = self.store.update(&schedule).await?;
        info!("Schedule {} archived", schedule_id);
        Ok(archived)
    }

    pub async fn get_schedule(&self, schedule_id: Uuid) -> Result<WeeklySchedule, ScheduleError> {
        self.store.get(schedule_id).await?.ok_or(ScheduleError::NotFound)
    }

    pub async fn list_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<WeeklySchedule>, ScheduleError> {
        Ok(self.store.list_for_doctor(doctor_id).await?)
    }

    async fn load_managed(&self, actor: &User, schedule_id: Uuid) -> Result<WeeklySchedule, ScheduleError> {
        let schedule = self.get_schedule(schedule_id).await?;
        // Other doctors' schedules are reported as missing.
        Self::ensure_can_manage(actor, schedule.doctor_id).map_err(|_| ScheduleError::NotFound)?;
        Ok(schedule)
    }

    fn ensure_can_manage(actor: &User, doctor_id: Uuid) -> Result<(), ScheduleError> {
        if actor.role.is_admin() {
            return Ok(());
        }
        if actor.role.acts_as_doctor() && actor.id == doctor_id.to_string() {
            return Ok(());
        }
        Err(ScheduleError::Forbidden)
    }

    /// Overlapping active weeks are allowed; availability prefers the newest one.
    async fn warn_on_overlap(&self, schedule: &WeeklySchedule) -> Result<(), ScheduleError> {
        let active = self.store.find_active_for_doctor(schedule.doctor_id).await?;
        let overlapping = active.iter().filter(|other| {
            other.id != schedule.id
                && other.week_start_date <= schedule.week_end_date
                && schedule.week_start_date <= other.week_end_date
        }).count();

        if overlapping > 0 {
            warn!("Doctor {} has {} other active schedule(s) overlapping {}..{}; newest wins",
                  schedule.doctor_id, overlapping, schedule.week_start_date, schedule.week_end_date);
        }
        Ok(())
    }
}

/// Convert slot times to 24-hour form and check ordering. Day-off markers keep
/// whatever span they were given.
pub fn normalize_slots(slots: Vec<ScheduleSlot>) -> Result<Vec<ScheduleSlot>, ScheduleError> {
    slots.into_iter().map(normalize_slot).collect()
}

fn normalize_slot(mut slot: ScheduleSlot) -> Result<ScheduleSlot, ScheduleError> {
    if slot.session_type.is_day_off() {
        if let (Ok(start), Ok(end)) = (time::to_24_hour(&slot.start_time), time::to_24_hour(&slot.end_time)) {
            slot.start_time = start;
            slot.end_time = end;
        }
        return Ok(slot);
    }

    slot.start_time = time::to_24_hour(&slot.start_time)
        .map_err(|e| ScheduleError::Validation(e.to_string()))?;
    slot.end_time = time::to_24_hour(&slot.end_time)
        .map_err(|e| ScheduleError::Validation(e.to_string()))?;

    if slot.span_minutes() <= 0 {
        return Err(ScheduleError::Validation(format!(
            "Slot start {} must be before end {}",
            slot.start_time, slot.end_time
        )));
    }

    Ok(slot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SessionType;

    #[test]
    fn normalizes_12_hour_slots() {
        let slots = normalize_slots(vec![ScheduleSlot::new("9:00 AM", "1:30 PM", SessionType::Surgery)]).unwrap();
        assert_eq!(slots[0].start_time, "09:00");
        assert_eq!(slots[0].end_time, "13:30");
    }

    #[test]
    fn rejects_inverted_slots_but_not_day_off_markers() {
        let inverted = normalize_slots(vec![ScheduleSlot::new("12:00", "09:00", SessionType::MorningConsultations)]);
        assert!(matches!(inverted, Err(ScheduleError::Validation(_))));

        let day_off = normalize_slots(vec![ScheduleSlot::new("11:00", "11:00", SessionType::DayOff)]);
        assert!(day_off.is_ok());

        let unparsed_day_off = normalize_slots(vec![ScheduleSlot::new("", "", SessionType::DayOff)]);
        assert!(unparsed_day_off.is_ok());
    }
}
