#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use appointment_cell::models::*;
use appointment_cell::services::{
    AppointmentNotifier, AppointmentStore, InMemoryAppointmentStore, NotificationDispatcher,
};
use appointment_cell::AppointmentContext;
use schedule_cell::models::{CreateScheduleRequest, ScheduleSlot, SessionType, Weekday};
use schedule_cell::services::{InMemoryScheduleStore, ScheduleService, ScheduleStore};
use shared_utils::clock::FixedClock;
use shared_utils::test_utils::{TestConfig, TestUser};

/// 2026-03-02 is a Monday.
pub fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Booked(Uuid),
    Cancelled(Uuid),
    Rescheduled(Uuid),
}

/// Records every event; optionally fails after recording.
#[derive(Default)]
pub struct RecordingNotifier {
    pub events: Mutex<Vec<Event>>,
    pub fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self { events: Mutex::new(Vec::new()), fail: true }
    }

    fn record(&self, event: Event) -> Result<()> {
        self.events.lock().unwrap().push(event);
        if self.fail {
            return Err(anyhow!("notification channel down"));
        }
        Ok(())
    }

    pub fn snapshot(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    /// Dispatch happens on spawned tasks; wait until `count` events arrived.
    pub async fn wait_for(&self, count: usize) -> Vec<Event> {
        for _ in 0..100 {
            let events = self.snapshot();
            if events.len() >= count {
                return events;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.snapshot()
    }
}

#[async_trait]
impl AppointmentNotifier for RecordingNotifier {
    async fn appointment_booked(&self, appointment: &Appointment) -> Result<()> {
        self.record(Event::Booked(appointment.id))
    }

    async fn appointment_cancelled(&self, appointment: &Appointment) -> Result<()> {
        self.record(Event::Cancelled(appointment.id))
    }

    async fn appointment_rescheduled(&self, _previous: &Appointment, updated: &Appointment) -> Result<()> {
        self.record(Event::Rescheduled(updated.id))
    }
}

pub struct Harness {
    pub ctx: AppointmentContext,
    pub clock: Arc<FixedClock>,
    pub notifier: Arc<RecordingNotifier>,
    pub schedules: Arc<dyn ScheduleStore>,
    pub doctor: TestUser,
    pub patient: TestUser,
}

impl Harness {
    /// Clock set to the Sunday evening before [`monday`].
    pub fn new() -> Self {
        Self::with_parts(
            FixedClock::at(monday().pred_opt().unwrap(), 18, 0),
            InMemoryAppointmentStore::shared(),
            Arc::new(RecordingNotifier::default()),
        )
    }

    pub fn with_parts(
        clock: FixedClock,
        appointments: Arc<dyn AppointmentStore>,
        notifier: Arc<RecordingNotifier>,
    ) -> Self {
        let clock = Arc::new(clock);
        let schedules = InMemoryScheduleStore::shared();
        let ctx = AppointmentContext::new(
            TestConfig::default().to_arc(),
            appointments,
            schedules.clone(),
            NotificationDispatcher::new(notifier.clone()),
            clock.clone(),
        );

        Self {
            ctx,
            clock,
            notifier,
            schedules,
            doctor: TestUser::doctor("doctor@example.com"),
            patient: TestUser::patient("patient@example.com"),
        }
    }

    /// Publish an active week for the harness doctor with the given Monday slots.
    pub async fn publish_monday(&self, slots: Vec<ScheduleSlot>) -> Uuid {
        let mut days = BTreeMap::new();
        days.insert(Weekday::Monday, slots);

        let schedule = ScheduleService::new(self.schedules.clone())
            .create_week(&self.doctor.to_user(), CreateScheduleRequest {
                doctor_id: self.doctor.uuid(),
                week_start_date: monday(),
                days,
                status: None,
            })
            .await
            .unwrap();
        schedule.id
    }

    pub async fn publish_morning(&self) -> Uuid {
        self.publish_monday(vec![
            ScheduleSlot::new("09:00", "12:00", SessionType::MorningConsultations),
        ])
        .await
    }

    pub fn booking_request(&self, start: &str, end: &str) -> BookAppointmentRequest {
        BookAppointmentRequest {
            patient_id: None,
            doctor_id: self.doctor.uuid(),
            appointment_date: monday(),
            start_time: start.to_string(),
            end_time: end.to_string(),
            session_type: SessionType::Available,
            symptoms: Some("Persistent cough".to_string()),
            notes: None,
            is_emergency: false,
        }
    }

    pub async fn book_as_patient(&self, start: &str, end: &str) -> Appointment {
        self.ctx
            .booking()
            .book_appointment(self.patient.uuid(), self.booking_request(start, end))
            .await
            .unwrap()
    }

    pub fn reschedule_to(&self, date: NaiveDate, start: &str, end: &str) -> RescheduleAppointmentRequest {
        RescheduleAppointmentRequest {
            new_date: date,
            new_start_time: start.to_string(),
            new_end_time: end.to_string(),
            reason: Some("Clashes with work".to_string()),
            session_type: None,
        }
    }
}
