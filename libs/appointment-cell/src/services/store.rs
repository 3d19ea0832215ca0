use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Method;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{StoreError, SupabaseClient};

use crate::models::{Appointment, SlotKey};

/// Persistence for appointments.
///
/// Implementations must reject any write that would leave two slot-holding
/// (non-cancelled) rows on the same doctor, date, start and end with
/// [`StoreError::Duplicate`]. Engines rely on this as the final word on
/// double booking; their own conflict queries are only a fast path.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn insert(&self, appointment: Appointment) -> Result<Appointment, StoreError>;

    async fn get(&self, appointment_id: Uuid) -> Result<Option<Appointment>, StoreError>;

    async fn update(&self, appointment: &Appointment) -> Result<Appointment, StoreError>;

    /// Non-cancelled appointments holding exactly this slot, optionally ignoring one row.
    async fn find_active_in_slot(
        &self,
        slot: &SlotKey,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Appointment>, StoreError>;

    /// Non-cancelled appointments for a doctor on one date, ordered by start time.
    async fn list_active_for_doctor_on(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, StoreError>;

    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, StoreError>;

    async fn list_for_doctor(
        &self,
        doctor_id: Uuid,
        date: Option<NaiveDate>,
    ) -> Result<Vec<Appointment>, StoreError>;
}

fn sort_by_schedule(rows: &mut [Appointment]) {
    rows.sort_by(|a, b| {
        a.appointment_date
            .cmp(&b.appointment_date)
            .then_with(|| a.slot_key().start_time.cmp(&b.slot_key().start_time))
    });
}

// ==============================================================================
// IN-MEMORY
// ==============================================================================

/// Map-backed store. The slot check and the write happen under one write lock,
/// which gives the same guarantee as the partial unique index in Postgres.
#[derive(Default)]
pub struct InMemoryAppointmentStore {
    rows: RwLock<HashMap<Uuid, Appointment>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<dyn AppointmentStore> {
        Arc::new(Self::new())
    }

    fn slot_taken(rows: &HashMap<Uuid, Appointment>, candidate: &Appointment) -> bool {
        if !candidate.holds_slot() {
            return false;
        }
        let key = candidate.slot_key();
        rows.values()
            .any(|row| row.id != candidate.id && row.holds_slot() && row.slot_key() == key)
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn insert(&self, appointment: Appointment) -> Result<Appointment, StoreError> {
        let mut rows = self.rows.write().await;

        if rows.contains_key(&appointment.id) {
            return Err(StoreError::Duplicate(format!("appointments.id {}", appointment.id)));
        }
        if Self::slot_taken(&rows, &appointment) {
            return Err(StoreError::Duplicate("appointments_active_slot_key".to_string()));
        }

        rows.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn get(&self, appointment_id: Uuid) -> Result<Option<Appointment>, StoreError> {
        Ok(self.rows.read().await.get(&appointment_id).cloned())
    }

    async fn update(&self, appointment: &Appointment) -> Result<Appointment, StoreError> {
        let mut rows = self.rows.write().await;

        if !rows.contains_key(&appointment.id) {
            return Err(StoreError::NotFound(format!("appointments.id {}", appointment.id)));
        }
        if Self::slot_taken(&rows, appointment) {
            return Err(StoreError::Duplicate("appointments_active_slot_key".to_string()));
        }

        rows.insert(appointment.id, appointment.clone());
        Ok(appointment.clone())
    }

    async fn find_active_in_slot(
        &self,
        slot: &SlotKey,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Appointment>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows
            .values()
            .filter(|row| Some(row.id) != exclude && row.holds_slot() && &row.slot_key() == slot)
            .cloned()
            .collect())
    }

    async fn list_active_for_doctor_on(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, StoreError> {
        let rows = self.rows.read().await;
        let mut active: Vec<Appointment> = rows
            .values()
            .filter(|row| row.doctor_id == doctor_id && row.appointment_date == date && row.holds_slot())
            .cloned()
            .collect();
        sort_by_schedule(&mut active);
        Ok(active)
    }

    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, StoreError> {
        let rows = self.rows.read().await;
        let mut mine: Vec<Appointment> = rows
            .values()
            .filter(|row| row.patient_id == patient_id)
            .cloned()
            .collect();
        sort_by_schedule(&mut mine);
        Ok(mine)
    }

    async fn list_for_doctor(
        &self,
        doctor_id: Uuid,
        date: Option<NaiveDate>,
    ) -> Result<Vec<Appointment>, StoreError> {
        let rows = self.rows.read().await;
        let mut theirs: Vec<Appointment> = rows
            .values()
            .filter(|row| row.doctor_id == doctor_id && date.map_or(true, |d| row.appointment_date == d))
            .cloned()
            .collect();
        sort_by_schedule(&mut theirs);
        Ok(theirs)
    }
}

// ==============================================================================
// SUPABASE
// ==============================================================================

/// Backed by the `appointments` table. A partial unique index on
/// `(doctor_id, appointment_date, start_time, end_time) WHERE status <> 'cancelled'`
/// turns a lost booking race into a 409, surfaced here as [`StoreError::Duplicate`].
pub struct SupabaseAppointmentStore {
    supabase: SupabaseClient,
}

impl SupabaseAppointmentStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    fn parse_rows(rows: Vec<Value>) -> Result<Vec<Appointment>, StoreError> {
        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(StoreError::from))
            .collect()
    }

    fn first_row(rows: Vec<Value>, context: &str) -> Result<Appointment, StoreError> {
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Backend(format!("{} returned no rows", context)))?;
        Ok(serde_json::from_value(row)?)
    }

    async fn select(&self, path: &str) -> Result<Vec<Appointment>, StoreError> {
        let rows: Vec<Value> = self.supabase.request(Method::GET, path, None, None).await?;
        Self::parse_rows(rows)
    }
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn insert(&self, appointment: Appointment) -> Result<Appointment, StoreError> {
        debug!("Inserting appointment {} for doctor {} on {} {}-{}",
               appointment.id, appointment.doctor_id, appointment.appointment_date,
               appointment.start_time, appointment.end_time);

        let body = serde_json::to_value(&appointment)?;
        let rows: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/appointments",
            None,
            Some(body),
            Some(SupabaseClient::return_representation()),
        ).await?;

        Self::first_row(rows, "Appointment insert")
    }

    async fn get(&self, appointment_id: Uuid) -> Result<Option<Appointment>, StoreError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        Ok(self.select(&path).await?.into_iter().next())
    }

    async fn update(&self, appointment: &Appointment) -> Result<Appointment, StoreError> {
        debug!("Updating appointment {}", appointment.id);

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment.id);
        let body = serde_json::json!({
            "appointment_date": appointment.appointment_date,
            "start_time": appointment.start_time,
            "end_time": appointment.end_time,
            "session_type": appointment.session_type,
            "status": appointment.status,
            "notes": appointment.notes,
            "reschedule_reason": appointment.reschedule_reason,
            "rescheduled_at": appointment.rescheduled_at,
            "updated_at": appointment.updated_at,
        });

        let rows: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            None,
            Some(body),
            Some(SupabaseClient::return_representation()),
        ).await?;

        if rows.is_empty() {
            warn!("Appointment {} vanished before update", appointment.id);
            return Err(StoreError::NotFound(format!("appointments.id {}", appointment.id)));
        }
        Self::first_row(rows, "Appointment update")
    }

    async fn find_active_in_slot(
        &self,
        slot: &SlotKey,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Appointment>, StoreError> {
        let mut path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&appointment_date=eq.{}&start_time=eq.{}&end_time=eq.{}&status=neq.cancelled",
            slot.doctor_id, slot.date, slot.start_time, slot.end_time
        );
        if let Some(id) = exclude {
            path.push_str(&format!("&id=neq.{}", id));
        }

        self.select(&path).await
    }

    async fn list_active_for_doctor_on(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, StoreError> {
        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&appointment_date=eq.{}&status=neq.cancelled&order=start_time.asc",
            doctor_id, date
        );
        self.select(&path).await
    }

    async fn list_for_patient(&self, patient_id: Uuid) -> Result<Vec<Appointment>, StoreError> {
        let path = format!(
            "/rest/v1/appointments?patient_id=eq.{}&order=appointment_date.asc,start_time.asc",
            patient_id
        );
        self.select(&path).await
    }

    async fn list_for_doctor(
        &self,
        doctor_id: Uuid,
        date: Option<NaiveDate>,
    ) -> Result<Vec<Appointment>, StoreError> {
        let mut path = format!("/rest/v1/appointments?doctor_id=eq.{}", doctor_id);
        if let Some(date) = date {
            path.push_str(&format!("&appointment_date=eq.{}", date));
        }
        path.push_str("&order=appointment_date.asc,start_time.asc");

        self.select(&path).await
    }
}
