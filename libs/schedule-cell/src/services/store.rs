use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{StoreError, SupabaseClient};

use crate::models::{ScheduleStatus, WeeklySchedule};

/// Persistence for weekly schedules.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn insert(&self, schedule: WeeklySchedule) -> Result<WeeklySchedule, StoreError>;

    async fn get(&self, schedule_id: Uuid) -> Result<Option<WeeklySchedule>, StoreError>;

    async fn update(&self, schedule: &WeeklySchedule) -> Result<WeeklySchedule, StoreError>;

    /// Active schedules for a doctor, most recently created first.
    async fn find_active_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<WeeklySchedule>, StoreError>;

    /// Every schedule for a doctor regardless of status, newest week first.
    async fn list_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<WeeklySchedule>, StoreError>;
}

// ==============================================================================
// IN-MEMORY
// ==============================================================================

#[derive(Default)]
pub struct InMemoryScheduleStore {
    rows: RwLock<HashMap<Uuid, WeeklySchedule>>,
}

impl InMemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<dyn ScheduleStore> {
        Arc::new(Self::new())
    }
}

#[async_trait]
impl ScheduleStore for InMemoryScheduleStore {
    async fn insert(&self, schedule: WeeklySchedule) -> Result<WeeklySchedule, StoreError> {
        let mut rows = self.rows.write().await;
        if rows.contains_key(&schedule.id) {
            return Err(StoreError::Duplicate(format!("weekly_schedules.id {}", schedule.id)));
        }
        rows.insert(schedule.id, schedule.clone());
        Ok(schedule)
    }

    async fn get(&self, schedule_id: Uuid) -> Result<Option<WeeklySchedule>, StoreError> {
        Ok(self.rows.read().await.get(&schedule_id).cloned())
    }

    async fn update(&self, schedule: &WeeklySchedule) -> Result<WeeklySchedule, StoreError> {
        let mut rows = self.rows.write().await;
        match rows.get_mut(&schedule.id) {
            Some(row) => {
                *row = schedule.clone();
                Ok(schedule.clone())
            }
            None => Err(StoreError::NotFound(format!("weekly_schedules.id {}", schedule.id))),
        }
    }

    async fn find_active_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<WeeklySchedule>, StoreError> {
        let rows = self.rows.read().await;
        let mut active: Vec<WeeklySchedule> = rows
            .values()
            .filter(|s| s.doctor_id == doctor_id && s.status == ScheduleStatus::Active)
            .cloned()
            .collect();
        active.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(active)
    }

    async fn list_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<WeeklySchedule>, StoreError> {
        let rows = self.rows.read().await;
        let mut schedules: Vec<WeeklySchedule> = rows
            .values()
            .filter(|s| s.doctor_id == doctor_id)
            .cloned()
            .collect();
        schedules.sort_by(|a, b| {
            b.week_start_date
                .cmp(&a.week_start_date)
                .then(b.created_at.cmp(&a.created_at))
        });
        Ok(schedules)
    }
}

// ==============================================================================
// SUPABASE
// ==============================================================================

/// Backed by the `weekly_schedules` table; `days` is a JSON array of 7 slot lists.
pub struct SupabaseScheduleStore {
    supabase: SupabaseClient,
}

impl SupabaseScheduleStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    fn parse_rows(rows: Vec<Value>) -> Result<Vec<WeeklySchedule>, StoreError> {
        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(StoreError::from))
            .collect()
    }

    fn first_row(rows: Vec<Value>, context: &str) -> Result<WeeklySchedule, StoreError> {
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Backend(format!("{} returned no rows", context)))?;
        Ok(serde_json::from_value(row)?)
    }
}

#[async_trait]
impl ScheduleStore for SupabaseScheduleStore {
    async fn insert(&self, schedule: WeeklySchedule) -> Result<WeeklySchedule, StoreError> {
        debug!("Inserting weekly schedule {} for doctor {}", schedule.id, schedule.doctor_id);

        let body = serde_json::to_value(&schedule)?;
        let rows: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/weekly_schedules",
            None,
            Some(body),
            Some(SupabaseClient::return_representation()),
        ).await?;

        Self::first_row(rows, "Schedule insert")
    }

    async fn get(&self, schedule_id: Uuid) -> Result<Option<WeeklySchedule>, StoreError> {
        let path = format!("/rest/v1/weekly_schedules?id=eq.{}", schedule_id);
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, None, None).await?;

        Ok(Self::parse_rows(rows)?.into_iter().next())
    }

    async fn update(&self, schedule: &WeeklySchedule) -> Result<WeeklySchedule, StoreError> {
        debug!("Updating weekly schedule {}", schedule.id);

        let path = format!("/rest/v1/weekly_schedules?id=eq.{}", schedule.id);
        let body = serde_json::json!({
            "days": schedule.days,
            "total_hours": schedule.total_hours,
            "status": schedule.status,
            "updated_at": schedule.updated_at,
        });

        let rows: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            None,
            Some(body),
            Some(SupabaseClient::return_representation()),
        ).await?;

        if rows.is_empty() {
            return Err(StoreError::NotFound(format!("weekly_schedules.id {}", schedule.id)));
        }
        Self::first_row(rows, "Schedule update")
    }

    async fn find_active_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<WeeklySchedule>, StoreError> {
        let path = format!(
            "/rest/v1/weekly_schedules?doctor_id=eq.{}&status=eq.active&order=created_at.desc",
            doctor_id
        );
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, None, None).await?;

        Self::parse_rows(rows)
    }

    async fn list_for_doctor(&self, doctor_id: Uuid) -> Result<Vec<WeeklySchedule>, StoreError> {
        let path = format!(
            "/rest/v1/weekly_schedules?doctor_id=eq.{}&order=week_start_date.desc,created_at.desc",
            doctor_id
        );
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, None, None).await?;

        Self::parse_rows(rows)
    }
}
