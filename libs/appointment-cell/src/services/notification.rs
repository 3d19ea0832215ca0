use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use shared_utils::time;

use crate::models::Appointment;

/// Outbound appointment events. Delivery is best effort: callers never see a
/// notifier failure.
#[async_trait]
pub trait AppointmentNotifier: Send + Sync {
    async fn appointment_booked(&self, appointment: &Appointment) -> Result<()>;

    async fn appointment_cancelled(&self, appointment: &Appointment) -> Result<()>;

    async fn appointment_rescheduled(&self, previous: &Appointment, updated: &Appointment) -> Result<()>;
}

/// Writes events to the log. Used when no webhook is configured.
pub struct LogNotifier;

#[async_trait]
impl AppointmentNotifier for LogNotifier {
    async fn appointment_booked(&self, appointment: &Appointment) -> Result<()> {
        info!("Appointment {} booked with doctor {} on {} at {}",
              appointment.id, appointment.doctor_id, appointment.appointment_date,
              display_time(&appointment.start_time));
        Ok(())
    }

    async fn appointment_cancelled(&self, appointment: &Appointment) -> Result<()> {
        info!("Appointment {} on {} at {} cancelled",
              appointment.id, appointment.appointment_date, display_time(&appointment.start_time));
        Ok(())
    }

    async fn appointment_rescheduled(&self, previous: &Appointment, updated: &Appointment) -> Result<()> {
        info!("Appointment {} moved from {} {} to {} {}",
              updated.id,
              previous.appointment_date, display_time(&previous.start_time),
              updated.appointment_date, display_time(&updated.start_time));
        Ok(())
    }
}

/// Posts JSON events to an external webhook (email/SMS relay).
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    async fn post(&self, payload: Value) -> Result<()> {
        debug!("Posting notification to {}", self.url);

        let response = self.client.post(&self.url).json(&payload).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Notification webhook returned {}: {}", status, body));
        }
        Ok(())
    }
}

fn display_time(value: &str) -> String {
    time::to_12_hour(value).unwrap_or_else(|_| value.to_string())
}

fn appointment_summary(appointment: &Appointment) -> Value {
    json!({
        "appointment_id": appointment.id,
        "patient_id": appointment.patient_id,
        "doctor_id": appointment.doctor_id,
        "date": appointment.appointment_date,
        "start_time": appointment.start_time,
        "end_time": appointment.end_time,
        "display_time": format!("{} - {}",
            display_time(&appointment.start_time), display_time(&appointment.end_time)),
        "session_type": appointment.session_type,
        "status": appointment.status,
    })
}

#[async_trait]
impl AppointmentNotifier for WebhookNotifier {
    async fn appointment_booked(&self, appointment: &Appointment) -> Result<()> {
        self.post(json!({
            "event": "appointment.booked",
            "appointment": appointment_summary(appointment),
        })).await
    }

    async fn appointment_cancelled(&self, appointment: &Appointment) -> Result<()> {
        self.post(json!({
            "event": "appointment.cancelled",
            "appointment": appointment_summary(appointment),
        })).await
    }

    async fn appointment_rescheduled(&self, previous: &Appointment, updated: &Appointment) -> Result<()> {
        self.post(json!({
            "event": "appointment.rescheduled",
            "previous": appointment_summary(previous),
            "appointment": appointment_summary(updated),
            "reason": updated.reschedule_reason,
        })).await
    }
}

/// Runs notifier calls on spawned tasks so a slow or failing channel never
/// delays or fails the request that triggered it.
#[derive(Clone)]
pub struct NotificationDispatcher {
    notifier: Arc<dyn AppointmentNotifier>,
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn AppointmentNotifier>) -> Self {
        Self { notifier }
    }

    pub fn logging() -> Self {
        Self::new(Arc::new(LogNotifier))
    }

    pub fn booked(&self, appointment: Appointment) {
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            if let Err(e) = notifier.appointment_booked(&appointment).await {
                warn!("Booking notification for appointment {} failed: {}", appointment.id, e);
            }
        });
    }

    pub fn cancelled(&self, appointment: Appointment) {
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            if let Err(e) = notifier.appointment_cancelled(&appointment).await {
                warn!("Cancellation notification for appointment {} failed: {}", appointment.id, e);
            }
        });
    }

    pub fn rescheduled(&self, previous: Appointment, updated: Appointment) {
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            if let Err(e) = notifier.appointment_rescheduled(&previous, &updated).await {
                warn!("Reschedule notification for appointment {} failed: {}", updated.id, e);
            }
        });
    }
}
