use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared_database::StoreError;
use shared_utils::time;

// ==============================================================================
// WEEKDAYS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    pub const ALL: [Weekday; 7] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
        Weekday::Saturday,
        Weekday::Sunday,
    ];

    /// Monday = 0 .. Sunday = 6.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self::ALL[date.weekday().num_days_from_monday() as usize]
    }

    pub fn name(self) -> &'static str {
        match self {
            Weekday::Monday => "monday",
            Weekday::Tuesday => "tuesday",
            Weekday::Wednesday => "wednesday",
            Weekday::Thursday => "thursday",
            Weekday::Friday => "friday",
            Weekday::Saturday => "saturday",
            Weekday::Sunday => "sunday",
        }
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Weekday {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|day| day.name() == lowered)
            .ok_or_else(|| ScheduleError::Validation(format!("Unknown weekday: {}", s)))
    }
}

// ==============================================================================
// SESSION TYPES AND SLOTS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionType {
    #[serde(rename = "Morning Consultations")]
    MorningConsultations,

    #[serde(rename = "Afternoon Procedures")]
    AfternoonProcedures,

    #[serde(rename = "Extended Afternoon")]
    ExtendedAfternoon,

    #[serde(rename = "Evening Consultations")]
    EveningConsultations,

    #[serde(rename = "Surgery")]
    Surgery,

    #[serde(rename = "Emergency", alias = "Emergency On-Call")]
    Emergency,

    #[serde(rename = "Day Off", alias = "DayOff")]
    DayOff,

    /// Generic placeholder; bookings carrying it get a concrete type derived from the start hour.
    #[serde(rename = "Available")]
    Available,
}

impl SessionType {
    pub fn is_day_off(&self) -> bool {
        matches!(self, SessionType::DayOff)
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, SessionType::Available)
    }

    pub fn label(&self) -> &'static str {
        match self {
            SessionType::MorningConsultations => "Morning Consultations",
            SessionType::AfternoonProcedures => "Afternoon Procedures",
            SessionType::ExtendedAfternoon => "Extended Afternoon",
            SessionType::EveningConsultations => "Evening Consultations",
            SessionType::Surgery => "Surgery",
            SessionType::Emergency => "Emergency",
            SessionType::DayOff => "Day Off",
            SessionType::Available => "Available",
        }
    }
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleSlot {
    pub start_time: String,
    pub end_time: String,
    pub session_type: SessionType,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub is_available: bool,
}

impl ScheduleSlot {
    pub fn new(start_time: &str, end_time: &str, session_type: SessionType) -> Self {
        Self {
            start_time: start_time.to_string(),
            end_time: end_time.to_string(),
            session_type,
            description: None,
            is_available: true,
        }
    }

    /// Whether the slot counts toward worked hours.
    pub fn counts_toward_hours(&self) -> bool {
        !self.session_type.is_day_off() && self.is_available
    }

    /// Slot span in minutes; unparseable or inverted spans count as zero.
    pub fn span_minutes(&self) -> i64 {
        time::span_minutes(&self.start_time, &self.end_time)
            .unwrap_or(0)
            .max(0)
    }
}

/// One ordered slot list per weekday, indexed by [`Weekday::index`].
pub type WeekDays = [Vec<ScheduleSlot>; 7];

pub fn empty_week() -> WeekDays {
    Default::default()
}

/// Sum of bookable slot spans across the week, in hours rounded to 2 decimals.
pub fn compute_total_hours(days: &WeekDays) -> f64 {
    let minutes: i64 = days
        .iter()
        .flatten()
        .filter(|slot| slot.counts_toward_hours())
        .map(ScheduleSlot::span_minutes)
        .sum();

    (minutes as f64 / 60.0 * 100.0).round() / 100.0
}

// ==============================================================================
// WEEKLY SCHEDULE
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    Draft,
    Active,
    Archived,
}

impl fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleStatus::Draft => write!(f, "draft"),
            ScheduleStatus::Active => write!(f, "active"),
            ScheduleStatus::Archived => write!(f, "archived"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklySchedule {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub week_start_date: NaiveDate,
    pub week_end_date: NaiveDate,
    pub days: WeekDays,
    pub total_hours: f64,
    pub status: ScheduleStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WeeklySchedule {
    pub fn slots_for(&self, weekday: Weekday) -> &[ScheduleSlot] {
        &self.days[weekday.index()]
    }

    /// Inclusive, date-only containment.
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.week_start_date <= date && date <= self.week_end_date
    }

    pub fn is_active(&self) -> bool {
        self.status == ScheduleStatus::Active
    }

    /// Replace one day's slots and refresh the cached total.
    pub fn set_day(&mut self, weekday: Weekday, slots: Vec<ScheduleSlot>) {
        self.days[weekday.index()] = slots;
        self.recompute_total_hours();
    }

    pub fn recompute_total_hours(&mut self) {
        self.total_hours = compute_total_hours(&self.days);
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateScheduleRequest {
    pub doctor_id: Uuid,
    pub week_start_date: NaiveDate,
    #[serde(default)]
    pub days: BTreeMap<Weekday, Vec<ScheduleSlot>>,
    pub status: Option<ScheduleStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateDaySlotsRequest {
    pub slots: Vec<ScheduleSlot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateScheduleStatusRequest {
    pub status: ScheduleStatus,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScheduleError {
    #[error("Schedule not found")]
    NotFound,

    #[error("Not allowed to manage this doctor's schedule")]
    Forbidden,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Store error: {0}")]
    Store(String),
}

impl From<StoreError> for ScheduleError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => ScheduleError::NotFound,
            other => ScheduleError::Store(other.to_string()),
        }
    }
}
