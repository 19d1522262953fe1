use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Default opening hours for one day of the week (0 = Sunday … 6 = Saturday).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct WeeklySetting {
    pub day_of_week: i16,
    pub is_open: bool,
    pub open_time: NaiveTime,
    pub close_time: NaiveTime,
    pub slot_duration_minutes: i32,
}

/// Date-specific exception to the weekly schedule.
///
/// The same row shape covers single dates, ranges (`end_date`), yearly
/// recurrences (`is_recurring`) and weekly recurrences (`recurrence_day_of_week`).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct DateOverride {
    pub id: Uuid,
    pub date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub is_closed: bool,
    pub open_time: Option<NaiveTime>,
    pub close_time: Option<NaiveTime>,
    pub reason: Option<String>,
    pub is_recurring: bool,
    pub recurrence_day_of_week: Option<i16>,
    pub show_on_website: bool,
    pub created_at: DateTime<Utc>,
}

/// Body for PUT /admin/appointments/settings.
#[derive(Debug, Deserialize)]
pub struct UpdateWeeklySettingsRequest {
    pub days: Vec<WeeklySettingInput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeeklySettingInput {
    pub day_of_week: i16,
    pub is_open: bool,
    pub open_time: String,
    pub close_time: String,
    pub slot_duration_minutes: i32,
}

/// Body for POST/PUT /admin/appointments/overrides.
#[derive(Debug, Clone, Deserialize)]
pub struct OverrideRequest {
    pub date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub is_closed: bool,
    pub open_time: Option<String>,
    pub close_time: Option<String>,
    pub reason: Option<String>,
    #[serde(default)]
    pub is_recurring: bool,
    pub recurrence_day_of_week: Option<i16>,
    #[serde(default = "default_true")]
    pub show_on_website: bool,
}

fn default_true() -> bool {
    true
}

/// Query params for GET /admin/appointments/overrides.
#[derive(Debug, Deserialize)]
pub struct OverrideListQuery {
    /// Only overrides still relevant on or after this date.
    pub from: Option<NaiveDate>,
}

/// Public view of the schedule shown on the marketing site.
#[derive(Debug, Serialize)]
pub struct PublicSchedule {
    pub weekly: Vec<WeeklySetting>,
    pub closures: Vec<DateOverride>,
}
