use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Confirmed,
    Cancelled,
    Completed,
}

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::Completed => "completed",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for AppointmentStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "confirmed" => Ok(AppointmentStatus::Confirmed),
            "cancelled" => Ok(AppointmentStatus::Cancelled),
            "completed" => Ok(AppointmentStatus::Completed),
            _ => Err(anyhow::anyhow!("Unknown appointment status: {s}")),
        }
    }
}

/// DB row struct — status is stored as TEXT with a CHECK constraint.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Appointment {
    pub id: Uuid,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub duration_minutes: i32,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub customer_street: Option<String>,
    pub customer_postal_code: String,
    pub customer_city: Option<String>,
    pub remarks: Option<String>,
    pub status: String,
    #[serde(skip_serializing)]
    pub edit_token: String,
    #[serde(skip_serializing)]
    pub admin_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn status(&self) -> AppointmentStatus {
        self.status.parse().unwrap_or(AppointmentStatus::Confirmed)
    }
}

/// Admin view: includes the internal notes and the edit token.
#[derive(Debug, Serialize)]
pub struct AdminAppointment {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub edit_token: String,
    pub admin_notes: Option<String>,
}

impl From<Appointment> for AdminAppointment {
    fn from(a: Appointment) -> Self {
        let edit_token = a.edit_token.clone();
        let admin_notes = a.admin_notes.clone();
        Self { appointment: a, edit_token, admin_notes }
    }
}

/// Returned once to the customer after booking; carries the edit token.
#[derive(Debug, Serialize)]
pub struct BookingConfirmation {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub edit_token: String,
}

/// Customer-supplied contact details, shared by public and admin bodies.
#[derive(Debug, Clone, Deserialize)]
pub struct CustomerDetails {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub street: Option<String>,
    pub postal_code: String,
    pub city: Option<String>,
    pub remarks: Option<String>,
}

/// Body for POST /appointments (public) and POST /admin/appointments.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateAppointmentRequest {
    pub date: NaiveDate,
    /// "HH:MM"
    pub time: String,
    #[serde(flatten)]
    pub customer: CustomerDetails,
    pub admin_notes: Option<String>,
}

/// Body for PUT /appointments/{token}. Omitted fields stay unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RescheduleRequest {
    pub date: Option<NaiveDate>,
    pub time: Option<String>,
    pub phone: Option<String>,
    pub street: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub remarks: Option<String>,
}

/// Body for PUT /admin/appointments/{id}.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminUpdateAppointmentRequest {
    pub date: Option<NaiveDate>,
    pub time: Option<String>,
    pub status: Option<AppointmentStatus>,
    pub admin_notes: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub street: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub remarks: Option<String>,
}

/// Query params for GET /admin/appointments.
#[derive(Debug, Default, Deserialize)]
pub struct AppointmentListQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub status: Option<AppointmentStatus>,
}

/// Query params for GET /appointments/availability.
#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub date: NaiveDate,
}

/// Query params for GET /appointments/availability/range.
#[derive(Debug, Deserialize)]
pub struct AvailabilityRangeQuery {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DayAvailability {
    pub date: NaiveDate,
    pub is_open: bool,
    pub reason: Option<String>,
    pub slot_duration_minutes: i32,
    /// Free slot start times formatted "HH:MM".
    pub slots: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DateSummary {
    pub date: NaiveDate,
    pub available_slots: usize,
}
