use chrono::{NaiveDate, NaiveTime};
use rand::{distributions::Alphanumeric, Rng};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    db::tenant::{schema_name, ACTIVE_SLOT_INDEX},
    error::{is_unique_violation, AppError},
    models::appointment::{
        AdminUpdateAppointmentRequest, Appointment, AppointmentListQuery, AppointmentStatus,
        CreateAppointmentRequest, RescheduleRequest,
    },
    services::{
        availability::AvailabilityService,
        clock,
        validation::{
            normalize_email, normalize_phone, normalize_postal_code, optional_text, parse_time,
            required_text, validate_customer, validate_remarks, ValidCustomer,
        },
    },
};

pub const EDIT_TOKEN_LEN: usize = 32;

const COLUMNS: &str = "id, appointment_date, appointment_time, duration_minutes,
     customer_name, customer_email, customer_phone, customer_street,
     customer_postal_code, customer_city, remarks, status, edit_token,
     admin_notes, created_at, updated_at";

/// Opaque customer-facing identifier, 32 alphanumeric characters.
pub fn generate_edit_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(EDIT_TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// Rejects malformed tokens before they reach the database.
pub fn is_well_formed_token(token: &str) -> bool {
    token.len() == EDIT_TOKEN_LEN && token.chars().all(|c| c.is_ascii_alphanumeric())
}

fn map_slot_conflict(e: sqlx::Error) -> AppError {
    if is_unique_violation(&e, Some(ACTIVE_SLOT_INDEX)) {
        AppError::SlotUnavailable
    } else {
        e.into()
    }
}

/// Only confirmed appointments may be changed by the customer.
pub fn ensure_customer_editable(a: &Appointment) -> Result<(), AppError> {
    match a.status() {
        AppointmentStatus::Confirmed => Ok(()),
        AppointmentStatus::Cancelled => {
            Err(AppError::validation("This appointment has been cancelled"))
        }
        AppointmentStatus::Completed => {
            Err(AppError::validation("This appointment has already taken place"))
        }
    }
}

/// Appointment values after merging an update onto the stored row.
#[derive(Debug, Clone, PartialEq)]
pub struct AppointmentChanges {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub status: AppointmentStatus,
    pub customer: ValidCustomer,
    pub admin_notes: Option<String>,
}

impl AppointmentChanges {
    fn from_current(a: &Appointment) -> Self {
        Self {
            date: a.appointment_date,
            time: a.appointment_time,
            status: a.status(),
            customer: ValidCustomer {
                name: a.customer_name.clone(),
                email: a.customer_email.clone(),
                phone: a.customer_phone.clone(),
                street: a.customer_street.clone(),
                postal_code: a.customer_postal_code.clone(),
                city: a.customer_city.clone(),
                remarks: a.remarks.clone(),
            },
            admin_notes: a.admin_notes.clone(),
        }
    }

    pub fn slot_changed(&self, a: &Appointment) -> bool {
        self.date != a.appointment_date || self.time != a.appointment_time
    }
}

/// Merges a customer reschedule onto the stored appointment.
/// Name and email stay fixed: they identify the booking.
pub fn merge_reschedule(a: &Appointment, req: &RescheduleRequest) -> Result<AppointmentChanges, AppError> {
    let mut c = AppointmentChanges::from_current(a);
    if let Some(date) = req.date {
        c.date = date;
    }
    if let Some(time) = &req.time {
        c.time = parse_time(time)?;
    }
    if let Some(phone) = &req.phone {
        c.customer.phone = normalize_phone(phone)?;
    }
    if let Some(postal) = &req.postal_code {
        c.customer.postal_code = normalize_postal_code(postal)?;
    }
    if req.street.is_some() {
        c.customer.street = optional_text(req.street.as_deref(), "Street", 255)?;
    }
    if req.city.is_some() {
        c.customer.city = optional_text(req.city.as_deref(), "City", 128)?;
    }
    if req.remarks.is_some() {
        c.customer.remarks = validate_remarks(req.remarks.as_deref())?;
    }
    Ok(c)
}

pub fn merge_admin_update(
    a: &Appointment,
    req: &AdminUpdateAppointmentRequest,
) -> Result<AppointmentChanges, AppError> {
    let reschedule = RescheduleRequest {
        date: req.date,
        time: req.time.clone(),
        phone: req.phone.clone(),
        street: req.street.clone(),
        postal_code: req.postal_code.clone(),
        city: req.city.clone(),
        remarks: req.remarks.clone(),
    };
    let mut c = merge_reschedule(a, &reschedule)?;
    if let Some(name) = &req.name {
        c.customer.name = required_text(name, "Name", 255)?;
    }
    if let Some(email) = &req.email {
        c.customer.email = normalize_email(email)?;
    }
    if let Some(status) = req.status {
        c.status = status;
    }
    if req.admin_notes.is_some() {
        c.admin_notes = optional_text(req.admin_notes.as_deref(), "Admin notes", 5000)?;
    }
    Ok(c)
}

pub struct AppointmentService;

impl AppointmentService {
    /// Public booking: validates, re-checks availability, then inserts.
    ///
    /// The availability check and the insert are not atomic; the partial
    /// unique index on the active slot is what rejects the losing request.
    pub async fn create_public(
        pool: &PgPool,
        tenant: &str,
        req: &CreateAppointmentRequest,
    ) -> Result<Appointment, AppError> {
        let customer = validate_customer(&req.customer)?;
        let time = parse_time(&req.time)?;
        if req.date < clock::today() {
            return Err(AppError::validation("Date is in the past"));
        }

        if !AvailabilityService::is_slot_available(pool, tenant, req.date, time, None).await? {
            return Err(AppError::SlotUnavailable);
        }

        let duration = AvailabilityService::slot_duration(pool, tenant, req.date).await?;
        Self::insert(pool, tenant, req.date, time, duration, &customer, None).await
    }

    /// Manual entry from the dashboard: open hours are not enforced, the
    /// active-slot index still is.
    pub async fn create_admin(
        pool: &PgPool,
        tenant: &str,
        req: &CreateAppointmentRequest,
    ) -> Result<Appointment, AppError> {
        let customer = validate_customer(&req.customer)?;
        let time = parse_time(&req.time)?;
        let admin_notes = optional_text(req.admin_notes.as_deref(), "Admin notes", 5000)?;
        let duration = AvailabilityService::slot_duration(pool, tenant, req.date).await?;
        Self::insert(pool, tenant, req.date, time, duration, &customer, admin_notes).await
    }

    async fn insert(
        pool: &PgPool,
        tenant: &str,
        date: NaiveDate,
        time: NaiveTime,
        duration_minutes: i32,
        c: &ValidCustomer,
        admin_notes: Option<String>,
    ) -> Result<Appointment, AppError> {
        let schema = schema_name(tenant);
        sqlx::query_as::<_, Appointment>(&format!(
            r#"INSERT INTO "{schema}".appointments
                   (appointment_date, appointment_time, duration_minutes,
                    customer_name, customer_email, customer_phone, customer_street,
                    customer_postal_code, customer_city, remarks, edit_token, admin_notes)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
               RETURNING {COLUMNS}"#
        ))
        .bind(date)
        .bind(time)
        .bind(duration_minutes)
        .bind(&c.name)
        .bind(&c.email)
        .bind(&c.phone)
        .bind(&c.street)
        .bind(&c.postal_code)
        .bind(&c.city)
        .bind(&c.remarks)
        .bind(generate_edit_token())
        .bind(admin_notes)
        .fetch_one(pool)
        .await
        .map_err(map_slot_conflict)
    }

    pub async fn get_by_token(pool: &PgPool, tenant: &str, token: &str) -> Result<Appointment, AppError> {
        if !is_well_formed_token(token) {
            return Err(AppError::NotFound("Appointment"));
        }
        let schema = schema_name(tenant);
        sqlx::query_as::<_, Appointment>(&format!(
            r#"SELECT {COLUMNS} FROM "{schema}".appointments WHERE edit_token = $1"#
        ))
        .bind(token)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Appointment"))
    }

    pub async fn get_by_id(pool: &PgPool, tenant: &str, id: Uuid) -> Result<Appointment, AppError> {
        let schema = schema_name(tenant);
        sqlx::query_as::<_, Appointment>(&format!(
            r#"SELECT {COLUMNS} FROM "{schema}".appointments WHERE id = $1"#
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Appointment"))
    }

    /// Customer self-service change. Returns the updated row and whether the
    /// slot moved.
    pub async fn reschedule_by_token(
        pool: &PgPool,
        tenant: &str,
        token: &str,
        req: &RescheduleRequest,
    ) -> Result<(Appointment, bool), AppError> {
        let current = Self::get_by_token(pool, tenant, token).await?;
        ensure_customer_editable(&current)?;

        let changes = merge_reschedule(&current, req)?;
        let moved = changes.slot_changed(&current);
        if moved {
            if changes.date < clock::today() {
                return Err(AppError::validation("Date is in the past"));
            }
            let free = AvailabilityService::is_slot_available(
                pool,
                tenant,
                changes.date,
                changes.time,
                Some(current.id),
            )
            .await?;
            if !free {
                return Err(AppError::SlotUnavailable);
            }
        }

        let updated = Self::apply(pool, tenant, &current, &changes).await?;
        Ok((updated, moved))
    }

    /// Marks the appointment cancelled, which frees its slot.
    pub async fn cancel_by_token(pool: &PgPool, tenant: &str, token: &str) -> Result<Appointment, AppError> {
        let current = Self::get_by_token(pool, tenant, token).await?;
        ensure_customer_editable(&current)?;

        let schema = schema_name(tenant);
        let updated = sqlx::query_as::<_, Appointment>(&format!(
            r#"UPDATE "{schema}".appointments
               SET status = 'cancelled', updated_at = NOW()
               WHERE id = $1 AND status = 'confirmed'
               RETURNING {COLUMNS}"#
        ))
        .bind(current.id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::validation("This appointment has been cancelled"))?;
        Ok(updated)
    }

    pub async fn list(
        pool: &PgPool,
        tenant: &str,
        query: &AppointmentListQuery,
    ) -> Result<Vec<Appointment>, AppError> {
        let schema = schema_name(tenant);
        let rows = sqlx::query_as::<_, Appointment>(&format!(
            r#"SELECT {COLUMNS} FROM "{schema}".appointments
               WHERE ($1::DATE IS NULL OR appointment_date >= $1)
                 AND ($2::DATE IS NULL OR appointment_date <= $2)
                 AND ($3::TEXT IS NULL OR status = $3)
               ORDER BY appointment_date, appointment_time"#
        ))
        .bind(query.from)
        .bind(query.to)
        .bind(query.status.map(|s| s.to_string()))
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }

    pub async fn admin_update(
        pool: &PgPool,
        tenant: &str,
        id: Uuid,
        req: &AdminUpdateAppointmentRequest,
    ) -> Result<(Appointment, bool), AppError> {
        let current = Self::get_by_id(pool, tenant, id).await?;
        let changes = merge_admin_update(&current, req)?;
        let moved = changes.slot_changed(&current);
        let updated = Self::apply(pool, tenant, &current, &changes).await?;
        Ok((updated, moved))
    }

    async fn apply(
        pool: &PgPool,
        tenant: &str,
        current: &Appointment,
        c: &AppointmentChanges,
    ) -> Result<Appointment, AppError> {
        let schema = schema_name(tenant);
        let duration = if c.slot_changed(current) {
            AvailabilityService::slot_duration(pool, tenant, c.date).await?
        } else {
            current.duration_minutes
        };
        sqlx::query_as::<_, Appointment>(&format!(
            r#"UPDATE "{schema}".appointments
               SET appointment_date = $1, appointment_time = $2, duration_minutes = $3,
                   status = $4, customer_name = $5, customer_email = $6,
                   customer_phone = $7, customer_street = $8, customer_postal_code = $9,
                   customer_city = $10, remarks = $11, admin_notes = $12,
                   updated_at = NOW()
               WHERE id = $13
               RETURNING {COLUMNS}"#
        ))
        .bind(c.date)
        .bind(c.time)
        .bind(duration)
        .bind(c.status.to_string())
        .bind(&c.customer.name)
        .bind(&c.customer.email)
        .bind(&c.customer.phone)
        .bind(&c.customer.street)
        .bind(&c.customer.postal_code)
        .bind(&c.customer.city)
        .bind(&c.customer.remarks)
        .bind(&c.admin_notes)
        .bind(current.id)
        .fetch_optional(pool)
        .await
        .map_err(map_slot_conflict)?
        .ok_or(AppError::NotFound("Appointment"))
    }

    pub async fn delete(pool: &PgPool, tenant: &str, id: Uuid) -> Result<(), AppError> {
        let schema = schema_name(tenant);
        let res = sqlx::query(&format!(r#"DELETE FROM "{schema}".appointments WHERE id = $1"#))
            .bind(id)
            .execute(pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(AppError::NotFound("Appointment"));
        }
        Ok(())
    }
}
