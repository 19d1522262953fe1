use chrono::{NaiveDate, NaiveTime};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    db::tenant::{schema_name, SINGLE_DATE_OVERRIDE_INDEX},
    error::{is_unique_violation, AppError},
    models::schedule::{
        DateOverride, OverrideRequest, PublicSchedule, WeeklySetting, WeeklySettingInput,
    },
    services::{
        clock,
        validation::{optional_text, parse_time},
    },
};

const MIN_SLOT_MINUTES: i32 = 5;
const MAX_SLOT_MINUTES: i32 = 480;

const OVERRIDE_COLUMNS: &str = "id, date, end_date, is_closed, open_time, close_time, reason,
     is_recurring, recurrence_day_of_week, show_on_website, created_at";

pub fn validate_weekly_setting(input: &WeeklySettingInput) -> Result<WeeklySetting, AppError> {
    if !(0..=6).contains(&input.day_of_week) {
        return Err(AppError::validation("day_of_week must be between 0 and 6"));
    }
    if !(MIN_SLOT_MINUTES..=MAX_SLOT_MINUTES).contains(&input.slot_duration_minutes) {
        return Err(AppError::validation(format!(
            "slot_duration_minutes must be between {MIN_SLOT_MINUTES} and {MAX_SLOT_MINUTES}"
        )));
    }
    let open_time = parse_time(&input.open_time)?;
    let close_time = parse_time(&input.close_time)?;
    if input.is_open && open_time >= close_time {
        return Err(AppError::validation("open_time must be before close_time"));
    }
    Ok(WeeklySetting {
        day_of_week: input.day_of_week,
        is_open: input.is_open,
        open_time,
        close_time,
        slot_duration_minutes: input.slot_duration_minutes,
    })
}

/// An override request after validation, ready to bind.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidOverride {
    pub date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub is_closed: bool,
    pub open_time: Option<NaiveTime>,
    pub close_time: Option<NaiveTime>,
    pub reason: Option<String>,
    pub is_recurring: bool,
    pub recurrence_day_of_week: Option<i16>,
    pub show_on_website: bool,
}

pub fn validate_override(req: &OverrideRequest) -> Result<ValidOverride, AppError> {
    if let Some(end) = req.end_date {
        if end < req.date {
            return Err(AppError::validation("end_date must not be before date"));
        }
    }
    if let Some(dow) = req.recurrence_day_of_week {
        if !(0..=6).contains(&dow) {
            return Err(AppError::validation("recurrence_day_of_week must be between 0 and 6"));
        }
        if req.is_recurring {
            return Err(AppError::validation(
                "An override cannot recur both yearly and weekly",
            ));
        }
    }

    let (open_time, close_time) = if req.is_closed {
        (None, None)
    } else {
        let open = req
            .open_time
            .as_deref()
            .ok_or_else(|| AppError::validation("open_time is required for special hours"))
            .and_then(parse_time)?;
        let close = req
            .close_time
            .as_deref()
            .ok_or_else(|| AppError::validation("close_time is required for special hours"))
            .and_then(parse_time)?;
        if open >= close {
            return Err(AppError::validation("open_time must be before close_time"));
        }
        (Some(open), Some(close))
    };

    Ok(ValidOverride {
        date: req.date,
        end_date: req.end_date,
        is_closed: req.is_closed,
        open_time,
        close_time,
        reason: optional_text(req.reason.as_deref(), "Reason", 500)?,
        is_recurring: req.is_recurring,
        recurrence_day_of_week: req.recurrence_day_of_week,
        show_on_website: req.show_on_website,
    })
}

fn map_override_conflict(e: sqlx::Error) -> AppError {
    if is_unique_violation(&e, Some(SINGLE_DATE_OVERRIDE_INDEX)) {
        AppError::Conflict("An override already exists for this date".into())
    } else {
        e.into()
    }
}

pub struct ScheduleService;

impl ScheduleService {
    pub async fn weekly_settings(pool: &PgPool, tenant: &str) -> Result<Vec<WeeklySetting>, AppError> {
        let schema = schema_name(tenant);
        let rows = sqlx::query_as::<_, WeeklySetting>(&format!(
            r#"SELECT day_of_week, is_open, open_time, close_time, slot_duration_minutes
               FROM "{schema}".appointment_settings
               ORDER BY day_of_week"#
        ))
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }

    /// Upsert the given days; days not in the list are left unchanged.
    pub async fn update_weekly_settings(
        pool: &PgPool,
        tenant: &str,
        days: &[WeeklySettingInput],
    ) -> Result<Vec<WeeklySetting>, AppError> {
        let valid = days
            .iter()
            .map(validate_weekly_setting)
            .collect::<Result<Vec<_>, _>>()?;

        let schema = schema_name(tenant);
        let mut tx = pool.begin().await?;
        for s in &valid {
            sqlx::query(&format!(
                r#"INSERT INTO "{schema}".appointment_settings
                       (day_of_week, is_open, open_time, close_time, slot_duration_minutes)
                   VALUES ($1, $2, $3, $4, $5)
                   ON CONFLICT (day_of_week) DO UPDATE SET
                       is_open = EXCLUDED.is_open,
                       open_time = EXCLUDED.open_time,
                       close_time = EXCLUDED.close_time,
                       slot_duration_minutes = EXCLUDED.slot_duration_minutes"#
            ))
            .bind(s.day_of_week)
            .bind(s.is_open)
            .bind(s.open_time)
            .bind(s.close_time)
            .bind(s.slot_duration_minutes)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Self::weekly_settings(pool, tenant).await
    }

    /// Overrides that may govern any date in `[from, to]`: every recurring
    /// override plus the one-off ones that intersect the window.
    pub async fn overrides_between(
        pool: &PgPool,
        tenant: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DateOverride>, AppError> {
        let schema = schema_name(tenant);
        let rows = sqlx::query_as::<_, DateOverride>(&format!(
            r#"SELECT {OVERRIDE_COLUMNS}
               FROM "{schema}".date_overrides
               WHERE is_recurring
                  OR recurrence_day_of_week IS NOT NULL
                  OR (date <= $2 AND COALESCE(end_date, date) >= $1)"#
        ))
        .bind(from)
        .bind(to)
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }

    /// All overrides, optionally only those still relevant on or after `from`.
    pub async fn list_overrides(
        pool: &PgPool,
        tenant: &str,
        from: Option<NaiveDate>,
    ) -> Result<Vec<DateOverride>, AppError> {
        let schema = schema_name(tenant);
        let rows = sqlx::query_as::<_, DateOverride>(&format!(
            r#"SELECT {OVERRIDE_COLUMNS}
               FROM "{schema}".date_overrides
               WHERE $1::DATE IS NULL
                  OR is_recurring
                  OR COALESCE(end_date, date) >= $1
                  OR (recurrence_day_of_week IS NOT NULL AND end_date IS NULL)
               ORDER BY date, created_at"#
        ))
        .bind(from)
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }

    pub async fn create_override(
        pool: &PgPool,
        tenant: &str,
        req: &OverrideRequest,
    ) -> Result<DateOverride, AppError> {
        let v = validate_override(req)?;
        let schema = schema_name(tenant);
        sqlx::query_as::<_, DateOverride>(&format!(
            r#"INSERT INTO "{schema}".date_overrides
                   (date, end_date, is_closed, open_time, close_time, reason,
                    is_recurring, recurrence_day_of_week, show_on_website)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
               RETURNING {OVERRIDE_COLUMNS}"#
        ))
        .bind(v.date)
        .bind(v.end_date)
        .bind(v.is_closed)
        .bind(v.open_time)
        .bind(v.close_time)
        .bind(&v.reason)
        .bind(v.is_recurring)
        .bind(v.recurrence_day_of_week)
        .bind(v.show_on_website)
        .fetch_one(pool)
        .await
        .map_err(map_override_conflict)
    }

    pub async fn update_override(
        pool: &PgPool,
        tenant: &str,
        id: Uuid,
        req: &OverrideRequest,
    ) -> Result<DateOverride, AppError> {
        let v = validate_override(req)?;
        let schema = schema_name(tenant);
        sqlx::query_as::<_, DateOverride>(&format!(
            r#"UPDATE "{schema}".date_overrides
               SET date = $1, end_date = $2, is_closed = $3, open_time = $4,
                   close_time = $5, reason = $6, is_recurring = $7,
                   recurrence_day_of_week = $8, show_on_website = $9
               WHERE id = $10
               RETURNING {OVERRIDE_COLUMNS}"#
        ))
        .bind(v.date)
        .bind(v.end_date)
        .bind(v.is_closed)
        .bind(v.open_time)
        .bind(v.close_time)
        .bind(&v.reason)
        .bind(v.is_recurring)
        .bind(v.recurrence_day_of_week)
        .bind(v.show_on_website)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(map_override_conflict)?
        .ok_or(AppError::NotFound("Override"))
    }

    pub async fn delete_override(pool: &PgPool, tenant: &str, id: Uuid) -> Result<(), AppError> {
        let schema = schema_name(tenant);
        let res = sqlx::query(&format!(r#"DELETE FROM "{schema}".date_overrides WHERE id = $1"#))
            .bind(id)
            .execute(pool)
            .await?;
        if res.rows_affected() == 0 {
            return Err(AppError::NotFound("Override"));
        }
        Ok(())
    }

    /// Weekly hours plus upcoming overrides flagged for the public website.
    pub async fn public_schedule(pool: &PgPool, tenant: &str) -> Result<PublicSchedule, AppError> {
        let today = clock::today();
        let weekly = Self::weekly_settings(pool, tenant).await?;
        let closures = Self::list_overrides(pool, tenant, Some(today))
            .await?
            .into_iter()
            .filter(|o| o.show_on_website)
            .collect();
        Ok(PublicSchedule { weekly, closures })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(is_open: bool, open: &str, close: &str, minutes: i32) -> WeeklySettingInput {
        WeeklySettingInput {
            day_of_week: 2,
            is_open,
            open_time: open.into(),
            close_time: close.into(),
            slot_duration_minutes: minutes,
        }
    }

    fn override_req() -> OverrideRequest {
        OverrideRequest {
            date: NaiveDate::from_ymd_opt(2026, 12, 24).unwrap(),
            end_date: None,
            is_closed: true,
            open_time: None,
            close_time: None,
            reason: Some("  Christmas  ".into()),
            is_recurring: false,
            recurrence_day_of_week: None,
            show_on_website: true,
        }
    }

    #[test]
    fn weekly_setting_validation() {
        let s = validate_weekly_setting(&day(true, "10:00", "17:00", 60)).unwrap();
        assert_eq!(s.open_time, NaiveTime::from_hms_opt(10, 0, 0).unwrap());

        assert!(validate_weekly_setting(&day(true, "17:00", "10:00", 60)).is_err());
        assert!(validate_weekly_setting(&day(true, "10:00", "17:00", 0)).is_err());
        assert!(validate_weekly_setting(&day(true, "10:00", "17:00", 600)).is_err());
        // Hours of a closed day are not checked for ordering.
        assert!(validate_weekly_setting(&day(false, "17:00", "10:00", 60)).is_ok());

        let mut bad_day = day(true, "10:00", "17:00", 60);
        bad_day.day_of_week = 7;
        assert!(validate_weekly_setting(&bad_day).is_err());
    }

    #[test]
    fn closed_override_drops_hours_and_trims_reason() {
        let mut req = override_req();
        req.open_time = Some("09:00".into());
        let v = validate_override(&req).unwrap();
        assert_eq!(v.open_time, None);
        assert_eq!(v.reason.as_deref(), Some("Christmas"));
    }

    #[test]
    fn special_hours_require_ordered_times() {
        let mut req = override_req();
        req.is_closed = false;
        assert!(validate_override(&req).is_err());

        req.open_time = Some("12:00".into());
        req.close_time = Some("10:00".into());
        assert!(validate_override(&req).is_err());

        req.close_time = Some("15:00".into());
        assert!(validate_override(&req).is_ok());
    }

    #[test]
    fn end_date_before_date_is_rejected() {
        let mut req = override_req();
        req.end_date = NaiveDate::from_ymd_opt(2026, 12, 20);
        assert!(validate_override(&req).is_err());
    }

    #[test]
    fn recurrence_kinds_are_exclusive() {
        let mut req = override_req();
        req.is_recurring = true;
        req.recurrence_day_of_week = Some(3);
        assert!(validate_override(&req).is_err());

        req.is_recurring = false;
        req.recurrence_day_of_week = Some(9);
        assert!(validate_override(&req).is_err());
    }
}
