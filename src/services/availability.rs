use std::collections::{HashMap, HashSet};

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    db::tenant::schema_name,
    error::AppError,
    models::{
        appointment::{DateSummary, DayAvailability},
        schedule::{DateOverride, WeeklySetting},
    },
    services::{clock, schedule::ScheduleService},
};

/// Slot length used when an override opens a day that has no weekly row.
pub const DEFAULT_SLOT_MINUTES: i32 = 60;

/// Longest window accepted by the range query.
pub const MAX_RANGE_DAYS: i64 = 62;

/// Effective opening state of one calendar date.
#[derive(Debug, Clone, PartialEq)]
pub struct DayState {
    pub is_open: bool,
    pub open_time: NaiveTime,
    pub close_time: NaiveTime,
    pub slot_duration_minutes: i32,
    pub reason: Option<String>,
}

impl DayState {
    fn closed(reason: Option<String>) -> Self {
        Self {
            is_open: false,
            open_time: NaiveTime::MIN,
            close_time: NaiveTime::MIN,
            slot_duration_minutes: DEFAULT_SLOT_MINUTES,
            reason,
        }
    }
}

pub fn day_of_week(date: NaiveDate) -> i16 {
    date.weekday().num_days_from_sunday() as i16
}

fn is_single_date(o: &DateOverride) -> bool {
    o.end_date.is_none() && !o.is_recurring && o.recurrence_day_of_week.is_none()
}

fn is_date_range(o: &DateOverride) -> bool {
    o.end_date.is_some() && !o.is_recurring && o.recurrence_day_of_week.is_none()
}

fn is_yearly(o: &DateOverride) -> bool {
    o.is_recurring && o.recurrence_day_of_week.is_none()
}

fn is_weekly(o: &DateOverride) -> bool {
    o.recurrence_day_of_week.is_some()
}

/// Yearly overrides repeat their month/day window (possibly spanning New
/// Year) every year from the anchor year on. A 29 February anchor only
/// matches leap years.
fn yearly_matches(o: &DateOverride, date: NaiveDate) -> bool {
    if date.year() < o.date.year() {
        return false;
    }
    let span_years = o.end_date.map_or(0, |end| end.year() - o.date.year());
    // The window containing `date` started either this year or, when it
    // spans New Year, in one of the preceding years.
    (0..=span_years).any(|back| {
        let start_year = date.year() - back;
        if start_year < o.date.year() {
            return false;
        }
        let Some(start) = o.date.with_year(start_year) else {
            return false;
        };
        let end = match o.end_date {
            Some(end) => match end.with_year(start_year + span_years) {
                Some(e) => e,
                None => return false,
            },
            None => start,
        };
        start <= date && date <= end
    })
}

fn weekly_matches(o: &DateOverride, date: NaiveDate) -> bool {
    o.recurrence_day_of_week == Some(day_of_week(date))
        && o.date <= date
        && o.end_date.map_or(true, |end| date <= end)
}

/// Picks the override that governs `date`.
///
/// Precedence: single date, then date range (narrowest first), then yearly
/// recurrence, then weekly recurrence. Ties go to the most recently created.
pub fn applicable_override(date: NaiveDate, overrides: &[DateOverride]) -> Option<&DateOverride> {
    let newest = |a: &&DateOverride, b: &&DateOverride| a.created_at.cmp(&b.created_at);

    if let Some(o) = overrides
        .iter()
        .filter(|o| is_single_date(o) && o.date == date)
        .max_by(newest)
    {
        return Some(o);
    }

    if let Some(o) = overrides
        .iter()
        .filter(|o| is_date_range(o) && o.date <= date && o.end_date.is_some_and(|e| date <= e))
        .min_by(|a, b| {
            let span = |o: &DateOverride| o.end_date.map_or(0, |e| (e - o.date).num_days());
            span(a).cmp(&span(b)).then_with(|| b.created_at.cmp(&a.created_at))
        })
    {
        return Some(o);
    }

    if let Some(o) = overrides
        .iter()
        .filter(|o| is_yearly(o) && yearly_matches(o, date))
        .max_by(newest)
    {
        return Some(o);
    }

    overrides
        .iter()
        .filter(|o| is_weekly(o) && weekly_matches(o, date))
        .max_by(newest)
}

/// Merges weekly settings with overrides to find the opening state of `date`.
pub fn resolve_day(date: NaiveDate, weekly: &[WeeklySetting], overrides: &[DateOverride]) -> DayState {
    let setting = weekly.iter().find(|s| s.day_of_week == day_of_week(date));

    if let Some(o) = applicable_override(date, overrides) {
        if o.is_closed {
            return DayState::closed(o.reason.clone());
        }
        let open_time = o.open_time.or(setting.map(|s| s.open_time));
        let close_time = o.close_time.or(setting.map(|s| s.close_time));
        return match (open_time, close_time) {
            (Some(open_time), Some(close_time)) => DayState {
                is_open: true,
                open_time,
                close_time,
                slot_duration_minutes: setting
                    .map_or(DEFAULT_SLOT_MINUTES, |s| s.slot_duration_minutes),
                reason: o.reason.clone(),
            },
            _ => DayState::closed(o.reason.clone()),
        };
    }

    match setting {
        Some(s) if s.is_open => DayState {
            is_open: true,
            open_time: s.open_time,
            close_time: s.close_time,
            slot_duration_minutes: s.slot_duration_minutes,
            reason: None,
        },
        _ => DayState::closed(None),
    }
}

/// Slot starts from `open` stepping by `duration`; the last slot ends at or
/// before `close`.
pub fn candidate_slots(open: NaiveTime, close: NaiveTime, duration_minutes: i32) -> Vec<NaiveTime> {
    if duration_minutes <= 0 || open >= close {
        return Vec::new();
    }
    let step = Duration::minutes(duration_minutes as i64);
    let mut slots = Vec::new();
    let mut start = open;
    loop {
        // overflowing_add_signed wraps at midnight; a non-zero wrap ends the day.
        let (end, wrapped) = start.overflowing_add_signed(step);
        if wrapped != 0 || end > close {
            break;
        }
        slots.push(start);
        start = end;
    }
    slots
}

/// Candidate slots minus booked ones; nothing in the past is offered.
pub fn free_slots(
    date: NaiveDate,
    state: &DayState,
    booked: &HashSet<NaiveTime>,
    now: NaiveDateTime,
) -> Vec<NaiveTime> {
    if !state.is_open || date < now.date() {
        return Vec::new();
    }
    candidate_slots(state.open_time, state.close_time, state.slot_duration_minutes)
        .into_iter()
        .filter(|t| !booked.contains(t))
        .filter(|t| date > now.date() || *t > now.time())
        .collect()
}

pub fn format_slot(t: NaiveTime) -> String {
    t.format("%H:%M").to_string()
}

pub fn day_availability(
    date: NaiveDate,
    weekly: &[WeeklySetting],
    overrides: &[DateOverride],
    booked: &HashSet<NaiveTime>,
    now: NaiveDateTime,
) -> DayAvailability {
    let state = resolve_day(date, weekly, overrides);
    let slots = free_slots(date, &state, booked, now);
    DayAvailability {
        date,
        is_open: state.is_open,
        reason: state.reason.clone(),
        slot_duration_minutes: state.slot_duration_minutes,
        slots: slots.into_iter().map(format_slot).collect(),
    }
}

pub struct AvailabilityService;

impl AvailabilityService {
    /// Free slots for a single date.
    pub async fn for_date(
        pool: &PgPool,
        tenant: &str,
        date: NaiveDate,
    ) -> Result<DayAvailability, AppError> {
        let (weekly, overrides, mut booked) = Self::load(pool, tenant, date, date, None).await?;
        let booked = booked.remove(&date).unwrap_or_default();
        Ok(day_availability(date, &weekly, &overrides, &booked, clock::now()))
    }

    /// Free slot counts per date in `[from, to]`.
    pub async fn for_range(
        pool: &PgPool,
        tenant: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DateSummary>, AppError> {
        if to < from {
            return Err(AppError::validation("'to' must not be before 'from'"));
        }
        if (to - from).num_days() >= MAX_RANGE_DAYS {
            return Err(AppError::validation(format!(
                "Range may span at most {MAX_RANGE_DAYS} days"
            )));
        }

        let (weekly, overrides, booked) = Self::load(pool, tenant, from, to, None).await?;
        let now = clock::now();
        let empty = HashSet::new();

        Ok(from
            .iter_days()
            .take_while(|d| *d <= to)
            .map(|date| {
                let state = resolve_day(date, &weekly, &overrides);
                let taken = booked.get(&date).unwrap_or(&empty);
                DateSummary {
                    date,
                    available_slots: free_slots(date, &state, taken, now).len(),
                }
            })
            .collect())
    }

    /// Whether `time` on `date` is an open, unbooked slot. `exclude` ignores
    /// one appointment's own booking (used when rescheduling).
    pub async fn is_slot_available(
        pool: &PgPool,
        tenant: &str,
        date: NaiveDate,
        time: NaiveTime,
        exclude: Option<Uuid>,
    ) -> Result<bool, AppError> {
        let (weekly, overrides, mut booked) = Self::load(pool, tenant, date, date, exclude).await?;
        let booked = booked.remove(&date).unwrap_or_default();
        let state = resolve_day(date, &weekly, &overrides);
        Ok(free_slots(date, &state, &booked, clock::now()).contains(&time))
    }

    /// Slot length in effect on `date`, used for the appointment row.
    pub async fn slot_duration(pool: &PgPool, tenant: &str, date: NaiveDate) -> Result<i32, AppError> {
        let weekly = ScheduleService::weekly_settings(pool, tenant).await?;
        Ok(weekly
            .iter()
            .find(|s| s.day_of_week == day_of_week(date))
            .map_or(DEFAULT_SLOT_MINUTES, |s| s.slot_duration_minutes))
    }

    async fn load(
        pool: &PgPool,
        tenant: &str,
        from: NaiveDate,
        to: NaiveDate,
        exclude: Option<Uuid>,
    ) -> Result<
        (
            Vec<WeeklySetting>,
            Vec<DateOverride>,
            HashMap<NaiveDate, HashSet<NaiveTime>>,
        ),
        AppError,
    > {
        let schema = schema_name(tenant);
        let weekly = ScheduleService::weekly_settings(pool, tenant).await?;
        let overrides = ScheduleService::overrides_between(pool, tenant, from, to).await?;

        let rows: Vec<(NaiveDate, NaiveTime)> = sqlx::query_as(&format!(
            r#"SELECT appointment_date, appointment_time
               FROM "{schema}".appointments
               WHERE appointment_date BETWEEN $1 AND $2
                 AND status <> 'cancelled'
                 AND ($3::UUID IS NULL OR id <> $3)"#
        ))
        .bind(from)
        .bind(to)
        .bind(exclude)
        .fetch_all(pool)
        .await?;

        let mut booked: HashMap<NaiveDate, HashSet<NaiveTime>> = HashMap::new();
        for (date, time) in rows {
            booked.entry(date).or_default().insert(time);
        }
        Ok((weekly, overrides, booked))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    /// A moment well before every date used below.
    fn long_ago() -> NaiveDateTime {
        d(2020, 1, 1).and_hms_opt(0, 0, 0).unwrap()
    }

    fn weekly() -> Vec<WeeklySetting> {
        (0..7)
            .map(|day| WeeklySetting {
                day_of_week: day,
                is_open: (1..=5).contains(&day),
                open_time: if day == 2 { t(10, 0) } else { t(9, 0) },
                close_time: t(17, 0),
                slot_duration_minutes: 60,
            })
            .collect()
    }

    fn closure(date: NaiveDate) -> DateOverride {
        DateOverride {
            id: Uuid::new_v4(),
            date,
            end_date: None,
            is_closed: true,
            open_time: None,
            close_time: None,
            reason: None,
            is_recurring: false,
            recurrence_day_of_week: None,
            show_on_website: true,
            created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    fn special_hours(date: NaiveDate, open: NaiveTime, close: NaiveTime) -> DateOverride {
        DateOverride {
            is_closed: false,
            open_time: Some(open),
            close_time: Some(close),
            ..closure(date)
        }
    }

    fn slots(av: &DayAvailability) -> Vec<&str> {
        av.slots.iter().map(String::as_str).collect()
    }

    // 2026-11-03 is a Tuesday.
    const TUESDAY: (i32, u32, u32) = (2026, 11, 3);

    fn tuesday() -> NaiveDate {
        d(TUESDAY.0, TUESDAY.1, TUESDAY.2)
    }

    #[test]
    fn tuesday_ten_to_five_gives_hourly_slots() {
        let av = day_availability(tuesday(), &weekly(), &[], &HashSet::new(), long_ago());
        assert!(av.is_open);
        assert_eq!(
            slots(&av),
            vec!["10:00", "11:00", "12:00", "13:00", "14:00", "15:00", "16:00"]
        );
    }

    #[test]
    fn booking_removes_exactly_that_slot() {
        let booked: HashSet<_> = [t(14, 0)].into_iter().collect();
        let av = day_availability(tuesday(), &weekly(), &[], &booked, long_ago());
        assert_eq!(
            slots(&av),
            vec!["10:00", "11:00", "12:00", "13:00", "15:00", "16:00"]
        );
    }

    #[test]
    fn closed_weekday_has_no_slots() {
        let sunday = d(2026, 11, 1);
        let av = day_availability(sunday, &weekly(), &[], &HashSet::new(), long_ago());
        assert!(!av.is_open);
        assert!(av.slots.is_empty());
    }

    #[test]
    fn closed_override_has_no_slots() {
        let mut o = closure(tuesday());
        o.reason = Some("Inventory".into());
        let av = day_availability(tuesday(), &weekly(), &[o], &HashSet::new(), long_ago());
        assert!(!av.is_open);
        assert!(av.slots.is_empty());
        assert_eq!(av.reason.as_deref(), Some("Inventory"));
    }

    #[test]
    fn special_hours_open_a_closed_weekday() {
        let saturday = d(2026, 11, 7);
        let o = special_hours(saturday, t(10, 0), t(12, 0));
        let av = day_availability(saturday, &weekly(), &[o], &HashSet::new(), long_ago());
        assert!(av.is_open);
        assert_eq!(slots(&av), vec!["10:00", "11:00"]);
    }

    #[test]
    fn last_slot_must_fit_before_closing() {
        assert_eq!(candidate_slots(t(9, 0), t(10, 30), 45), vec![t(9, 0), t(9, 45)]);
        assert!(candidate_slots(t(9, 0), t(9, 30), 45).is_empty());
        assert!(candidate_slots(t(17, 0), t(9, 0), 60).is_empty());
        assert!(candidate_slots(t(9, 0), t(17, 0), 0).is_empty());
    }

    #[test]
    fn slots_never_wrap_past_midnight() {
        let s = candidate_slots(t(22, 0), NaiveTime::from_hms_opt(23, 59, 59).unwrap(), 60);
        assert_eq!(s, vec![t(22, 0)]);
    }

    #[test]
    fn past_dates_and_elapsed_slots_are_not_offered() {
        let now = tuesday().and_hms_opt(12, 30, 0).unwrap();
        let av = day_availability(tuesday(), &weekly(), &[], &HashSet::new(), now);
        assert_eq!(slots(&av), vec!["13:00", "14:00", "15:00", "16:00"]);

        let yesterday = tuesday().pred_opt().unwrap();
        let av = day_availability(yesterday, &weekly(), &[], &HashSet::new(), now);
        assert!(av.slots.is_empty());
    }

    #[test]
    fn range_override_covers_every_day_in_it() {
        let mut o = closure(d(2026, 12, 24));
        o.end_date = Some(d(2026, 12, 31));
        for day in 24..=31 {
            let state = resolve_day(d(2026, 12, day), &weekly(), std::slice::from_ref(&o));
            assert!(!state.is_open, "Dec {day} should be closed");
        }
        assert!(resolve_day(d(2027, 1, 4), &weekly(), &[o]).is_open);
    }

    #[test]
    fn yearly_override_repeats_on_the_same_day() {
        let mut o = closure(d(2024, 12, 25));
        o.is_recurring = true;
        // Christmas 2026 is a Friday.
        assert!(!resolve_day(d(2026, 12, 25), &weekly(), std::slice::from_ref(&o)).is_open);
        assert!(resolve_day(d(2026, 12, 24), &weekly(), std::slice::from_ref(&o)).is_open);
        // Not before the anchor year.
        assert!(resolve_day(d(2023, 12, 25), &weekly(), &[o]).is_open);
    }

    #[test]
    fn yearly_range_spanning_new_year() {
        let mut o = closure(d(2025, 12, 30));
        o.end_date = Some(d(2026, 1, 2));
        o.is_recurring = true;
        let overrides = [o];
        assert!(applicable_override(d(2027, 12, 31), &overrides).is_some());
        assert!(applicable_override(d(2028, 1, 1), &overrides).is_some());
        assert!(applicable_override(d(2028, 1, 3), &overrides).is_none());
        assert!(applicable_override(d(2027, 12, 29), &overrides).is_none());
    }

    #[test]
    fn leap_day_yearly_override_skips_common_years() {
        let mut o = closure(d(2024, 2, 29));
        o.is_recurring = true;
        let overrides = [o];
        assert!(applicable_override(d(2028, 2, 29), &overrides).is_some());
        assert!(applicable_override(d(2027, 2, 28), &overrides).is_none());
        assert!(applicable_override(d(2027, 3, 1), &overrides).is_none());
    }

    #[test]
    fn weekly_override_applies_from_its_start_date() {
        let mut o = closure(d(2026, 11, 10));
        o.recurrence_day_of_week = Some(2);
        o.end_date = Some(d(2026, 11, 30));
        let overrides = [o];
        assert!(applicable_override(tuesday(), &overrides).is_none());
        assert!(applicable_override(d(2026, 11, 10), &overrides).is_some());
        assert!(applicable_override(d(2026, 11, 24), &overrides).is_some());
        assert!(applicable_override(d(2026, 12, 1), &overrides).is_none());
        // Wednesday is unaffected.
        assert!(applicable_override(d(2026, 11, 11), &overrides).is_none());
    }

    #[test]
    fn precedence_single_then_range_then_yearly_then_weekly() {
        let date = tuesday();

        let mut weekly_o = closure(d(2026, 1, 6));
        weekly_o.recurrence_day_of_week = Some(2);
        weekly_o.reason = Some("weekly".into());

        let mut yearly_o = special_hours(d(2025, 11, 3), t(9, 0), t(10, 0));
        yearly_o.is_recurring = true;
        yearly_o.reason = Some("yearly".into());

        let mut range_o = special_hours(d(2026, 11, 1), t(11, 0), t(13, 0));
        range_o.end_date = Some(d(2026, 11, 8));
        range_o.reason = Some("range".into());

        let single_o = DateOverride {
            reason: Some("single".into()),
            ..special_hours(date, t(15, 0), t(17, 0))
        };

        let mut all = vec![weekly_o.clone()];
        assert_eq!(resolve_day(date, &weekly(), &all).reason.as_deref(), Some("weekly"));
        all.push(yearly_o);
        assert_eq!(resolve_day(date, &weekly(), &all).reason.as_deref(), Some("yearly"));
        all.push(range_o);
        assert_eq!(resolve_day(date, &weekly(), &all).reason.as_deref(), Some("range"));
        all.push(single_o);
        let state = resolve_day(date, &weekly(), &all);
        assert_eq!(state.reason.as_deref(), Some("single"));
        assert_eq!(candidate_slots(state.open_time, state.close_time, 60), vec![t(15, 0), t(16, 0)]);
    }

    #[test]
    fn narrower_range_wins() {
        let mut wide = closure(d(2026, 10, 1));
        wide.end_date = Some(d(2026, 12, 31));
        let mut narrow = special_hours(d(2026, 11, 2), t(9, 0), t(11, 0));
        narrow.end_date = Some(d(2026, 11, 6));
        narrow.reason = Some("narrow".into());
        let overrides = [wide, narrow];
        let chosen = applicable_override(tuesday(), &overrides).unwrap();
        assert_eq!(chosen.reason.as_deref(), Some("narrow"));
    }

    #[test]
    fn newest_single_override_wins_a_tie() {
        let older = closure(tuesday());
        let newer = DateOverride {
            created_at: Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap(),
            ..special_hours(tuesday(), t(9, 0), t(12, 0))
        };
        assert!(resolve_day(tuesday(), &weekly(), &[older, newer]).is_open);
    }
}
