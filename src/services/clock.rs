//! Wall-clock time of the business, independent of the host's `TZ`.

use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;

pub const DEFAULT_BUSINESS_TZ: Tz = chrono_tz::Europe::Amsterdam;

static BUSINESS_TZ: OnceLock<Tz> = OnceLock::new();

/// Set once at startup from `Config::business_tz`.
pub fn set_business_timezone(tz: Tz) {
    if BUSINESS_TZ.set(tz).is_err() {
        tracing::warn!("Business timezone already set, ignoring {tz}");
    }
}

pub fn business_timezone() -> Tz {
    BUSINESS_TZ.get().copied().unwrap_or(DEFAULT_BUSINESS_TZ)
}

/// Local date and time in `tz` at `instant`.
pub fn local_at(tz: Tz, instant: DateTime<Utc>) -> NaiveDateTime {
    instant.with_timezone(&tz).naive_local()
}

pub fn now() -> NaiveDateTime {
    local_at(business_timezone(), Utc::now())
}

pub fn today() -> NaiveDate {
    now().date()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, TimeZone};
    use std::collections::HashSet;

    use crate::services::availability::{free_slots, DayState};

    #[test]
    fn utc_instant_maps_to_amsterdam_summer_time() {
        let instant = Utc.with_ymd_and_hms(2026, 7, 1, 7, 30, 0).unwrap();
        let local = local_at(chrono_tz::Europe::Amsterdam, instant);
        assert_eq!(local.time(), NaiveTime::from_hms_opt(9, 30, 0).unwrap());
    }

    #[test]
    fn started_slots_are_judged_in_business_time_not_utc() {
        // 08:30 UTC is 09:30 in Brussels (CEST): the 09:00 slot has started.
        let instant = Utc.with_ymd_and_hms(2026, 7, 1, 8, 30, 0).unwrap();
        let now = local_at(chrono_tz::Europe::Brussels, instant);
        let state = DayState {
            is_open: true,
            open_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            close_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
            slot_duration_minutes: 60,
            reason: None,
        };
        let slots = free_slots(now.date(), &state, &HashSet::new(), now);
        assert_eq!(
            slots,
            vec![
                NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
            ]
        );
    }

    #[test]
    fn date_rolls_over_at_business_midnight() {
        let instant = Utc.with_ymd_and_hms(2026, 12, 31, 23, 30, 0).unwrap();
        let local = local_at(chrono_tz::Europe::Amsterdam, instant);
        assert_eq!(local.date(), NaiveDate::from_ymd_opt(2027, 1, 1).unwrap());
    }
}
