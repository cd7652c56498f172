//! Broken-down calendar tuples and the calendar helpers the occurrence
//! search leans on. All decomposition happens on the UTC calendar; zone
//! conversion is confined to one-shot literal parsing.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Timelike, Utc};

/// A mutable calendar tuple, `struct tm` style: month is 0-based, day is
/// 1-based. Round-trips with [`DateTime<Utc>`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimePoint {
    pub year: i32,
    /// 0 = January .. 11 = December.
    pub month: u32,
    /// 1-based day of month.
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    pub millisecond: u32,
}

impl TimePoint {
    pub fn from_utc(dt: &DateTime<Utc>) -> Self {
        Self {
            year: dt.year(),
            month: dt.month0(),
            day: dt.day(),
            hour: dt.hour(),
            minute: dt.minute(),
            second: dt.second(),
            millisecond: dt.timestamp_subsec_millis(),
        }
    }

    /// Convert back to an absolute instant. `None` when the tuple does not
    /// name a real calendar time (e.g. February 30th).
    pub fn to_utc(&self) -> Option<DateTime<Utc>> {
        Utc.with_ymd_and_hms(
            self.year,
            self.month + 1,
            self.day,
            self.hour,
            self.minute,
            self.second,
        )
        .single()
        .map(|dt| dt + chrono::Duration::milliseconds(self.millisecond as i64))
    }

    /// Day of week with Sunday = 0.
    pub fn weekday(&self) -> u32 {
        weekday0(self.year, self.month, self.day)
    }
}

/// Day of week (Sunday = 0) for a (year, 0-based month, 1-based day) triple.
pub(crate) fn weekday0(year: i32, month0: u32, day: u32) -> u32 {
    NaiveDate::from_ymd_opt(year, month0 + 1, day)
        .map(|d| d.weekday().num_days_from_sunday())
        .unwrap_or(0)
}

/// Days in the given 0-based month, proleptic Gregorian.
pub(crate) fn days_in_month(year: i32, month0: u32) -> u32 {
    match month0 {
        0 | 2 | 4 | 6 | 7 | 9 | 11 => 31,
        3 | 5 | 8 | 10 => 30,
        1 => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
        _ => 0,
    }
}

pub(crate) fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}
