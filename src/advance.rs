//! Next-occurrence search: a field cascade over a compiled [`FieldTable`],
//! finest to coarsest, carrying into the next coarser field whenever a
//! field's acceptance set is exhausted.

use crate::pattern::FieldTable;
use crate::timepoint::{days_in_month, weekday0, TimePoint};

/// How many years past the reference the search will roam before giving up.
/// A leap-day pattern pinned to one weekday recurs on a 28-year cycle, so
/// the bound has to sit comfortably above that.
const YEAR_HORIZON: i32 = 50;

/// Smallest accepted time point strictly after `after`, or `None` when the
/// table admits nothing within the search horizon (e.g. February 31st).
pub(crate) fn next_occurrence(
    table: &FieldTable,
    after: &TimePoint,
    legacy: bool,
) -> Option<TimePoint> {
    let horizon = after.year + YEAR_HORIZON;
    let mut t = *after;
    t.millisecond = 0;
    t.second += 1;

    loop {
        if t.year > horizon {
            return None;
        }

        // Seconds.
        match table.next_second(t.second) {
            Some(s) => t.second = s,
            None => {
                t.second = table.first_second();
                t.minute += 1;
                continue;
            }
        }

        // Minutes.
        match table.next_minute(t.minute) {
            Some(m) if m == t.minute => {}
            Some(m) => {
                t.minute = m;
                t.second = table.first_second();
            }
            None => {
                t.minute = table.first_minute();
                t.second = table.first_second();
                t.hour += 1;
                continue;
            }
        }

        // Hours.
        match table.next_hour(t.hour) {
            Some(h) if h == t.hour => {}
            Some(h) => {
                t.hour = h;
                t.minute = table.first_minute();
                t.second = table.first_second();
            }
            None => {
                t.hour = table.first_hour();
                t.minute = table.first_minute();
                t.second = table.first_second();
                t.day += 1;
                continue;
            }
        }

        // Day of month, with the weekday constraint folded in.
        let dim = days_in_month(t.year, t.month);
        match next_day(table, &t, dim, legacy) {
            Some(d) if d == t.day => {}
            Some(d) => {
                t.day = d;
                t.hour = table.first_hour();
                t.minute = table.first_minute();
                t.second = table.first_second();
            }
            None => {
                t.day = 1;
                t.hour = table.first_hour();
                t.minute = table.first_minute();
                t.second = table.first_second();
                t.month += 1;
                if t.month > 11 {
                    t.month = 0;
                    t.year += 1;
                }
                continue;
            }
        }

        // Month. Any jump invalidates the day found above, so re-enter the
        // cascade instead of returning.
        match table.next_month(t.month + 1) {
            Some(m) if m == t.month + 1 => return Some(t),
            Some(m) => {
                t.month = m - 1;
                t.day = 1;
                t.hour = table.first_hour();
                t.minute = table.first_minute();
                t.second = table.first_second();
                continue;
            }
            None => {
                t.year += 1;
                t.month = 0;
                t.day = 1;
                t.hour = table.first_hour();
                t.minute = table.first_minute();
                t.second = table.first_second();
                continue;
            }
        }
    }
}

/// First acceptable day at or after `t.day` in `t`'s month.
///
/// A day passes when its day-of-month and day-of-week constraints agree:
/// both must hold, except in legacy mode with both fields constrained,
/// where either one suffices. The `L` sentinel admits the month's last day.
fn next_day(table: &FieldTable, t: &TimePoint, dim: u32, legacy: bool) -> Option<u32> {
    (t.day..=dim).find(|&d| {
        let dom_ok = table.accepts_day(d) || (table.last_day && d == dim);
        let dow_ok = table.accepts_weekday(weekday0(t.year, t.month, d));
        if legacy && table.day_restricted && table.weekday_restricted {
            dom_ok || dow_ok
        } else {
            dom_ok && dow_ok
        }
    })
}
