//! Expression compiler: turns a six-field cron expression (or an ISO-8601
//! fixed-instant literal) into bit-per-value acceptance sets.

use chrono::{DateTime, NaiveDateTime, TimeZone, Timelike, Utc};

use crate::error::ScheduleError;

/// Domain description for one expression field, in source order.
struct FieldSpec {
    name: &'static str,
    min: u32,
    max: u32,
    names: Option<&'static [(&'static str, u32)]>,
    allow_last: bool,
}

const SECONDS: FieldSpec = FieldSpec {
    name: "second",
    min: 0,
    max: 59,
    names: None,
    allow_last: false,
};
const MINUTES: FieldSpec = FieldSpec {
    name: "minute",
    min: 0,
    max: 59,
    names: None,
    allow_last: false,
};
const HOURS: FieldSpec = FieldSpec {
    name: "hour",
    min: 0,
    max: 23,
    names: None,
    allow_last: false,
};
const DAYS: FieldSpec = FieldSpec {
    name: "day-of-month",
    min: 1,
    max: 31,
    names: None,
    allow_last: true,
};
const MONTHS: FieldSpec = FieldSpec {
    name: "month",
    min: 1,
    max: 12,
    names: Some(&MONTH_NAMES),
    allow_last: false,
};
const WEEKDAYS: FieldSpec = FieldSpec {
    name: "day-of-week",
    min: 0,
    max: 7,
    names: Some(&DAY_NAMES),
    allow_last: false,
};

const MONTH_NAMES: [(&str, u32); 12] = [
    ("JAN", 1),
    ("FEB", 2),
    ("MAR", 3),
    ("APR", 4),
    ("MAY", 5),
    ("JUN", 6),
    ("JUL", 7),
    ("AUG", 8),
    ("SEP", 9),
    ("OCT", 10),
    ("NOV", 11),
    ("DEC", 12),
];
const DAY_NAMES: [(&str, u32); 7] = [
    ("SUN", 0),
    ("MON", 1),
    ("TUE", 2),
    ("WED", 3),
    ("THU", 4),
    ("FRI", 5),
    ("SAT", 6),
];

/// Compiled acceptance sets, one bit per value.
///
/// Days of month use bits 1..=31, months bits 1..=12, weekdays bits 0..=7
/// with Sunday at both ends (bit 0 is forced on whenever bit 7 is).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldTable {
    pub(crate) seconds: u64,
    pub(crate) minutes: u64,
    pub(crate) hours: u32,
    pub(crate) days: u32,
    pub(crate) months: u16,
    pub(crate) weekdays: u8,
    /// `L`: the last calendar day of whatever month is under examination.
    pub(crate) last_day: bool,
    /// The day-of-month field was something other than `*`.
    pub(crate) day_restricted: bool,
    /// The day-of-week field was something other than `*`.
    pub(crate) weekday_restricted: bool,
}

impl FieldTable {
    pub(crate) fn accepts_day(&self, v: u32) -> bool {
        bit(self.days as u64, v)
    }

    pub(crate) fn accepts_weekday(&self, v: u32) -> bool {
        bit(self.weekdays as u64, v)
    }

    pub(crate) fn next_second(&self, from: u32) -> Option<u32> {
        seek(self.seconds, from, 59)
    }

    pub(crate) fn next_minute(&self, from: u32) -> Option<u32> {
        seek(self.minutes, from, 59)
    }

    pub(crate) fn next_hour(&self, from: u32) -> Option<u32> {
        seek(self.hours as u64, from, 23)
    }

    pub(crate) fn next_month(&self, from: u32) -> Option<u32> {
        seek(self.months as u64, from, 12)
    }

    pub(crate) fn first_second(&self) -> u32 {
        self.seconds.trailing_zeros()
    }

    pub(crate) fn first_minute(&self) -> u32 {
        self.minutes.trailing_zeros()
    }

    pub(crate) fn first_hour(&self) -> u32 {
        self.hours.trailing_zeros()
    }
}

fn bit(mask: u64, v: u32) -> bool {
    v < 64 && mask >> v & 1 == 1
}

/// Smallest set bit at or above `from`, within the field domain.
fn seek(mask: u64, from: u32, max: u32) -> Option<u32> {
    if from > max {
        return None;
    }
    let shifted = mask >> from;
    if shifted == 0 {
        None
    } else {
        Some(from + shifted.trailing_zeros())
    }
}

/// A compiled schedule expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    /// Recurring six-field expression.
    Recurring(FieldTable),
    /// Single fixed instant parsed from an ISO-8601 literal; exhausted after
    /// it has been emitted once.
    At(DateTime<Utc>),
}

impl Pattern {
    /// Compile `expr`. `tz` resolves naive one-shot literals (those without
    /// a trailing `Z` or numeric offset).
    pub(crate) fn parse(expr: &str, tz: Option<chrono_tz::Tz>) -> Result<Self, ScheduleError> {
        let trimmed = expr.trim();
        if trimmed.is_empty() {
            return Err(ScheduleError::WrongFieldCount { found: 0 });
        }
        if let Some(rest) = trimmed.strip_prefix('@') {
            let expansion =
                alias_expansion(rest).ok_or_else(|| ScheduleError::UnknownAlias {
                    alias: trimmed.to_string(),
                })?;
            return Self::parse(expansion, tz);
        }

        let text = trimmed.to_ascii_uppercase();
        let fields: Vec<&str> = text.split_whitespace().collect();
        if fields.len() == 1 && looks_like_instant(fields[0]) {
            return parse_instant(fields[0], tz).map(Pattern::At);
        }
        if fields.len() != 6 {
            return Err(ScheduleError::WrongFieldCount {
                found: fields.len(),
            });
        }

        let seconds = parse_field(fields[0], &SECONDS)?;
        let minutes = parse_field(fields[1], &MINUTES)?;
        let hours = parse_field(fields[2], &HOURS)?;
        let days = parse_field(fields[3], &DAYS)?;
        let months = parse_field(fields[4], &MONTHS)?;
        let mut weekdays = parse_field(fields[5], &WEEKDAYS)?;
        // 0 and 7 both mean Sunday.
        if weekdays.mask & (1 << 7) != 0 {
            weekdays.mask |= 1;
        }

        Ok(Pattern::Recurring(FieldTable {
            seconds: seconds.mask,
            minutes: minutes.mask,
            hours: hours.mask as u32,
            days: days.mask as u32,
            months: months.mask as u16,
            weekdays: weekdays.mask as u8,
            last_day: days.last,
            day_restricted: days.restricted,
            weekday_restricted: weekdays.restricted,
        }))
    }
}

fn alias_expansion(name: &str) -> Option<&'static str> {
    match name.to_ascii_lowercase().as_str() {
        "yearly" | "annually" => Some("0 0 0 1 1 *"),
        "monthly" => Some("0 0 0 1 * *"),
        "weekly" => Some("0 0 0 * * 0"),
        "daily" => Some("0 0 0 * * *"),
        "hourly" => Some("0 0 * * * *"),
        _ => None,
    }
}

/// A lone token with date/time punctuation is treated as a fixed-instant
/// literal rather than a truncated field list.
fn looks_like_instant(token: &str) -> bool {
    token.contains('T') || token.contains(':') || token.contains('-')
}

fn parse_instant(
    text: &str,
    tz: Option<chrono_tz::Tz>,
) -> Result<DateTime<Utc>, ScheduleError> {
    let invalid = || ScheduleError::InvalidIsoLiteral {
        literal: text.to_string(),
    };
    // An explicit offset (or trailing Z) pins the instant directly.
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(truncate_to_second(dt.with_timezone(&Utc)));
    }
    let naive = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .map_err(|_| invalid())?;
    let resolved = match tz {
        // Ambiguous local times take the earlier mapping; times inside a
        // DST gap do not exist and are rejected.
        Some(tz) => tz
            .from_local_datetime(&naive)
            .earliest()
            .ok_or_else(invalid)?
            .with_timezone(&Utc),
        None => Utc.from_utc_datetime(&naive),
    };
    Ok(truncate_to_second(resolved))
}

fn truncate_to_second(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.with_nanosecond(0).unwrap_or(dt)
}

struct ParsedField {
    mask: u64,
    last: bool,
    restricted: bool,
}

fn parse_field(text: &str, spec: &FieldSpec) -> Result<ParsedField, ScheduleError> {
    if text == "*" {
        return Ok(ParsedField {
            mask: full_mask(spec),
            last: false,
            restricted: false,
        });
    }
    let text = match spec.names {
        Some(names) => substitute_names(text, names),
        None => text.to_string(),
    };
    for ch in text.chars() {
        let ok = ch.is_ascii_digit()
            || matches!(ch, ',' | '-' | '*' | '/')
            || (spec.allow_last && ch == 'L');
        if !ok {
            return Err(ScheduleError::IllegalCharacter {
                field: spec.name,
                ch,
            });
        }
    }

    let mut mask = 0u64;
    let mut last = false;
    for atom in text.split(',') {
        if atom.is_empty() {
            return Err(ScheduleError::InvalidField {
                field: spec.name,
                value: text.clone(),
            });
        }
        if atom == "L" {
            last = true;
            continue;
        }
        if atom == "*" {
            mask |= full_mask(spec);
            continue;
        }
        if let Some((base, step)) = atom.split_once('/') {
            let step: u32 = step.parse().map_err(|_| ScheduleError::InvalidStep {
                field: spec.name,
                step: step.to_string(),
            })?;
            let domain = spec.max - spec.min + 1;
            if step == 0 || step > domain {
                return Err(ScheduleError::InvalidStep {
                    field: spec.name,
                    step: step.to_string(),
                });
            }
            let (from, to) = if base == "*" {
                (spec.min, spec.max)
            } else if let Some((a, b)) = base.split_once('-') {
                parse_range(a, b, spec)?
            } else {
                (parse_value(base, spec)?, spec.max)
            };
            let mut v = from;
            while v <= to {
                mask |= 1 << v;
                v += step;
            }
            continue;
        }
        if let Some((a, b)) = atom.split_once('-') {
            let (from, to) = parse_range(a, b, spec)?;
            for v in from..=to {
                mask |= 1 << v;
            }
            continue;
        }
        let v = parse_value(atom, spec)?;
        mask |= 1 << v;
    }

    if mask == 0 && !last {
        return Err(ScheduleError::InvalidField {
            field: spec.name,
            value: text.clone(),
        });
    }
    Ok(ParsedField {
        mask,
        last,
        restricted: true,
    })
}

fn substitute_names(text: &str, names: &[(&str, u32)]) -> String {
    let mut out = text.to_string();
    for (name, value) in names {
        if out.contains(name) {
            out = out.replace(name, &value.to_string());
        }
    }
    out
}

fn parse_range(a: &str, b: &str, spec: &FieldSpec) -> Result<(u32, u32), ScheduleError> {
    let invalid = || ScheduleError::InvalidRange {
        field: spec.name,
        atom: format!("{a}-{b}"),
    };
    let from: u32 = a.parse().map_err(|_| invalid())?;
    let to: u32 = b.parse().map_err(|_| invalid())?;
    if from > to {
        return Err(invalid());
    }
    check_bounds(from, spec)?;
    check_bounds(to, spec)?;
    Ok((from, to))
}

fn parse_value(text: &str, spec: &FieldSpec) -> Result<u32, ScheduleError> {
    let v: u32 = text.parse().map_err(|_| ScheduleError::InvalidField {
        field: spec.name,
        value: text.to_string(),
    })?;
    check_bounds(v, spec)?;
    Ok(v)
}

fn check_bounds(v: u32, spec: &FieldSpec) -> Result<(), ScheduleError> {
    if v < spec.min || v > spec.max {
        return Err(ScheduleError::OutOfRange {
            field: spec.name,
            value: v,
            min: spec.min,
            max: spec.max,
        });
    }
    Ok(())
}

fn full_mask(spec: &FieldSpec) -> u64 {
    let mut mask = 0;
    for v in spec.min..=spec.max {
        mask |= 1 << v;
    }
    mask
}
