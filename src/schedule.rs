//! A compiled expression plus options: pure occurrence queries, and the
//! entry point for driving a callback on the schedule.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::advance::next_occurrence;
use crate::error::ScheduleError;
use crate::job::{CatchPolicy, Job, JobCallback, JobResult};
use crate::pattern::Pattern;
use crate::timepoint::TimePoint;

/// Options accepted by [`Schedule::with_options`].
///
/// Deserializes from JSON so job definitions can live in config files.
/// `catch` is skipped there because it may carry a handler closure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleOptions {
    /// Earliest instant the schedule may emit. References before this are
    /// clamped up so an occurrence exactly at `start_at` is still produced.
    pub start_at: Option<DateTime<Utc>>,
    /// Occurrences after this instant are suppressed.
    pub stop_at: Option<DateTime<Utc>>,
    /// Invocation budget; `None` is unbounded, values <= 0 never run.
    pub max_runs: Option<i64>,
    /// Start in the paused state: timers fire but the callback is skipped.
    pub paused: bool,
    /// IANA zone name used to resolve naive one-shot literals. Unknown
    /// names fall back to UTC with a warning.
    pub timezone: Option<String>,
    /// `true` (default): when both day-of-month and day-of-week are
    /// constrained, either may match. `false`: both must match.
    pub legacy_mode: bool,
    /// Skip a tick while the previous invocation is still in flight.
    pub protect: bool,
    /// What to do with errors returned by the callback.
    #[serde(skip)]
    pub catch: CatchPolicy,
    /// Opaque value handed to the callback on every invocation.
    pub context: Option<serde_json::Value>,
    /// Registry name; must be unique among live jobs.
    pub name: Option<String>,
}

impl Default for ScheduleOptions {
    fn default() -> Self {
        Self {
            start_at: None,
            stop_at: None,
            max_runs: None,
            paused: false,
            timezone: None,
            legacy_mode: true,
            protect: false,
            catch: CatchPolicy::default(),
            context: None,
            name: None,
        }
    }
}

/// A compiled schedule expression plus its options. Immutable after
/// construction; clone freely.
#[derive(Debug, Clone)]
pub struct Schedule {
    pattern: Pattern,
    options: ScheduleOptions,
}

impl Schedule {
    pub fn new(expr: &str) -> Result<Self, ScheduleError> {
        Self::with_options(expr, ScheduleOptions::default())
    }

    pub fn with_options(expr: &str, options: ScheduleOptions) -> Result<Self, ScheduleError> {
        let tz = options
            .timezone
            .as_deref()
            .and_then(|name| match name.parse::<chrono_tz::Tz>() {
                Ok(tz) => Some(tz),
                Err(_) => {
                    tracing::warn!(timezone = name, "unknown timezone name, falling back to UTC");
                    None
                }
            });
        let pattern = Pattern::parse(expr, tz)?;
        Ok(Self { pattern, options })
    }

    pub fn options(&self) -> &ScheduleOptions {
        &self.options
    }

    /// Next matching instant strictly after `from` (default: now), at whole-
    /// second precision. `None` when the schedule is exhausted: a one-shot
    /// already emitted or in the past, a spent run budget, `stop_at` passed,
    /// or no occurrence within the search horizon.
    pub fn next(&self, from: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
        if self.options.max_runs.is_some_and(|n| n <= 0) {
            return None;
        }
        let mut from = from.unwrap_or_else(Utc::now);
        if let Some(start) = self.options.start_at {
            // One millisecond early so an occurrence exactly at start_at is
            // still strictly after the clamped reference.
            let threshold = start - chrono::Duration::milliseconds(1);
            if from < threshold {
                from = threshold;
            }
        }
        let next = match &self.pattern {
            Pattern::At(at) => (*at > from).then_some(*at),
            Pattern::Recurring(table) => {
                next_occurrence(table, &TimePoint::from_utc(&from), self.options.legacy_mode)
                    .and_then(|t| t.to_utc())
            }
        }?;
        match self.options.stop_at {
            Some(stop) if next > stop => None,
            _ => Some(next),
        }
    }

    /// Up to `n` occurrences strictly after `from`, each computed from the
    /// previous one. Shorter than `n` when the schedule runs out first.
    pub fn next_n(&self, n: usize, from: Option<DateTime<Utc>>) -> Vec<DateTime<Utc>> {
        let mut out = Vec::with_capacity(n);
        let mut cursor = from;
        for _ in 0..n {
            match self.next(cursor) {
                Some(next) => {
                    cursor = Some(next);
                    out.push(next);
                }
                None => break,
            }
        }
        out
    }

    /// Time remaining until the next occurrence, or `None` when exhausted.
    pub fn ms_to_next(&self, from: Option<DateTime<Utc>>) -> Option<Duration> {
        let from = from.unwrap_or_else(Utc::now);
        let next = self.next(Some(from))?;
        (next - from).to_std().ok()
    }

    /// Drive `callback` on this schedule. Consumes the schedule; clone first
    /// to keep a query handle. Must be called inside a tokio runtime.
    pub fn schedule<F, Fut>(self, callback: F) -> Result<Job, ScheduleError>
    where
        F: Fn(Job, Option<serde_json::Value>) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = JobResult> + Send + 'static,
    {
        let callback: JobCallback = Arc::new(
            move |job, ctx| -> futures::future::BoxFuture<'static, JobResult> {
                Box::pin(callback(job, ctx))
            },
        );
        Job::spawn(self, callback)
    }
}
