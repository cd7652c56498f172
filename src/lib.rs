//! # chime
//!
//! In-process cron-style job scheduler.
//!
//! ## Features
//!
//! - Six-field expressions (`sec min hour day month weekday`) with lists,
//!   ranges, steps, names (`JAN`, `MON-FRI`), `L` (last day of month) and
//!   the `@hourly`-style aliases.
//! - One-shot schedules from ISO-8601 literals, optionally resolved in an
//!   IANA timezone.
//! - Pure occurrence queries (`next`, `next_n`, `ms_to_next`) usable
//!   without driving anything.
//! - Tokio-backed job driver: pause/resume/stop, manual trigger, overlap
//!   protection, run budgets, start/stop windows, and transparent re-arming
//!   for delays beyond the timer ceiling.
//! - Process-wide registry of named jobs with duplicate rejection.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use chime::Schedule;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), chime::ScheduleError> {
//!     // Weekday mornings at 09:30.
//!     let job = Schedule::new("0 30 9 * * MON-FRI")?.schedule(|_job, _ctx| async move {
//!         println!("good morning");
//!         Ok(())
//!     })?;
//!
//!     // Query without driving: the next three fire times.
//!     for at in job.schedule().next_n(3, None) {
//!         println!("will fire at {at}");
//!     }
//!
//!     job.stop();
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod job;
pub mod registry;
pub mod schedule;

mod advance;
mod pattern;
mod timepoint;

pub use error::ScheduleError;
pub use job::{CatchPolicy, Job, JobResult};
pub use registry::scheduled_jobs;
pub use schedule::{Schedule, ScheduleOptions};
