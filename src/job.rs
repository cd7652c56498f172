//! Job driver: repeatedly arms a timer for the schedule's next occurrence,
//! invokes the user callback, and tracks run state. One tokio task per job;
//! the callback itself is spawned so a slow action never delays arming.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::error::ScheduleError;
use crate::registry;
use crate::schedule::Schedule;

/// Outcome of one callback invocation.
pub type JobResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Boxed user action: receives the job handle (so the action can stop its
/// own job) and the opaque context value.
pub type JobCallback =
    Arc<dyn Fn(Job, Option<serde_json::Value>) -> BoxFuture<'static, JobResult> + Send + Sync>;

/// What to do with an error returned by the callback. The job keeps
/// scheduling in every case.
#[derive(Clone, Default)]
pub enum CatchPolicy {
    /// Report through `tracing::error!`.
    #[default]
    Log,
    /// Discard silently.
    Swallow,
    /// Hand the error to a user function.
    Handler(Arc<dyn Fn(Box<dyn std::error::Error + Send + Sync>) + Send + Sync>),
}

impl fmt::Debug for CatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Log => f.write_str("Log"),
            Self::Swallow => f.write_str("Swallow"),
            Self::Handler(_) => f.write_str("Handler(..)"),
        }
    }
}

/// Longest delay a single timer arming may cover. Anything longer is split
/// into silent re-arm checkpoints that do not invoke the callback.
pub(crate) const MAX_ARM: Duration = Duration::from_millis(i32::MAX as u64);

/// Returns the delay to arm and whether the wake-up is a checkpoint rather
/// than a real tick.
pub(crate) fn clamp_arm(delay: Duration) -> (Duration, bool) {
    if delay > MAX_ARM {
        (MAX_ARM, true)
    } else {
        (delay, false)
    }
}

#[derive(Debug)]
struct RunState {
    paused: bool,
    stopped: bool,
    /// A timer is (or will be) armed for a future occurrence.
    armed: bool,
    runs_left: Option<i64>,
    in_flight: u32,
    current_run: Option<DateTime<Utc>>,
    previous_run: Option<DateTime<Utc>>,
}

pub(crate) struct JobInner {
    schedule: Schedule,
    callback: JobCallback,
    state: Mutex<RunState>,
    stop_signal: Notify,
}

/// Handle to a scheduled job. Clones share the same underlying driver.
#[derive(Clone)]
pub struct Job {
    inner: Arc<JobInner>,
}

impl Job {
    /// Register the name (if any), then start the driver task.
    pub(crate) fn spawn(schedule: Schedule, callback: JobCallback) -> Result<Job, ScheduleError> {
        let state = RunState {
            paused: schedule.options().paused,
            stopped: false,
            armed: true,
            runs_left: schedule.options().max_runs,
            in_flight: 0,
            current_run: None,
            previous_run: None,
        };
        let inner = Arc::new(JobInner {
            schedule,
            callback,
            state: Mutex::new(state),
            stop_signal: Notify::new(),
        });
        let job = Job { inner };
        if let Some(name) = job.name() {
            registry::register(name, Arc::downgrade(&job.inner))?;
        }
        tracing::debug!(job = job.display_name(), "job scheduled");
        let driver = job.clone();
        tokio::spawn(async move { driver.run_loop().await });
        Ok(job)
    }

    pub(crate) fn from_inner(inner: Arc<JobInner>) -> Job {
        Job { inner }
    }

    pub fn schedule(&self) -> &Schedule {
        &self.inner.schedule
    }

    pub fn name(&self) -> Option<&str> {
        self.inner.schedule.options().name.as_deref()
    }

    fn display_name(&self) -> &str {
        self.name().unwrap_or("<unnamed>")
    }

    fn state(&self) -> MutexGuard<'_, RunState> {
        self.inner.state.lock().expect("job state poisoned")
    }

    /// Terminal. Cancels the armed timer, suppresses further arming, and
    /// frees the registry name. A currently running invocation is not
    /// interrupted.
    pub fn stop(&self) {
        {
            let mut st = self.state();
            if st.stopped {
                return;
            }
            st.stopped = true;
            st.armed = false;
        }
        if let Some(name) = self.name() {
            registry::unregister(name);
        }
        self.inner.stop_signal.notify_one();
        tracing::debug!(job = self.display_name(), "job stopped");
    }

    /// Timers keep firing while paused; the callback is skipped. Returns
    /// false once the job is stopped.
    pub fn pause(&self) -> bool {
        let mut st = self.state();
        if st.stopped {
            return false;
        }
        st.paused = true;
        true
    }

    /// Returns false once the job is stopped.
    pub fn resume(&self) -> bool {
        let mut st = self.state();
        if st.stopped {
            return false;
        }
        st.paused = false;
        true
    }

    /// Armed for a future occurrence, not paused, not stopped.
    pub fn is_running(&self) -> bool {
        let st = self.state();
        st.armed && !st.paused && !st.stopped
    }

    pub fn is_stopped(&self) -> bool {
        self.state().stopped
    }

    /// An invocation is currently in flight.
    pub fn is_busy(&self) -> bool {
        self.state().in_flight > 0
    }

    /// Instant of the invocation currently executing, if any.
    pub fn current_run(&self) -> Option<DateTime<Utc>> {
        self.state().current_run
    }

    /// Instant of the last completed invocation, if any.
    pub fn previous_run(&self) -> Option<DateTime<Utc>> {
        self.state().previous_run
    }

    /// Invoke the callback once, immediately. Ignores pause and stop state,
    /// the run budget, and the armed timer.
    pub async fn trigger(&self) {
        let now = Utc::now();
        {
            let mut st = self.state();
            st.in_flight += 1;
            st.current_run = Some(now);
        }
        let run_id = Uuid::new_v4();
        tracing::debug!(job = self.display_name(), run_id = %run_id, "invoking callback (triggered)");
        let context = self.inner.schedule.options().context.clone();
        let result = (self.inner.callback)(self.clone(), context).await;
        self.settle(now, result);
    }

    async fn run_loop(self) {
        let mut reference = Utc::now();
        loop {
            if self.is_stopped() {
                break;
            }
            if self.state().runs_left.is_some_and(|n| n <= 0) {
                break;
            }
            let Some(target) = self.inner.schedule.next(Some(reference)) else {
                break;
            };

            // Arm the timer, splitting delays beyond the ceiling into
            // silent re-arms.
            loop {
                let delay = (target - Utc::now()).to_std().unwrap_or(Duration::ZERO);
                let (arm, checkpoint) = clamp_arm(delay);
                tokio::select! {
                    _ = tokio::time::sleep(arm) => {
                        if checkpoint {
                            continue;
                        }
                    }
                    _ = self.inner.stop_signal.notified() => return,
                }
                break;
            }

            if self.is_stopped() {
                break;
            }
            self.fire(target);
            reference = target;
        }
        self.state().armed = false;
    }

    /// One timer expiry. Checks stop, pause, overlap protection, and the
    /// run budget, then spawns the callback.
    fn fire(&self, scheduled_for: DateTime<Utc>) {
        let context = {
            let mut st = self.state();
            if st.stopped {
                return;
            }
            if st.paused {
                tracing::trace!(job = self.display_name(), "tick while paused, skipping callback");
                return;
            }
            if self.inner.schedule.options().protect && st.in_flight > 0 {
                tracing::debug!(
                    job = self.display_name(),
                    "previous invocation still running, skipping tick"
                );
                return;
            }
            match st.runs_left.as_mut() {
                Some(n) if *n <= 0 => return,
                Some(n) => *n -= 1,
                None => {}
            }
            st.in_flight += 1;
            st.current_run = Some(scheduled_for);
            self.inner.schedule.options().context.clone()
        };
        let run_id = Uuid::new_v4();
        let job = self.clone();
        let fut = (self.inner.callback)(job.clone(), context);
        tokio::spawn(async move {
            tracing::debug!(
                job = job.display_name(),
                run_id = %run_id,
                scheduled_for = %scheduled_for,
                "invoking callback"
            );
            let result = fut.await;
            job.settle(scheduled_for, result);
        });
    }

    /// Book-keeping after an invocation resolves, plus error dispatch.
    fn settle(&self, scheduled_for: DateTime<Utc>, result: JobResult) {
        {
            let mut st = self.state();
            st.in_flight -= 1;
            if st.in_flight == 0 {
                st.current_run = None;
            }
            st.previous_run = Some(scheduled_for);
        }
        if let Err(error) = result {
            match &self.inner.schedule.options().catch {
                CatchPolicy::Log => {
                    tracing::error!(job = self.display_name(), error = %error, "job callback failed")
                }
                CatchPolicy::Swallow => {}
                CatchPolicy::Handler(handler) => handler(error),
            }
        }
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let st = self.state();
        f.debug_struct("Job")
            .field("name", &self.name())
            .field("paused", &st.paused)
            .field("stopped", &st.stopped)
            .field("busy", &(st.in_flight > 0))
            .finish()
    }
}
