//! Driver tests — run real per-second schedules against the tokio clock.
//!
//! These are deliberately slow (each waits for wall-clock second
//! boundaries); the assertions leave margin for timer jitter but not for
//! semantic drift: run budgets and overlap protection are checked exactly.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chime::{scheduled_jobs, CatchPolicy, Job, JobResult, Schedule, ScheduleOptions};
use chrono::{SecondsFormat, Utc};

fn named(name: &str) -> ScheduleOptions {
    ScheduleOptions {
        name: Some(name.to_string()),
        ..Default::default()
    }
}

async fn noop(_job: Job, _ctx: Option<serde_json::Value>) -> JobResult {
    Ok(())
}

/// Poll `cond` until it holds or `timeout` elapses.
async fn wait_for(cond: impl Fn() -> bool, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    cond()
}

#[tokio::test]
async fn fires_every_second_until_run_budget_is_spent() {
    let count = Arc::new(AtomicUsize::new(0));
    let seen = count.clone();
    let options = ScheduleOptions {
        max_runs: Some(2),
        ..Default::default()
    };
    let job = Schedule::with_options("* * * * * *", options)
        .unwrap()
        .schedule(move |_job, _ctx| {
            let seen = seen.clone();
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .unwrap();

    assert!(wait_for(|| count.load(Ordering::SeqCst) == 2, Duration::from_secs(4)).await);
    // Budget spent: the next second boundary must not add a third run.
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(count.load(Ordering::SeqCst), 2);
    assert!(!job.is_running());
    assert!(!job.is_stopped(), "an exhausted job is idle, not stopped");
}

#[tokio::test]
async fn paused_job_skips_callbacks_until_resumed() {
    let count = Arc::new(AtomicUsize::new(0));
    let seen = count.clone();
    let options = ScheduleOptions {
        paused: true,
        ..Default::default()
    };
    let job = Schedule::with_options("* * * * * *", options)
        .unwrap()
        .schedule(move |_job, _ctx| {
            let seen = seen.clone();
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .unwrap();

    // Two second boundaries pass without an invocation.
    tokio::time::sleep(Duration::from_millis(2200)).await;
    assert_eq!(count.load(Ordering::SeqCst), 0);
    assert!(!job.is_running());

    assert!(job.resume());
    assert!(wait_for(|| count.load(Ordering::SeqCst) >= 1, Duration::from_secs(3)).await);
    assert!(job.is_running());

    assert!(job.pause());
    let at_pause = count.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(2200)).await;
    // At most one in-flight tick may still land right after pause().
    assert!(count.load(Ordering::SeqCst) <= at_pause + 1);

    job.stop();
    assert!(!job.pause(), "pause after stop reports failure");
    assert!(!job.resume(), "resume after stop reports failure");
}

#[tokio::test]
async fn stop_frees_the_registry_name_for_reuse() {
    let job = Schedule::with_options("* * * * * *", named("registry-reuse"))
        .unwrap()
        .schedule(noop)
        .unwrap();

    let duplicate = Schedule::with_options("* * * * * *", named("registry-reuse"))
        .unwrap()
        .schedule(noop);
    assert!(matches!(
        duplicate,
        Err(chime::ScheduleError::DuplicateName { .. })
    ));

    assert!(scheduled_jobs()
        .iter()
        .any(|j| j.name() == Some("registry-reuse")));

    job.stop();
    assert!(job.is_stopped());
    assert!(scheduled_jobs()
        .iter()
        .all(|j| j.name() != Some("registry-reuse")));

    let reclaimed = Schedule::with_options("* * * * * *", named("registry-reuse"))
        .unwrap()
        .schedule(noop)
        .unwrap();
    reclaimed.stop();
}

#[tokio::test]
async fn unnamed_jobs_are_not_registered() {
    let job = Schedule::new("* * * * * *").unwrap().schedule(noop).unwrap();
    // Only named jobs ever appear in the registry view.
    assert!(scheduled_jobs().iter().all(|j| j.name().is_some()));
    job.stop();
}

#[tokio::test]
async fn overlap_protection_bounds_concurrent_invocations() {
    // The callback outlives the one-second tick interval, so every other
    // tick arrives while the previous invocation is still in flight.
    let slow = |count: Arc<AtomicUsize>| {
        move |_job: Job, _ctx: Option<serde_json::Value>| {
            let count = count.clone();
            async move {
                count.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(1100)).await;
                Ok(())
            }
        }
    };

    let protected = Arc::new(AtomicUsize::new(0));
    let options = ScheduleOptions {
        protect: true,
        ..Default::default()
    };
    let job = Schedule::with_options("* * * * * *", options)
        .unwrap()
        .schedule(slow(protected.clone()))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(3500)).await;
    job.stop();
    assert_eq!(protected.load(Ordering::SeqCst), 2);

    let unprotected = Arc::new(AtomicUsize::new(0));
    let job = Schedule::new("* * * * * *")
        .unwrap()
        .schedule(slow(unprotected.clone()))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(3500)).await;
    job.stop();
    assert!(unprotected.load(Ordering::SeqCst) > 2);
}

#[tokio::test]
async fn busy_flag_and_run_instants_track_invocations() {
    let job = Schedule::new("* * * * * *")
        .unwrap()
        .schedule(|_job, _ctx| async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok(())
        })
        .unwrap();

    assert!(wait_for(|| job.is_busy(), Duration::from_millis(2500)).await);
    assert!(job.current_run().is_some());

    // Pause so no new tick starts while the in-flight one drains.
    assert!(job.pause());
    assert!(wait_for(|| !job.is_busy(), Duration::from_millis(1000)).await);
    assert!(job.current_run().is_none());
    assert!(job.previous_run().is_some());
    job.stop();
}

#[tokio::test]
async fn context_reaches_every_invocation() {
    let received = Arc::new(Mutex::new(None));
    let sink = received.clone();
    let options = ScheduleOptions {
        context: Some(serde_json::json!({ "db": "main" })),
        ..Default::default()
    };
    let job = Schedule::with_options("* * * * * *", options)
        .unwrap()
        .schedule(move |_job, ctx| {
            let sink = sink.clone();
            async move {
                *sink.lock().unwrap() = ctx;
                Ok(())
            }
        })
        .unwrap();

    assert!(
        wait_for(
            || received.lock().unwrap().is_some(),
            Duration::from_millis(2500)
        )
        .await
    );
    assert_eq!(
        received.lock().unwrap().clone(),
        Some(serde_json::json!({ "db": "main" }))
    );
    job.stop();
}

#[tokio::test]
async fn catch_handler_receives_callback_errors() {
    let messages = Arc::new(Mutex::new(Vec::new()));
    let sink = messages.clone();
    let options = ScheduleOptions {
        max_runs: Some(1),
        catch: CatchPolicy::Handler(Arc::new(move |error| {
            sink.lock().unwrap().push(error.to_string());
        })),
        ..Default::default()
    };
    let _job = Schedule::with_options("* * * * * *", options)
        .unwrap()
        .schedule(|_job, _ctx| async move { Err("disk full".into()) })
        .unwrap();

    assert!(
        wait_for(
            || !messages.lock().unwrap().is_empty(),
            Duration::from_millis(2500)
        )
        .await
    );
    assert_eq!(messages.lock().unwrap().as_slice(), ["disk full"]);
}

#[tokio::test]
async fn trigger_runs_immediately_even_while_paused() {
    let count = Arc::new(AtomicUsize::new(0));
    let seen = count.clone();
    let options = ScheduleOptions {
        paused: true,
        ..Default::default()
    };
    let job = Schedule::with_options("0 0 0 1 1 *", options)
        .unwrap()
        .schedule(move |_job, _ctx| {
            let seen = seen.clone();
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .unwrap();

    job.trigger().await;
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert!(job.previous_run().is_some());
    assert!(!job.is_busy());
    job.stop();
}

#[tokio::test]
async fn callback_can_stop_its_own_job() {
    let count = Arc::new(AtomicUsize::new(0));
    let seen = count.clone();
    let job = Schedule::new("* * * * * *")
        .unwrap()
        .schedule(move |job, _ctx| {
            let seen = seen.clone();
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
                job.stop();
                Ok(())
            }
        })
        .unwrap();

    assert!(wait_for(|| count.load(Ordering::SeqCst) == 1, Duration::from_secs(4)).await);
    assert!(wait_for(|| job.is_stopped(), Duration::from_millis(500)).await);
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn near_future_one_shot_fires_exactly_once() {
    let count = Arc::new(AtomicUsize::new(0));
    let seen = count.clone();
    let at = (Utc::now() + chrono::Duration::seconds(2))
        .to_rfc3339_opts(SecondsFormat::Secs, true);
    let job = Schedule::new(&at)
        .unwrap()
        .schedule(move |_job, _ctx| {
            let seen = seen.clone();
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
        .unwrap();

    assert!(wait_for(|| count.load(Ordering::SeqCst) == 1, Duration::from_secs(4)).await);
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert!(!job.is_running(), "a spent one-shot has nothing armed");
}
