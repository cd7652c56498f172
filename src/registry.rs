//! Process-wide map of named jobs. Entries are weak: the registry never
//! keeps a job alive, and dead entries are pruned on each insertion.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{LazyLock, Mutex, Weak};

use crate::error::ScheduleError;
use crate::job::{Job, JobInner};

static JOBS: LazyLock<Mutex<HashMap<String, Weak<JobInner>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Atomically claim `name`. Fails when another live job already holds it.
pub(crate) fn register(name: &str, handle: Weak<JobInner>) -> Result<(), ScheduleError> {
    let mut jobs = JOBS.lock().expect("job registry poisoned");
    jobs.retain(|_, entry| entry.strong_count() > 0);
    match jobs.entry(name.to_string()) {
        Entry::Occupied(_) => Err(ScheduleError::DuplicateName {
            name: name.to_string(),
        }),
        Entry::Vacant(slot) => {
            slot.insert(handle);
            Ok(())
        }
    }
}

pub(crate) fn unregister(name: &str) {
    JOBS.lock().expect("job registry poisoned").remove(name);
}

/// Live named jobs; stopped or dropped jobs do not appear.
pub fn scheduled_jobs() -> Vec<Job> {
    JOBS.lock()
        .expect("job registry poisoned")
        .values()
        .filter_map(Weak::upgrade)
        .map(Job::from_inner)
        .filter(|job| !job.is_stopped())
        .collect()
}
