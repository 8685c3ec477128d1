use std::cmp::Reverse;
use std::collections::BinaryHeap;

use chrono::{DateTime, TimeDelta, Utc};
use thiserror::Error;
use tracing::{debug, info};

use super::job::Job;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("schedule is empty, add at least one job before starting")]
    EmptySchedule,
    #[error("cannot modify or restart a running schedule")]
    AlreadyStarted,
    #[error("job interval must be strictly positive")]
    NonPositiveInterval,
}

/// One armed job: the instant it next falls due.
///
/// Entries are consumed and immediately re-created at `deadline + interval`
/// on every tick; they never outlive the cursor. The derived ordering
/// (deadline first, then the job's own order) is what the min-heap pops by.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct ScheduleEntry {
    deadline: DateTime<Utc>,
    job: Job,
}

/// Holds the fixed job set and turns it into a running schedule.
///
/// Due times are relative to the instant the schedule was started. Accuracy
/// is best-effort: under load the schedule drifts rather than catching up.
pub struct ScheduleEngine {
    jobs: Vec<Job>,
    /// When true, the cursor sleeps until each deadline before yielding it.
    sleep: bool,
    started: bool,
}

impl ScheduleEngine {
    pub fn new(sleep: bool) -> Self {
        Self { jobs: Vec::new(), sleep, started: false }
    }

    /// Add a job to the schedule. Only permitted before the engine starts.
    pub fn add_job(&mut self, job: Job) -> Result<(), ScheduleError> {
        if self.started {
            return Err(ScheduleError::AlreadyStarted);
        }
        if job.interval.is_zero() {
            return Err(ScheduleError::NonPositiveInterval);
        }
        self.jobs.push(job);
        Ok(())
    }

    /// Start the schedule from the current instant.
    pub fn start(&mut self) -> Result<ScheduleCursor, ScheduleError> {
        self.start_at(Utc::now())
    }

    /// Arm every job at `from + interval` and hand back the tick cursor.
    pub fn start_at(&mut self, from: DateTime<Utc>) -> Result<ScheduleCursor, ScheduleError> {
        if self.started {
            return Err(ScheduleError::AlreadyStarted);
        }
        if self.jobs.is_empty() {
            return Err(ScheduleError::EmptySchedule);
        }
        self.started = true;
        info!("starting schedule at {from} with {} jobs", self.jobs.len());

        let mut entries = BinaryHeap::with_capacity(self.jobs.len());
        for job in &self.jobs {
            entries.push(Reverse(ScheduleEntry {
                deadline: arm(from, job),
                job: job.clone(),
            }));
        }
        Ok(ScheduleCursor { entries, sleep: self.sleep })
    }
}

/// Infinite iterator over due `(deadline, job)` pairs in chronological order.
///
/// Jobs due at the same instant come out one per `next` call, smallest
/// `(interval, endpoint)` first; they are never grouped into a batch.
#[derive(Debug)]
pub struct ScheduleCursor {
    entries: BinaryHeap<Reverse<ScheduleEntry>>,
    sleep: bool,
}

impl ScheduleCursor {
    /// Pop the next due entry and re-arm its job one interval later.
    ///
    /// With pacing enabled this suspends until the deadline is reached; the
    /// suspension is not interruptible, which bounds the caller's shutdown
    /// latency by the longest pending interval.
    pub async fn next(&mut self) -> (DateTime<Utc>, Job) {
        let Some(Reverse(entry)) = self.entries.pop() else {
            // start_at() arms one entry per job and every pop re-arms.
            unreachable!("a started cursor always holds one entry per job");
        };
        self.entries.push(Reverse(ScheduleEntry {
            deadline: arm(entry.deadline, &entry.job),
            job: entry.job.clone(),
        }));

        if self.sleep {
            if let Ok(wait) = (entry.deadline - Utc::now()).to_std() {
                debug!("sleeping {wait:?} until next deadline");
                tokio::time::sleep(wait).await;
            }
        }
        (entry.deadline, entry.job)
    }
}

/// `from + interval`, saturating at the end of representable time rather
/// than overflowing on absurd intervals.
fn arm(from: DateTime<Utc>, job: &Job) -> DateTime<Utc> {
    TimeDelta::from_std(job.interval)
        .ok()
        .and_then(|delta| from.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
