/// Scheduling module - computes when each recurring probe is due
///
/// This module is responsible for:
/// - Holding the fixed set of recurring jobs
/// - Producing due `(deadline, job)` pairs in chronological order
/// - Pacing the schedule against the wall clock when enabled
pub mod engine;
pub mod job;

pub use engine::{ScheduleCursor, ScheduleEngine, ScheduleError};
pub use job::Job;
