use tracing::{debug, info, warn};

use crate::queue::WorkQueue;
use crate::schedule::ScheduleCursor;
use crate::shutdown::Shutdown;

/// Drive the schedule, enqueuing each endpoint as it falls due.
///
/// The cursor's sleep is not interrupted by shutdown, so this loop's exit
/// latency is bounded by the longest interval in the programme. A full queue
/// stalls the loop instead of dropping ticks; the schedule drifts and no
/// attempt is made to catch up.
pub async fn run(mut cursor: ScheduleCursor, queue: WorkQueue, shutdown: Shutdown) {
    info!("starting scheduler-0");
    loop {
        let (deadline, job) = cursor.next().await;
        if shutdown.is_triggered() {
            break;
        }
        debug!("queuing probe of {} due at {deadline}", job.endpoint);
        if queue.push(job.endpoint).await.is_err() {
            warn!("work queue closed, stopping the schedule driver");
            break;
        }
    }
    info!("scheduler-0 shutting down");
}
