use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::probe::ProbeExecutor;
use crate::queue::{Pop, WorkReceiver};
use crate::report::Report;
use crate::shutdown::Shutdown;
use crate::sink::{ReportSink, SinkError};

/// Bounded wait per queue pop; also every worker's shutdown observation
/// latency.
pub const POLL_TIMEOUT: Duration = Duration::from_secs(1);

/// Fixed-size set of probe executors draining the work queue.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `count` workers. Each gets its own sink from `make_sink` and a
    /// shared handle on the probe executor and queue.
    pub fn spawn<P, S, F>(
        count: usize,
        queue: WorkReceiver,
        shutdown: Shutdown,
        probe: Arc<P>,
        mut make_sink: F,
    ) -> Result<Self, SinkError>
    where
        P: ProbeExecutor + 'static,
        S: ReportSink + 'static,
        F: FnMut(&str) -> Result<S, SinkError>,
    {
        let mut handles = Vec::with_capacity(count);
        for n in 0..count {
            let name = format!("worker-{n}");
            let sink = make_sink(&name)?;
            handles.push(tokio::spawn(worker_loop(
                name,
                queue.clone(),
                shutdown.clone(),
                probe.clone(),
                sink,
            )));
        }
        Ok(Self { handles })
    }

    /// Wait for every worker to exit.
    pub async fn join(self) {
        for result in futures::future::join_all(self.handles).await {
            if let Err(err) = result {
                error!("worker task failed: {err}");
            }
        }
    }
}

/// Execute probes until shutdown is observed, then flush the sink once.
///
/// A failed probe never takes the worker down: it is logged, the item is
/// dropped, and the loop continues.
async fn worker_loop<P, S>(
    name: String,
    queue: WorkReceiver,
    shutdown: Shutdown,
    probe: Arc<P>,
    mut sink: S,
) where
    P: ProbeExecutor,
    S: ReportSink,
{
    info!("starting {name}");
    while !shutdown.is_triggered() {
        sink.poll();
        match queue.pop(POLL_TIMEOUT).await {
            Pop::Item(endpoint) => {
                let issued_at = Utc::now();
                match probe.execute(&endpoint).await {
                    Ok(outcome) => {
                        let report = Report {
                            endpoint: endpoint.clone(),
                            status_code: outcome.status_code,
                            issued_at,
                            phase_timings: outcome.timings,
                        };
                        info!(
                            "{name}: {endpoint} returned {} in {:?}",
                            outcome.status_code, outcome.timings.total
                        );
                        if let Err(err) = sink.publish(&endpoint, &report) {
                            error!("{name}: couldn't hand report about {endpoint} to the sink: {err}");
                        }
                    }
                    Err(err) => {
                        warn!("{name}: failed to probe {endpoint}: {err}");
                    }
                }
            }
            Pop::Empty => {
                debug!("{name}: nothing to probe");
            }
            Pop::Closed => {
                // The driver is gone; keep observing shutdown on the same
                // bounded period instead of spinning.
                debug!("{name}: queue closed, waiting for shutdown");
                tokio::time::sleep(POLL_TIMEOUT).await;
            }
        }
    }
    warn!("{name} shutting down");
    sink.flush();
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU64, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::probe::{ProbeError, ProbeOutcome};
    use crate::queue;
    use crate::report::PhaseTimings;
    use crate::shutdown;

    /// Probe double that returns deterministic, strictly increasing timings,
    /// failing on any endpoint containing "fail".
    struct ScriptedProbe {
        calls: AtomicU64,
        delay: Duration,
    }

    impl ScriptedProbe {
        fn new(delay: Duration) -> Self {
            Self { calls: AtomicU64::new(0), delay }
        }
    }

    #[async_trait]
    impl ProbeExecutor for ScriptedProbe {
        async fn execute(&self, endpoint: &str) -> Result<ProbeOutcome, ProbeError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if endpoint.contains("fail") {
                return Err(ProbeError::Connect("scripted failure".to_string()));
            }
            let step = |k: u64| Duration::from_millis(n * 10 + k);
            Ok(ProbeOutcome {
                status_code: 200 + n as u16,
                timings: PhaseTimings {
                    name_resolution: step(1),
                    connect: step(2),
                    tls_handshake: step(3),
                    pretransfer: step(4),
                    time_to_first_byte: step(5),
                    total: step(6),
                },
            })
        }
    }

    #[derive(Default)]
    struct SinkLog {
        published: Vec<(String, Report)>,
        flushes: Vec<String>,
    }

    /// Sink double that records publishes and flushes into a shared log.
    /// A double flush shows up as a duplicate name in `flushes`.
    struct RecordingSink {
        name: String,
        log: Arc<Mutex<SinkLog>>,
    }

    impl ReportSink for RecordingSink {
        fn publish(&mut self, key: &str, report: &Report) -> Result<(), SinkError> {
            self.log.lock().unwrap().published.push((key.to_string(), report.clone()));
            Ok(())
        }

        fn poll(&mut self) {}

        fn flush(&mut self) {
            self.log.lock().unwrap().flushes.push(self.name.clone());
        }
    }

    fn recording_sinks(
        log: &Arc<Mutex<SinkLog>>,
    ) -> impl FnMut(&str) -> Result<RecordingSink, SinkError> + '_ {
        move |name| Ok(RecordingSink { name: name.to_string(), log: log.clone() })
    }

    async fn wait_until(log: &Arc<Mutex<SinkLog>>, published: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if log.lock().unwrap().published.len() >= published {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("workers did not publish in time");
    }

    #[tokio::test(start_paused = true)]
    async fn workers_exit_within_one_poll_and_flush_once() {
        let (_queue, receiver) = queue::bounded(4);
        let (coordinator, shutdown) = shutdown::coordinator();
        let log = Arc::new(Mutex::new(SinkLog::default()));

        let pool = WorkerPool::spawn(
            3,
            receiver,
            shutdown,
            Arc::new(ScriptedProbe::new(Duration::ZERO)),
            recording_sinks(&log),
        )
        .unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        coordinator.trigger("test");

        // Each worker observes the flag within one pop timeout and exits.
        tokio::time::timeout(2 * POLL_TIMEOUT, pool.join()).await.expect("workers hung");

        let mut flushes = log.lock().unwrap().flushes.clone();
        flushes.sort();
        assert_eq!(flushes, vec!["worker-0", "worker-1", "worker-2"]);
    }

    #[tokio::test]
    async fn probe_failure_keeps_the_worker_alive() {
        let (queue, receiver) = queue::bounded(4);
        let (coordinator, shutdown) = shutdown::coordinator();
        let log = Arc::new(Mutex::new(SinkLog::default()));

        let pool = WorkerPool::spawn(
            1,
            receiver,
            shutdown,
            Arc::new(ScriptedProbe::new(Duration::ZERO)),
            recording_sinks(&log),
        )
        .unwrap();

        queue.push("http://fail.example/".to_string()).await.unwrap();
        queue.push("http://ok.example/".to_string()).await.unwrap();
        wait_until(&log, 1).await;

        coordinator.trigger("test");
        pool.join().await;

        let log = log.lock().unwrap();
        assert_eq!(log.published.len(), 1);
        assert_eq!(log.published[0].0, "http://ok.example/");
        assert_eq!(log.flushes, vec!["worker-0"]);
    }

    #[tokio::test]
    async fn reports_carry_dequeue_order_and_timings() {
        let (queue, receiver) = queue::bounded(4);
        let (coordinator, shutdown) = shutdown::coordinator();
        let log = Arc::new(Mutex::new(SinkLog::default()));

        let pool = WorkerPool::spawn(
            1,
            receiver,
            shutdown,
            Arc::new(ScriptedProbe::new(Duration::from_millis(2))),
            recording_sinks(&log),
        )
        .unwrap();

        let endpoints = ["http://u1.example/", "http://u2.example/", "http://u3.example/"];
        for endpoint in endpoints {
            queue.push(endpoint.to_string()).await.unwrap();
        }
        wait_until(&log, 3).await;

        coordinator.trigger("test");
        pool.join().await;

        let log = log.lock().unwrap();
        assert_eq!(log.published.len(), 3);
        for (n, (key, report)) in log.published.iter().enumerate() {
            // The publish key is the probed endpoint.
            assert_eq!(key, endpoints[n]);
            assert_eq!(report.endpoint, endpoints[n]);
            assert_eq!(report.status_code, 201 + n as u16);
            assert_eq!(report.phase_timings.total, Duration::from_millis((n as u64 + 1) * 10 + 6));
        }
        // issued_at is captured at dequeue, so it increases strictly with
        // the submission order.
        for pair in log.published.windows(2) {
            assert!(pair[0].1.issued_at < pair[1].1.issued_at);
        }
        assert_eq!(log.flushes, vec!["worker-0"]);
    }
}
