use std::collections::VecDeque;
use std::time::Duration;

use tracing::{debug, error, warn};

use super::{ReportSink, SinkError, schema};
use crate::report::Report;

/// Frames buffered locally before `publish` starts refusing reports.
const MAX_PENDING: usize = 1024;
/// How long `flush` keeps retrying before abandoning what is left.
const FLUSH_BUDGET: Duration = Duration::from_secs(2);

/// Report sink backed by a ZeroMQ PUSH socket.
///
/// Sends never block the caller: frames that cannot go out immediately are
/// buffered and retried on `poll`. Each frame is `[topic, key, record]`.
pub struct PushSink {
    name: String,
    topic: String,
    socket: zmq::Socket,
    pending: VecDeque<(String, Vec<u8>)>,
    flush_budget: Duration,
}

impl PushSink {
    /// Connect a PUSH socket to the report bus endpoint.
    pub fn connect(
        ctx: &zmq::Context,
        name: &str,
        endpoint: &str,
        topic: &str,
    ) -> Result<Self, SinkError> {
        let socket = ctx.socket(zmq::PUSH).map_err(disconnected)?;
        socket.set_linger(0).map_err(disconnected)?;
        socket.connect(endpoint).map_err(disconnected)?;
        debug!("{name}: sink connected to {endpoint}");
        Ok(Self {
            name: name.to_string(),
            topic: topic.to_string(),
            socket,
            pending: VecDeque::new(),
            flush_budget: FLUSH_BUDGET,
        })
    }

    #[cfg(test)]
    fn with_flush_budget(mut self, budget: Duration) -> Self {
        self.flush_budget = budget;
        self
    }

    #[cfg(test)]
    fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Attempt one non-blocking send. `false` means the frame should stay
    /// queued; unrecoverable errors are reported and the frame dropped.
    fn try_send(&mut self, key: &str, record: &[u8]) -> bool {
        let frames = [self.topic.as_bytes(), key.as_bytes(), record];
        match self.socket.send_multipart(frames, zmq::DONTWAIT) {
            Ok(()) => true,
            Err(zmq::Error::EAGAIN) => false,
            Err(err) => {
                report_delivery_failure(&self.name, key, &err);
                true
            }
        }
    }
}

impl ReportSink for PushSink {
    fn publish(&mut self, key: &str, report: &Report) -> Result<(), SinkError> {
        let record = serde_json::to_vec(&schema::encode(report))?;

        // Drain the backlog first so frames leave in publish order.
        self.poll();
        if !self.pending.is_empty() {
            if self.pending.len() >= MAX_PENDING {
                return Err(SinkError::Backlogged);
            }
            self.pending.push_back((key.to_string(), record));
            return Ok(());
        }

        if !self.try_send(key, &record) {
            self.pending.push_back((key.to_string(), record));
        }
        Ok(())
    }

    fn poll(&mut self) {
        while let Some((key, record)) = self.pending.front() {
            let key = key.clone();
            let record = record.clone();
            if !self.try_send(&key, &record) {
                break;
            }
            self.pending.pop_front();
        }
    }

    fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let budget = i32::try_from(self.flush_budget.as_millis()).unwrap_or(i32::MAX);
        if let Err(err) = self.socket.set_sndtimeo(budget) {
            warn!("{}: couldn't set flush timeout: {err}", self.name);
        }
        while let Some((key, record)) = self.pending.pop_front() {
            let frames = [self.topic.as_bytes(), key.as_bytes(), record.as_slice()];
            match self.socket.send_multipart(frames, 0) {
                Ok(()) => {}
                Err(zmq::Error::EAGAIN) => {
                    warn!(
                        "{}: flush budget exhausted, abandoning {} undelivered reports",
                        self.name,
                        self.pending.len() + 1
                    );
                    self.pending.clear();
                    return;
                }
                Err(err) => report_delivery_failure(&self.name, &key, &err),
            }
        }
        debug!("{}: sink flushed", self.name);
    }
}

/// Delivery-failure callback: logged only, never handed back to the worker.
fn report_delivery_failure(name: &str, key: &str, err: &zmq::Error) {
    error!("{name}: couldn't publish report about {key}: {err}");
}

fn disconnected(err: zmq::Error) -> SinkError {
    SinkError::Disconnected(err.to_string())
}
