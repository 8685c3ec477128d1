/// Sink module - delivery of probe reports to the message bus
///
/// This module is responsible for:
/// - The `ReportSink` contract the workers publish through
/// - The versioned wire schema and its JSON serializer
/// - The ZeroMQ push transport and schema-registry client
pub mod push;
pub mod registry;
pub mod schema;

pub use push::PushSink;

use thiserror::Error;

use crate::report::Report;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink disconnected: {0}")]
    Disconnected(String),
    #[error("sink backlog full, report dropped")]
    Backlogged,
    #[error("report encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Destination for completed probe reports.
///
/// `publish` must never block the worker loop. Delivery failures surface
/// through the sink's own error reporting, not as errors to the caller;
/// what the caller does get back are local conditions it can log.
pub trait ReportSink: Send {
    fn publish(&mut self, key: &str, report: &Report) -> Result<(), SinkError>;

    /// Drive in-flight deliveries forward without blocking.
    fn poll(&mut self);

    /// Block until every pending delivery is resolved, delivered or
    /// abandoned, within the sink's flush budget.
    fn flush(&mut self);
}
