use std::time::Duration;

/// One recurring probe: how often, and against what.
///
/// Jobs are created once from the parsed programme and live for the process
/// lifetime. The derived ordering (interval first, endpoint second) is the
/// tie-break used when two jobs fall due at the same instant.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Job {
    /// Delay between consecutive executions.
    pub interval: Duration,
    /// Endpoint the probe is issued against.
    pub endpoint: String,
}

impl Job {
    pub fn new(interval: Duration, endpoint: impl Into<String>) -> Self {
        Self { interval, endpoint: endpoint.into() }
    }
}
