use std::time::Duration;

use chrono::{DateTime, Utc};

/// Cumulative phase marks for one probe, all measured from the same start
/// instant, so each later phase includes every earlier one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseTimings {
    /// Time to resolve the host name.
    pub name_resolution: Duration,
    /// Time to open the TCP connection.
    pub connect: Duration,
    /// Time to finish the TLS handshake; zero for plain HTTP.
    pub tls_handshake: Duration,
    /// Time until the request was ready to send.
    pub pretransfer: Duration,
    /// Time until the first response byte arrived.
    pub time_to_first_byte: Duration,
    /// Time for the whole transfer.
    pub total: Duration,
}

/// Result of one executed probe, handed to the sink and never retained.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub endpoint: String,
    pub status_code: u16,
    /// Instant the probe was dequeued, not when it completed.
    pub issued_at: DateTime<Utc>,
    pub phase_timings: PhaseTimings,
}
