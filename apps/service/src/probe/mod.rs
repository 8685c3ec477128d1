/// Probe module - issues a single timed request against an endpoint
///
/// This module is responsible for:
/// - The `ProbeExecutor` contract the workers execute through
/// - The staged HTTP/HTTPS prober and its phase measurements
pub mod http;

pub use http::HttpProber;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::report::PhaseTimings;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("invalid endpoint {0:?}: {1}")]
    InvalidEndpoint(String, String),
    #[error("name resolution failed: {0}")]
    Resolve(String),
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("TLS handshake failed: {0}")]
    Tls(String),
    #[error("transfer failed: {0}")]
    Transfer(String),
    #[error("probe timed out after {0:?}")]
    TimedOut(Duration),
}

/// Status and phase timings observed for one completed probe.
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub status_code: u16,
    pub timings: PhaseTimings,
}

/// Issues one probe against an endpoint and measures its phases.
///
/// Implementations enforce their own connect and total timeouts; the worker
/// loop never imposes any of its own.
#[async_trait]
pub trait ProbeExecutor: Send + Sync {
    async fn execute(&self, endpoint: &str) -> Result<ProbeOutcome, ProbeError>;
}
