use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use url::Url;

use super::{ProbeError, ProbeExecutor, ProbeOutcome};
use crate::report::PhaseTimings;

/// Budgets matching the upstream probe defaults.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const TOTAL_TIMEOUT: Duration = Duration::from_secs(300);

/// HTTP/HTTPS prober that drives the connection one phase at a time so every
/// cumulative mark (resolve, connect, handshake, transfer) is read off a
/// single clock.
///
/// The response body is read and discarded; only its arrival is timed.
pub struct HttpProber {
    tls: TlsConnector,
    connect_timeout: Duration,
    total_timeout: Duration,
}

impl HttpProber {
    pub fn new() -> Self {
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let config =
            ClientConfig::builder().with_root_certificates(roots).with_no_client_auth();
        Self {
            tls: TlsConnector::from(Arc::new(config)),
            connect_timeout: CONNECT_TIMEOUT,
            total_timeout: TOTAL_TIMEOUT,
        }
    }

    async fn run(&self, endpoint: &str) -> Result<ProbeOutcome, ProbeError> {
        let target = Target::parse(endpoint)?;
        let started = Instant::now();

        let setup = tokio::time::timeout(self.connect_timeout, self.setup(&target, started));
        let (mut connection, mut timings) =
            setup.await.map_err(|_| ProbeError::TimedOut(self.connect_timeout))??;

        timings.pretransfer = started.elapsed();
        let request = target.request();
        let (status_code, time_to_first_byte, total) = match &mut connection {
            Connection::Plain(stream) => transfer(stream, request.as_bytes(), started).await?,
            Connection::Tls(stream) => transfer(stream, request.as_bytes(), started).await?,
        };
        timings.time_to_first_byte = time_to_first_byte;
        timings.total = total;

        Ok(ProbeOutcome { status_code, timings })
    }

    /// Resolve, connect and (for https) shake hands, marking each phase.
    async fn setup(
        &self,
        target: &Target,
        started: Instant,
    ) -> Result<(Connection, PhaseTimings), ProbeError> {
        let mut timings = PhaseTimings::default();

        let mut addrs = tokio::net::lookup_host((target.host.as_str(), target.port))
            .await
            .map_err(|err| ProbeError::Resolve(err.to_string()))?;
        let addr = addrs
            .next()
            .ok_or_else(|| ProbeError::Resolve(format!("no address for {}", target.host)))?;
        timings.name_resolution = started.elapsed();

        let stream = TcpStream::connect(addr)
            .await
            .map_err(|err| ProbeError::Connect(err.to_string()))?;
        timings.connect = started.elapsed();

        if !target.https {
            // tls_handshake stays zero for plain HTTP.
            return Ok((Connection::Plain(stream), timings));
        }

        let domain = ServerName::try_from(target.host.clone()).map_err(|_| {
            ProbeError::InvalidEndpoint(target.host.clone(), "not a valid TLS name".to_string())
        })?;
        let stream = self
            .tls
            .connect(domain, stream)
            .await
            .map_err(|err| ProbeError::Tls(err.to_string()))?;
        timings.tls_handshake = started.elapsed();

        Ok((Connection::Tls(Box::new(stream)), timings))
    }
}

#[async_trait]
impl ProbeExecutor for HttpProber {
    async fn execute(&self, endpoint: &str) -> Result<ProbeOutcome, ProbeError> {
        match tokio::time::timeout(self.total_timeout, self.run(endpoint)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ProbeError::TimedOut(self.total_timeout)),
        }
    }
}

enum Connection {
    Plain(TcpStream),
    Tls(Box<tokio_rustls::client::TlsStream<TcpStream>>),
}

struct Target {
    host: String,
    port: u16,
    https: bool,
    path: String,
}

impl Target {
    fn parse(endpoint: &str) -> Result<Self, ProbeError> {
        let invalid = |reason: &str| {
            ProbeError::InvalidEndpoint(endpoint.to_string(), reason.to_string())
        };
        let url = Url::parse(endpoint).map_err(|err| invalid(&err.to_string()))?;
        let https = match url.scheme() {
            "http" => false,
            "https" => true,
            other => return Err(invalid(&format!("unsupported scheme {other:?}"))),
        };
        let host = url.host_str().ok_or_else(|| invalid("missing host"))?.to_string();
        let port = url.port_or_known_default().unwrap_or(if https { 443 } else { 80 });
        let path = match url.query() {
            Some(query) => format!("{}?{query}", url.path()),
            None => url.path().to_string(),
        };
        Ok(Self { host, port, https, path })
    }

    fn request(&self) -> String {
        format!(
            "GET {} HTTP/1.1\r\nHost: {}\r\nUser-Agent: lagwatch/0.1\r\nAccept: */*\r\nConnection: close\r\n\r\n",
            self.path, self.host
        )
    }
}

/// Write the request, then read to EOF, marking first byte and completion.
async fn transfer<S>(
    stream: &mut S,
    request: &[u8],
    started: Instant,
) -> Result<(u16, Duration, Duration), ProbeError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let io_err = |err: std::io::Error| ProbeError::Transfer(err.to_string());

    stream.write_all(request).await.map_err(io_err)?;
    stream.flush().await.map_err(io_err)?;

    let mut buf = vec![0u8; 8192];
    let n = stream.read(&mut buf).await.map_err(io_err)?;
    if n == 0 {
        return Err(ProbeError::Transfer("connection closed before any response".to_string()));
    }
    let time_to_first_byte = started.elapsed();

    // Keep only enough of the head to parse the status line; the rest of the
    // body is drained and discarded.
    let mut head = buf[..n.min(512)].to_vec();
    loop {
        let n = stream.read(&mut buf).await.map_err(io_err)?;
        if n == 0 {
            break;
        }
        if head.len() < 512 {
            head.extend_from_slice(&buf[..n.min(512 - head.len())]);
        }
    }
    let total = started.elapsed();

    Ok((parse_status_line(&head)?, time_to_first_byte, total))
}

fn parse_status_line(head: &[u8]) -> Result<u16, ProbeError> {
    let malformed =
        || ProbeError::Transfer("malformed HTTP status line".to_string());
    let line = head.split(|&b| b == b'\r').next().unwrap_or(head);
    let text = std::str::from_utf8(line).map_err(|_| malformed())?;
    let mut parts = text.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(version), Some(code)) if version.starts_with("HTTP/") => {
            code.parse().map_err(|_| malformed())
        }
        _ => Err(malformed()),
    }
}
