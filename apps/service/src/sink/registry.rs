use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use super::schema;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Client TLS material for the schema registry, straight from the CLI.
#[derive(Debug, Clone, Default)]
pub struct TlsMaterial {
    pub key: Option<PathBuf>,
    pub cert: Option<PathBuf>,
    pub ca: Option<PathBuf>,
}

/// Register the versioned report schema under `subject`.
///
/// Called once at startup, before any worker publishes. The caller decides
/// what a failure means; publishing itself does not depend on the registry.
pub async fn register_schema(base_url: &str, subject: &str, tls: &TlsMaterial) -> Result<()> {
    let client = build_client(tls).await?;
    let url = format!("{}/subjects/{subject}/versions", base_url.trim_end_matches('/'));

    let response = client
        .post(&url)
        .json(&schema::registry_payload(subject))
        .send()
        .await
        .with_context(|| format!("posting schema to {url}"))?;

    let status = response.status();
    if !status.is_success() {
        anyhow::bail!("registry rejected schema for {subject}: {status}");
    }
    info!("registered report schema v{} for {subject}", schema::SCHEMA_VERSION);
    Ok(())
}

async fn build_client(tls: &TlsMaterial) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder().use_rustls_tls().timeout(REQUEST_TIMEOUT);

    if let Some(ca) = &tls.ca {
        let pem = tokio::fs::read(ca)
            .await
            .with_context(|| format!("reading CA bundle {}", ca.display()))?;
        builder = builder.add_root_certificate(
            reqwest::Certificate::from_pem(&pem).context("parsing CA bundle")?,
        );
    }

    if let (Some(cert), Some(key)) = (&tls.cert, &tls.key) {
        let mut pem = tokio::fs::read(cert)
            .await
            .with_context(|| format!("reading client certificate {}", cert.display()))?;
        pem.extend(
            tokio::fs::read(key)
                .await
                .with_context(|| format!("reading client key {}", key.display()))?,
        );
        builder = builder
            .identity(reqwest::Identity::from_pem(&pem).context("parsing client identity")?);
    }

    builder.build().context("building registry client")
}
