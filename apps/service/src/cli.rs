use std::path::PathBuf;

use clap::Parser;

/// Command-line surface of the probe service.
#[derive(Debug, Parser)]
#[command(name = "lagwatch-service", version, about = "Probe URL latency on a recurring schedule.")]
pub struct Cli {
    /// Number of probe workers.
    #[arg(short = 'W', long, default_value_t = 3, value_name = "N")]
    pub workers: usize,

    /// Capacity of the work queue between the scheduler and the workers.
    #[arg(long, default_value_t = 100, value_name = "N")]
    pub queue_capacity: usize,

    /// Log debug output.
    #[arg(short, long)]
    pub verbose: bool,

    /// ZeroMQ endpoint reports are pushed to.
    #[arg(long, default_value = "tcp://127.0.0.1:5556", value_name = "ADDR")]
    pub sink_endpoint: String,

    /// Topic reports are published under.
    #[arg(long, default_value = "latency-reports", value_name = "NAME")]
    pub topic: String,

    /// Schema registry base URL; the report schema is registered at startup.
    #[arg(long, value_name = "URL")]
    pub schema_registry: Option<String>,

    /// Client TLS key for the schema registry.
    #[arg(long, value_name = "PATH")]
    pub tls_key: Option<PathBuf>,

    /// Client TLS certificate for the schema registry.
    #[arg(long, value_name = "PATH")]
    pub tls_cert: Option<PathBuf>,

    /// CA bundle for the schema registry.
    #[arg(long, value_name = "PATH")]
    pub tls_ca: Option<PathBuf>,

    /// File of probe entries, one `<seconds>,<url>` per line.
    #[arg(value_name = "FILE")]
    pub programme: PathBuf,
}
