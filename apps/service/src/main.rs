mod cli;
mod config;
mod dispatcher;
mod probe;
mod queue;
mod report;
mod schedule;
mod shutdown;
mod sink;
mod worker;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use crate::cli::Cli;
use crate::probe::HttpProber;
use crate::schedule::ScheduleEngine;
use crate::sink::PushSink;
use crate::sink::registry::{self, TlsMaterial};
use crate::worker::WorkerPool;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    logger::init_tracing(args.verbose);

    let jobs = config::load_programme(&args.programme)?;
    info!("loaded {} probe entries from {}", jobs.len(), args.programme.display());

    if let Some(registry_url) = &args.schema_registry {
        let tls = TlsMaterial {
            key: args.tls_key.clone(),
            cert: args.tls_cert.clone(),
            ca: args.tls_ca.clone(),
        };
        if let Err(err) = registry::register_schema(registry_url, &args.topic, &tls).await {
            // Keep running: publishing fails per-report until the bus side
            // recovers, matching the probe loop's own failure handling.
            error!("schema registration failed at startup: {err:#}");
        }
    }

    let mut engine = ScheduleEngine::new(true);
    for job in jobs {
        engine.add_job(job)?;
    }
    let cursor = engine.start()?;

    let (coordinator, shutdown) = shutdown::coordinator();
    let (work_queue, receiver) = queue::bounded(args.queue_capacity);

    let probe = Arc::new(HttpProber::new());
    let sink_ctx = zmq::Context::new();
    let pool = WorkerPool::spawn(args.workers, receiver, shutdown.clone(), probe, |name| {
        PushSink::connect(&sink_ctx, name, &args.sink_endpoint, &args.topic)
    })?;
    info!("started {} workers", args.workers);

    let mut driver = tokio::spawn(dispatcher::run(cursor, work_queue, shutdown));

    // The shutdown flag has exactly one writer: this supervisor. Workers and
    // the driver only ever observe it.
    tokio::select! {
        signal = termination_signal() => {
            coordinator.trigger(&format!("received {signal}"));
            if let Err(err) = (&mut driver).await {
                error!("schedule driver failed: {err}");
            }
        }
        result = &mut driver => {
            coordinator.trigger("schedule driver exited");
            if let Err(err) = result {
                error!("schedule driver failed: {err}");
            }
        }
    }

    pool.join().await;
    info!("all workers joined, exiting");
    Ok(())
}

async fn termination_signal() -> &'static str {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate()).ok();
    tokio::select! {
        _ = tokio::signal::ctrl_c() => "SIGINT",
        _ = async {
            match sigterm.as_mut() {
                Some(term) => { term.recv().await; }
                None => std::future::pending().await,
            }
        } => "SIGTERM",
    }
}
