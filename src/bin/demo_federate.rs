//! Connects a single federate to an RTI (typically the `rti_stub` binary
//! running alongside it) and runs a trivial NET/TAG loop, advancing in
//! fixed logical-time steps and printing each granted tag. Useful for
//! manually exercising the handshake and time-advance protocol without a
//! real code-generated scheduler.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use federate_rt::event_queue::RecordingQueue;
use federate_rt::{FederateConfig, FederateId, FederateRuntime, Instant, NeighborStructure};

#[derive(Parser, Debug)]
#[command(about = "Demo federate for federate-rt")]
struct Args {
    #[arg(long, default_value_t = 0)]
    fed_id: u16,

    #[arg(long, default_value = "default_federation")]
    federation_id: String,

    #[arg(long, default_value = "127.0.0.1")]
    rti_host: Ipv4Addr,

    #[arg(long, default_value_t = 15045)]
    rti_port: u16,

    /// Number of NET/TAG steps to run before requesting a stop.
    #[arg(long, default_value_t = 5)]
    steps: u32,

    /// Logical-time step size, in nanoseconds.
    #[arg(long, default_value_t = 1_000_000_000)]
    step_ns: i64,

    /// Run without waiting for physical time to reach the coordinated start.
    #[arg(long)]
    fast_forward: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let config = FederateConfig::new(
        FederateId::from(args.fed_id),
        args.federation_id.clone(),
        args.rti_host,
    )
    .with_rti_port(args.rti_port)
    .with_fast_forward(args.fast_forward)
    .with_neighbors(NeighborStructure::default());

    let event_queue = Arc::new(RecordingQueue::new(Instant::ZERO));
    let runtime = FederateRuntime::start(config, event_queue)
        .context("federate failed to join the federation")?;

    let mut t = runtime.start_time;
    for step in 1..=args.steps {
        t = t + Duration::from_nanos(args.step_ns as u64);
        let granted = runtime
            .coordinator
            .next_event_time(t)
            .context("next_event_time failed")?;
        tracing::info!(step, requested = %t, granted = %granted, "advanced logical time");
    }

    runtime.request_stop().context("failed to broadcast stop")?;
    Ok(())
}
