//! A standalone reference RTI for manual testing and local development,
//! built on the same [`federate_rt::rti_stub`] module this crate's own
//! integration tests use.

use std::net::{Ipv4Addr, TcpListener};

use anyhow::Context;
use clap::Parser;
use federate_rt::rti_stub::{run_stub_rti, StubConfig};
use federate_rt::Instant;

#[derive(Parser, Debug)]
#[command(about = "Minimal reference RTI for federate-rt")]
struct Args {
    /// Federation id federates must present to be admitted.
    #[arg(long, default_value = "default_federation")]
    federation_id: String,

    /// Number of federates to wait for before granting the first TAGs.
    #[arg(long, default_value_t = 1)]
    number_of_federates: usize,

    /// TCP port to listen on.
    #[arg(long, default_value_t = 15045)]
    port: u16,

    /// Coordinated start time, in nanoseconds since the federation origin.
    #[arg(long, default_value_t = 0)]
    start_time_ns: i64,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, args.port))
        .with_context(|| format!("failed to bind RTI listener on port {}", args.port))?;

    tracing::info!(
        federation_id = %args.federation_id,
        number_of_federates = args.number_of_federates,
        port = args.port,
        "starting stub RTI"
    );

    run_stub_rti(
        listener,
        StubConfig {
            federation_id: args.federation_id,
            number_of_federates: args.number_of_federates,
            start_time: Instant::from_nanos(args.start_time_ns),
        },
    )
    .context("stub RTI exited with an error")
}
