use clap::Parser;
use tracing_subscriber::EnvFilter;

use linact_gantry::runtime::{self, RuntimeOptions};

/// Serve the linear-actuator gantry over zenoh
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Use the in-memory controller instead of real hardware
    #[arg(long)]
    simulate: bool,

    /// Serial port of the motion controller (skips USB discovery)
    #[arg(long)]
    port: Option<String>,

    /// End velocity applied to every axis on initialize
    #[arg(long)]
    velocity: Option<u32>,
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init(); // installs the subscriber globally

    let args = Args::parse();
    let options = RuntimeOptions {
        simulate: args.simulate,
        port: args.port,
        velocity: args.velocity,
    };

    if let Err(e) = runtime::run(options).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
