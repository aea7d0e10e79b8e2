use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use swerve_differential_runtime::config::{DEFAULT_CONFIG_PATH, DEFAULT_MODULE_NAME};
use swerve_differential_runtime::motor::sim::DEFAULT_MAX_VELOCITY;
use swerve_differential_runtime::runtime::{self, RunOptions};

/// Differential swerve module runtime
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// Module configuration file (JSON)
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Module name, used as the topic namespace
    #[arg(short, long, default_value = DEFAULT_MODULE_NAME)]
    module: String,

    /// Velocity limit for each simulated motor, in rotations/sec
    #[arg(long, default_value_t = DEFAULT_MAX_VELOCITY)]
    motor_max_velocity: f64,
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init(); // installs the subscriber globally

    let args = Args::parse();
    let options = RunOptions {
        config_path: args.config,
        module: args.module,
        motor_max_velocity: args.motor_max_velocity,
    };

    if let Err(e) = runtime::run(options).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
