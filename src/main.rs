//! stress-service: a small multi-protocol network service for stress runs
//!
//! Endpoints:
//! - HTTP page on TCP (default port 80)
//! - UDP echo (default port 4242)
//! - Memory probe on TCP and UDP (default port 4243)
//!
//! Features:
//! - Byte counters for HTTP and memory-probe traffic
//! - Periodic status report with stack, memory and counter figures
//! - Readiness markers on stdout once every endpoint is bound
//! - Configuration via CLI arguments or TOML file

mod config;
mod counters;
mod memory;
mod protocols;
mod runtime;
mod status;

use config::Config;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging. stdout carries the banner and status reports.
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    info!(
        host = %config.host,
        http_port = config.http_port,
        echo_port = config.echo_port,
        mem_tcp_port = config.mem_tcp_port,
        mem_udp_port = config.mem_udp_port,
        memsize_policy = ?config.memsize_policy,
        status_interval_secs = config.status_interval.as_secs(),
        "Starting stress service"
    );

    runtime::run(config)?;
    Ok(())
}
