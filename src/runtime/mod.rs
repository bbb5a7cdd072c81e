//! Single-threaded networking runtime.
//!
//! A mio poller (epoll on Linux, kqueue on macOS) owns every socket. The
//! loop turns readiness into completion events and hands them to protocol
//! handlers:
//! - `StreamHandler`: per-connection TCP state machines
//! - `DatagramHandler`: per-socket UDP request/reply
//! - `Connection`: write queue and state for one accepted stream
//! - `Token`: endpoint and connection correlation

mod connection;
mod event_loop;
mod handler;
pub mod protocol;
mod timer;
mod token;

pub use event_loop::EventLoop;
pub use handler::{Action, DatagramAction, DatagramHandler, DisconnectReason, StreamHandler};
pub use protocol::ServiceContext;

use std::io;
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::counters::ByteCounters;
use crate::memory::{MemoryUsage, ProcessMemory};
use crate::status::{self, StatusReporter};

/// Bind every endpoint, announce readiness and serve until a fatal error.
pub fn run(config: Config) -> io::Result<()> {
    let counters = ByteCounters::new();
    let memory: Arc<dyn MemoryUsage> = Arc::new(ProcessMemory);

    let context = ServiceContext::new(&config, Arc::clone(&counters), Arc::clone(&memory));
    let reporter = StatusReporter::stdout(Arc::clone(&counters), Arc::clone(&memory));
    let event_loop = EventLoop::bind(&config, context, reporter)?;

    // Markers go out only after all four endpoints are bound.
    status::write_startup_banner(&mut io::stdout().lock(), memory.bytes())?;
    info!("Service ready");

    event_loop.run()
}
