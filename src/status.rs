//! Startup banner and periodic status reports.
//!
//! Both go to stdout rather than the log: an external harness watches for
//! the readiness markers verbatim and in order.

use std::fmt;
use std::io::{self, Write};
use std::sync::Arc;
use tracing::{debug, info};

use crate::counters::{ByteCounters, CounterSnapshot};
use crate::memory::MemoryUsage;

/// Synchronization markers printed once every endpoint is bound.
pub const READINESS_MARKERS: [&str; 6] = [
    "Ready to start",
    "Ready for ARP",
    "Ready for UDP",
    "Ready for ICMP",
    "Ready for TCP",
    "Ready to end",
];

fn megabytes(bytes: u64) -> f64 {
    bytes as f64 / 1_000_000.0
}

/// Write the startup banner followed by the readiness markers.
pub fn write_startup_banner<W: Write>(out: &mut W, memory_bytes: u64) -> io::Result<()> {
    writeln!(out, "*** TEST SERVICE STARTED *** ")?;
    writeln!(
        out,
        "Current memory usage: {} b, ({:.6} MB) ",
        memory_bytes,
        megabytes(memory_bytes)
    )?;
    for marker in READINESS_MARKERS {
        writeln!(out, "{marker}")?;
    }
    out.flush()
}

/// One status block.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub stack_status: String,
    pub memory_bytes: u64,
    pub counters: CounterSnapshot,
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "<Service> TCP STATUS:\n{} ", self.stack_status)?;
        writeln!(
            f,
            "Current memory usage: {} b, ({:.6} MB) ",
            self.memory_bytes,
            megabytes(self.memory_bytes)
        )?;
        writeln!(
            f,
            "Recv: {} Sent: {}",
            self.counters.received, self.counters.sent
        )
    }
}

/// Prints a [`StatusReport`] each time the event loop's status timer fires.
pub struct StatusReporter {
    counters: Arc<ByteCounters>,
    memory: Arc<dyn MemoryUsage>,
    out: Box<dyn Write + Send>,
}

impl StatusReporter {
    pub fn new(
        counters: Arc<ByteCounters>,
        memory: Arc<dyn MemoryUsage>,
        out: Box<dyn Write + Send>,
    ) -> Self {
        Self {
            counters,
            memory,
            out,
        }
    }

    /// Report to stdout.
    pub fn stdout(counters: Arc<ByteCounters>, memory: Arc<dyn MemoryUsage>) -> Self {
        Self::new(counters, memory, Box::new(io::stdout()))
    }

    pub fn snapshot(&self, stack_status: String) -> StatusReport {
        StatusReport {
            stack_status,
            memory_bytes: self.memory.bytes(),
            counters: self.counters.snapshot(),
        }
    }

    /// Print one report. Output failures are logged and otherwise ignored.
    pub fn report(&mut self, stack_status: String) {
        let report = self.snapshot(stack_status);

        info!(
            memory_bytes = report.memory_bytes,
            received = report.counters.received,
            sent = report.counters.sent,
            "Status report"
        );

        if let Err(e) = write!(self.out, "{report}").and_then(|_| self.out.flush()) {
            debug!(error = %e, "Failed to print status report");
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};

    /// Cloneable in-memory writer.
    #[derive(Clone, Default)]
    pub struct SharedBuf(pub Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        pub fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::SharedBuf;
    use super::*;
    use crate::memory::FixedMemory;

    #[test]
    fn test_readiness_markers_in_order() {
        let mut out = Vec::new();
        write_startup_banner(&mut out, 2_500_000).unwrap();
        let text = String::from_utf8(out).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "*** TEST SERVICE STARTED *** ");
        assert_eq!(lines[1], "Current memory usage: 2500000 b, (2.500000 MB) ");
        assert_eq!(&lines[2..], &READINESS_MARKERS[..]);
    }

    #[test]
    fn test_report_format() {
        let report = StatusReport {
            stack_status: "LISTENERS:\n".to_string(),
            memory_bytes: 1_500_000,
            counters: CounterSnapshot {
                received: 18,
                sent: 512,
            },
        };

        assert_eq!(
            report.to_string(),
            "<Service> TCP STATUS:\nLISTENERS:\n \n\
             Current memory usage: 1500000 b, (1.500000 MB) \n\
             Recv: 18 Sent: 512\n"
        );
    }

    #[test]
    fn test_reporter_reads_live_counters() {
        let counters = ByteCounters::new();
        let buf = SharedBuf::default();
        let mut reporter = StatusReporter::new(
            Arc::clone(&counters),
            Arc::new(FixedMemory(4_000_000)),
            Box::new(buf.clone()),
        );

        reporter.report("first".to_string());
        counters.record_received(100);
        counters.record_sent(40);
        reporter.report("second".to_string());

        let text = buf.contents();
        assert!(text.contains("Recv: 0 Sent: 0\n"));
        assert!(text.contains("Recv: 100 Sent: 40\n"));
        assert!(text.contains("Current memory usage: 4000000 b, (4.000000 MB) "));
        assert_eq!(text.matches("<Service> TCP STATUS:").count(), 2);
    }

    #[test]
    fn test_report_survives_broken_output() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let mut reporter =
            StatusReporter::new(ByteCounters::new(), Arc::new(FixedMemory(1)), Box::new(Broken));
        reporter.report(String::new());
    }
}
