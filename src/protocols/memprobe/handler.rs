//! Memory probe handlers for the stream and datagram channels.

use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, error, warn};

use super::parser::{self, Probe};
use crate::config::MemsizePolicy;
use crate::counters::ByteCounters;
use crate::memory::MemoryUsage;
use crate::runtime::{Action, DatagramAction, DatagramHandler, DisconnectReason, StreamHandler};

/// Answers the first read on a connection with the memory usage line.
pub struct TcpMemProbeHandler {
    read_size: usize,
    replied: bool,
    counters: Arc<ByteCounters>,
    memory: Arc<dyn MemoryUsage>,
}

impl TcpMemProbeHandler {
    pub fn new(read_size: usize, counters: Arc<ByteCounters>, memory: Arc<dyn MemoryUsage>) -> Self {
        Self {
            read_size,
            replied: false,
            counters,
            memory,
        }
    }
}

impl StreamHandler for TcpMemProbeHandler {
    fn on_accept(&mut self, _peer: SocketAddr) -> Action {
        Action::Read(self.read_size)
    }

    fn on_read_complete(&mut self, data: &[u8]) -> Action {
        self.counters.record_received(data.len());
        if self.replied {
            return Action::Continue;
        }

        let reply = parser::response_line(self.memory.bytes());
        debug!(reply = reply.trim_end(), "TCP memory probe: reporting memory size");
        self.replied = true;
        Action::Write(vec![Bytes::from(reply)])
    }

    fn on_write_complete(&mut self, n: usize) -> Action {
        self.counters.record_sent(n);
        Action::AwaitClose
    }

    fn on_disconnect(&mut self, reason: DisconnectReason) {
        debug!(%reason, "TCP memory probe connection closed");
    }
}

/// Answers `memsize` datagrams with the memory usage figure.
pub struct UdpMemProbeHandler {
    policy: MemsizePolicy,
    counters: Arc<ByteCounters>,
    memory: Arc<dyn MemoryUsage>,
}

impl UdpMemProbeHandler {
    pub fn new(policy: MemsizePolicy, counters: Arc<ByteCounters>, memory: Arc<dyn MemoryUsage>) -> Self {
        Self {
            policy,
            counters,
            memory,
        }
    }
}

impl DatagramHandler for UdpMemProbeHandler {
    fn on_datagram(&mut self, peer: SocketAddr, payload: &[u8]) -> DatagramAction {
        self.counters.record_received(payload.len());

        match parser::parse(payload) {
            Probe::Memsize => {
                let reply = parser::response_datagram(self.memory.bytes());
                debug!(peer = %peer, reply = %reply, "UDP memory probe: reporting memory size");
                DatagramAction::Reply(Bytes::from(reply))
            }
            Probe::Invalid => match self.policy {
                MemsizePolicy::Abort => {
                    error!(peer = %peer, bytes = payload.len(), "UDP memory probe payload is not memsize");
                    DatagramAction::Fatal(format!(
                        "memory probe from {peer} sent {:?}, expected \"memsize\"",
                        String::from_utf8_lossy(payload)
                    ))
                }
                MemsizePolicy::ErrorReply => {
                    warn!(peer = %peer, bytes = payload.len(), "UDP memory probe payload is not memsize");
                    DatagramAction::Reply(Bytes::from_static(parser::response_error()))
                }
            },
        }
    }

    fn on_reply_sent(&mut self, n: usize) {
        self.counters.record_sent(n);
    }
}
