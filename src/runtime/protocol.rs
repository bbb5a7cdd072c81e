//! Endpoint protocols and handler construction.
//!
//! Maps each bound endpoint to the handler that serves it. Stream handlers
//! are created once per accepted connection; datagram handlers once per
//! socket.

use std::fmt;
use std::sync::Arc;

use crate::config::{Config, MemsizePolicy};
use crate::counters::ByteCounters;
use crate::memory::MemoryUsage;
use crate::protocols::echo::UdpEchoHandler;
use crate::protocols::http::{HttpHandler, ResponseBuilder};
use crate::protocols::memprobe::{TcpMemProbeHandler, UdpMemProbeHandler};
use crate::runtime::{DatagramHandler, StreamHandler};

/// Transport an endpoint is bound on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Tcp,
    Udp,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Tcp => f.pad("TCP"),
            Transport::Udp => f.pad("UDP"),
        }
    }
}

/// Protocol served on an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Http,
    TcpMemProbe,
    UdpEcho,
    UdpMemProbe,
}

impl Protocol {
    pub const ALL: [Protocol; 4] = [
        Protocol::Http,
        Protocol::TcpMemProbe,
        Protocol::UdpEcho,
        Protocol::UdpMemProbe,
    ];

    pub fn transport(self) -> Transport {
        match self {
            Protocol::Http | Protocol::TcpMemProbe => Transport::Tcp,
            Protocol::UdpEcho | Protocol::UdpMemProbe => Transport::Udp,
        }
    }

    /// Configured port for this protocol.
    pub fn port(self, config: &Config) -> u16 {
        match self {
            Protocol::Http => config.http_port,
            Protocol::TcpMemProbe => config.mem_tcp_port,
            Protocol::UdpEcho => config.echo_port,
            Protocol::UdpMemProbe => config.mem_udp_port,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Http => f.pad("http"),
            Protocol::TcpMemProbe | Protocol::UdpMemProbe => f.pad("memprobe"),
            Protocol::UdpEcho => f.pad("echo"),
        }
    }
}

/// State shared by every handler in the service.
#[derive(Clone)]
pub struct ServiceContext {
    pub counters: Arc<ByteCounters>,
    pub memory: Arc<dyn MemoryUsage>,
    pub responses: Arc<ResponseBuilder>,
    pub read_size: usize,
    pub memsize_policy: MemsizePolicy,
}

impl ServiceContext {
    pub fn new(config: &Config, counters: Arc<ByteCounters>, memory: Arc<dyn MemoryUsage>) -> Self {
        let responses = match config.seed {
            Some(seed) => ResponseBuilder::new(seed),
            None => ResponseBuilder::from_boot_clock(),
        };

        Self {
            counters,
            memory,
            responses: Arc::new(responses),
            read_size: config.read_size,
            memsize_policy: config.memsize_policy,
        }
    }

    /// Handler for a newly accepted connection. `None` for datagram protocols.
    pub fn stream_handler(&self, protocol: Protocol) -> Option<Box<dyn StreamHandler>> {
        match protocol {
            Protocol::Http => Some(Box::new(HttpHandler::new(
                self.read_size,
                Arc::clone(&self.counters),
                Arc::clone(&self.responses),
            ))),
            Protocol::TcpMemProbe => Some(Box::new(TcpMemProbeHandler::new(
                self.read_size,
                Arc::clone(&self.counters),
                Arc::clone(&self.memory),
            ))),
            Protocol::UdpEcho | Protocol::UdpMemProbe => None,
        }
    }

    /// Handler for a bound datagram socket. `None` for stream protocols.
    pub fn datagram_handler(&self, protocol: Protocol) -> Option<Box<dyn DatagramHandler>> {
        match protocol {
            Protocol::UdpEcho => Some(Box::new(UdpEchoHandler)),
            Protocol::UdpMemProbe => Some(Box::new(UdpMemProbeHandler::new(
                self.memsize_policy,
                Arc::clone(&self.counters),
                Arc::clone(&self.memory),
            ))),
            Protocol::Http | Protocol::TcpMemProbe => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::FixedMemory;

    #[test]
    fn test_transports() {
        assert_eq!(Protocol::Http.transport(), Transport::Tcp);
        assert_eq!(Protocol::TcpMemProbe.transport(), Transport::Tcp);
        assert_eq!(Protocol::UdpEcho.transport(), Transport::Udp);
        assert_eq!(Protocol::UdpMemProbe.transport(), Transport::Udp);
    }

    #[test]
    fn test_default_ports() {
        let mut config = Config::for_tests();
        config.http_port = 80;
        config.echo_port = 4242;
        config.mem_tcp_port = 4243;
        config.mem_udp_port = 4243;

        assert_eq!(Protocol::Http.port(&config), 80);
        assert_eq!(Protocol::UdpEcho.port(&config), 4242);
        assert_eq!(Protocol::TcpMemProbe.port(&config), 4243);
        assert_eq!(Protocol::UdpMemProbe.port(&config), 4243);
    }

    #[test]
    fn test_handler_construction_matches_transport() {
        let config = Config::for_tests();
        let context = ServiceContext::new(&config, ByteCounters::new(), Arc::new(FixedMemory(1)));

        for protocol in Protocol::ALL {
            let is_tcp = protocol.transport() == Transport::Tcp;
            assert_eq!(context.stream_handler(protocol).is_some(), is_tcp);
            assert_eq!(context.datagram_handler(protocol).is_some(), !is_tcp);
        }
    }
}
