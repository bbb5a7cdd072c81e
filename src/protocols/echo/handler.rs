//! UDP echo handler.

use bytes::Bytes;
use std::net::SocketAddr;
use tracing::trace;

use crate::runtime::{DatagramAction, DatagramHandler};

/// Sends every datagram back to its sender unchanged.
///
/// Not instrumented: echo traffic does not touch the byte counters.
#[derive(Debug, Default)]
pub struct UdpEchoHandler;

impl DatagramHandler for UdpEchoHandler {
    fn on_datagram(&mut self, peer: SocketAddr, payload: &[u8]) -> DatagramAction {
        trace!(peer = %peer, bytes = payload.len(), "Echo");
        DatagramAction::Reply(Bytes::copy_from_slice(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_echo_verbatim() {
        let peer: SocketAddr = "192.168.1.5:9999".parse().unwrap();
        let mut handler = UdpEchoHandler;

        assert_eq!(
            handler.on_datagram(peer, b"ping"),
            DatagramAction::Reply(Bytes::from_static(b"ping"))
        );

        let binary = [0u8, 255, 13, 10, 0];
        assert_eq!(
            handler.on_datagram(peer, &binary),
            DatagramAction::Reply(Bytes::copy_from_slice(&binary))
        );
    }

    #[test]
    fn test_echo_empty_datagram() {
        let peer: SocketAddr = "[::1]:7".parse().unwrap();
        assert_eq!(
            UdpEchoHandler.on_datagram(peer, b""),
            DatagramAction::Reply(Bytes::new())
        );
    }
}
