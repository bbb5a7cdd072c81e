//! Event interfaces between the runtime and protocol handlers.
//!
//! The runtime owns the sockets and turns readiness into completion
//! events. A stream handler sees exactly four events per connection and
//! answers each with an [`Action`]; a datagram handler sees one event per
//! datagram and answers with a [`DatagramAction`].

use bytes::Bytes;
use std::fmt;
use std::io;
use std::net::SocketAddr;

/// What the runtime should do next with a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Issue one read of up to this many bytes.
    Read(usize),
    /// Queue these buffers for sequential writing. Each buffer produces its
    /// own write completion.
    Write(Vec<Bytes>),
    /// Nothing new; keep draining queued writes.
    Continue,
    /// Stop reading requests and wait for the peer to close.
    AwaitClose,
    /// Close the connection now.
    Close,
}

/// Why a connection ended.
#[derive(Debug)]
pub enum DisconnectReason {
    /// The peer closed its side.
    PeerClosed,
    /// The handler asked for the close.
    Local,
    /// A socket operation failed.
    Error(io::Error),
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectReason::PeerClosed => write!(f, "peer closed"),
            DisconnectReason::Local => write!(f, "closed locally"),
            DisconnectReason::Error(e) => write!(f, "error: {e}"),
        }
    }
}

/// Per-connection protocol logic driven by TCP completion events.
pub trait StreamHandler: Send {
    /// A peer connected.
    fn on_accept(&mut self, peer: SocketAddr) -> Action;

    /// A read issued via [`Action::Read`] delivered these bytes.
    ///
    /// After [`Action::AwaitClose`] or [`Action::Close`] the runtime keeps
    /// reading until the peer closes. Those bytes are reported here too, and
    /// the returned action is ignored.
    fn on_read_complete(&mut self, data: &[u8]) -> Action;

    /// One buffer queued via [`Action::Write`] was fully written.
    fn on_write_complete(&mut self, n: usize) -> Action;

    /// The connection is gone. The runtime releases it after this returns.
    fn on_disconnect(&mut self, reason: DisconnectReason);
}

/// What the runtime should do with a received datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatagramAction {
    /// Send this payload back to the sender.
    Reply(Bytes),
    /// Unrecoverable protocol violation; the process must not continue.
    Fatal(String),
}

/// Per-socket protocol logic driven by UDP datagrams.
pub trait DatagramHandler: Send {
    fn on_datagram(&mut self, peer: SocketAddr, payload: &[u8]) -> DatagramAction;

    /// A reply of `n` bytes was handed to the socket.
    fn on_reply_sent(&mut self, _n: usize) {}
}
