//! Connection state machine for managing TCP connections.
//!
//! Each connection tracks its current state (reading, writing, etc.),
//! its queued writes, and the protocol handler serving it. Handlers never
//! see this state directly; they answer events with an [`Action`] and the
//! connection applies it.

use bytes::Bytes;
use mio::net::TcpStream;
use slab::Slab;
use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::net::{Shutdown, SocketAddr};

use crate::runtime::protocol::Protocol;
use crate::runtime::{Action, StreamHandler};

/// Current state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// One read of up to `max` bytes is outstanding.
    Reading { max: usize },
    /// Writing queued buffers in order.
    Writing,
    /// Done with requests; waiting for the peer to close.
    AwaitingClose,
    /// The handler asked for the close; the write side is shut next.
    Closing,
    /// Write side shut; discarding input until the peer closes.
    Draining,
}

impl fmt::Display for ConnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnState::Reading { .. } => f.pad("READING"),
            ConnState::Writing => f.pad("WRITING"),
            ConnState::AwaitingClose => f.pad("AWAIT-CLOSE"),
            ConnState::Closing => f.pad("CLOSING"),
            ConnState::Draining => f.pad("DRAINING"),
        }
    }
}

/// Stream socket whose sending half can be closed on its own.
pub trait HalfClose {
    fn shutdown_write(&self) -> io::Result<()>;
}

impl HalfClose for TcpStream {
    fn shutdown_write(&self) -> io::Result<()> {
        self.shutdown(Shutdown::Write)
    }
}

/// A single client connection.
pub struct Connection<S = TcpStream> {
    pub stream: S,
    pub peer: SocketAddr,
    pub local_port: u16,
    pub protocol: Protocol,
    pub state: ConnState,
    pub handler: Box<dyn StreamHandler>,
    /// Buffers waiting to be written, in order.
    pub write_queue: VecDeque<Bytes>,
    /// Bytes of the front buffer already written.
    pub written: usize,
}

impl<S> Connection<S> {
    /// Create a connection that has not yet been offered to its handler.
    pub fn new(
        stream: S,
        peer: SocketAddr,
        local_port: u16,
        protocol: Protocol,
        handler: Box<dyn StreamHandler>,
    ) -> Self {
        Self {
            stream,
            peer,
            local_port,
            protocol,
            state: ConnState::AwaitingClose,
            handler,
            write_queue: VecDeque::new(),
            written: 0,
        }
    }

    /// Deliver the accept event and apply the handler's answer.
    pub fn accept(&mut self) {
        let action = self.handler.on_accept(self.peer);
        self.apply(action);
    }

    /// Apply a handler's answer to the connection state.
    pub fn apply(&mut self, action: Action) {
        match action {
            Action::Read(max) => self.state = ConnState::Reading { max },
            Action::Write(buffers) => {
                self.write_queue.extend(buffers);
                self.state = ConnState::Writing;
            }
            Action::Continue => {}
            Action::AwaitClose => {
                if self.state != ConnState::Writing {
                    self.state = ConnState::AwaitingClose;
                }
            }
            Action::Close => self.state = ConnState::Closing,
        }

        // A drained queue with nothing new requested means the exchange is over.
        if self.state == ConnState::Writing && self.write_queue.is_empty() {
            self.state = ConnState::AwaitingClose;
        }
    }

    /// Bytes queued but not yet written.
    pub fn pending_bytes(&self) -> usize {
        self.write_queue.iter().map(Bytes::len).sum::<usize>() - self.written
    }
}

/// Registry of active connections using slab allocation.
///
/// Provides O(1) insert, lookup, and remove operations.
pub struct ConnectionRegistry<S = TcpStream> {
    connections: Slab<Connection<S>>,
    max_connections: usize,
}

impl<S> ConnectionRegistry<S> {
    /// Create a new registry with specified maximum capacity.
    pub fn new(max_connections: usize) -> Self {
        Self {
            connections: Slab::with_capacity(max_connections),
            max_connections,
        }
    }

    /// Insert a new connection into the registry.
    ///
    /// Returns `None` if the registry is at capacity.
    pub fn insert(&mut self, conn: Connection<S>) -> Option<usize> {
        if self.is_full() {
            return None;
        }
        Some(self.connections.insert(conn))
    }

    pub fn get_mut(&mut self, id: usize) -> Option<&mut Connection<S>> {
        self.connections.get_mut(id)
    }

    /// Remove a connection from the registry.
    pub fn remove(&mut self, id: usize) -> Option<Connection<S>> {
        self.connections.try_remove(id)
    }

    /// Number of active connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_full(&self) -> bool {
        self.connections.len() >= self.max_connections
    }

    /// Maximum number of connections allowed.
    pub fn capacity(&self) -> usize {
        self.max_connections
    }

    /// Iterate over all connections.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Connection<S>)> {
        self.connections.iter()
    }
}
