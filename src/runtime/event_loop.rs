//! mio event loop implementation.
//!
//! Readiness-based model: poll tells us when sockets are ready, then we
//! perform non-blocking read/write syscalls and turn their results into
//! completion events for the protocol handlers. Uses epoll on Linux,
//! kqueue on macOS.
//!
//! Everything runs on one thread. Connection sockets are registered for
//! both readable and writable readiness once; after each wakeup the
//! connection is driven until the socket would block, so no edge is lost
//! when a handler switches between reading and writing.

use mio::net::{TcpListener, TcpStream, UdpSocket};
use mio::{Events, Interest, Poll, Token};
use std::fmt::Write as _;
use std::io::{self, Read, Write};
use std::net::{IpAddr, SocketAddr};
use std::time::Instant;
use tracing::{debug, error, info, trace, warn};

use crate::config::Config;
use crate::runtime::connection::{ConnState, Connection, ConnectionRegistry, HalfClose};
use crate::runtime::protocol::{Protocol, ServiceContext, Transport};
use crate::runtime::timer::PeriodicTimer;
use crate::runtime::token::{self, TokenKind};
use crate::runtime::{Action, DatagramAction, DatagramHandler, DisconnectReason};
use crate::status::StatusReporter;

const EVENTS_CAPACITY: usize = 256;

/// Largest UDP payload.
const DATAGRAM_BUFFER_SIZE: usize = 64 * 1024;

const LISTEN_BACKLOG: i32 = 1024;

enum EndpointKind {
    Listener(TcpListener),
    Datagram {
        socket: UdpSocket,
        handler: Box<dyn DatagramHandler>,
    },
}

/// A bound port and the protocol served on it.
struct Endpoint {
    protocol: Protocol,
    local_addr: SocketAddr,
    kind: EndpointKind,
}

/// Single-threaded event loop owning every socket in the service.
pub struct EventLoop {
    poll: Poll,
    events: Events,
    endpoints: Vec<Endpoint>,
    connections: ConnectionRegistry,
    context: ServiceContext,
    read_buf: Vec<u8>,
    datagram_buf: Vec<u8>,
    reporter: StatusReporter,
    timer: PeriodicTimer,
}

impl EventLoop {
    /// Bind every endpoint named in `config` and register it with the poller.
    pub fn bind(
        config: &Config,
        context: ServiceContext,
        reporter: StatusReporter,
    ) -> io::Result<Self> {
        let poll = Poll::new()?;
        let host: IpAddr = config
            .host
            .parse()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        let mut endpoints = Vec::with_capacity(Protocol::ALL.len());
        for (idx, protocol) in Protocol::ALL.into_iter().enumerate() {
            let addr = SocketAddr::new(host, protocol.port(config));
            let mut endpoint = bind_endpoint(protocol, addr, &context)?;

            let token = token::endpoint_token(idx);
            match &mut endpoint.kind {
                EndpointKind::Listener(listener) => {
                    poll.registry()
                        .register(listener, token, Interest::READABLE)?;
                }
                EndpointKind::Datagram { socket, .. } => {
                    poll.registry().register(socket, token, Interest::READABLE)?;
                }
            }

            info!(
                protocol = %protocol,
                transport = %protocol.transport(),
                addr = %endpoint.local_addr,
                "Endpoint bound"
            );
            endpoints.push(endpoint);
        }

        let timer = PeriodicTimer::new(config.status_interval, Instant::now());
        info!(
            max_connections = config.max_connections,
            read_size = context.read_size,
            status_interval_secs = timer.period().as_secs(),
            "Event loop ready"
        );

        Ok(Self {
            poll,
            events: Events::with_capacity(EVENTS_CAPACITY),
            endpoints,
            connections: ConnectionRegistry::new(config.max_connections),
            read_buf: vec![0u8; context.read_size],
            context,
            datagram_buf: vec![0u8; DATAGRAM_BUFFER_SIZE],
            reporter,
            timer,
        })
    }

    /// Actual address an endpoint is bound to. Useful with port 0.
    #[cfg(test)]
    pub fn local_addr(&self, protocol: Protocol) -> Option<SocketAddr> {
        self.endpoints
            .iter()
            .find(|endpoint| endpoint.protocol == protocol)
            .map(|endpoint| endpoint.local_addr)
    }

    /// Run until a poll error occurs.
    pub fn run(mut self) -> io::Result<()> {
        loop {
            self.turn()?;
        }
    }

    /// Wait for one batch of events (or the status timer) and process it.
    fn turn(&mut self) -> io::Result<()> {
        let timeout = self.timer.timeout(Instant::now());
        match self.poll.poll(&mut self.events, Some(timeout)) {
            Ok(()) => {}
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => return Ok(()),
            Err(e) => return Err(e),
        }

        let tokens: Vec<Token> = self.events.iter().map(|event| event.token()).collect();
        for token in tokens {
            match token::classify(token) {
                TokenKind::Endpoint(idx) => match self.endpoints.get(idx).map(|e| e.protocol.transport()) {
                    Some(Transport::Tcp) => self.accept_connections(idx),
                    Some(Transport::Udp) => self.handle_datagrams(idx),
                    None => {}
                },
                TokenKind::Connection(conn_id) => self.handle_connection_event(conn_id),
            }
        }

        if self.timer.fire_if_due(Instant::now()) {
            let status = self.stack_status();
            self.reporter.report(status);
        }

        Ok(())
    }

    fn accept_connections(&mut self, idx: usize) {
        let Endpoint {
            protocol,
            local_addr,
            kind: EndpointKind::Listener(listener),
        } = &self.endpoints[idx]
        else {
            return;
        };
        let protocol = *protocol;
        let local_port = local_addr.port();

        let mut accepted = Vec::new();
        loop {
            let (stream, peer) = match listener.accept() {
                Ok(pair) => pair,
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    error!(protocol = %protocol, "Accept error: {}", e);
                    break;
                }
            };

            if self.connections.is_full() {
                warn!(peer = %peer, "Connection limit reached");
                continue;
            }

            let Some(handler) = self.context.stream_handler(protocol) else {
                continue;
            };

            let conn = Connection::new(stream, peer, local_port, protocol, handler);
            let Some(conn_id) = self.connections.insert(conn) else {
                continue;
            };

            // Re-borrow after insert
            let Some(conn) = self.connections.get_mut(conn_id) else {
                continue;
            };
            if let Err(e) = self.poll.registry().register(
                &mut conn.stream,
                token::connection_token(conn_id),
                Interest::READABLE | Interest::WRITABLE,
            ) {
                warn!(peer = %peer, error = %e, "Failed to register connection");
                self.connections.remove(conn_id);
                continue;
            }
            conn.accept();

            debug!(conn_id, peer = %peer, protocol = %protocol, "Accepted connection");
            accepted.push(conn_id);
        }

        for conn_id in accepted {
            self.handle_connection_event(conn_id);
        }
    }

    fn handle_connection_event(&mut self, conn_id: usize) {
        let Some(conn) = self.connections.get_mut(conn_id) else {
            return;
        };

        if let Some(reason) = drive(conn, &mut self.read_buf) {
            self.close_connection(conn_id, reason);
        }
    }

    fn close_connection(&mut self, conn_id: usize, reason: DisconnectReason) {
        if let Some(mut conn) = self.connections.remove(conn_id) {
            let _ = self.poll.registry().deregister(&mut conn.stream);
            debug!(conn_id, peer = %conn.peer, %reason, "Connection closed");
            conn.handler.on_disconnect(reason);
        }
    }

    fn handle_datagrams(&mut self, idx: usize) {
        let Endpoint {
            protocol,
            kind: EndpointKind::Datagram { socket, handler },
            ..
        } = &mut self.endpoints[idx]
        else {
            return;
        };

        loop {
            let (n, peer) = match socket.recv_from(&mut self.datagram_buf) {
                Ok(pair) => pair,
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!(protocol = %protocol, error = %e, "Datagram receive failed");
                    break;
                }
            };

            match handler.on_datagram(peer, &self.datagram_buf[..n]) {
                DatagramAction::Reply(reply) => match socket.send_to(&reply, peer) {
                    Ok(sent) => handler.on_reply_sent(sent),
                    Err(e) => {
                        warn!(peer = %peer, error = %e, "Datagram reply dropped");
                    }
                },
                DatagramAction::Fatal(reason) => fatal(&reason),
            }
        }
    }

    /// Text snapshot of endpoints and open connections.
    pub fn stack_status(&self) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "LISTENERS:");
        for endpoint in &self.endpoints {
            let _ = writeln!(
                out,
                "  {:<4} {:<9} {}",
                endpoint.protocol.transport(),
                endpoint.protocol,
                endpoint.local_addr
            );
        }

        let _ = writeln!(
            out,
            "CONNECTIONS: {}/{}",
            self.connections.len(),
            self.connections.capacity()
        );
        for (conn_id, conn) in self.connections.iter() {
            let _ = writeln!(
                out,
                "  #{:<5} {:<9} {:<5} <- {:<21} {} ({} bytes queued)",
                conn_id,
                conn.protocol,
                conn.local_port,
                conn.peer,
                conn.state,
                conn.pending_bytes()
            );
        }

        out
    }
}

/// Terminate on an unrecoverable protocol violation.
fn fatal(reason: &str) -> ! {
    error!(reason, "Fatal precondition violation, aborting");
    eprintln!("Fatal: {reason}");
    std::process::abort()
}

/// Advance a connection until its socket would block or it ends.
///
/// A local close shuts the write side and waits for the peer's end of
/// stream before the connection is released. Returns the reason once the
/// connection should be released.
fn drive<S: Read + Write + HalfClose>(
    conn: &mut Connection<S>,
    read_buf: &mut [u8],
) -> Option<DisconnectReason> {
    loop {
        match conn.state {
            ConnState::Reading { max } => {
                let limit = max.min(read_buf.len());
                match conn.stream.read(&mut read_buf[..limit]) {
                    Ok(0) => return Some(DisconnectReason::PeerClosed),
                    Ok(n) => {
                        trace!(bytes = n, "Read complete");
                        let action = conn.handler.on_read_complete(&read_buf[..n]);
                        conn.apply(action);
                    }
                    Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return None,
                    Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                    Err(e) => return Some(DisconnectReason::Error(e)),
                }
            }
            ConnState::Writing => {
                let Some(front) = conn.write_queue.front() else {
                    conn.apply(Action::Continue);
                    continue;
                };

                if conn.written >= front.len() {
                    let n = front.len();
                    conn.write_queue.pop_front();
                    conn.written = 0;
                    trace!(bytes = n, "Write complete");
                    let action = conn.handler.on_write_complete(n);
                    conn.apply(action);
                    continue;
                }

                match conn.stream.write(&front[conn.written..]) {
                    Ok(0) => {
                        return Some(DisconnectReason::Error(io::Error::new(
                            io::ErrorKind::WriteZero,
                            "write returned 0",
                        )));
                    }
                    Ok(n) => conn.written += n,
                    Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return None,
                    Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                    Err(e) => return Some(DisconnectReason::Error(e)),
                }
            }
            ConnState::Closing => {
                // Unread input at drop time turns the close into a reset.
                if let Err(e) = conn.stream.shutdown_write() {
                    return Some(DisconnectReason::Error(e));
                }
                conn.state = ConnState::Draining;
            }
            ConnState::AwaitingClose | ConnState::Draining => {
                match conn.stream.read(read_buf) {
                    Ok(0) if conn.state == ConnState::Draining => {
                        return Some(DisconnectReason::Local)
                    }
                    Ok(0) => return Some(DisconnectReason::PeerClosed),
                    Ok(n) => {
                        trace!(bytes = n, "Discarded input after exchange");
                        let _ = conn.handler.on_read_complete(&read_buf[..n]);
                    }
                    Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return None,
                    Err(ref e) if e.kind() == io::ErrorKind::Interrupted => {}
                    Err(e) => return Some(DisconnectReason::Error(e)),
                }
            }
        }
    }
}

/// Create a TCP listener with SO_REUSEADDR so restarts can rebind at once.
fn create_listener(addr: SocketAddr) -> io::Result<std::net::TcpListener> {
    let socket = socket2::Socket::new(
        socket2::Domain::for_address(addr),
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;

    Ok(socket.into())
}

fn create_datagram_socket(addr: SocketAddr) -> io::Result<std::net::UdpSocket> {
    let socket = socket2::Socket::new(
        socket2::Domain::for_address(addr),
        socket2::Type::DGRAM,
        Some(socket2::Protocol::UDP),
    )?;

    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;

    Ok(socket.into())
}

fn bind_endpoint(
    protocol: Protocol,
    addr: SocketAddr,
    context: &ServiceContext,
) -> io::Result<Endpoint> {
    let bind_error = |e: io::Error| {
        io::Error::new(
            e.kind(),
            format!("failed to bind {} {} on {}: {}", protocol.transport(), protocol, addr, e),
        )
    };

    match protocol.transport() {
        Transport::Tcp => {
            let listener = TcpListener::from_std(create_listener(addr).map_err(bind_error)?);
            Ok(Endpoint {
                protocol,
                local_addr: listener.local_addr()?,
                kind: EndpointKind::Listener(listener),
            })
        }
        Transport::Udp => {
            let socket = UdpSocket::from_std(create_datagram_socket(addr).map_err(bind_error)?);
            let handler = context.datagram_handler(protocol).ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidInput, "no datagram handler")
            })?;
            Ok(Endpoint {
                protocol,
                local_addr: socket.local_addr()?,
                kind: EndpointKind::Datagram { socket, handler },
            })
        }
    }
}
