//! HTTP connection handler.

use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, trace};

use super::parser::{self, Request};
use super::response::{build_header, ResponseBuilder, NOT_FOUND};
use crate::counters::ByteCounters;
use crate::runtime::{Action, DisconnectReason, StreamHandler};

/// Connection progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpState {
    AwaitingRequest,
    /// Response queued; this many writes are still outstanding.
    Responding { pending: usize },
    /// Terminal.
    Responded,
}

/// Serves one request per connection, then closes.
pub struct HttpHandler {
    state: HttpState,
    read_size: usize,
    counters: Arc<ByteCounters>,
    responses: Arc<ResponseBuilder>,
}

impl HttpHandler {
    pub fn new(read_size: usize, counters: Arc<ByteCounters>, responses: Arc<ResponseBuilder>) -> Self {
        Self {
            state: HttpState::AwaitingRequest,
            read_size,
            counters,
            responses,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> HttpState {
        self.state
    }

    fn respond(&mut self, request: Request) -> Action {
        let writes = match request {
            Request::Index => {
                let body = self.responses.build_body();
                let header = build_header(body.len());
                vec![Bytes::from(header), Bytes::from(body)]
            }
            Request::NotFound => vec![Bytes::from_static(NOT_FOUND.as_bytes())],
        };

        self.state = HttpState::Responding {
            pending: writes.len(),
        };
        Action::Write(writes)
    }
}

impl StreamHandler for HttpHandler {
    fn on_accept(&mut self, peer: SocketAddr) -> Action {
        trace!(peer = %peer, "HTTP connection accepted");
        Action::Read(self.read_size)
    }

    fn on_read_complete(&mut self, data: &[u8]) -> Action {
        self.counters.record_received(data.len());

        if self.state != HttpState::AwaitingRequest {
            return Action::Continue;
        }

        let request = parser::parse(data);
        debug!(bytes = data.len(), ?request, "HTTP request");
        self.respond(request)
    }

    fn on_write_complete(&mut self, n: usize) -> Action {
        self.counters.record_sent(n);

        match self.state {
            HttpState::Responding { pending } if pending > 1 => {
                self.state = HttpState::Responding {
                    pending: pending - 1,
                };
                Action::Continue
            }
            HttpState::Responding { .. } => {
                self.state = HttpState::Responded;
                Action::Close
            }
            _ => Action::Continue,
        }
    }

    fn on_disconnect(&mut self, reason: DisconnectReason) {
        trace!(%reason, state = ?self.state, "HTTP connection closed");
        self.state = HttpState::Responded;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> SocketAddr {
        "127.0.0.1:50000".parse().unwrap()
    }

    fn handler() -> (HttpHandler, Arc<ByteCounters>) {
        let counters = ByteCounters::new();
        let handler = HttpHandler::new(1024, Arc::clone(&counters), Arc::new(ResponseBuilder::new(3)));
        (handler, counters)
    }

    fn expect_writes(action: Action) -> Vec<Bytes> {
        match action {
            Action::Write(writes) => writes,
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_accept_issues_one_read() {
        let (mut handler, _) = handler();
        assert_eq!(handler.on_accept(peer()), Action::Read(1024));
        assert_eq!(handler.state(), HttpState::AwaitingRequest);
    }

    #[test]
    fn test_index_request() {
        let (mut handler, counters) = handler();
        handler.on_accept(peer());

        let request = b"GET / HTTP/1.1\r\n\r\n";
        let writes = expect_writes(handler.on_read_complete(request));
        assert_eq!(counters.received(), request.len() as u64);
        assert_eq!(writes.len(), 2);

        let header = std::str::from_utf8(&writes[0]).unwrap();
        let body = &writes[1];
        assert!(header.starts_with("HTTP/1.1 200 OK"));
        assert!(header.contains(&format!("Content-Length: {}\n", body.len())));
        assert!(body.starts_with(b"<html>"));
        assert_eq!(handler.state(), HttpState::Responding { pending: 2 });

        assert_eq!(handler.on_write_complete(writes[0].len()), Action::Continue);
        assert_eq!(handler.on_write_complete(writes[1].len()), Action::Close);
        assert_eq!(handler.state(), HttpState::Responded);
        assert_eq!(counters.sent(), (writes[0].len() + writes[1].len()) as u64);
    }

    #[test]
    fn test_other_request_gets_not_found() {
        let (mut handler, counters) = handler();
        handler.on_accept(peer());

        let writes = expect_writes(handler.on_read_complete(b"POST /x HTTP/1.1\r\n\r\n"));
        assert_eq!(writes, vec![Bytes::from_static(NOT_FOUND.as_bytes())]);

        assert_eq!(handler.on_write_complete(NOT_FOUND.len()), Action::Close);
        assert_eq!(counters.sent(), NOT_FOUND.len() as u64);
    }

    #[test]
    fn test_only_first_chunk_is_answered() {
        let (mut handler, counters) = handler();
        handler.on_accept(peer());

        expect_writes(handler.on_read_complete(b"GET /"));
        assert_eq!(handler.on_read_complete(b" HTTP/1.1\r\n\r\n"), Action::Continue);
        assert_eq!(counters.received(), 5 + 13);
    }

    #[test]
    fn test_disconnect_is_terminal() {
        let (mut handler, counters) = handler();
        handler.on_accept(peer());
        handler.on_disconnect(DisconnectReason::PeerClosed);
        assert_eq!(handler.state(), HttpState::Responded);
        assert_eq!(counters.snapshot().sent, 0);
    }
}
