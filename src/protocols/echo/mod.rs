//! UDP echo protocol.
//!
//! Every datagram is sent back, byte for byte, to the address and port it
//! came from:
//!
//! ```text
//! Request:  ping
//! Response: ping
//! ```
//!
//! Useful for raw datagram throughput and integrity checks: no parsing, no
//! validation, no shared state.

pub mod handler;

pub use handler::UdpEchoHandler;
