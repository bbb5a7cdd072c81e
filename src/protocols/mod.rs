//! Protocol implementations.
//!
//! Each protocol has a handler used by the runtime event loop, and a parser
//! or response module where there is anything to parse or build.
//!
//! ## Stream Protocols
//! - `http`: Improvised HTTP serving one page
//! - `memprobe`: Memory usage reply (also has a datagram variant)
//!
//! ## Datagram Protocols
//! - `echo`: Verbatim echo
//! - `memprobe`: `memsize` request/reply

pub mod echo;
pub mod http;
pub mod memprobe;
