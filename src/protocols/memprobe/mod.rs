//! Memory probe protocol.
//!
//! A private request/reply convention for monitoring the service's own
//! memory usage while it is under load.
//!
//! ```text
//! TCP:  any payload      ->  "<bytes>\n"   (connection stays open)
//! UDP:  "memsize"        ->  "<bytes>"
//! UDP:  anything else    ->  abort, or "ERROR expected memsize"
//! ```

pub mod handler;
pub mod parser;

pub use handler::{TcpMemProbeHandler, UdpMemProbeHandler};
