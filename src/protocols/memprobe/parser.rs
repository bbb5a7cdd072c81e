//! Memory probe request validation and reply formatting.

/// The only request accepted on the datagram channel.
pub const MEMSIZE: &[u8] = b"memsize";

/// Parsed datagram probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    Memsize,
    Invalid,
}

/// Validate a datagram probe. The payload must be exactly `memsize`.
pub fn parse(input: &[u8]) -> Probe {
    if input == MEMSIZE {
        Probe::Memsize
    } else {
        Probe::Invalid
    }
}

/// Stream reply: decimal byte count and a newline.
pub fn response_line(bytes: u64) -> String {
    format!("{bytes}\n")
}

/// Datagram reply: decimal byte count only.
pub fn response_datagram(bytes: u64) -> String {
    bytes.to_string()
}

/// Explicit protocol error reply.
pub fn response_error() -> &'static [u8] {
    b"ERROR expected memsize"
}
