//! Poll token layout.
//!
//! Connections take tokens from the bottom of the space (their slab key);
//! bound endpoints take tokens from the top, counting down from
//! `usize::MAX`, so the two ranges never meet.

use mio::Token;

/// Upper bound on bound endpoints.
pub const MAX_ENDPOINTS: usize = 64;

/// What a token refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Index into the endpoint table.
    Endpoint(usize),
    /// Key in the connection registry.
    Connection(usize),
}

pub fn endpoint_token(idx: usize) -> Token {
    debug_assert!(idx < MAX_ENDPOINTS, "endpoint index out of range");
    Token(usize::MAX - idx)
}

pub fn connection_token(conn_id: usize) -> Token {
    debug_assert!(conn_id <= usize::MAX - MAX_ENDPOINTS, "connection id out of range");
    Token(conn_id)
}

pub fn classify(token: Token) -> TokenKind {
    let idx = usize::MAX - token.0;
    if idx < MAX_ENDPOINTS {
        TokenKind::Endpoint(idx)
    } else {
        TokenKind::Connection(token.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        for idx in [0, 1, MAX_ENDPOINTS - 1] {
            assert_eq!(classify(endpoint_token(idx)), TokenKind::Endpoint(idx));
        }
        for id in [0, 1, 1000, usize::MAX - MAX_ENDPOINTS] {
            assert_eq!(classify(connection_token(id)), TokenKind::Connection(id));
        }
    }

    #[test]
    fn test_first_endpoint_is_max_token() {
        assert_eq!(endpoint_token(0), Token(usize::MAX));
    }
}
