//! HTTP request classification.

/// Substring that selects the index page.
const INDEX_REQUEST: &[u8] = b"GET / ";

/// Classified request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// The chunk contains `GET / `.
    Index,
    /// Anything else.
    NotFound,
}

/// Classify the first chunk read from a connection.
///
/// Only this chunk is inspected; a request line split across reads is
/// classified on its first part alone.
pub fn parse(input: &[u8]) -> Request {
    if contains(input, INDEX_REQUEST) {
        Request::Index
    } else {
        Request::NotFound
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_index() {
        assert_eq!(parse(b"GET / HTTP/1.1\r\n\r\n"), Request::Index);
        assert_eq!(parse(b"GET / "), Request::Index);
    }

    #[test]
    fn test_parse_index_anywhere_in_chunk() {
        assert_eq!(parse(b"garbage\r\nGET / HTTP/1.0\r\n"), Request::Index);
    }

    #[test]
    fn test_parse_not_found() {
        assert_eq!(parse(b"POST /x HTTP/1.1\r\n\r\n"), Request::NotFound);
        assert_eq!(parse(b"GET /index.html HTTP/1.1\r\n"), Request::NotFound);
        assert_eq!(parse(b"get / HTTP/1.1\r\n"), Request::NotFound);
        assert_eq!(parse(b""), Request::NotFound);
    }

    #[test]
    fn test_split_request_line_is_not_reassembled() {
        assert_eq!(parse(b"GET /"), Request::NotFound);
    }

    #[test]
    fn test_non_utf8_input() {
        assert_eq!(parse(&[0xff, 0xfe, b'G']), Request::NotFound);
        assert_eq!(parse(b"\xffGET / \xfe"), Request::Index);
    }
}
