//! Improvised HTTP service.
//!
//! One read, one response, then close:
//!
//! ```text
//! Request:  any chunk containing "GET / "
//! Response: 200 header (two writes: header, then HTML body)
//!
//! Request:  anything else
//! Response: HTTP/1.1 404 Not Found \n Connection: close\n\n
//! ```
//!
//! The page carries one randomized heading colour so that successive
//! responses differ.

pub mod handler;
pub mod parser;
pub mod response;

pub use handler::HttpHandler;
pub use response::ResponseBuilder;
