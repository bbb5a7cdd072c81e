//! HTTP response construction.

use std::sync::Mutex;

/// Fixed reply for every request that is not `GET / `.
pub const NOT_FOUND: &str = "HTTP/1.1 404 Not Found \n Connection: close\n\n";

/// Build the 200 header announcing a body of `content_length` bytes.
pub fn build_header(content_length: usize) -> String {
    format!(
        "HTTP/1.1 200 OK \n \
         Date: Mon, 01 Jan 1970 00:00:01 GMT \n\
         Server: IncludeOS prototype 4.0 \n\
         Last-Modified: Wed, 08 Jan 2003 23:11:55 GMT \n\
         Content-Type: text/html; charset=UTF-8 \n\
         Content-Length: {content_length}\n\
         Accept-Ranges: bytes\n\
         Connection: close\n\n"
    )
}

const UBUNTU_MEDIUM: &str = "font-family: 'Ubuntu', sans-serif; font-weight: 500; ";
const UBUNTU_LIGHT: &str = "font-family: 'Ubuntu', sans-serif; font-weight: 300; ";

/// Builds page bodies, each with a freshly drawn heading colour.
///
/// The generator is shared by every connection and advances once per body.
pub struct ResponseBuilder {
    rng: Mutex<fastrand::Rng>,
}

impl ResponseBuilder {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(fastrand::Rng::with_seed(seed)),
        }
    }

    /// Seed from the wall clock at startup.
    pub fn from_boot_clock() -> Self {
        Self::new(boot_seed())
    }

    /// Draw the next 3-digit hex colour, e.g. `3fa`.
    pub fn next_color(&self) -> String {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        format!("{:03x}", rng.u16(..0x1000))
    }

    /// Build the HTML page. Starts with `<html>`.
    pub fn build_body(&self) -> String {
        let color = self.next_color();
        format!(
            "<html><head>\
             <link href='https://fonts.googleapis.com/css?family=Ubuntu:500,300' rel='stylesheet' type='text/css'>\
             </head><body>\
             <h1 style= \"color: #{color}\">\
             <span style=\"{UBUNTU_MEDIUM}\">Include</span><span style=\"{UBUNTU_LIGHT}\">OS</span> </h1>\
             <h2>Now speaks TCP!</h2>\
             <p> This is improvised http, but proper stuff is in the works. </p>\
             <footer><hr /> &copy; 2016, IncludeOS AS @ 60&deg; north </footer>\
             </body></html>\n"
        )
    }
}

fn boot_seed() -> u64 {
    chrono::Utc::now()
        .timestamp_nanos_opt()
        .map(|nanos| nanos as u64)
        .unwrap_or_else(|| chrono::Utc::now().timestamp_micros() as u64)
}
