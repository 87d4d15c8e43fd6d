//! Plain-text request and response entries.

use crate::app::Header;
use crate::environ::Environ;
use crate::id::CorrelationId;
use reqlog_core::size::SizeLimit;
use std::fmt::{self, Write};

/// Appended to a logged body that was cut at the size limit.
pub const TRUNCATION_MARKER: &str = " ... (truncated)";

/// `time.ctime()`-style local timestamp, e.g. `Mon Oct 19 09:03:07 2026`.
pub fn ctime_now() -> String {
    chrono::Local::now().format("%a %b %e %H:%M:%S %Y").to_string()
}

/// Seconds since the Unix epoch with microsecond precision.
pub fn unix_now() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Time spent serving a request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Elapsed {
    Seconds(f64),
    Unknown,
}

impl fmt::Display for Elapsed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Elapsed::Seconds(s) => write!(f, "{s:.4}"),
            Elapsed::Unknown => f.write_str("??"),
        }
    }
}

/// Everything a response entry shows.
#[derive(Debug, Clone)]
pub struct ResponseRecord<'a> {
    pub id: CorrelationId,
    pub at: &'a str,
    pub elapsed: Elapsed,
    pub status: &'a str,
    pub headers: &'a [Header],
    pub body: &'a [u8],
}

pub fn request_entry(id: CorrelationId, at: &str, environ: &Environ) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "--- REQUEST {id} at {at} ---");
    let _ = writeln!(out, "URL: {}", environ.source_url());
    out.push_str("CGI Variables\n");
    for (key, value) in environ.cgi_variables() {
        let _ = writeln!(out, "  {key}: {value}");
    }
    out.push_str("WSGI Variables\n");
    for (key, value) in environ.wsgi_variables() {
        let _ = writeln!(out, "  {key}: {value}");
    }
    let _ = write!(out, "--- end REQUEST {id} ---");
    out
}

pub fn response_entry(record: &ResponseRecord<'_>, limit: SizeLimit) -> String {
    let id = record.id;
    let mut out = String::new();
    let _ = writeln!(
        out,
        "--- RESPONSE {id} at {} ({} seconds) ---",
        record.at, record.elapsed
    );
    let _ = writeln!(out, "Status: {}", record.status);
    out.push_str("Response Headers\n");
    for (name, value) in record.headers {
        let _ = writeln!(out, "  {name}: {value}");
    }
    let _ = writeln!(out, "Bodylen: {}", record.body.len());
    out.push_str("Body:\n\n");
    out.push_str(&body_text(record.body, limit));
    let _ = write!(out, "\n--- end RESPONSE {id} ---");
    out
}

/// Body as logged: lossy UTF-8, cut at `limit` with a marker.
pub fn body_text(body: &[u8], limit: SizeLimit) -> String {
    let (shown, truncated) = limit.apply(body);
    let mut text = String::from_utf8_lossy(shown).into_owned();
    if truncated {
        text.push_str(TRUNCATION_MARKER);
    }
    text
}
