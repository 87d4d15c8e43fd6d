//! Capturing what a downstream application produces.

use crate::app::{BodyWriter, Header, ResponseBody, StartResponse};
use bytes::{Bytes, BytesMut};
use tracing::debug;

/// Status used when the application never started a response.
pub const START_RESPONSE_NOT_CALLED: &str = "500 Start Response Not Called";

#[derive(Debug)]
enum CaptureState {
    NotStarted,
    Started { status: String, headers: Vec<Header> },
}

/// `StartResponse` handed to the downstream application.
///
/// Every call is forwarded to the caller's `StartResponse`; only the first
/// one is recorded. Writes through the returned [`BodyWriter`] and drained
/// chunks land in one buffer, in arrival order.
pub struct ResponseCapture<'a> {
    upstream: &'a mut dyn StartResponse,
    state: CaptureState,
    body: BytesMut,
}

/// The finished capture.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedResponse {
    pub status: String,
    pub headers: Vec<Header>,
    pub body: Bytes,
    /// False when the fallback status was substituted.
    pub started: bool,
}

impl<'a> ResponseCapture<'a> {
    pub fn new(upstream: &'a mut dyn StartResponse) -> Self {
        Self {
            upstream,
            state: CaptureState::NotStarted,
            body: BytesMut::new(),
        }
    }

    pub fn is_started(&self) -> bool {
        matches!(self.state, CaptureState::Started { .. })
    }

    /// Append a drained chunk.
    pub fn push(&mut self, chunk: &[u8]) {
        self.body.extend_from_slice(chunk);
    }

    pub fn body_len(&self) -> usize {
        self.body.len()
    }

    pub fn finish(self) -> CapturedResponse {
        let body = self.body.freeze();
        match self.state {
            CaptureState::Started { status, headers } => CapturedResponse {
                status,
                headers,
                body,
                started: true,
            },
            CaptureState::NotStarted => CapturedResponse {
                status: START_RESPONSE_NOT_CALLED.to_string(),
                headers: Vec::new(),
                body,
                started: false,
            },
        }
    }
}

impl StartResponse for ResponseCapture<'_> {
    fn start_response(
        &mut self,
        status: &str,
        headers: &[Header],
        exc_info: Option<&anyhow::Error>,
    ) -> &mut dyn BodyWriter {
        match self.state {
            CaptureState::NotStarted => {
                self.state = CaptureState::Started {
                    status: status.to_string(),
                    headers: headers.to_vec(),
                };
            }
            CaptureState::Started { .. } => {
                debug!(status, "start_response called again; keeping the first status");
            }
        }
        self.upstream.start_response(status, headers, exc_info);
        self
    }
}

impl BodyWriter for ResponseCapture<'_> {
    fn write(&mut self, chunk: &[u8]) {
        self.push(chunk);
    }
}

// ── Disposal ─────────────────────────────────────────────────────────────────

/// Owns a response body and closes it exactly once when dropped, including
/// during unwinding.
pub struct CloseGuard {
    body: Box<dyn ResponseBody>,
}

impl CloseGuard {
    pub fn new(body: Box<dyn ResponseBody>) -> Self {
        Self { body }
    }

    pub fn next_chunk(
        &mut self,
        start_response: &mut dyn StartResponse,
    ) -> Option<anyhow::Result<Bytes>> {
        self.body.next_chunk(start_response)
    }
}

impl Drop for CloseGuard {
    fn drop(&mut self) {
        self.body.close();
    }
}
