//! The contract between servers, middleware and applications.
//!
//! A server hands an application an [`Environ`] and a [`StartResponse`]
//! capability. The application calls `start_response` once with the status
//! line and headers (before or while producing its first body chunk), and
//! returns a [`ResponseBody`] that the server drains. Middleware implements
//! [`Application`] itself, so layers compose into chains.

use crate::environ::Environ;
use bytes::Bytes;
use std::collections::VecDeque;

/// A response header: name and value, in wire order. Duplicates are allowed.
pub type Header = (String, String);

/// Capability to start a response.
pub trait StartResponse {
    /// Record the status line (`"200 OK"`) and headers.
    ///
    /// `exc_info` carries the failure that caused an error response, if any.
    /// The returned writer appends body bytes ahead of the returned body.
    fn start_response(
        &mut self,
        status: &str,
        headers: &[Header],
        exc_info: Option<&anyhow::Error>,
    ) -> &mut dyn BodyWriter;
}

/// Capability to push body bytes imperatively.
pub trait BodyWriter {
    fn write(&mut self, chunk: &[u8]);
}

/// A response body produced chunk by chunk.
pub trait ResponseBody: Send {
    /// Next chunk, `None` once exhausted.
    ///
    /// `start_response` is available so bodies that start lazily can call it
    /// before yielding their first chunk.
    fn next_chunk(
        &mut self,
        start_response: &mut dyn StartResponse,
    ) -> Option<anyhow::Result<Bytes>>;

    /// Release resources held by the body. Called once after draining.
    fn close(&mut self) {}
}

/// A request handler.
pub trait Application: Send + Sync {
    fn call(
        &self,
        environ: &mut Environ,
        start_response: &mut dyn StartResponse,
    ) -> anyhow::Result<Box<dyn ResponseBody>>;
}

impl<F> Application for F
where
    F: Fn(&mut Environ, &mut dyn StartResponse) -> anyhow::Result<Box<dyn ResponseBody>>
        + Send
        + Sync,
{
    fn call(
        &self,
        environ: &mut Environ,
        start_response: &mut dyn StartResponse,
    ) -> anyhow::Result<Box<dyn ResponseBody>> {
        self(environ, start_response)
    }
}

// ── Bodies ───────────────────────────────────────────────────────────────────

/// A body made of chunks that are already in memory.
#[derive(Debug, Default, Clone)]
pub struct ChunkedBody {
    chunks: VecDeque<Bytes>,
}

impl ChunkedBody {
    pub fn new<I, B>(chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
        }
    }

    /// A body holding exactly one chunk.
    pub fn single(chunk: impl Into<Bytes>) -> Self {
        Self::new([chunk.into()])
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Bytes still waiting to be yielded.
    pub fn remaining(&self) -> usize {
        self.chunks.iter().map(Bytes::len).sum()
    }
}

impl ResponseBody for ChunkedBody {
    fn next_chunk(&mut self, _start_response: &mut dyn StartResponse) -> Option<anyhow::Result<Bytes>> {
        self.chunks.pop_front().map(Ok)
    }
}

/// Drain `body` into one buffer, closing it afterwards on every path.
pub fn collect_body(
    body: Box<dyn ResponseBody>,
    start_response: &mut dyn StartResponse,
) -> anyhow::Result<Vec<u8>> {
    let mut guard = crate::capture::CloseGuard::new(body);
    let mut out = Vec::new();
    while let Some(chunk) = guard.next_chunk(start_response) {
        out.extend_from_slice(&chunk?);
    }
    Ok(out)
}
